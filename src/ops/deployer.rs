//! Deployment plan execution.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::NamedTempFile;

use crate::core::errors::DeployError;
use crate::core::plan::{ArchiveItem, DeploymentAction, DeploymentPlan};
use crate::util::cancel::CancellationToken;
use crate::util::fs::{absolute, copy_file, ensure_dir};
use crate::util::process::{resolve_tool, ProcessBuilder};

/// Executes deployment plans on the local filesystem.
#[derive(Debug, Clone)]
pub struct ArtifactDeployer {
    archiver: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl Default for ArtifactDeployer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ArtifactDeployer {
    /// Create a deployer using `tar` (or the given override).
    pub fn new(tar: Option<&Path>) -> Self {
        ArtifactDeployer {
            archiver: resolve_tool(tar, "tar"),
            temp_dir: None,
        }
    }

    /// Use a specific archiver executable. It is invoked as
    /// `<archiver> -czf <archive> -T <list>`.
    pub fn with_archiver(mut self, archiver: impl Into<PathBuf>) -> Self {
        self.archiver = archiver.into();
        self
    }

    /// Directory for temporary archive member lists.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Execute every action in order. The first failure stops the run.
    pub fn deploy(
        &self,
        plan: &DeploymentPlan,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError> {
        for action in &plan.actions {
            cancel.check()?;

            match action {
                DeploymentAction::FileCopy { source, target, .. } => {
                    copy_file(source, target).map_err(|e| DeployError::Action {
                        action: action.kind_name(),
                        message: format!("could not copy {}", source.display()),
                        cause: Some(e),
                    })?;
                    tracing::debug!("Copied {} -> {}", source.display(), target.display());
                }
                DeploymentAction::ArchiveCreate {
                    archive_path,
                    base_directory,
                    items,
                    ..
                } => self.create_archive(action, archive_path, base_directory, items)?,
            }
        }

        tracing::info!(
            "Deployed {} files for {}",
            plan.file_count(),
            plan.statistics.library
        );
        Ok(())
    }

    fn create_archive(
        &self,
        action: &DeploymentAction,
        archive_path: &Path,
        base_directory: &Path,
        items: &[ArchiveItem],
    ) -> Result<(), DeployError> {
        if items.is_empty() {
            tracing::debug!("Nothing to archive for {}", archive_path.display());
            return Ok(());
        }

        let action_error = |message: String, cause: anyhow::Error| DeployError::Action {
            action: action.kind_name(),
            message,
            cause: Some(cause),
        };

        // tar runs inside the base directory
        let archive_path = absolute(archive_path)
            .map_err(|e| action_error("could not resolve archive path".to_string(), e))?;

        if let Some(parent) = archive_path.parent() {
            ensure_dir(parent).map_err(|e| {
                action_error(format!("could not create {}", parent.display()), e)
            })?;
        }

        // removed on drop, including every early return below
        let list = self
            .write_member_list(base_directory, items)
            .map_err(|e| action_error("could not write archive member list".to_string(), e))?;

        let command = ProcessBuilder::new(&self.archiver)
            .cwd(base_directory)
            .arg("-czf")
            .arg(&archive_path)
            .arg("-T")
            .arg(list.path());

        let output = command.exec().map_err(|e| {
            action_error(format!("could not run {}", self.archiver.display()), e)
        })?;

        if !output.status.success() {
            return Err(DeployError::Archiver {
                archive: archive_path,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tracing::debug!(
            "Archived {} files into {}",
            items.len(),
            archive_path.display()
        );
        Ok(())
    }

    /// One member per line, relative to `base_directory` when possible.
    fn write_member_list(
        &self,
        base_directory: &Path,
        items: &[ArchiveItem],
    ) -> anyhow::Result<NamedTempFile> {
        let mut list = match &self.temp_dir {
            Some(dir) => {
                ensure_dir(dir)?;
                NamedTempFile::new_in(absolute(dir)?)
            }
            None => NamedTempFile::new(),
        }
        .context("failed to create temporary file")?;

        for item in items {
            let member = item
                .source
                .strip_prefix(base_directory)
                .unwrap_or(&item.source);
            writeln!(list, "{}", member.display())?;
        }
        list.flush()?;

        Ok(list)
    }
}
