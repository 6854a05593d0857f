//! Deployment plans.
//!
//! A plan is the ordered list of filesystem actions that turn a binary
//! closure into a redistributable layout, plus statistics describing it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Why an artifact is part of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactOrigin {
    /// The library's own binary
    Primary,
    /// A binary the library needs at runtime
    Runtime,
    /// A license or copyright file
    License,
}

impl fmt::Display for ArtifactOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactOrigin::Primary => write!(f, "primary"),
            ArtifactOrigin::Runtime => write!(f, "runtime"),
            ArtifactOrigin::License => write!(f, "license"),
        }
    }
}

/// How binaries are shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentStrategy {
    /// Each binary is copied into the output tree (Windows).
    DirectCopy,
    /// Binaries are packed into one tar.gz that keeps symlink chains (Unix).
    Archive,
}

/// Where an individual file ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentLocation {
    FileSystem,
    Archive,
}

/// One file inside an archive action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveItem {
    pub source: PathBuf,
    pub package: String,
    pub origin: ArtifactOrigin,
}

/// A single step of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum DeploymentAction {
    FileCopy {
        source: PathBuf,
        target: PathBuf,
        package: String,
        origin: ArtifactOrigin,
    },
    ArchiveCreate {
        archive_path: PathBuf,
        /// Working directory of the archiver; item members are file names
        /// relative to it
        base_directory: PathBuf,
        items: Vec<ArchiveItem>,
        archive_name: String,
    },
}

impl DeploymentAction {
    /// Action kind, used in error reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DeploymentAction::FileCopy { .. } => "FileCopy",
            DeploymentAction::ArchiveCreate { .. } => "ArchiveCreate",
        }
    }
}

/// A file accounted for in the statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDeploymentInfo {
    pub path: PathBuf,
    pub package: String,
    pub location: DeploymentLocation,
}

/// What a plan deploys, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatistics {
    pub library: String,
    pub primary_files: Vec<FileDeploymentInfo>,
    pub runtime_files: Vec<FileDeploymentInfo>,
    pub license_files: Vec<FileDeploymentInfo>,
    /// Packages with at least one deployed artifact
    pub deployed_packages: BTreeSet<String>,
    /// Packages visited by the walk that ended up with nothing deployed
    pub filtered_packages: BTreeSet<String>,
    pub strategy: DeploymentStrategy,
}

/// Ordered actions plus statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub actions: Vec<DeploymentAction>,
    pub statistics: DeploymentStatistics,
}

impl DeploymentPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Total number of files moved by the plan, archive members included.
    pub fn file_count(&self) -> usize {
        self.actions
            .iter()
            .map(|action| match action {
                DeploymentAction::FileCopy { .. } => 1,
                DeploymentAction::ArchiveCreate { items, .. } => items.len(),
            })
            .sum()
    }
}
