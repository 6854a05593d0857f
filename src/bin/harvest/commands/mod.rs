//! Command implementations

pub mod info;
pub mod plan;
pub mod run;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::cli::RuntimeArgs;
use harvest::core::{RuntimeInfo, RuntimeProfile};
use harvest::ops::{ArtifactDeployer, HarvestOptions, HarvestSummary, LibraryOutcome};
use harvest::scanner::NativeScanner;
use harvest::sources::VcpkgCliProvider;
use harvest::util::config::{find_config, HarvestConfig};
use harvest::util::diagnostic::{emit, suggestions};
use harvest::util::fs::absolute;
use harvest::util::VcpkgIntegration;

/// Default output directory, relative to the config file.
const DEFAULT_OUTPUT_DIR: &str = "harvest_output";

/// Options every command receives.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub color: bool,
}

/// Everything needed to harvest for one runtime.
pub struct Session {
    pub config: HarvestConfig,
    pub config_dir: PathBuf,
    pub profile: RuntimeProfile,
    pub vcpkg: VcpkgIntegration,
    pub provider: VcpkgCliProvider,
    pub scanner: NativeScanner,
}

impl Session {
    pub fn open(global: &GlobalOpts, runtime: &RuntimeArgs) -> Result<Self> {
        let (mut config, config_path) = load_config(global.config.as_deref())?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if let Some(root) = &runtime.vcpkg_root {
            config.vcpkg.root = Some(root.clone());
        }

        let info = resolve_runtime(&config, runtime)?;
        let manifests = config.manifest_config();
        let profile = RuntimeProfile::new(&info, &config.system_artifacts, manifests.core())?;

        let vcpkg = VcpkgIntegration::from_config(&config.vcpkg, profile.triplet())?;
        tracing::debug!(
            "Using vcpkg at {} (triplet {})",
            vcpkg.root.display(),
            vcpkg.triplet
        );

        let provider = VcpkgCliProvider::new(vcpkg.clone());
        let scanner = NativeScanner::for_os(profile.os_family(), &config.tools);

        Ok(Session {
            config,
            config_dir,
            profile,
            vcpkg,
            provider,
            scanner,
        })
    }

    pub fn harvest_options(&self, output: Option<PathBuf>, dry_run: bool) -> HarvestOptions {
        let output_root = output
            .or_else(|| self.config.output.dir.clone())
            .unwrap_or_else(|| self.config_dir.join(DEFAULT_OUTPUT_DIR));

        HarvestOptions {
            output_root,
            archive_base: self.vcpkg.lib_dir(),
            dry_run,
            write_reports: self.config.output.write_reports,
        }
    }

    pub fn deployer(&self, tar: Option<&Path>) -> ArtifactDeployer {
        ArtifactDeployer::new(tar.or(self.config.tools.tar.as_deref()))
    }
}

/// Load the config from `path`, or search upward from the current directory.
pub fn load_config(path: Option<&Path>) -> Result<(HarvestConfig, PathBuf)> {
    let path = match path {
        // a bare `--config Harvest.toml` has an empty parent
        Some(path) => absolute(path)?,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            find_config(&cwd).ok_or_else(|| {
                anyhow!(
                    "could not find Harvest.toml in {} or any parent directory\n{}",
                    cwd.display(),
                    suggestions::NO_CONFIG
                )
            })?
        }
    };

    let config = HarvestConfig::load_with_global(&path)?;
    Ok((config, path))
}

/// RID from the command line or the host; triplet from the command line,
/// `[vcpkg] triplet`, or the matching `[[runtimes]]` entry.
pub fn resolve_runtime(config: &HarvestConfig, args: &RuntimeArgs) -> Result<RuntimeInfo> {
    let rid = match &args.rid {
        Some(rid) => rid.clone(),
        None => RuntimeProfile::host_rid()
            .ok_or_else(|| anyhow!("cannot determine the host RID; pass --rid"))?,
    };

    let triplet = match args.triplet.as_ref().or(config.vcpkg.triplet.as_ref()) {
        Some(triplet) => triplet.clone(),
        None => match config.runtime(&rid) {
            Some(runtime) => runtime.triplet.clone(),
            None => bail!(
                "no triplet configured for runtime `{}`\n\
                 help: Add a [[runtimes]] entry to Harvest.toml or pass --triplet",
                rid
            ),
        },
    };

    Ok(RuntimeInfo::new(rid, triplet))
}

/// Print skip/failure diagnostics and a one-line summary.
pub fn report_summary(summary: &HarvestSummary, color: bool) {
    for result in &summary.results {
        match &result.outcome {
            LibraryOutcome::Skipped { diagnostic } | LibraryOutcome::Failed { diagnostic } => {
                emit(diagnostic, color)
            }
            _ => {}
        }
    }

    eprintln!(
        "{}: {} harvested, {} skipped, {} failed",
        summary.rid,
        summary.harvested(),
        summary.skipped(),
        summary.failed()
    );
}
