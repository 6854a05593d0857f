//! Harvest driver.
//!
//! Chains closure, plan and deployment for each requested library on one
//! runtime profile. A library that is not installed is skipped, any other
//! failure is recorded and the batch moves on. Cancellation stops the batch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::closure::BinaryClosure;
use crate::core::errors::{ClosureError, DeployError, HarvestError, PlanError};
use crate::core::manifest::{LibraryManifest, ManifestConfig};
use crate::core::plan::{DeploymentPlan, DeploymentStatistics};
use crate::core::profile::RuntimeProfile;
use crate::ops::closure::BinaryClosureWalker;
use crate::ops::deployer::ArtifactDeployer;
use crate::ops::planner::ArtifactPlanner;
use crate::scanner::RuntimeScanner;
use crate::sources::PackageInfoProvider;
use crate::util::cancel::CancellationToken;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::write_string;

/// Options for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Output root; each library gets `<output_root>/<library>/`
    pub output_root: PathBuf,
    /// Directory archive members are taken from (`installed/<triplet>/lib`)
    pub archive_base: PathBuf,
    /// Plan without touching the filesystem
    pub dry_run: bool,
    /// Write `harvest-<library>-<rid>.json` after each deployment
    pub write_reports: bool,
}

/// What happened to one library.
#[derive(Debug)]
pub enum LibraryOutcome {
    /// Deployed; `report` is the written report file, if any.
    Harvested {
        plan: DeploymentPlan,
        report: Option<PathBuf>,
    },
    /// Planned only (dry run).
    Planned { plan: DeploymentPlan },
    /// Not installed for this triplet.
    Skipped { diagnostic: Diagnostic },
    Failed { diagnostic: Diagnostic },
}

#[derive(Debug)]
pub struct LibraryResult {
    pub library: String,
    pub outcome: LibraryOutcome,
}

/// Results of a batch, in request order.
#[derive(Debug)]
pub struct HarvestSummary {
    pub rid: String,
    pub results: Vec<LibraryResult>,
}

impl HarvestSummary {
    /// No library failed. Skipped libraries do not count as failures.
    pub fn all_succeeded(&self) -> bool {
        !self
            .results
            .iter()
            .any(|r| matches!(r.outcome, LibraryOutcome::Failed { .. }))
    }

    pub fn count(&self, f: impl Fn(&LibraryOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn harvested(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                LibraryOutcome::Harvested { .. } | LibraryOutcome::Planned { .. }
            )
        })
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LibraryOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LibraryOutcome::Failed { .. }))
    }
}

/// JSON report written next to the harvested artifacts.
#[derive(Debug, Serialize)]
pub struct HarvestReport<'a> {
    pub library: &'a str,
    pub rid: &'a str,
    pub triplet: &'a str,
    pub primary_binaries: &'a [PathBuf],
    pub packages: &'a BTreeSet<String>,
    pub statistics: &'a DeploymentStatistics,
}

/// Runs harvests for one runtime profile.
pub struct Harvester<'a, P: ?Sized, S: ?Sized> {
    provider: &'a P,
    scanner: &'a S,
    profile: &'a RuntimeProfile,
    manifests: &'a ManifestConfig,
    deployer: ArtifactDeployer,
    options: HarvestOptions,
}

impl<'a, P, S> Harvester<'a, P, S>
where
    P: PackageInfoProvider + ?Sized,
    S: RuntimeScanner + ?Sized,
{
    pub fn new(
        provider: &'a P,
        scanner: &'a S,
        profile: &'a RuntimeProfile,
        manifests: &'a ManifestConfig,
        deployer: ArtifactDeployer,
        options: HarvestOptions,
    ) -> Self {
        Harvester {
            provider,
            scanner,
            profile,
            manifests,
            deployer,
            options,
        }
    }

    /// Harvest `libraries` by name, or every configured library when empty.
    pub fn harvest(
        &self,
        libraries: &[String],
        cancel: &CancellationToken,
    ) -> Result<HarvestSummary, HarvestError> {
        let names: Vec<String> = if libraries.is_empty() {
            self.manifests
                .libraries
                .iter()
                .map(|m| m.name.clone())
                .collect()
        } else {
            libraries.to_vec()
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            cancel.check()?;

            let outcome = match self.manifests.find(&name) {
                Some(manifest) => self.harvest_library(manifest, cancel)?,
                None => LibraryOutcome::Failed {
                    diagnostic: Diagnostic::error(format!("unknown library `{}`", name))
                        .with_suggestion("Add it to [[libraries]] in Harvest.toml"),
                },
            };

            match &outcome {
                LibraryOutcome::Skipped { diagnostic } => {
                    tracing::warn!("{}", diagnostic.message)
                }
                LibraryOutcome::Failed { diagnostic } => {
                    tracing::error!("{}: {}", name, diagnostic.message)
                }
                _ => {}
            }

            results.push(LibraryResult {
                library: name,
                outcome,
            });
        }

        let summary = HarvestSummary {
            rid: self.profile.rid().to_string(),
            results,
        };
        tracing::info!(
            "Harvest for {}: {} succeeded, {} skipped, {} failed",
            summary.rid,
            summary.harvested(),
            summary.skipped(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Run one library through closure, plan and deployment.
    ///
    /// Only cancellation escapes as an error.
    pub fn harvest_library(
        &self,
        manifest: &LibraryManifest,
        cancel: &CancellationToken,
    ) -> Result<LibraryOutcome, HarvestError> {
        tracing::info!("Harvesting {} for {}", manifest.name, self.profile.rid());

        let closure = match self.closure(manifest, cancel) {
            Ok(closure) => closure,
            Err(ClosureError::Canceled(c)) => return Err(c.into()),
            Err(e) if e.is_not_found() => {
                return Ok(LibraryOutcome::Skipped {
                    diagnostic: e.to_diagnostic(&manifest.name),
                })
            }
            Err(e) => {
                return Ok(LibraryOutcome::Failed {
                    diagnostic: e.to_diagnostic(&manifest.name),
                })
            }
        };

        let plan = match self.plan(manifest, &closure, cancel) {
            Ok(plan) => plan,
            Err(PlanError::Canceled(c)) => return Err(c.into()),
            Err(e) => {
                return Ok(LibraryOutcome::Failed {
                    diagnostic: e.to_diagnostic(&manifest.name),
                })
            }
        };

        if self.options.dry_run {
            return Ok(LibraryOutcome::Planned { plan });
        }

        match self.deployer.deploy(&plan, cancel) {
            Ok(()) => {}
            Err(DeployError::Canceled(c)) => return Err(c.into()),
            Err(e) => {
                return Ok(LibraryOutcome::Failed {
                    diagnostic: e.to_diagnostic(&manifest.name),
                })
            }
        }

        let report = if self.options.write_reports {
            match self.write_report(manifest, &closure, &plan) {
                Ok(path) => Some(path),
                Err(e) => {
                    return Ok(LibraryOutcome::Failed {
                        diagnostic: Diagnostic::error(format!(
                            "could not write harvest report for `{}`",
                            manifest.name
                        ))
                        .with_context(format!("{:#}", e)),
                    })
                }
            }
        } else {
            None
        };

        Ok(LibraryOutcome::Harvested { plan, report })
    }

    /// Compute the closure of one library.
    pub fn closure(
        &self,
        manifest: &LibraryManifest,
        cancel: &CancellationToken,
    ) -> Result<BinaryClosure, ClosureError> {
        BinaryClosureWalker::new(self.provider, self.scanner, self.profile)
            .build_closure(manifest, cancel)
    }

    /// Plan one library from its closure.
    pub fn plan(
        &self,
        manifest: &LibraryManifest,
        closure: &BinaryClosure,
        cancel: &CancellationToken,
    ) -> Result<DeploymentPlan, PlanError> {
        let core_package = self.manifests.core().map(|m| m.vcpkg_name.clone());
        ArtifactPlanner::new(
            self.provider,
            self.profile,
            core_package,
            &self.options.archive_base,
        )
        .create_plan(manifest, closure, &self.options.output_root, cancel)
    }

    fn write_report(
        &self,
        manifest: &LibraryManifest,
        closure: &BinaryClosure,
        plan: &DeploymentPlan,
    ) -> anyhow::Result<PathBuf> {
        let report = HarvestReport {
            library: &manifest.name,
            rid: self.profile.rid(),
            triplet: self.profile.triplet(),
            primary_binaries: &closure.primary_binaries,
            packages: &closure.packages,
            statistics: &plan.statistics,
        };

        let path = report_path(&self.options.output_root, &manifest.name, self.profile.rid());
        write_string(&path, &serde_json::to_string_pretty(&report)?)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// `<output_root>/harvest-<library>-<rid>.json`
pub fn report_path(output_root: &Path, library: &str, rid: &str) -> PathBuf {
    output_root.join(format!("harvest-{}-{}.json", library, rid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::OsFamily;
    use crate::test_support::{windows_profile, FakePackageProvider, FakeScanner, VcpkgTree};

    fn manifests() -> ManifestConfig {
        ManifestConfig::new(vec![
            LibraryManifest::new("SDL2", "sdl2")
                .core()
                .with_primary(OsFamily::Windows, &["SDL2.dll"]),
            LibraryManifest::new("SDL2_image", "sdl2-image")
                .with_primary(OsFamily::Windows, &["SDL2_image.dll"]),
            LibraryManifest::new("SDL2_ttf", "sdl2-ttf")
                .with_primary(OsFamily::Windows, &["SDL2_ttf.dll"]),
            LibraryManifest::new("SDL2_net", "sdl2-net")
                .with_primary(OsFamily::Windows, &["SDL2_net_missing.dll"]),
        ])
    }

    fn options(tree: &VcpkgTree, dry_run: bool) -> HarvestOptions {
        HarvestOptions {
            output_root: tree.scratch_dir("out"),
            archive_base: tree.lib_dir(),
            dry_run,
            write_reports: true,
        }
    }

    fn provider(tree: &VcpkgTree) -> FakePackageProvider {
        let mut provider = FakePackageProvider::new();
        provider.add(tree.package("sdl2").bin("SDL2.dll").copyright());
        provider.add(
            tree.package("sdl2-image")
                .bin("SDL2_image.dll")
                .dep("sdl2")
                .copyright(),
        );
        provider.add(tree.package("sdl2-net").bin("SDL2_net.dll"));
        provider
    }

    #[test]
    fn test_batch_policy() {
        let tree = VcpkgTree::new("x64-windows-release");
        let provider = provider(&tree);
        let scanner = FakeScanner::new();
        let manifests = manifests();
        let profile = windows_profile(&tree, manifests.core());
        let harvester = Harvester::new(
            &provider,
            &scanner,
            &profile,
            &manifests,
            ArtifactDeployer::default(),
            options(&tree, false),
        );

        let requested: Vec<String> = ["SDL2_image", "SDL2_ttf", "SDL2_net", "SDL2_gfx"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let summary = harvester
            .harvest(&requested, &CancellationToken::new())
            .unwrap();

        let kinds: Vec<&str> = summary
            .results
            .iter()
            .map(|r| match r.outcome {
                LibraryOutcome::Harvested { .. } => "harvested",
                LibraryOutcome::Planned { .. } => "planned",
                LibraryOutcome::Skipped { .. } => "skipped",
                LibraryOutcome::Failed { .. } => "failed",
            })
            .collect();
        assert_eq!(kinds, vec!["harvested", "skipped", "failed", "failed"]);
        assert!(!summary.all_succeeded());

        let out = tree.root().join("scratch/out");
        assert!(out.join("SDL2_image/runtimes/win-x64/native/SDL2_image.dll").is_file());
        // core binaries are not shipped with satellites
        assert!(!out.join("SDL2_image/runtimes/win-x64/native/SDL2.dll").exists());

        let report = std::fs::read_to_string(report_path(&out, "SDL2_image", "win-x64")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(report["library"], "SDL2_image");
        assert_eq!(report["statistics"]["filtered_packages"][0], "sdl2");
    }

    #[test]
    fn test_all_libraries_by_default() {
        let tree = VcpkgTree::new("x64-windows-release");
        let provider = provider(&tree);
        let scanner = FakeScanner::new();
        let manifests = ManifestConfig::new(manifests().libraries.into_iter().take(2).collect());
        let profile = windows_profile(&tree, manifests.core());
        let harvester = Harvester::new(
            &provider,
            &scanner,
            &profile,
            &manifests,
            ArtifactDeployer::default(),
            options(&tree, false),
        );

        let summary = harvester.harvest(&[], &CancellationToken::new()).unwrap();
        assert_eq!(summary.harvested(), 2);
        assert!(summary.all_succeeded());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tree = VcpkgTree::new("x64-windows-release");
        let provider = provider(&tree);
        let scanner = FakeScanner::new();
        let manifests = manifests();
        let profile = windows_profile(&tree, manifests.core());
        let harvester = Harvester::new(
            &provider,
            &scanner,
            &profile,
            &manifests,
            ArtifactDeployer::default(),
            options(&tree, true),
        );

        let summary = harvester
            .harvest(&["SDL2".to_string()], &CancellationToken::new())
            .unwrap();
        assert!(matches!(
            summary.results[0].outcome,
            LibraryOutcome::Planned { .. }
        ));
        assert_eq!(std::fs::read_dir(tree.root().join("scratch/out")).unwrap().count(), 0);
    }

    #[test]
    fn test_cancellation_aborts_batch() {
        let tree = VcpkgTree::new("x64-windows-release");
        let provider = provider(&tree);
        let scanner = FakeScanner::new();
        let manifests = manifests();
        let profile = windows_profile(&tree, manifests.core());
        let harvester = Harvester::new(
            &provider,
            &scanner,
            &profile,
            &manifests,
            ArtifactDeployer::default(),
            options(&tree, false),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = harvester.harvest(&[], &cancel).unwrap_err();
        assert!(matches!(err, HarvestError::Canceled(_)));
    }
}
