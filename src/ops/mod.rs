//! High-level operations.
//!
//! This module contains the harvest pipeline: closure resolution, deployment
//! planning, deployment, and the driver that chains them.

pub mod closure;
pub mod deployer;
pub mod harvest;
pub mod planner;

pub use closure::{
    infer_package_from_library_name, infer_package_from_path, is_binary_for, BinaryClosureWalker,
};
pub use deployer::ArtifactDeployer;
pub use harvest::{
    report_path, HarvestOptions, HarvestReport, HarvestSummary, Harvester, LibraryOutcome,
    LibraryResult,
};
pub use planner::{strategy_for, ArtifactPlanner};
