//! Core data structures for harvesting.
//!
//! This module contains the types shared by every harvest stage:
//! - Library manifests and primary binary patterns
//! - Runtime profiles (RID, triplet, OS family, system libraries)
//! - Binary closures and deployment plans
//! - Stage error types

pub mod closure;
pub mod errors;
pub mod manifest;
pub mod plan;
pub mod profile;

pub use closure::{BinaryClosure, BinaryNode, UNKNOWN_PACKAGE};
pub use errors::{ClosureError, DeployError, HarvestError, PlanError, ProfileError};
pub use manifest::{LibraryManifest, ManifestConfig, PrimaryBinaries};
pub use plan::{
    ArchiveItem, ArtifactOrigin, DeploymentAction, DeploymentLocation, DeploymentPlan,
    DeploymentStatistics, DeploymentStrategy, FileDeploymentInfo,
};
pub use profile::{OsFamily, RuntimeInfo, RuntimeProfile, SystemArtifactsConfig};
