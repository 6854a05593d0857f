//! Native harvest - collects the runtime closure of vcpkg packages
//!
//! This crate provides the library functionality behind the `harvest` CLI:
//! resolving every shared binary a vcpkg-built library needs at runtime,
//! planning how to lay those binaries out per runtime identifier, and
//! deploying them.

pub mod core;
pub mod ops;
pub mod scanner;
pub mod sources;
pub mod util;

/// Test utilities and fakes for harvest unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides in-memory package providers and scanners and
/// temporary vcpkg trees.
#[cfg(test)]
pub mod test_support;

pub use core::{
    closure::BinaryClosure, manifest::LibraryManifest, plan::DeploymentPlan,
    profile::RuntimeProfile,
};

pub use ops::{ArtifactDeployer, ArtifactPlanner, BinaryClosureWalker, Harvester};
pub use util::cancel::CancellationToken;
