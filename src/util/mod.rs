//! Shared utilities

pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod vcpkg;

pub use cancel::{CancellationToken, Canceled};
pub use config::HarvestConfig;
pub use diagnostic::Diagnostic;
pub use vcpkg::VcpkgIntegration;
