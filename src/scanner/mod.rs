//! Runtime dependency scanners.
//!
//! A scanner asks the platform's dependency listing tool which shared
//! libraries a binary links against and resolves the answers to existing
//! absolute paths:
//!
//! - Windows: `dumpbin /DEPENDENTS`
//! - Linux: `ldd`
//! - macOS: `otool -L`
//!
//! Parsing is kept in pure functions so it can be tested without the tools.

pub mod dumpbin;
pub mod ldd;
pub mod otool;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::profile::OsFamily;
use crate::util::config::ToolsConfig;
use crate::util::process::{resolve_tool, ProcessBuilder};

pub use dumpbin::DumpbinScanner;
pub use ldd::LddScanner;
pub use otool::OtoolScanner;

/// Lists the shared libraries a binary depends on at runtime.
pub trait RuntimeScanner {
    /// Absolute paths of existing files `binary` links against.
    ///
    /// A tool that runs but fails yields an empty set; a tool that cannot be
    /// started is an error.
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>>;
}

impl<S: RuntimeScanner + ?Sized> RuntimeScanner for &S {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        (**self).scan(binary)
    }
}

/// The scanner for an OS family.
#[derive(Debug, Clone)]
pub enum NativeScanner {
    Dumpbin(DumpbinScanner),
    Ldd(LddScanner),
    Otool(OtoolScanner),
}

impl NativeScanner {
    /// Select the scanner for `os`, honoring tool overrides.
    pub fn for_os(os: OsFamily, tools: &ToolsConfig) -> Self {
        match os {
            OsFamily::Windows => NativeScanner::Dumpbin(DumpbinScanner::new(resolve_tool(
                tools.dumpbin.as_deref(),
                "dumpbin",
            ))),
            OsFamily::Linux => {
                NativeScanner::Ldd(LddScanner::new(resolve_tool(tools.ldd.as_deref(), "ldd")))
            }
            OsFamily::Osx => NativeScanner::Otool(OtoolScanner::new(resolve_tool(
                tools.otool.as_deref(),
                "otool",
            ))),
        }
    }

    /// Name of the underlying tool, for messages.
    pub fn tool_name(&self) -> &'static str {
        match self {
            NativeScanner::Dumpbin(_) => "dumpbin",
            NativeScanner::Ldd(_) => "ldd",
            NativeScanner::Otool(_) => "otool",
        }
    }
}

impl RuntimeScanner for NativeScanner {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        match self {
            NativeScanner::Dumpbin(s) => s.scan(binary),
            NativeScanner::Ldd(s) => s.scan(binary),
            NativeScanner::Otool(s) => s.scan(binary),
        }
    }
}

/// Run a listing tool. `Ok(None)` when it ran but exited non-zero.
fn run_listing_tool(command: ProcessBuilder, binary: &Path) -> Result<Option<String>> {
    let output = command.exec()?;

    if !output.status.success() {
        tracing::warn!(
            "`{}` exited with {:?} while scanning {}: {}",
            command.display_command(),
            output.status.code(),
            binary.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}
