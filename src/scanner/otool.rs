//! `otool -L` scanner for macOS dylibs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use super::{run_listing_tool, RuntimeScanner};
use crate::util::process::ProcessBuilder;

static DEPENDENCY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s+\(compatibility version .+\)$").unwrap()
});

#[derive(Debug, Clone)]
pub struct OtoolScanner {
    program: PathBuf,
}

impl OtoolScanner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        OtoolScanner {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RuntimeScanner for OtoolScanner {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        let command = ProcessBuilder::new(&self.program).arg("-L").arg(binary);

        let Some(stdout) = run_listing_tool(command, binary)? else {
            return Ok(BTreeSet::new());
        };

        let binary_dir = binary.parent().unwrap_or(Path::new("."));
        Ok(parse_otool_output(&stdout)
            .iter()
            .filter_map(|install_name| resolve_install_name(install_name, binary_dir))
            .collect())
    }
}

/// Install names listed by `otool -L`. The first line names the binary
/// itself and is skipped.
pub fn parse_otool_output(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| DEPENDENCY_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Resolve an install name to an existing file.
///
/// `@rpath/` is tried next to the binary, then in `../lib`; `@loader_path/`
/// and `@executable_path/` are relative to the binary's directory.
pub fn resolve_install_name(install_name: &str, binary_dir: &Path) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = if let Some(rest) = install_name.strip_prefix("@rpath/") {
        vec![binary_dir.join(rest), binary_dir.join("..").join("lib").join(rest)]
    } else if let Some(rest) = install_name
        .strip_prefix("@loader_path/")
        .or_else(|| install_name.strip_prefix("@executable_path/"))
    {
        vec![binary_dir.join(rest)]
    } else if install_name.starts_with('/') {
        vec![PathBuf::from(install_name)]
    } else {
        return None;
    };

    candidates.into_iter().find(|p| p.is_file())
}
