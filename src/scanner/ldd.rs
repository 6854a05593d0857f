//! `ldd` scanner for Linux shared objects.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{run_listing_tool, RuntimeScanner};
use crate::util::process::ProcessBuilder;

/// Directories whose libraries belong to the distribution.
const SYSTEM_DIRS: &[&str] = &["/lib", "/lib64", "/usr/lib", "/usr/lib64"];

#[derive(Debug, Clone)]
pub struct LddScanner {
    program: PathBuf,
}

impl LddScanner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        LddScanner {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RuntimeScanner for LddScanner {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        let command = ProcessBuilder::new(&self.program).arg(binary);

        let Some(stdout) = run_listing_tool(command, binary)? else {
            return Ok(BTreeSet::new());
        };

        Ok(parse_ldd_output(&stdout)
            .into_iter()
            .filter(|path| path.is_file())
            .collect())
    }
}

/// Resolved library paths from `ldd` output, system directories excluded.
///
/// Handles both `libfoo.so.1 => /path/libfoo.so.1 (0x...)` and
/// `/path/ld-linux.so.2 (0x...)` lines.
pub fn parse_ldd_output(output: &str) -> Vec<PathBuf> {
    let mut deps = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.contains("not found") || line.contains("linux-vdso") {
            continue;
        }

        let target = match line.split_once("=>") {
            Some((_, after)) => after.trim(),
            None => line,
        };

        let Some(paren) = target.find(" (0x") else {
            continue;
        };
        let path = target[..paren].trim();
        if path.is_empty() {
            continue;
        }

        let path = PathBuf::from(path);
        if !path.is_absolute() || is_in_system_dir(&path) {
            continue;
        }
        deps.push(path);
    }

    deps
}

fn is_in_system_dir(path: &Path) -> bool {
    SYSTEM_DIRS.iter().any(|dir| path.starts_with(dir))
}
