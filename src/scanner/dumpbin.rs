//! `dumpbin /DEPENDENTS` scanner for Windows DLLs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{run_listing_tool, RuntimeScanner};
use crate::util::process::ProcessBuilder;

const SECTION_START: &str = "Image has the following dependencies:";
const SECTION_END: &str = "Summary";

#[derive(Debug, Clone)]
pub struct DumpbinScanner {
    program: PathBuf,
}

impl DumpbinScanner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        DumpbinScanner {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RuntimeScanner for DumpbinScanner {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        let command = ProcessBuilder::new(&self.program)
            .arg("/NOLOGO")
            .arg("/DEPENDENTS")
            .arg(binary);

        let Some(stdout) = run_listing_tool(command, binary)? else {
            return Ok(BTreeSet::new());
        };

        // dumpbin prints bare names; vcpkg keeps a package's DLLs side by side
        let search_dir = binary.parent().unwrap_or(Path::new("."));
        let deps = parse_dependents(&stdout)
            .into_iter()
            .map(|name| search_dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        Ok(deps)
    }
}

/// DLL names listed in the dependency section of `dumpbin /DEPENDENTS`.
pub fn parse_dependents(output: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let mut in_section = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if !in_section {
            in_section = trimmed.starts_with(SECTION_START);
            continue;
        }
        if trimmed.starts_with(SECTION_END) {
            break;
        }
        if trimmed.to_ascii_lowercase().ends_with(".dll") {
            deps.push(trimmed.to_string());
        }
    }

    deps
}
