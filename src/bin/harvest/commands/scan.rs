//! `harvest scan` command

use anyhow::{anyhow, bail, Result};

use super::{load_config, GlobalOpts};
use crate::cli::ScanArgs;
use harvest::core::{OsFamily, RuntimeProfile};
use harvest::scanner::{NativeScanner, RuntimeScanner};
use harvest::util::config::ToolsConfig;

pub fn execute(args: ScanArgs, global: &GlobalOpts) -> Result<()> {
    if !args.binary.is_file() {
        bail!("{} is not a file", args.binary.display());
    }

    let os = match args.os {
        Some(os) => os,
        None => {
            let rid = RuntimeProfile::host_rid()
                .ok_or_else(|| anyhow!("cannot determine the host OS; pass --os"))?;
            OsFamily::from_rid(&rid)?
        }
    };

    // tool overrides are optional for a scan
    let tools = match load_config(global.config.as_deref()) {
        Ok((config, _)) => config.tools,
        Err(e) => {
            tracing::debug!("No config loaded: {:#}", e);
            ToolsConfig::default()
        }
    };

    let scanner = NativeScanner::for_os(os, &tools);
    let deps = scanner.scan(&args.binary)?;

    if deps.is_empty() {
        eprintln!(
            "{} reported no resolvable dependencies for {}",
            scanner.tool_name(),
            args.binary.display()
        );
    }
    for dep in deps {
        println!("{}", dep.display());
    }

    Ok(())
}
