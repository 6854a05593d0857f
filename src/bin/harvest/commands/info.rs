//! `harvest info` command

use anyhow::{bail, Result};

use super::{GlobalOpts, Session};
use crate::cli::InfoArgs;
use harvest::sources::PackageInfoProvider;

pub fn execute(args: InfoArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global, &args.runtime)?;
    let triplet = session.profile.triplet();

    match session.provider.package_info(&args.package, triplet)? {
        Some(info) => {
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        None => bail!(
            "package `{}:{}` is not installed\n\
             help: vcpkg install {}:{}",
            args.package,
            triplet,
            args.package,
            triplet
        ),
    }
}
