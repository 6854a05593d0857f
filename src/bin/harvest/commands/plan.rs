//! `harvest plan` command

use anyhow::{bail, Result};

use super::{report_summary, GlobalOpts, Session};
use crate::cli::PlanArgs;
use harvest::core::DeploymentPlan;
use harvest::ops::{Harvester, LibraryOutcome};
use harvest::util::CancellationToken;

pub fn execute(args: PlanArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global, &args.runtime)?;
    let manifests = session.config.manifest_config();

    let harvester = Harvester::new(
        &session.provider,
        &session.scanner,
        &session.profile,
        &manifests,
        session.deployer(None),
        session.harvest_options(args.output, true),
    );

    let summary = harvester.harvest(&args.libraries, &CancellationToken::new())?;

    let plans: Vec<&DeploymentPlan> = summary
        .results
        .iter()
        .filter_map(|r| match &r.outcome {
            LibraryOutcome::Planned { plan } => Some(plan),
            _ => None,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&plans)?);

    report_summary(&summary, global.color);

    if !summary.all_succeeded() {
        bail!("{} of {} libraries failed", summary.failed(), summary.results.len());
    }
    Ok(())
}
