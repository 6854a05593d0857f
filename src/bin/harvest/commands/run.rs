//! `harvest run` command

use anyhow::{bail, Result};

use super::{report_summary, GlobalOpts, Session};
use crate::cli::RunArgs;
use harvest::ops::{Harvester, LibraryOutcome};
use harvest::util::CancellationToken;

pub fn execute(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global, &args.runtime)?;
    let manifests = session.config.manifest_config();

    let mut options = session.harvest_options(args.output, args.dry_run);
    if args.no_report {
        options.write_reports = false;
    }

    let harvester = Harvester::new(
        &session.provider,
        &session.scanner,
        &session.profile,
        &manifests,
        session.deployer(args.tar.as_deref()),
        options,
    );

    // Ctrl-C terminates the process; the token is for library callers that
    // drive harvests from their own event loop
    let cancel = CancellationToken::new();
    let summary = harvester.harvest(&args.libraries, &cancel)?;

    for result in &summary.results {
        match &result.outcome {
            LibraryOutcome::Harvested { plan, report } => {
                println!(
                    "{}: {} files{}",
                    result.library,
                    plan.file_count(),
                    report
                        .as_ref()
                        .map(|r| format!(" (report: {})", r.display()))
                        .unwrap_or_default()
                );
            }
            LibraryOutcome::Planned { plan } => {
                println!("{}: {} files (dry run)", result.library, plan.file_count());
            }
            _ => {}
        }
    }

    report_summary(&summary, global.color);

    if !summary.all_succeeded() {
        bail!("{} of {} libraries failed", summary.failed(), summary.results.len());
    }
    Ok(())
}
