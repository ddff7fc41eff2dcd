//! `tote build`.

use tote_config::UPLOAD_MODE;

use super::{Session, watch};
use crate::cli::BuildArgs;
use crate::error::Result;
use crate::ui;

pub async fn execute(args: BuildArgs, quiet: bool) -> Result<()> {
    let session = Session::for_build(&args)?;

    if args.upload && session.mode() != UPLOAD_MODE {
        ui::warning(&format!(
            "--upload only applies in {UPLOAD_MODE} mode; building `{}` without it",
            session.mode()
        ));
    }

    if args.watch {
        return watch::run(session, quiet).await;
    }

    let report = session.build().await?;
    if !quiet {
        ui::print_build_summary(&report);
        ui::success(&format!(
            "Built {} files into {} in {}",
            report.manifest.len(),
            report.out_dir.display(),
            ui::format_duration(report.duration)
        ));
    }
    Ok(())
}
