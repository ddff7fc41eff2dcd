//! `tote check`.

use super::Session;
use crate::cli::CheckArgs;
use crate::error::Result;
use crate::ui;

pub fn execute(args: CheckArgs, quiet: bool) -> Result<()> {
    let session = Session::new(&args.project)?;
    let resolved = session.resolve()?;

    if !quiet {
        let config = &resolved.config;
        ui::info(&format!("mode: {}", resolved.mode));
        ui::info(&format!("output: {}", resolved.out_dir.display()));
        ui::info(&format!(
            "{} entries, {} rules, {} plugins, {} jobs",
            config.entry.len(),
            config.rules.len(),
            config.plugins.len(),
            resolved.jobs
        ));
        ui::success("Configuration is valid");
    }
    Ok(())
}
