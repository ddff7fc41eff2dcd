//! Entry point for the `tote` binary.

use clap::Parser;
use miette::Result;
use tote_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args, args.quiet).await,
        cli::Command::Check(check_args) => commands::check_execute(check_args, args.quiet),
    };

    result.map_err(error::cli_error_to_miette)
}
