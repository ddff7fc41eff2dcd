//! Command-line interface definition.
//!
//! - `tote build` - run the pipeline once, or keep rebuilding with `--watch`
//! - `tote check` - resolve and validate the configuration without building

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tote - a rule-driven asset pipeline for web applications
#[derive(Parser, Debug)]
#[command(
    name = "tote",
    version,
    about = "A rule-driven asset pipeline for web applications",
    long_about = "tote classifies project files by rule, runs each through its chain of\n\
                  transform stages and emits the results with a content-hashed manifest."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project
    ///
    /// Resolves the configuration for the selected mode, transforms every
    /// discovered file and writes the outputs plus `manifest.json`.
    Build(BuildArgs),

    /// Validate the configuration
    ///
    /// Merges the mode overlay, validates the result and checks that every
    /// stage and plugin name is registered. Nothing is written.
    Check(CheckArgs),
}

/// Options shared by every command that loads a configuration.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Build mode; selects the `[profiles.<mode>]` overlay
    #[arg(short, long, default_value = "production", value_name = "MODE")]
    pub mode: String,

    /// Configuration file (defaults to tote.toml, then package.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub cwd: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Append the upload plugin (production mode only)
    #[arg(long)]
    pub upload: bool,

    /// Override `output.dir`
    #[arg(short, long = "out", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Maximum number of files transformed concurrently
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Rebuild whenever a project file changes
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("jobs must be at least 1".to_string()),
        Ok(jobs) => Ok(jobs),
        Err(_) => Err(format!("`{value}` is not a positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_defaults() {
        let cli = Cli::try_parse_from(["tote", "build"]).unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.mode, "production");
        assert_eq!(args.project.cwd, PathBuf::from("."));
        assert!(!args.upload);
        assert!(!args.watch);
        assert!(args.jobs.is_none());
    }

    #[test]
    fn build_with_overrides() {
        let cli = Cli::try_parse_from([
            "tote", "build", "--mode", "development", "--out", "dist", "--jobs", "4", "--upload", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.mode, "development");
        assert_eq!(args.out_dir, Some(PathBuf::from("dist")));
        assert_eq!(args.jobs, Some(4));
        assert!(args.upload);
    }

    #[test]
    fn zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["tote", "build", "--jobs", "0"]).is_err());
        assert_eq!(parse_jobs("x").unwrap_err(), "`x` is not a positive integer");
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["tote", "-v", "-q", "check"]).is_err());
    }

    #[test]
    fn check_accepts_config_path() {
        let cli = Cli::try_parse_from(["tote", "check", "--config", "conf/tote.toml", "-m", "development"]).unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.project.config, Some(PathBuf::from("conf/tote.toml")));
        assert_eq!(args.project.mode, "development");
    }
}
