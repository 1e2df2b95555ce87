//! CLI definitions for dakoku.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// dakoku CLI.
#[derive(Parser)]
#[command(name = "dakoku")]
#[command(about = "Attendance punch automation for Jobcan and Slack workflows")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path. Defaults and environment variables are used when omitted.
    #[arg(short, long, global = true, env = "DAKOKU_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Punch attendance on one site
    Run(RunArgs),

    /// Load and validate the configuration, printing a redacted summary
    Validate,
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Target site (jobcan, slackwf)
    pub site: String,

    /// Action (check-in, check-out, check-both)
    pub action: String,

    /// Fill every form but do not submit
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the browser open after success (overrides runtime.keep_open)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub keep_open: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["dakoku", "run", "jobcan", "check-in", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.site, "jobcan");
                assert_eq!(args.action, "check-in");
                assert!(args.dry_run);
                assert_eq!(args.keep_open, None);
            }
            Commands::Validate => panic!("expected run"),
        }
    }

    #[test]
    fn test_keep_open_flag_forms() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["dakoku", "run", "slackwf", "check-both"];
            argv.extend_from_slice(extra);
            match Cli::try_parse_from(argv).unwrap().command {
                Commands::Run(args) => args.keep_open,
                Commands::Validate => None,
            }
        };

        assert_eq!(parse(&["--keep-open"]), Some(true));
        assert_eq!(parse(&["--keep-open=false"]), Some(false));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["dakoku", "validate", "--config", "dakoku.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("dakoku.toml")));
        assert!(matches!(cli.command, Commands::Validate));
    }

    #[test]
    fn test_run_requires_site_and_action() {
        assert!(Cli::try_parse_from(["dakoku", "run", "jobcan"]).is_err());
    }
}
