#![forbid(unsafe_code)]

mod cmd;
mod output;
mod source;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use sprintlens_core::config::{load_user_config, resolve_config};
use sprintlens_core::error::MetricsError;
use sprintlens_core::timing;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "slens: sprint burndown and lead-time metrics",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum, conflicts_with = "json")]
    format: Option<OutputMode>,

    /// Metrics config file to use instead of `.sprintlens/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Metrics",
        about = "Ideal vs actual burndown for a sprint",
        long_about = "Compute the ideal and actual remaining-work lines for one sprint of a snapshot.",
        after_help = "EXAMPLES:\n    # Burndown of a sprint\n    slens burndown --snapshot export.json --sprint \"Sprint 14\"\n\n    # Include per-bucket item counts for every date\n    slens burndown -s export.json --sprint \"Sprint 14\" --daily\n\n    # Task, user story and business value burndowns side by side\n    slens burndown -s export.json --sprint \"Sprint 14\" --combined\n\n    # Emit machine-readable output\n    slens burndown -s export.json --sprint \"Sprint 14\" --json"
    )]
    Burndown(cmd::burndown::BurndownArgs),

    #[command(
        next_help_heading = "Metrics",
        about = "Per-story lead times",
        long_about = "Compute cycle times of items completed within a sprint or a date range.",
        after_help = "EXAMPLES:\n    # Lead times over a sprint\n    slens lead-time -s export.json --sprint \"Sprint 14\"\n\n    # Lead times over an explicit range\n    slens lead-time -s export.json --from 2024-04-01 --to 2024-04-30\n\n    # Add item counts per bucket for every date\n    slens lead-time -s export.json --from 2024-04-01 --to 2024-04-30 --daily\n\n    # Emit machine-readable output\n    slens lead-time -s export.json --sprint \"Sprint 14\" --json"
    )]
    LeadTime(cmd::lead_time::LeadTimeArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Show or edit configuration",
        after_help = "EXAMPLES:\n    # Show the resolved configuration\n    slens config show\n\n    # Hold the ideal line on weekends\n    slens config set calendar.exclude_weekends true\n\n    # Prefer JSON output for this user\n    slens config set --scope user user.output json"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    slens completions bash > ~/.local/share/bash-completion/completions/slens"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when `SPRINTLENS_LOG` is unset. Covers the library crates
/// (`sprintlens_*`) and this binary (`slens`).
const fn default_log_filter(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "sprintlens=debug,slens=debug,info"
    } else {
        "sprintlens=info,slens=info,warn"
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let verbose = verbose || env::var("DEBUG").is_ok();
    let filter = EnvFilter::try_from_env("SPRINTLENS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose, quiet)));

    let format = env::var("SPRINTLENS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output only.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Resolve configuration and output mode for commands that need them.
///
/// Failures are rendered to stderr before being returned.
fn load_context(
    project_root: PathBuf,
    explicit: Option<&Path>,
    format: Option<OutputMode>,
    json: bool,
) -> anyhow::Result<cmd::Context> {
    let config = match resolve_config(&project_root, explicit) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                resolve_output_mode(format, json, None),
                &CliError::from(&MetricsError::Config(format!("{err:#}"))),
            )?;
            return Err(err);
        }
    };
    let output = resolve_output_mode(format, json, config.user.output.as_deref());
    debug!(
        output = output.as_str(),
        config = ?config.source,
        "resolved configuration"
    );

    Ok(cmd::Context {
        project_root,
        config,
        output,
    })
}

/// The user's preferred output mode, when the user file can be read.
fn user_output_preference() -> Option<String> {
    match load_user_config() {
        Ok(user) => user.output,
        Err(err) => {
            warn!("ignoring user config: {err:#}");
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    let project_root = env::current_dir()?;
    let (format, json) = (cli.format, cli.json);

    // Config edits run without resolving config, so a malformed config file
    // can still be repaired.
    let command_result = match cli.command {
        Commands::Config(args) if args.works_on_raw_files() => {
            let output = resolve_output_mode(format, json, user_output_preference().as_deref());
            timing::timed("cmd.config", || {
                cmd::config::run_config_raw(&args, &project_root, output)
            })
        }
        command => {
            let ctx = load_context(project_root, cli.config.as_deref(), format, json)?;
            match command {
                Commands::Burndown(args) => timing::timed("cmd.burndown", || {
                    cmd::burndown::run_burndown(&args, &ctx)
                }),
                Commands::LeadTime(args) => timing::timed("cmd.lead-time", || {
                    cmd::lead_time::run_lead_time(&args, &ctx)
                }),
                Commands::Config(args) => {
                    timing::timed("cmd.config", || cmd::config::run_config(&args, &ctx))
                }
                Commands::Completions(args) => timing::timed("cmd.completions", || {
                    let mut command = Cli::command();
                    cmd::completions::run_completions(&args, &mut command)
                }),
            }
        }
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn timing_flag_parses_before_and_after_subcommand() {
        let before = Cli::parse_from(["slens", "--timing", "config", "show"]);
        assert!(before.timing);
        let after = Cli::parse_from(["slens", "config", "show", "--timing"]);
        assert!(after.timing);
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["slens", "burndown", "-s", "x.json", "--sprint", "S1", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Burndown(_)));
    }

    #[test]
    fn format_flag_parses_value() {
        let cli = Cli::parse_from(["slens", "--format", "text", "config", "show"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn json_and_format_conflict() {
        assert!(Cli::try_parse_from(["slens", "--json", "--format", "text", "config", "show"]).is_err());
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let cli = Cli::parse_from(["slens", "-q", "config", "show"]);
        assert!(cli.quiet);
        assert!(Cli::try_parse_from(["slens", "-q", "-v", "config", "show"]).is_err());
    }

    #[test]
    fn config_path_flag_parsed() {
        let cli = Cli::parse_from(["slens", "--config", "metrics.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("metrics.toml")));
    }

    #[test]
    fn lead_time_subcommand_is_kebab_case() {
        let cli = Cli::parse_from([
            "slens",
            "lead-time",
            "-s",
            "x.json",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
        ]);
        assert!(matches!(cli.command, Commands::LeadTime(_)));
    }

    #[test]
    fn default_log_filter_covers_the_binary_target() {
        assert_eq!(default_log_filter(false, true), "error");
        assert!(default_log_filter(true, false).contains("slens=debug"));
        assert!(default_log_filter(true, false).contains("sprintlens=debug"));
        assert!(default_log_filter(false, false).contains("slens=info"));
        for (verbose, quiet) in [(true, false), (false, false), (false, true)] {
            assert!(EnvFilter::try_new(default_log_filter(verbose, quiet)).is_ok());
        }
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["slens", "completions", "zsh"]);
        assert!(matches!(cli.command, Commands::Completions(_)));
    }
}
