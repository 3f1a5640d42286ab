mod commands;
mod render;
mod serve;
mod setup;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use costguard_core::TriggerSource;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Cloud-cost guardrail: budget kill switch, tag policy and instance cap.
#[derive(Parser)]
#[command(
    name = "costguard",
    version,
    about = "Cloud-cost guardrail: budget kill switch, tag policy and instance cap"
)]
struct Cli {
    /// Path to the TOML configuration (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Evaluate as of this RFC 3339 instant instead of the wall clock
    #[arg(long, global = true, value_parser = parse_timestamp)]
    at: Option<OffsetDateTime>,

    /// Instance IDs (one per line) to act on if inventory is unreachable
    #[arg(long, global = true)]
    known_instances: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare spend with the budget; shut everything down on a breach
    CheckSpend,

    /// Apply the tag policy: mark, terminate and clean up storage
    EnforceTags,

    /// Stop the newest instances beyond the concurrent cap
    EnforceLimit,

    /// Full shutdown on behalf of an external trigger
    Shutdown {
        /// Trigger source: budget-breach, alarm, manual or schedule
        #[arg(long, default_value = "manual", value_parser = parse_source)]
        source: TriggerSource,
    },

    /// Operator emergency shutdown, confirmed by typing SHUTDOWN
    Emergency {
        /// Confirmation phrase; read from stdin when omitted
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Tag policy verdicts for every resource, without side effects
    Evaluate,

    /// Run the HTTP trigger server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

fn parse_timestamp(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("invalid RFC 3339 timestamp: {}", e))
}

fn parse_source(s: &str) -> Result<TriggerSource, String> {
    s.parse()
}

fn main() {
    let cli = Cli::parse();
    setup::init_tracing(cli.quiet);

    let guardrail =
        match setup::build_guardrail(cli.config.as_deref(), cli.known_instances.as_deref()) {
            Ok(g) => g,
            Err(msg) => {
                report_error(&msg, cli.output, cli.quiet);
                process::exit(1);
            }
        };
    let now = cli.at.unwrap_or_else(OffsetDateTime::now_utc);

    match cli.command {
        Commands::CheckSpend => {
            commands::cmd_check_spend(&guardrail, now, cli.output, cli.quiet);
        }
        Commands::EnforceTags => {
            commands::cmd_enforce_tags(&guardrail, now, cli.output, cli.quiet);
        }
        Commands::EnforceLimit => {
            commands::cmd_enforce_limit(&guardrail, now, cli.output, cli.quiet);
        }
        Commands::Shutdown { source } => {
            commands::cmd_shutdown(&guardrail, source, now, cli.output, cli.quiet);
        }
        Commands::Emergency { confirm } => {
            commands::cmd_emergency(&guardrail, confirm.as_deref(), now, cli.output, cli.quiet);
        }
        Commands::Evaluate => {
            commands::cmd_evaluate(&guardrail, now, cli.output, cli.quiet);
        }
        Commands::Serve { port } => {
            let result = commands::block_on(
                serve::start_server(guardrail, port, cli.at),
                cli.output,
                cli.quiet,
            );
            if let Err(e) = result {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
    }
}

/// Print an error to stderr in the selected format. Silent with `--quiet`.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
