//! certkeeper: declarative certificate tracking against the local cert daemon.
//!
//! # Usage
//!
//! ```text
//! certkeeper ensure --key <path> --cert <path> [--ca <name>] [--state present|absent|resubmitted] [--check] [--json]
//! certkeeper ensure --nss-db <dir> --nss-nickname <name> [...]
//! certkeeper apply <manifest.yaml> [--check] [--json]
//! certkeeper list [--json]
//! certkeeper status <request-id> [--json]
//! ```
//!
//! Every command accepts `--socket <path>` and `-v`/`-vv`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    apply::ApplyArgs, ensure::EnsureArgs, list::ListArgs, status::StatusArgs, GlobalOpts,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "certkeeper",
    version,
    about = "Keep cert daemon tracking requests in their desired state",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cert daemon socket (overrides config.yaml and CERTKEEPER_SOCKET).
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring one certificate slot to its desired state.
    Ensure(EnsureArgs),

    /// Reconcile every certificate listed in a manifest.
    Apply(ApplyArgs),

    /// Show every request the daemon tracks.
    List(ListArgs),

    /// Show one tracked request.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let global = GlobalOpts { socket: cli.socket };
    match cli.command {
        Commands::Ensure(args) => args.run(&global),
        Commands::Apply(args) => args.run(&global),
        Commands::List(args) => args.run(&global),
        Commands::Status(args) => args.run(&global),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
