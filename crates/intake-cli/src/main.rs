//! Intake CLI
//!
//! Usage:
//!   intake check <definitions>                    Compile and list models and endpoints
//!   intake bind <definitions> <METHOD> <path>     Bind one request snapshot
//!   intake bind defs.yaml GET /items/ -q limit=5 -q item-query=foo
//!   intake bind defs.yaml PUT /items/5 --body item.json
//!   intake bind defs.yaml POST /login/ --form --body - < form.txt
//!   intake --log-level debug check defs.yaml

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Declarative request validation", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a definition file and list what it declares
    Check(commands::check::CheckArgs),

    /// Bind a request against a definition file and print the result
    Bind(commands::bind::BindArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Check(args) => commands::check::execute(args),
        Commands::Bind(args) => {
            let exit_code = commands::bind::execute(args)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

/// Initialize logging based on log level
fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    Ok(())
}
