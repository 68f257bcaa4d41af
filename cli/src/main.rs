use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;

use commands::Commands;
use config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, PartialEq, Debug)]
#[command(name = "threadkeeper")]
#[command(about = "Keep agent conversation history inside its window", long_about = None)]
struct Cli {
    /// Path to the config file (defaults to ~/.threadkeeper/config.toml)
    #[arg(short = 'c', long = "config", env = "THREADKEEPER_CONFIG", global = true)]
    config_path: Option<PathBuf>,

    /// Enable debug output
    #[arg(long = "debug", default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    format!(
                        "error,{}=debug,threadkeeper_core=debug",
                        env!("CARGO_CRATE_NAME")
                    )
                    .into()
                }),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match AppConfig::load(cli.config_path.as_ref()) {
        Ok(config) => {
            if let Err(e) = cli.command.run(config) {
                eprintln!("Ops! something went wrong: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}
