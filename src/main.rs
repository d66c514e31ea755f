use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::commands::{self, State};
use gator::config::Config;
use gator::db::Database;
use gator::fetcher::Fetcher;

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Follow RSS feeds from the command line")]
struct Cli {
    /// Config file (defaults to ~/.gatorconfig.json)
    #[arg(long, env = "GATOR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// One of: login, register, reset, users, agg, addfeed, feeds, follow,
    /// following, unfollow, browse
    command: String,

    /// Arguments passed through to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::read_from(&config_path)?;
    debug!(path = %config_path.display(), "Loaded configuration");

    // Initialize database
    let db = Database::new(&config.db_url)
        .await
        .with_context(|| format!("could not open database {}", config.db_url))?;
    db.initialize().await?;

    let fetcher = Fetcher::new()?;
    let mut state = State::new(db, fetcher, config, config_path);

    commands::registry()
        .run(&mut state, &cli.command, &cli.args)
        .await?;

    Ok(())
}
