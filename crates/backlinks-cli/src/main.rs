mod cli;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::BacklinksConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = BacklinksConfig::load_or_default(&cli.config);
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    match cli.command {
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config, &config),
        Commands::Import(args) => cli::import::run(args, &config),
        Commands::Rescan(args) => cli::scan::rescan(args, &config),
        Commands::Status(args) => cli::status::status(args, &config),
        Commands::Show(args) => cli::status::show(args, &config),
        Commands::Suggest(args) => cli::suggest::run(args, &config),
        Commands::Unscanned(args) => cli::scan::unscanned(args, &config),
        Commands::Deregister(args) => cli::scan::deregister(args, &config),
        Commands::Tick => cli::worker::tick(&config),
        Commands::Drain(args) => cli::worker::drain(args, &config),
        Commands::Worker(args) => cli::worker::run(args, &config).await,
    }
}
