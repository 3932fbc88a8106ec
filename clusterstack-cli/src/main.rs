use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod cli;
mod commands;
mod config;

use cli::{Args, Command};
use config::Config;

/// Initialize tracing with two outputs:
/// 1. File output (~/.clusterstack/clusterstack.log) - everything RUST_LOG lets through
/// 2. Console output (stderr) - warnings only, unless --verbose
///
/// The returned guard flushes the file writer when dropped; hold it for the whole run.
fn initialize_tracing(verbose: bool) -> Result<WorkerGuard> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "warn,\
         clusterstack=info,\
         clusterstack_orchestrations=info"
            .into()
    });

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let log_dir = PathBuf::from(home).join(".clusterstack");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::never(&log_dir, "clusterstack.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    let console_level = if verbose { LevelFilter::INFO } else { LevelFilter::WARN };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let _guard = initialize_tracing(args.verbose)?;
    let config = Config::load()?;

    match args.command {
        Command::CreateCluster(create) => commands::cluster::run_create(&config, create).await,
        Command::Status { cluster, output } => {
            commands::cluster::run_status(&config, cluster, output).await
        }
        Command::Events { stack, limit } => commands::stack::run_events(&config, stack, limit).await,
        Command::Templates { output } => commands::templates::run_list(&config, output),
    }
}
