use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use herald::app::AppContext;
use herald::cli::{commands, Cli, Commands, DaemonAction, SourceAction};
use herald::config::Config;
use herald::daemon::{self, Daemon};

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herald=info"));

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Start { log, .. },
        } => log.as_deref(),
        _ => None,
    };
    init_tracing(log_file)?;

    // Daemon control needs neither config nor database
    match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Stop,
        } => {
            let pid = daemon::stop_daemon()?;
            println!("Daemon stopped (PID {})", pid);
            return Ok(());
        }
        Commands::Daemon {
            action: DaemonAction::Status,
        } => {
            println!("{}", daemon::daemon_status());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config).context("Failed to open the herald database")?;

    match cli.command {
        Commands::Source { action } => match action {
            SourceAction::Add {
                name,
                url,
                quality,
                uploaders,
            } => commands::add_source(&ctx, &name, &url, quality, uploaders)?,
            SourceAction::Remove { name } => commands::remove_source(&ctx, &name)?,
            SourceAction::List => commands::list_sources(&ctx)?,
        },
        Commands::Filter {
            name,
            quality,
            clear_quality,
            uploaders,
            clear_uploaders,
        } => commands::update_filter(
            &ctx,
            &name,
            quality,
            clear_quality,
            uploaders,
            clear_uploaders,
        )?,
        Commands::Interval { value } => commands::interval(&ctx, value.as_deref())?,
        Commands::Check => commands::check(&ctx).await?,
        Commands::Seen => commands::seen(&ctx)?,
        Commands::Daemon { action } => {
            if let DaemonAction::Start {
                no_initial_check, ..
            } = action
            {
                let run_on_start = ctx.config.poll.run_on_start && !no_initial_check;
                Daemon::new(Arc::new(ctx), run_on_start).run().await?;
            }
        }
    }

    Ok(())
}
