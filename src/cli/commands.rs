use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, Result};
use crate::daemon::{self, DaemonSignal};
use crate::domain::{FilterConfig, Source};
use crate::scheduler::{format_interval, parse_interval, save_interval};

pub fn add_source(
    ctx: &AppContext,
    name: &str,
    url: &str,
    quality: Option<String>,
    uploaders: Vec<String>,
) -> Result<()> {
    let filters = FilterConfig::new(quality, uploaders);
    let source = ctx.registry.add(name, url, filters)?;
    println!("Added source: {}", source.name);
    println!("  {}", source.url);
    println!("  filters: {}", source.filters.describe());
    Ok(())
}

pub fn remove_source(ctx: &AppContext, name: &str) -> Result<()> {
    ctx.registry.remove(name)?;
    println!("Removed source: {}", name);
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.registry.list()?;

    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    for source in sources {
        print_source(&source);
    }
    Ok(())
}

fn print_source(source: &Source) {
    println!("{}\n  {}\n  filters: {}", source.name, source.url, source.filters.describe());
}

/// Apply filter changes to a source, or show its filters when none are given.
pub fn update_filter(
    ctx: &AppContext,
    name: &str,
    quality: Option<String>,
    clear_quality: bool,
    uploaders: Option<Vec<String>>,
    clear_uploaders: bool,
) -> Result<()> {
    let mut source = ctx.registry.get(name)?;
    let mut changed = false;

    if clear_quality {
        source = ctx.registry.set_quality(name, None)?;
        changed = true;
    } else if let Some(quality) = quality {
        source = ctx.registry.set_quality(name, Some(quality))?;
        changed = true;
    }

    if clear_uploaders {
        source = ctx.registry.set_uploaders(name, BTreeSet::new())?;
        changed = true;
    } else if let Some(uploaders) = uploaders {
        source = ctx
            .registry
            .set_uploaders(name, uploaders.into_iter().collect())?;
        changed = true;
    }

    if changed {
        println!("Updated filters for {}: {}", source.name, source.filters.describe());
    } else {
        print_source(&source);
    }
    Ok(())
}

/// Show the poll interval, or persist a new one and tell a running daemon.
pub fn interval(ctx: &AppContext, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        println!("Poll interval: {}", format_interval(ctx.poll_interval()?));
        return Ok(());
    };

    let interval = parse_interval(value)?;
    save_interval(ctx.store.as_ref(), interval)?;
    println!("Poll interval set to {}", format_interval(interval));

    if let Some(pid) = daemon::running_pid() {
        daemon::signal_daemon(DaemonSignal::Reload)?;
        println!("Daemon (PID {}) will use the new interval", pid);
    }
    Ok(())
}

/// Run one poll cycle. A running daemon is asked to do it instead, so two
/// processes never poll at once.
pub async fn check(ctx: &AppContext) -> Result<()> {
    if let Some(pid) = daemon::running_pid() {
        daemon::signal_daemon(DaemonSignal::Check)?;
        println!("Asked daemon (PID {}) to check now", pid);
        return Ok(());
    }

    let pipeline = ctx.pipeline()?;
    let report = pipeline.run(&CancellationToken::new()).await;

    for id in &report.failed_deliveries {
        eprintln!("  Failed to deliver {}", id);
    }
    for name in &report.failed_sources {
        eprintln!("  Failed to fetch {}", name);
    }
    println!("Check complete: {}", report.summary());
    Ok(())
}

pub fn seen(ctx: &AppContext) -> Result<()> {
    let count = ctx.dedup.len()?;
    match ctx.config.dedup.max_entries {
        0 => println!("{} delivered ids remembered", count),
        max => println!("{} delivered ids remembered (keeping at most {})", count, max),
    }
    Ok(())
}
