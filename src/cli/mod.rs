pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Polls feeds and posts new matching entries to Telegram", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/herald/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage feed sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Show or change the filters of a source
    Filter {
        /// Source name
        name: String,

        /// Only deliver titles containing this token (e.g. "1080p")
        #[arg(short, long, conflicts_with = "clear_quality")]
        quality: Option<String>,

        /// Remove the quality restriction
        #[arg(long)]
        clear_quality: bool,

        /// Comma-separated list of allowed uploaders
        #[arg(short, long, value_delimiter = ',', conflicts_with = "clear_uploaders")]
        uploaders: Option<Vec<String>>,

        /// Allow every uploader
        #[arg(long)]
        clear_uploaders: bool,
    },
    /// Show or set the poll interval ("5" = 5 minutes, or "45s", "10m", "1h")
    Interval {
        value: Option<String>,
    },
    /// Poll all sources once, now
    Check,
    /// Background poller
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Show how many delivered ids are remembered
    Seen,
}

#[derive(Subcommand)]
pub enum SourceAction {
    /// Add a feed source
    Add {
        /// Unique name, without whitespace
        name: String,
        /// Feed URL
        url: String,

        #[arg(short, long)]
        quality: Option<String>,

        /// Allowed uploader (repeatable)
        #[arg(short, long = "uploader")]
        uploaders: Vec<String>,
    },
    /// Remove a feed source
    Remove { name: String },
    /// List feed sources
    List,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start polling in the foreground until stopped
    Start {
        /// Log file path (default: stderr)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Wait one interval before the first check
        #[arg(long)]
        no_initial_check: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
