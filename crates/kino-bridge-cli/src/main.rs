//! Kino Bridge CLI - headless host for the playback bridge
//!
//! Features:
//! - Source resolution with a chosen platform crypto capability
//! - Scripted engine timelines replayed through a real playback session

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod script;

/// Kino Bridge CLI - playback bridge harness
#[derive(Parser)]
#[command(name = "kino-bridge")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Resolve media sources and replay playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Playback options given as flags or as a JSON file
#[derive(clap::Args)]
struct OptionArgs {
    /// Options JSON file in the host map shape (overrides the flags below)
    #[arg(long)]
    options: Option<PathBuf>,

    /// DRM scheme (widevine, playready, clearkey)
    #[arg(long)]
    drm_scheme: Option<String>,

    /// License server URL
    #[arg(long)]
    license_uri: Option<String>,

    /// User agent for HTTP requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Also open key sessions for clear content
    #[arg(long)]
    clear_content: bool,

    /// Mix audio with other apps instead of taking focus
    #[arg(long)]
    mix: bool,
}

/// Platform crypto support to resolve against
#[derive(clap::Args)]
struct PlatformArgs {
    /// Platform API level
    #[arg(long, default_value = "30")]
    api_level: u32,

    /// Report Widevine as unsupported
    #[arg(long)]
    no_widevine: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a source and print its descriptor
    Resolve {
        /// Media URI
        uri: String,

        /// Format hint (ss, dash, hls, other)
        #[arg(long)]
        format_hint: Option<String>,

        #[command(flatten)]
        options: OptionArgs,

        #[command(flatten)]
        platform: PlatformArgs,
    },

    /// Replay a scripted engine timeline through a playback session
    Replay {
        /// Media URI
        uri: String,

        /// Timeline script (JSON)
        #[arg(short, long)]
        script: PathBuf,

        /// Format hint (ss, dash, hls, other)
        #[arg(long)]
        format_hint: Option<String>,

        #[command(flatten)]
        options: OptionArgs,

        #[command(flatten)]
        platform: PlatformArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    kino_bridge::init();

    match cli.command {
        Commands::Resolve { uri, format_hint, options, platform } => {
            let options = commands::load_options(&options)?;
            let crypto = commands::crypto_capability(&platform);
            commands::resolve(&uri, format_hint.as_deref(), options, crypto, &cli.format)?;
        }
        Commands::Replay { uri, script, format_hint, options, platform } => {
            let options = commands::load_options(&options)?;
            let crypto = commands::crypto_capability(&platform);
            commands::replay(&uri, format_hint.as_deref(), options, crypto, &script, &cli.format).await?;
        }
    }

    Ok(())
}
