use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use usage_analytics::UsageSummary;
use usage_core::config::AppConfig;
use usage_core::store::JsonFileStore;
use usage_core::tracker::UsageTracker;

#[derive(Parser)]
#[command(
    name = "trialbot-usage",
    about = "Usage tracking and admin reporting for the clinical trials chatbot",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/trialbot-usage/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the stats file path
    #[arg(long, global = true)]
    stats_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tracking/reporting HTTP server (default)
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print summary statistics for the collected data
    Stats,

    /// Write the CSV export to a file or stdout
    Export {
        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all collected usage data
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(path) = cli.stats_file {
        config.storage.stats_file = Some(path);
    }

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            usage_server::serve(config).await
        }

        Commands::Stats => {
            let tracker = tracker_for(&config);
            let summary = UsageSummary::from_records(&tracker.all_records().await);
            print!("{}", summary.to_text());
            Ok(())
        }

        Commands::Export { output } => {
            let tracker = tracker_for(&config);
            let csv = usage_analytics::export_csv(&tracker.all_records().await);
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", csv),
            }
            Ok(())
        }

        Commands::Clear { yes } => {
            if !yes {
                eprintln!("This deletes ALL collected usage data. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            let mut tracker = tracker_for(&config);
            tracker.clear().await;
            println!("All usage statistics cleared");
            Ok(())
        }

        Commands::Config { action } => {
            match action.unwrap_or(ConfigAction::Show) {
                ConfigAction::Show => {
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                ConfigAction::Init => {
                    config.save()?;
                    println!("Wrote {}", AppConfig::default_path().display());
                }
                ConfigAction::Path => {
                    println!("{}", AppConfig::default_path().display());
                }
            }
            Ok(())
        }
    }
}

fn tracker_for(config: &AppConfig) -> UsageTracker {
    UsageTracker::new(Arc::new(JsonFileStore::new(config.stats_file())))
}
