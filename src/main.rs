//! assessment-guard
//!
//! Command-line front end for the analysis-backend circuit breaker.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──analyze──▶ gateway ──▶ circuit breaker ──▶ store (shared failure marker)
//!                                         │
//!                                         └──probe──▶ GET {base_url}/AIAnalysis/status
//!
//!   editor ──set_dirty──▶ tracking registry ──▶ subscribers (edge-triggered)
//!                                 │
//!                                 └──reminders──▶ notification channel (level-triggered)
//! ```
//!
//! # Commands
//! - `status`: one status check, printed as JSON
//! - `capabilities`: capability report, printed as JSON
//! - `watch`: poll status and log mode transitions until Ctrl-C

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assessment_guard::config::{load_config, GuardConfig};
use assessment_guard::lifecycle::{signals, Services, Shutdown};
use assessment_guard::notify::HubChannel;
use assessment_guard::observability::{logging, metrics};
use assessment_guard::resilience::CircuitMode;

#[derive(Parser)]
#[command(name = "assessment-guard")]
#[command(about = "Availability guard for the assessment analysis backend", long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check backend availability once
    Status,
    /// Show which analysis capabilities are usable
    Capabilities,
    /// Poll availability and log mode changes until interrupted
    Watch {
        #[arg(long, default_value_t = 15)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("assessment-guard v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let services = Services::from_config(config, Arc::new(HubChannel::default()))?;

    match cli.command {
        Commands::Status => {
            let record = services.breaker.get_status().await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Capabilities => {
            let report = services.breaker.get_capabilities().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Watch { interval_secs } => {
            watch(&services, Duration::from_secs(interval_secs.max(1))).await;
        }
    }

    services.dispose();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn watch(services: &Services, every: Duration) {
    let shutdown = Arc::new(Shutdown::new());
    let mut stop = shutdown.subscribe();
    let listener = signals::spawn_signal_listener(shutdown.clone());

    let mut ticker = tokio::time::interval(every);
    let mut last = CircuitMode::Unknown;

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            _ = ticker.tick() => {
                let report = services.breaker.get_capabilities().await;
                if report.mode != last {
                    tracing::info!(from = %last, to = %report.mode, "Availability changed");
                    last = report.mode;
                }
            }
        }
    }

    listener.abort();
}
