//! Horizon overlay host.
//!
//! Loads configuration, builds the session and overlay registries, then
//! drives everything from one tick loop until a shutdown signal arrives.
//! Without a network layer, connections come from simulated bot clients and
//! wire operations are logged through `tracing`.

mod cli;
mod config;
mod host;
mod logging;
mod signals;
mod simulation;

use anyhow::{anyhow, Result};
use cli::CliArgs;
use config::AppConfig;
use horizon_host::TracingTransport;
use host::OverlayHost;
use simulation::BotSimulation;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// The host application.
pub struct Application {
    config: AppConfig,
    host: OverlayHost,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_overrides(&args);
        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging)?;

        let host = OverlayHost::new(&config, Arc::new(TracingTransport))?;

        info!(
            "🚀 Horizon overlay host v{} | Config: {}",
            env!("CARGO_PKG_VERSION"),
            args.config_path.display()
        );
        Ok(Self { config, host })
    }

    pub async fn run(self) -> Result<()> {
        let tick_interval = Duration::from_millis(self.config.server.tick_interval_ms);
        info!("📋 Configuration Summary:");
        info!(
            "  ⏱️ Tick interval: {}ms ({:.1} TPS)",
            self.config.server.tick_interval_ms,
            1000.0 / self.config.server.tick_interval_ms as f64
        );
        info!("  👥 Max players: {}", self.config.server.max_players);
        info!(
            "  📋 Overlays: {} (auto-display: {})",
            self.host.overlays.len(),
            self.config.overlays.auto_display
        );

        let bots = BotSimulation::start(
            &self.config.simulation,
            self.host.hub.clone(),
            self.host.scheduler.clone(),
        );

        let mut ticks = tokio::time::interval(tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = tokio::time::interval(Duration::from_secs(
            self.config.server.stats_interval_secs,
        ));
        stats.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = signals::shutdown_signal();
        tokio::pin!(shutdown);

        info!("✅ Host is running, press Ctrl+C to shut down");
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    self.host.tick();
                }
                _ = stats.tick() => {
                    self.host.log_diagnostics();
                }
                result = &mut shutdown => {
                    if let Err(e) = result {
                        error!("❌ Signal handling failed: {:?}", e);
                    }
                    break;
                }
            }
        }

        info!("🛑 Shutdown signal received, tearing down sessions...");
        self.host.shutdown();
        self.host.log_diagnostics();
        info!(
            "👋 Horizon overlay host stopped after {} tick(s), {} simulated client(s)",
            self.host.scheduler.current_tick(),
            bots.spawned()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}
