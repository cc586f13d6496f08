//! Configuration management for the Horizon overlay host.
//!
//! This module handles loading, validation and CLI overrides of the host
//! configuration stored as TOML.

use crate::cli::CliArgs;
use horizon_overlay::{OverlayDefinition, OverlaySettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tick loop and capacity settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Overlay auto-display and refresh defaults
    #[serde(default)]
    pub overlays: OverlaySettings,
    /// Simulated clients
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Overlays registered at startup, one `[[overlay]]` table each
    #[serde(default, rename = "overlay")]
    pub overlay_definitions: Vec<OverlayDefinition>,
}

/// Server tick loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Milliseconds per server tick (50 = 20 ticks per second)
    pub tick_interval_ms: u64,
    /// Reported by the `{max_players}` tag
    pub max_players: usize,
    /// Seconds between diagnostics log lines
    pub stats_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            max_players: 100,
            stats_interval_secs: 60,
        }
    }
}

/// Simulated client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of bot clients connected at startup
    pub bot_clients: usize,
    /// Ticks each bot stays connected before being replaced (0 = until shutdown)
    pub bot_lifetime_ticks: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            bot_clients: 2,
            bot_lifetime_ticks: 0,
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            overlays: OverlaySettings::default(),
            simulation: SimulationSettings::default(),
            logging: LoggingSettings::default(),
            overlay_definitions: vec![OverlayDefinition {
                id: "welcome".to_string(),
                title: "Horizon".to_string(),
                owner: "config".to_string(),
                priority: 0,
                auto_refresh: true,
                refresh_interval: None,
                auto_display: true,
                lines: vec![
                    "Welcome, {player}".to_string(),
                    "Online: {online}/{max_players}".to_string(),
                    "{date} {time}".to_string(),
                ],
                tags: vec![
                    "player".to_string(),
                    "online".to_string(),
                    "max_players".to_string(),
                    "date".to_string(),
                    "time".to_string(),
                ],
            }],
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            default_config.save_to_file(path).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Writes the configuration to `path` as TOML.
    pub async fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, toml_content).await?;
        Ok(())
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(bots) = args.bots {
            self.simulation.bot_clients = bots;
        }
        if let Some(tick_ms) = args.tick_ms {
            self.server.tick_interval_ms = tick_ms;
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.tick_interval_ms == 0 {
            return Err("Tick interval must be at least 1 ms".to_string());
        }

        if self.server.stats_interval_secs == 0 {
            return Err("Stats interval must be at least 1 second".to_string());
        }

        if self.overlays.default_refresh_interval == 0 {
            return Err("Default overlay refresh interval must be at least 1 tick".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, VALID_LOG_LEVELS
            ));
        }

        for definition in &self.overlay_definitions {
            definition
                .validate()
                .map_err(|e| format!("Invalid overlay definition: {}", e))?;
        }

        Ok(())
    }
}
