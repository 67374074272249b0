//! TOML configuration for the supervisor.
//!
//! Provides two loading methods:
//! - `default_config()` - Loads the defaults compiled into the binary
//! - `load_config(path)` - Loads a custom configuration from a file path

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default configuration embedded in the binary at compile time.
/// Loaded from `config/supervisor.toml`.
const DEFAULT_CONFIG: &str = include_str!("../config/supervisor.toml");

/// Root configuration for a supervision session.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    pub analysis: AnalysisConfig,
    pub playback: PlaybackConfig,
    pub overlay: OverlayConfig,
    pub audit: AuditConfig,
}

/// Settings for the reasoning-service call path.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// AI provider: "claude", "openai", or "openrouter"
    pub provider: String,
    /// Model identifier for the provider
    pub model: String,
    /// Language tag sent with every request; the service localizes messages
    pub language: String,
    /// Minimum interval between started analysis calls
    pub min_call_interval_secs: f64,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

/// Settings for video-synchronized procedure playback.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// The controller pauses this many seconds before a step's target timestamp
    pub step_lead_window_secs: f64,
    /// Position poll cadence for the host loop
    pub poll_interval_ms: u64,
}

/// Settings for overlay geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Whether the live feed is displayed mirrored (anomaly boxes are reflected to match)
    pub mirrored: bool,
}

/// Settings for the audit log and compliance score.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Ring-buffer cap on retained entries
    pub max_entries: usize,
    /// Score penalty per CRITICAL entry
    pub critical_penalty: u32,
    /// Score penalty per MEDIUM entry
    pub medium_penalty: u32,
    /// Score penalty per LOW entry
    pub low_penalty: u32,
}

impl AnalysisConfig {
    /// Minimum inter-call interval as a `Duration`.
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_call_interval_secs)
    }
}

impl PlaybackConfig {
    /// Poll cadence as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load configuration from a TOML file at the given path.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config(path: &Path) -> Result<SupervisorConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SupervisorConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Get the default configuration embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_config() -> SupervisorConfig {
    toml::from_str(DEFAULT_CONFIG).expect("embedded supervisor.toml must be valid TOML")
}
