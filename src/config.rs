//! Configuration for the lightning node.
//!
//! Everything is supplied once at startup and never reconfigured at runtime.
//! Every field has a default, so an empty TOML file is a valid configuration:
//!
//! ```
//! use lightning_node::config::NodeConfig;
//!
//! let config = NodeConfig::from_toml_str("").unwrap();
//! assert!(config.positioning.enabled);
//! assert_eq!(config.positioning.poll_interval_ms, 1000);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_FIX_POLL_MS, DEFAULT_NOISE_SETTLE_MS, MIN_GPS_SETTLE_MS, SENTINEL_YEAR,
};
use crate::error::{NodeError, Result};
use crate::output::OutputFormat;

/// Analog front-end gain mode of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AfeMode {
    /// Higher gain, for use inside a building
    Indoor,
    /// Lower gain, for field deployment
    Outdoor,
}

impl fmt::Display for AfeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AfeMode::Indoor => write!(f, "Indoor"),
            AfeMode::Outdoor => write!(f, "Outdoor"),
        }
    }
}

impl FromStr for AfeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indoor" => Ok(AfeMode::Indoor),
            "outdoor" => Ok(AfeMode::Outdoor),
            other => Err(format!("invalid AFE mode: {}", other)),
        }
    }
}

/// Node-wide configuration
///
/// # Example
/// ```
/// use lightning_node::config::NodeConfig;
///
/// let mut config = NodeConfig::default();
/// config.detector.enabled = false;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node identity
    pub node: IdentityConfig,
    /// Positioning receiver and fix acquisition
    pub positioning: PositioningConfig,
    /// Lightning detector and classification loop
    pub detector: DetectorConfig,
    /// Record output
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix of the session filename
    pub name: String,
}

/// Fix acquisition configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    /// When false the node runs with sentinel coordinates and an unset clock
    pub enabled: bool,
    /// Period between receiver status queries in milliseconds
    pub poll_interval_ms: u64,
    /// Wait before powering the receiver down, so the last read value is stable
    pub settle_ms: u64,
    /// Year the receiver reports before it has real UTC time
    pub sentinel_year: i32,
    /// Give up after this many seconds of polling; `None` blocks indefinitely
    pub fix_timeout_secs: Option<u64>,
}

/// Detector calibration registers, written once at initialization
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Front-end gain mode
    pub mode: AfeMode,
    /// Noise floor level (1-7)
    pub noise_floor: u8,
    /// Watchdog threshold (1-10)
    pub watchdog_threshold: u8,
    /// Spike rejection setting (1-11)
    pub spike_rejection: u8,
    /// Antenna tuning capacitance in pF (0-120, steps of 8)
    pub tune_cap_pf: u8,
}

/// Event classification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// When false every wait returns the "no measurement" sentinel immediately
    pub enabled: bool,
    /// Settle interval after a noise interrupt in milliseconds
    pub noise_settle_ms: u64,
    /// Interval between interrupt pin reads in microseconds (0 = tight poll)
    pub pin_poll_interval_us: u64,
    /// Pacing of sentinel records while the detector is disabled
    pub disabled_interval_ms: u64,
    /// Calibration registers
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Record rendering
    pub format: OutputFormat,
    /// Emit a CSV header line before the first record
    pub header: bool,
}

impl NodeConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject register values the detector cannot hold and settle delays
    /// too short for the receiver to latch its last reading.
    pub fn validate(&self) -> Result<()> {
        if self.positioning.poll_interval_ms == 0 {
            return Err(NodeError::Config(
                "positioning.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.positioning.settle_ms < MIN_GPS_SETTLE_MS {
            return Err(NodeError::Config(format!(
                "positioning.settle_ms must be at least {} ms, got {}",
                MIN_GPS_SETTLE_MS, self.positioning.settle_ms
            )));
        }
        self.detector.calibration.validate()
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<()> {
        check_range("noise_floor", self.noise_floor, 1, 7)?;
        check_range("watchdog_threshold", self.watchdog_threshold, 1, 10)?;
        check_range("spike_rejection", self.spike_rejection, 1, 11)?;
        check_range("tune_cap_pf", self.tune_cap_pf, 0, 120)?;
        if self.tune_cap_pf % 8 != 0 {
            return Err(NodeError::Config(format!(
                "detector.calibration.tune_cap_pf must be a multiple of 8, got {}",
                self.tune_cap_pf
            )));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: u8, min: u8, max: u8) -> Result<()> {
    if value < min || value > max {
        return Err(NodeError::Config(format!(
            "detector.calibration.{} must be in {}..={}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "lnb".to_string(),
        }
    }
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: DEFAULT_FIX_POLL_MS,
            settle_ms: MIN_GPS_SETTLE_MS,
            sentinel_year: SENTINEL_YEAR,
            fix_timeout_secs: None,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            mode: AfeMode::Outdoor,
            noise_floor: 2,
            watchdog_threshold: 2,
            spike_rejection: 2,
            tune_cap_pf: 0,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            noise_settle_ms: DEFAULT_NOISE_SETTLE_MS,
            pin_poll_interval_us: 0,
            disabled_interval_ms: 1000,
            calibration: Calibration::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            header: false,
        }
    }
}
