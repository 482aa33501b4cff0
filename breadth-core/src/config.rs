//! Engine configuration: window sizes, spike thresholds, smoothing periods.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of moving-average windows a `DayFlags` bitmask can carry.
pub const MAX_MA_WINDOWS: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the breadth engine.
///
/// Every field has a default matching the classic breadth setup, so an empty
/// TOML table yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreadthConfig {
    /// Moving-average window sizes, strictly increasing.
    pub ma_windows: Vec<usize>,
    /// Number of prior closes compared against for a 52-week high/low.
    pub high_low_lookback: usize,
    /// Number of prior volumes averaged for spike detection.
    pub volume_lookback: usize,
    /// Minimum absolute daily change (fraction) for a spike.
    pub spike_pct: f64,
    /// Minimum volume as a multiple of the prior average for a spike.
    pub spike_volume_mult: f64,
    /// Short EMA period of the McClellan oscillator.
    pub ema_short: usize,
    /// Long EMA period of the McClellan oscillator.
    pub ema_long: usize,
}

impl Default for BreadthConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20, 50, 200],
            high_low_lookback: 251,
            volume_lookback: 20,
            spike_pct: 0.015,
            spike_volume_mult: 1.25,
            ema_short: 19,
            ema_long: 39,
        }
    }
}

impl BreadthConfig {
    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ma_windows.is_empty() {
            return Err(ConfigError::Invalid("ma_windows must not be empty".into()));
        }
        if self.ma_windows.len() > MAX_MA_WINDOWS {
            return Err(ConfigError::Invalid(format!(
                "at most {MAX_MA_WINDOWS} ma_windows are supported, got {}",
                self.ma_windows.len()
            )));
        }
        if self.ma_windows[0] == 0 {
            return Err(ConfigError::Invalid("ma_windows must be >= 1".into()));
        }
        if self.ma_windows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(
                "ma_windows must be strictly increasing".into(),
            ));
        }
        if self.high_low_lookback == 0 {
            return Err(ConfigError::Invalid("high_low_lookback must be >= 1".into()));
        }
        if self.volume_lookback == 0 {
            return Err(ConfigError::Invalid("volume_lookback must be >= 1".into()));
        }
        if !(self.spike_pct >= 0.0) {
            return Err(ConfigError::Invalid("spike_pct must be >= 0".into()));
        }
        if !(self.spike_volume_mult > 0.0) {
            return Err(ConfigError::Invalid("spike_volume_mult must be > 0".into()));
        }
        if self.ema_short == 0 || self.ema_short >= self.ema_long {
            return Err(ConfigError::Invalid(format!(
                "ema periods must satisfy 0 < ema_short < ema_long (got {} / {})",
                self.ema_short, self.ema_long
            )));
        }
        Ok(())
    }

    /// Column-style label for each MA window, e.g. `above_ma50`.
    pub fn ma_labels(&self) -> Vec<String> {
        self.ma_windows
            .iter()
            .map(|w| format!("above_ma{w}"))
            .collect()
    }
}
