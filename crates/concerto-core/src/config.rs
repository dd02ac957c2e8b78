//! Audio engine configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the audio engine.
///
/// Every field has a default, so a TOML document only needs the keys it
/// wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Frames per processing block.
    pub block_size: usize,
    pub channels: usize,
    /// Capacity of the MIDI hand-off buffer.
    pub midi_queue_capacity: usize,
    /// Consecutive process failures before a plugin is marked failed.
    pub failure_threshold: u32,
    /// Upper bound on plugin nodes in the routing graph.
    pub max_nodes: usize,
    /// Share of the block duration one plugin may spend in `process`.
    /// `None` disables the per-plugin deadline.
    pub process_budget: Option<f64>,
    /// Capacity of the monitoring event channel.
    pub monitor_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 512,
            channels: 2,
            midi_queue_capacity: 256,
            failure_threshold: 10,
            max_nodes: 64,
            process_budget: Some(1.0),
            monitor_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (1-8192)",
                self.block_size
            )));
        }
        if self.channels == 0 || self.channels > 32 {
            return Err(Error::InvalidConfig(format!(
                "channels {} out of range (1-32)",
                self.channels
            )));
        }
        if self.midi_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "midi_queue_capacity must be non-zero".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(Error::InvalidConfig(
                "failure_threshold must be non-zero".into(),
            ));
        }
        if self.max_nodes == 0 {
            return Err(Error::InvalidConfig("max_nodes must be non-zero".into()));
        }
        if self.monitor_capacity == 0 {
            return Err(Error::InvalidConfig(
                "monitor_capacity must be non-zero".into(),
            ));
        }
        if let Some(budget) = self.process_budget {
            if !(budget > 0.0 && budget <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "process_budget {budget} must be a fraction in (0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Wall-clock duration of one block.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate)
    }

    /// Deadline for a single plugin's `process` call, if enforced.
    pub fn plugin_deadline(&self) -> Option<Duration> {
        self.process_budget
            .map(|fraction| self.block_duration().mul_f64(fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.failure_threshold, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = EngineConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            sample_rate: 1000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            process_budget: Some(-0.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let config = EngineConfig {
            sample_rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        for budget in [f64::NAN, f64::INFINITY, 1e300, 1.5, 0.0] {
            let config = EngineConfig {
                process_budget: Some(budget),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "budget {budget} accepted");
        }

        let config = EngineConfig {
            process_budget: Some(1.0),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_nan_sample_rate() {
        assert!(matches!(
            EngineConfig::from_toml_str("sample_rate = nan"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("process_budget = 1e300"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = EngineConfig::from_toml_str(
            "sample_rate = 48000.0\nblock_size = 128\nfailure_threshold = 3\n",
        )
        .unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            EngineConfig::from_toml_str("block_size = \"large\""),
            Err(Error::ConfigParse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("channels = 0"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_block_duration() {
        let config = EngineConfig {
            sample_rate: 48000.0,
            block_size: 480,
            ..Default::default()
        };
        assert_abs_diff_eq!(config.block_duration().as_secs_f64(), 0.010, epsilon = 1e-9);
    }
}
