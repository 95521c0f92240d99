//! Evaluation Configuration
//!
//! The immutable record of everything the harness needs to build, load and
//! run one model: architecture identifier, shape hyperparameters and the
//! evaluation batch settings. Produced once from CLI flags and never mutated
//! afterwards.

use serde::{Deserialize, Serialize};

use super::Architecture;
use crate::utils::error::{EvalError, Result};

/// Configuration for one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Which architecture to build
    pub arch: Architecture,

    /// Factor by which channel widths are scaled (s > 1 widens, s < 1 narrows)
    pub width_scale: f64,

    /// Input width used by the architecture constructors
    pub model_width: usize,

    /// Input height used by the architecture constructors
    pub model_height: usize,

    /// Number of input channels (3 for RGB)
    pub channels: usize,

    /// Number of output classes
    pub num_classes: usize,

    /// Evaluation batch size
    pub batch_size: usize,

    /// Data-loading parallelism hint
    pub workers: usize,

    /// Replicate across all available accelerators when any exist
    pub data_parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            arch: Architecture::BasicDw,
            width_scale: 1.0,
            model_width: 224,
            model_height: 224,
            channels: 3,
            num_classes: 1000,
            batch_size: 512,
            workers: 4,
            data_parallel: true,
        }
    }
}

impl EvalConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(EvalError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.model_width == 0 || self.model_height == 0 {
            return Err(EvalError::Config(
                "model width and height must be greater than 0".to_string(),
            ));
        }

        if self.channels == 0 {
            return Err(EvalError::Config(
                "channels must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(EvalError::Config(
                "batch size must be greater than 0".to_string(),
            ));
        }

        if self.width_scale <= 0.0 || !self.width_scale.is_finite() {
            return Err(EvalError::Config(
                "width scale must be a positive finite number".to_string(),
            ));
        }

        Ok(())
    }
}

/// Scale a base channel count by the width factor.
///
/// Results are clamped to at least 8 channels and rounded up to an even
/// count so channel-split units always have two equal halves.
pub fn scaled_channels(base: usize, width_scale: f64) -> usize {
    let scaled = (base as f64 * width_scale).round() as usize;
    let scaled = scaled.max(8);
    scaled + scaled % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EvalConfig::default();
        assert_eq!(config.num_classes, 1000);
        assert_eq!(config.batch_size, 512);
        assert!(config.data_parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_fields() {
        let mut config = EvalConfig::default();
        config.num_classes = 0;
        assert!(config.validate().is_err());

        config = EvalConfig::default();
        config.model_width = 0;
        assert!(config.validate().is_err());

        config = EvalConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        config = EvalConfig::default();
        config.width_scale = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scaled_channels() {
        assert_eq!(scaled_channels(32, 1.0), 32);
        assert_eq!(scaled_channels(32, 2.0), 64);
        // Narrow scales clamp to the minimum width.
        assert_eq!(scaled_channels(32, 0.1), 8);
        // Odd results round up to even.
        assert_eq!(scaled_channels(116, 0.25), 30);
    }
}
