//! Model module: architecture registry and CNN variants
//!
//! This module provides:
//! - The closed set of supported architecture identifiers
//! - The [`ImageClassifier`] trait every variant implements
//! - Construction, cost measurement and weight binding for the variants
//!
//! Dispatch over architectures is an exhaustive `match` on [`Architecture`],
//! so an unsupported tag can only exist as a parse failure, never as a
//! half-constructed model.

pub mod basic;
pub mod config;
pub mod cost;
pub mod shuffle;
pub mod weights;

use std::fmt;
use std::str::FromStr;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::utils::error::EvalError;

// Re-export main types for convenience
pub use basic::{BasicNet, BasicNetConfig};
pub use config::EvalConfig;
pub use cost::CostMetrics;
pub use shuffle::{ShuffleNet, ShuffleNetConfig};

/// The fixed set of supported architecture identifiers.
///
/// The `dw` variants use depthwise-separable convolutions, the `vw`
/// variants full-width convolutions over the same topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    BasicDw,
    BasicVw,
    ShuffleDw,
    ShuffleVw,
}

impl Architecture {
    /// All supported variants, in CLI-help order.
    pub const ALL: [Architecture; 4] = [
        Architecture::BasicDw,
        Architecture::BasicVw,
        Architecture::ShuffleDw,
        Architecture::ShuffleVw,
    ];

    /// The CLI tag for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::BasicDw => "basic_dw",
            Architecture::BasicVw => "basic_vw",
            Architecture::ShuffleDw => "shuffle_dw",
            Architecture::ShuffleVw => "shuffle_vw",
        }
    }

    /// Whether this variant uses depthwise-separable convolutions.
    pub fn is_depthwise(&self) -> bool {
        matches!(self, Architecture::BasicDw | Architecture::ShuffleDw)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_dw" => Ok(Architecture::BasicDw),
            "basic_vw" => Ok(Architecture::BasicVw),
            "shuffle_dw" => Ok(Architecture::ShuffleDw),
            "shuffle_vw" => Ok(Architecture::ShuffleVw),
            other => Err(EvalError::UnsupportedModel(other.to_string())),
        }
    }
}

/// Interface the evaluation pipeline needs from a constructed network.
///
/// Everything else (parameter count, record loading, device transfer) comes
/// from the [`Module`] supertrait.
pub trait ImageClassifier<B: Backend>: Module<B> {
    /// Forward pass: `[batch, channels, height, width]` -> `[batch, classes]` logits.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Static multiply-accumulate count for one forward pass of a single
    /// image, derived from the architecture alone (independent of parameter
    /// values).
    fn flop_count(&self) -> usize;
}
