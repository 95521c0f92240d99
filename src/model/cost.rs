//! Cost Reporting Module
//!
//! Computes the static computational cost of a constructed network:
//! learnable parameter count and multiply-accumulate count for one forward
//! pass. Both depend only on the architecture (parameter shapes), never on
//! parameter values, so measurement is safe before weights are loaded.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::ImageClassifier;

/// Static cost of a model, reported in millions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    /// Learnable parameter count, in millions
    pub params_millions: f64,

    /// Floating-point operations (multiply-accumulates) per image, in millions
    pub flops_millions: f64,
}

/// Measure the cost of a constructed model.
pub fn measure<B: Backend, M: ImageClassifier<B>>(model: &M) -> CostMetrics {
    CostMetrics {
        params_millions: model.num_params() as f64 / 1_000_000.0,
        flops_millions: model.flop_count() as f64 / 1_000_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::model::{BasicNet, BasicNetConfig};
    use burn::module::Module;

    #[test]
    fn test_measure_reports_positive_cost() {
        let device = Default::default();
        let config = BasicNetConfig::new().with_num_classes(10).with_height(32).with_width(32);
        let model = BasicNet::<DefaultBackend>::new(&config, &device);

        let cost = measure(&model);

        assert!(cost.params_millions > 0.0);
        assert!(cost.flops_millions > 0.0);
        assert_eq!(cost.params_millions, model.num_params() as f64 / 1e6);
    }

    #[test]
    fn test_measure_is_stable_across_constructions() {
        let device = Default::default();
        let config = BasicNetConfig::new().with_num_classes(10).with_height(32).with_width(32);

        let a = measure(&BasicNet::<DefaultBackend>::new(&config, &device));
        let b = measure(&BasicNet::<DefaultBackend>::new(&config, &device));

        assert_eq!(a, b);
    }
}
