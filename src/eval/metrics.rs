//! Accuracy metrics for the validation pass

use serde::{Deserialize, Serialize};

/// Final accuracy metrics of one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Top-1 accuracy in `[0, 1]`
    pub top1: f64,

    /// Top-5 accuracy in `[0, 1]`
    pub top5: f64,

    /// Total samples evaluated
    pub total_samples: usize,

    /// Wall-clock evaluation time (seconds)
    pub eval_time: f64,
}

/// Running top-1 / top-5 accuracy accumulator
#[derive(Debug, Default)]
pub struct AccuracyMeter {
    correct_top1: usize,
    correct_top5: usize,
    total: usize,
}

impl AccuracyMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample given its class logits and true label.
    ///
    /// The target's rank is the number of classes scoring strictly higher,
    /// so ties resolve in the model's favor.
    pub fn update(&mut self, logits: &[f32], target: usize) {
        debug_assert!(target < logits.len());
        let target_score = logits[target];
        let rank = logits.iter().filter(|&&score| score > target_score).count();

        if rank == 0 {
            self.correct_top1 += 1;
        }
        if rank < 5 {
            self.correct_top5 += 1;
        }
        self.total += 1;
    }

    /// Samples recorded so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Current top-1 accuracy.
    pub fn top1(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct_top1 as f64 / self.total as f64
        }
    }

    /// Current top-5 accuracy.
    pub fn top5(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct_top5 as f64 / self.total as f64
        }
    }

    /// Close out the run.
    pub fn finish(self, eval_time: f64) -> Metrics {
        Metrics {
            top1: self.top1(),
            top5: self.top5(),
            total_samples: self.total,
            eval_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top1_and_top5_counting() {
        let mut meter = AccuracyMeter::new();

        // Target is the argmax: counts for both.
        meter.update(&[0.1, 0.9, 0.0, 0.0, 0.0, 0.0], 1);
        // Target ranks 2nd: top-5 only.
        meter.update(&[0.8, 0.5, 0.0, 0.0, 0.0, 0.0], 1);
        // Target ranks 6th: neither.
        meter.update(&[0.9, 0.8, 0.7, 0.6, 0.5, 0.1], 5);

        assert_eq!(meter.total(), 3);
        assert!((meter.top1() - 1.0 / 3.0).abs() < 1e-9);
        assert!((meter.top5() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_meter_reports_zero() {
        let meter = AccuracyMeter::new();
        assert_eq!(meter.top1(), 0.0);
        assert_eq!(meter.top5(), 0.0);

        let metrics = meter.finish(0.0);
        assert_eq!(metrics.total_samples, 0);
    }

    #[test]
    fn test_metrics_serialization() {
        let metrics = Metrics {
            top1: 0.72,
            top5: 0.91,
            total_samples: 50000,
            eval_time: 123.4,
        };

        let json = serde_json::to_string(&metrics).unwrap();
        let parsed: Metrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_samples, metrics.total_samples);
        assert_eq!(parsed.top1, metrics.top1);
    }
}
