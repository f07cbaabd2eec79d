//! Turns decoder probabilities into bits.

use crate::error::{Result, WatermarkError};

/// Probabilities strictly above this value decode to 1.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct SequenceAggregator {
    threshold: f64,
}

impl Default for SequenceAggregator {
    fn default() -> Self {
        Self {
            threshold: DECISION_THRESHOLD,
        }
    }
}

impl SequenceAggregator {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn to_bits(&self, probabilities: &[f64]) -> Vec<u8> {
        probabilities
            .iter()
            .map(|&p| u8::from(p > self.threshold))
            .collect()
    }

    /// Average probability vectors from independent runs, bit by bit.
    pub fn combine_runs(&self, runs: &[Vec<f64>]) -> Result<Vec<f64>> {
        let Some(first) = runs.first() else {
            return Err(WatermarkError::InvalidInput(
                "at least one decoding run is required".into(),
            ));
        };
        let len = first.len();
        if let Some(index) = runs.iter().position(|run| run.len() != len) {
            return Err(WatermarkError::InvalidInput(format!(
                "run {} has {} probabilities, expected {}",
                index,
                runs[index].len(),
                len
            )));
        }

        let count = runs.len() as f64;
        Ok((0..len)
            .map(|i| runs.iter().map(|run| run[i]).sum::<f64>() / count)
            .collect())
    }

    /// Mean-then-threshold over several runs.
    pub fn decide_runs(&self, runs: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self.to_bits(&self.combine_runs(runs)?))
    }
}
