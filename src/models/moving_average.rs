//! Exponentially weighted moving-average baseline.
//!
//! The EWMA of the observed history is held flat across the horizon, or
//! decayed linearly toward `ma_end_ratio × level` on the final day. This is the
//! fallback the orchestrator uses when another model lacks history, so it
//! accepts any non-empty series.

use tracing::debug;

use crate::domain::{CleanedSeries, MaShape, ModelChoice, ModelParams};
use crate::error::PlanError;
use crate::math::ewma_last;
use crate::models::{Forecaster, ModelForecast, ensure_history, finalize};

#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverageModel;

impl Forecaster for MovingAverageModel {
    fn choice(&self) -> ModelChoice {
        ModelChoice::MovingAverage
    }

    fn min_history(&self, _params: &ModelParams) -> usize {
        1
    }

    fn forecast(
        &self,
        series: &CleanedSeries,
        horizon_days: usize,
        params: &ModelParams,
    ) -> Result<ModelForecast, PlanError> {
        let last = ensure_history(self.choice(), series, self.min_history(params))?;
        let level = ewma_last(&series.values(), params.ma_span).unwrap_or(0.0);
        debug!(sku = %series.sku, level, span = params.ma_span, "moving-average level");

        let values = shape_horizon(level, horizon_days, params.ma_shape, params.ma_end_ratio);
        finalize(self.choice(), last, &values, None)
    }
}

fn shape_horizon(level: f64, horizon_days: usize, shape: MaShape, end_ratio: f64) -> Vec<f64> {
    match shape {
        MaShape::Flat => vec![level; horizon_days],
        MaShape::LinearDecay => {
            if horizon_days <= 1 {
                return vec![level; horizon_days];
            }
            let end = level * end_ratio;
            (0..horizon_days)
                .map(|i| {
                    let u = i as f64 / (horizon_days as f64 - 1.0);
                    level + u * (end - level)
                })
                .collect()
        }
    }
}
