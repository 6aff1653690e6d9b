//! Forecast model adapters.
//!
//! Every adapter implements [`Forecaster`]: given one SKU's cleaned history it
//! produces exactly `horizon_days` contiguous daily points starting the day
//! after the last observation, never negative. Too little history is reported
//! as `PlanError::InsufficientHistory`; the orchestrator decides the fallback.
//!
//! Dispatch goes through [`ModelRegistry`], keyed by [`ModelChoice`].

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::{CleanedSeries, ForecastPoint, ModelChoice, ModelParams, Regressors, horizon_dates};
use crate::error::PlanError;

pub mod decision_tree;
pub mod heuristic;
pub mod knn;
pub mod moving_average;
pub mod seasonal;

pub use decision_tree::DecisionTreeModel;
pub use heuristic::HeuristicModel;
pub use knn::KnnModel;
pub use moving_average::MovingAverageModel;
pub use seasonal::SeasonalRegressionModel;

/// Counts of values corrected by the numeric guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub negative_clamped: usize,
    pub ceiling_clamped: usize,
}

/// Output of a single model run.
#[derive(Debug, Clone)]
pub struct ModelForecast {
    pub model: ModelChoice,
    pub points: Vec<ForecastPoint>,
    pub guard: GuardStats,
}

/// Common contract for all forecasting strategies.
pub trait Forecaster: Send + Sync {
    fn choice(&self) -> ModelChoice;

    /// Minimum number of observations the model accepts.
    fn min_history(&self, params: &ModelParams) -> usize;

    /// Forecast `horizon_days` days past the end of `series`.
    fn forecast(
        &self,
        series: &CleanedSeries,
        horizon_days: usize,
        params: &ModelParams,
    ) -> Result<ModelForecast, PlanError>;
}

/// Maps each `ModelChoice` to its strategy implementation.
pub struct ModelRegistry {
    models: HashMap<ModelChoice, Box<dyn Forecaster>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Registry with all built-in models.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(MovingAverageModel));
        registry.register(Box::new(KnnModel));
        registry.register(Box::new(DecisionTreeModel));
        registry.register(Box::new(SeasonalRegressionModel));
        registry.register(Box::new(HeuristicModel));
        registry
    }

    /// Register (or replace) the strategy for its `choice()`.
    pub fn register(&mut self, model: Box<dyn Forecaster>) {
        self.models.insert(model.choice(), model);
    }

    pub fn get(&self, choice: ModelChoice) -> Option<&dyn Forecaster> {
        self.models.get(&choice).map(|m| m.as_ref())
    }
}

/// Reject histories shorter than the model's floor.
pub(crate) fn ensure_history(
    model: ModelChoice,
    series: &CleanedSeries,
    required: usize,
) -> Result<NaiveDate, PlanError> {
    let available = series.len();
    match series.last_date() {
        Some(last) if available >= required => Ok(last),
        _ => Err(PlanError::InsufficientHistory {
            model,
            required,
            available,
        }),
    }
}

/// Regressor values assumed for a future day: caller-supplied, else zero.
pub(crate) fn future_regressors(params: &ModelParams, date: NaiveDate) -> Regressors {
    params.future_regressors.get(&date).copied().unwrap_or_default()
}

/// Turn raw model values into forecast points, applying the numeric guards.
///
/// Non-finite and negative values become 0. When `ceiling` is set, values
/// above it are clamped to it.
pub(crate) fn finalize(
    model: ModelChoice,
    last: NaiveDate,
    values: &[f64],
    ceiling: Option<f64>,
) -> Result<ModelForecast, PlanError> {
    let mut guard = GuardStats::default();
    let points = horizon_dates(last, values.len())?
        .into_iter()
        .zip(values.iter())
        .map(|(date, &raw)| {
            let mut v = raw;
            if !v.is_finite() || v < 0.0 {
                guard.negative_clamped += 1;
                v = 0.0;
            }
            if let Some(max) = ceiling {
                if v > max {
                    guard.ceiling_clamped += 1;
                    v = max;
                }
            }
            ForecastPoint { date, forecast: v }
        })
        .collect();

    if guard.negative_clamped > 0 || guard.ceiling_clamped > 0 {
        warn!(
            model = %model,
            negative = guard.negative_clamped,
            ceiling = guard.ceiling_clamped,
            "forecast values clamped by guardrails"
        );
    }

    Ok(ModelForecast {
        model,
        points,
        guard,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};

    use crate::domain::{CleanedSeries, Regressors, SalesRecord};

    /// Daily series for SKU "A" starting at `start`, one value per day.
    pub fn daily_series(start: NaiveDate, values: &[f64]) -> CleanedSeries {
        let records = values
            .iter()
            .enumerate()
            .map(|(i, &sales)| SalesRecord {
                date: start + Duration::days(i as i64),
                sku: "A".to_string(),
                sales,
                regressors: Regressors::default(),
            })
            .collect();
        CleanedSeries::new("A", records)
    }

    pub fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }
}
