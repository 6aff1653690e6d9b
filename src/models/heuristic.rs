//! Seasonality + momentum heuristic engine.
//!
//! Forecast for horizon day `i`:
//!
//! ```text
//! baseline × trend(phase, progress) × month_index × weekday_index
//!          × profile.marketing × event_ramp(date)
//! ```
//!
//! - Seasonality indices are (weighted) mean sales per month / weekday over the
//!   weighted global mean. With `time_weighted` the newest day counts 2× the
//!   oldest. Deviations from 1 are scaled by the profile's `season` multiplier.
//! - Momentum compares a short EWMA with a long one; the phase's relative gap,
//!   scaled by the profile `trend` multiplier and `dampening`, fades out
//!   linearly across the horizon.
//! - The baseline is the median of the de-seasonalised recent window, so a single
//!   spike does not move it.
//! - Every value is clamped to `[0, guardrail_ratio × historical max]`.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{CleanedSeries, MIN_HISTORY_DAYS, ModelChoice, ModelParams, day_features, horizon_dates};
use crate::error::PlanError;
use crate::math::{ewma_last, median, recency_weights, weighted_mean};
use crate::models::{Forecaster, ModelForecast, ensure_history, finalize};

const RECENCY_MAX_WEIGHT: f64 = 2.0;
const MIN_TREND_MODIFIER: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicModel;

/// Direction of recent demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RampUp,
    Decline,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub phase: Phase,
    /// `short / long - 1`.
    pub strength: f64,
}

/// Multiplicative indices; index 0 of `monthly` is January, of `weekday` Monday.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalityIndices {
    pub monthly: [f64; 12],
    pub weekday: [f64; 7],
}

impl SeasonalityIndices {
    fn at(&self, date: NaiveDate) -> f64 {
        let f = day_features(date);
        self.monthly[(f.month - 1) as usize] * self.weekday[f.weekday as usize]
    }

    /// Pull every index toward (or push it away from) 1.
    fn scaled(&self, season: f64) -> Self {
        let scale = |v: f64| (1.0 + (v - 1.0) * season).max(0.0);
        Self {
            monthly: self.monthly.map(scale),
            weekday: self.weekday.map(scale),
        }
    }
}

pub fn seasonality_indices(series: &CleanedSeries, time_weighted: bool) -> SeasonalityIndices {
    let values = series.values();
    let weights = if time_weighted {
        recency_weights(values.len(), RECENCY_MAX_WEIGHT)
    } else {
        vec![1.0; values.len()]
    };

    let mut indices = SeasonalityIndices {
        monthly: [1.0; 12],
        weekday: [1.0; 7],
    };
    let Some(global) = weighted_mean(&values, &weights).filter(|g| *g > 0.0) else {
        return indices;
    };

    let mut month_buckets: [(Vec<f64>, Vec<f64>); 12] = Default::default();
    let mut weekday_buckets: [(Vec<f64>, Vec<f64>); 7] = Default::default();
    for ((record, &v), &w) in series.records.iter().zip(values.iter()).zip(weights.iter()) {
        let f = day_features(record.date);
        let month = &mut month_buckets[(f.month - 1) as usize];
        month.0.push(v);
        month.1.push(w);
        let day = &mut weekday_buckets[f.weekday as usize];
        day.0.push(v);
        day.1.push(w);
    }

    for (slot, (v, w)) in indices.monthly.iter_mut().zip(month_buckets.iter()) {
        if let Some(m) = weighted_mean(v, w) {
            *slot = m / global;
        }
    }
    for (slot, (v, w)) in indices.weekday.iter_mut().zip(weekday_buckets.iter()) {
        if let Some(m) = weighted_mean(v, w) {
            *slot = m / global;
        }
    }
    indices
}

pub fn detect_momentum(values: &[f64], params: &ModelParams) -> Momentum {
    let short = ewma_last(values, params.short_span).unwrap_or(0.0);
    let long = ewma_last(values, params.long_span).unwrap_or(0.0);
    if long <= 0.0 {
        return Momentum {
            phase: Phase::Stable,
            strength: 0.0,
        };
    }
    let strength = short / long - 1.0;
    let phase = if strength > params.momentum_threshold {
        Phase::RampUp
    } else if strength < -params.momentum_threshold {
        Phase::Decline
    } else {
        Phase::Stable
    };
    Momentum { phase, strength }
}

fn trend_modifier(momentum: Momentum, progress: f64, trend: f64, dampening: f64) -> f64 {
    match momentum.phase {
        Phase::Stable => 1.0,
        Phase::RampUp | Phase::Decline => {
            let m = 1.0 + momentum.strength * trend * dampening * (1.0 - progress);
            m.max(MIN_TREND_MODIFIER)
        }
    }
}

/// Linear lead-in toward each event date: full `pct` uplift on the day,
/// nothing `days` or more before it. Overlapping ramps multiply.
fn event_ramp(date: NaiveDate, events: &[NaiveDate], pct: f64, days: i64) -> f64 {
    events
        .iter()
        .map(|&event| {
            let until = (event - date).num_days();
            if (0..days).contains(&until) {
                1.0 + pct / 100.0 * (1.0 - until as f64 / days as f64)
            } else {
                1.0
            }
        })
        .product()
}

/// Median of the last `window` observations with the seasonal indices removed.
fn robust_baseline(series: &CleanedSeries, indices: &SeasonalityIndices, window: usize) -> f64 {
    let start = series.len().saturating_sub(window);
    let recent = &series.records[start..];
    let deseasonalised: Vec<f64> = recent
        .iter()
        .filter_map(|r| {
            let idx = indices.at(r.date);
            (idx > 0.0).then(|| r.sales / idx)
        })
        .collect();
    median(&deseasonalised)
        .or_else(|| median(&recent.iter().map(|r| r.sales).collect::<Vec<_>>()))
        .unwrap_or(0.0)
}

impl Forecaster for HeuristicModel {
    fn choice(&self) -> ModelChoice {
        ModelChoice::Heuristic
    }

    fn min_history(&self, _params: &ModelParams) -> usize {
        MIN_HISTORY_DAYS
    }

    fn forecast(
        &self,
        series: &CleanedSeries,
        horizon_days: usize,
        params: &ModelParams,
    ) -> Result<ModelForecast, PlanError> {
        let last = ensure_history(self.choice(), series, self.min_history(params))?;
        let profile = params.profile;

        let raw_indices = seasonality_indices(series, params.time_weighted);
        let indices = raw_indices.scaled(profile.season);
        let momentum = detect_momentum(&series.values(), params);
        let baseline = robust_baseline(series, &raw_indices, params.baseline_window);
        let ceiling = params.guardrail_ratio * series.max_sales();

        debug!(
            sku = %series.sku,
            baseline,
            phase = ?momentum.phase,
            strength = momentum.strength,
            ceiling,
            "heuristic state"
        );

        let values: Vec<f64> = horizon_dates(last, horizon_days)?
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let progress = (i + 1) as f64 / horizon_days as f64;
                baseline
                    * trend_modifier(momentum, progress, profile.trend, params.dampening)
                    * indices.at(date)
                    * profile.marketing
                    * event_ramp(
                        date,
                        &params.event_dates,
                        params.festival_ramp_pct,
                        params.festival_ramp_days,
                    )
            })
            .collect();

        finalize(self.choice(), last, &values, Some(ceiling))
    }
}
