//! Additive seasonal regression.
//!
//! `y(t) = intercept + trend·t + weekly(t) + yearly(t) + Σ β_r · regressor_r(t)`
//!
//! - Seasonal components are Fourier series (weekly order 3, yearly order 6),
//!   each enabled only when the history span covers at least two weekly cycles
//!   or a full year respectively.
//! - Regressors: standardised marketing spend, festival flag, event flag and a
//!   weekend flag, present only when `marketing_weight > 0`.
//! - Each coefficient group carries a Gaussian prior (ridge penalty `1/scale²`):
//!   trend scale `20 × trend_sensitivity`, seasonality scale 10, regressors
//!   `marketing_weight`. The intercept is unpenalised.
//! - `y` is divided by its historical maximum before fitting.
//!
//! Future regressor values are taken from `ModelParams::future_regressors` and
//! are zero otherwise. Zero future spend drags the forecast down whenever spend
//! drove history; that is a known accuracy limitation of the model.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{CleanedSeries, MIN_HISTORY_DAYS, ModelChoice, ModelParams, Regressors, day_features, horizon_dates};
use crate::error::PlanError;
use crate::math::{Standardizer, solve_ridge};
use crate::models::{Forecaster, ModelForecast, ensure_history, finalize, future_regressors};

const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_ORDER: usize = 3;
const YEARLY_ORDER: usize = 6;
const WEEKLY_MIN_SPAN: usize = 14;
const YEARLY_MIN_SPAN: usize = 365;
const SEASONALITY_PRIOR_SCALE: f64 = 10.0;
const TREND_SCALE_FACTOR: f64 = 20.0;
const REGRESSOR_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalRegressionModel;

/// Which column groups the design matrix contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DesignLayout {
    weekly: bool,
    yearly: bool,
    regressors: bool,
}

impl DesignLayout {
    fn for_history(span_days: usize, params: &ModelParams) -> Self {
        Self {
            weekly: span_days >= WEEKLY_MIN_SPAN,
            yearly: span_days >= YEARLY_MIN_SPAN,
            regressors: params.marketing_weight > 0.0,
        }
    }

    fn column_count(&self) -> usize {
        2 + if self.weekly { 2 * WEEKLY_ORDER } else { 0 }
            + if self.yearly { 2 * YEARLY_ORDER } else { 0 }
            + if self.regressors { REGRESSOR_COUNT } else { 0 }
    }

    fn penalties(&self, params: &ModelParams) -> Vec<f64> {
        let trend_scale = TREND_SCALE_FACTOR * params.trend_sensitivity;
        let mut out = vec![0.0, 1.0 / (trend_scale * trend_scale)];
        let seasonal = 1.0 / (SEASONALITY_PRIOR_SCALE * SEASONALITY_PRIOR_SCALE);
        if self.weekly {
            out.extend(std::iter::repeat_n(seasonal, 2 * WEEKLY_ORDER));
        }
        if self.yearly {
            out.extend(std::iter::repeat_n(seasonal, 2 * YEARLY_ORDER));
        }
        if self.regressors {
            let w = params.marketing_weight;
            out.extend(std::iter::repeat_n(1.0 / (w * w), REGRESSOR_COUNT));
        }
        out
    }
}

/// Builds design rows for history and horizon days alike.
struct DesignBuilder {
    layout: DesignLayout,
    origin: NaiveDate,
    spend_scaler: Standardizer,
}

impl DesignBuilder {
    fn row(&self, date: NaiveDate, regressors: &Regressors) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.layout.column_count());
        row.push(1.0);
        row.push((date - self.origin).num_days() as f64 / YEARLY_PERIOD);

        let day = date.num_days_from_ce() as f64;
        if self.layout.weekly {
            fourier_terms(&mut row, day, WEEKLY_PERIOD, WEEKLY_ORDER);
        }
        if self.layout.yearly {
            fourier_terms(&mut row, day, YEARLY_PERIOD, YEARLY_ORDER);
        }
        if self.layout.regressors {
            let spend = self.spend_scaler.transform(&[regressors.marketing_spend]);
            row.push(spend[0]);
            row.push(regressors.festival_flag);
            row.push(regressors.event_flag);
            row.push(if day_features(date).is_weekend { 1.0 } else { 0.0 });
        }
        row
    }
}

fn fourier_terms(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

impl Forecaster for SeasonalRegressionModel {
    fn choice(&self) -> ModelChoice {
        ModelChoice::SeasonalRegression
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
        let origin = series.first_date().unwrap_or(last);

        let layout = DesignLayout::for_history(series.calendar_span_days(), params);
        let p = layout.column_count();
        let n = series.len();
        if n <= p {
            return Err(PlanError::InsufficientHistory {
                model: self.choice(),
                required: p + 1,
                available: n,
            });
        }

        let y_max = series.max_sales();
        if y_max <= 0.0 {
            return finalize(self.choice(), last, &vec![0.0; horizon_days], None);
        }

        let spend: Vec<Vec<f64>> = series
            .records
            .iter()
            .map(|r| vec![r.regressors.marketing_spend])
            .collect();
        let builder = DesignBuilder {
            layout,
            origin,
            spend_scaler: Standardizer::fit(&spend),
        };

        let mut x = DMatrix::<f64>::zeros(n, p);
        for (i, record) in series.records.iter().enumerate() {
            for (j, v) in builder.row(record.date, &record.regressors).into_iter().enumerate() {
                x[(i, j)] = v;
            }
        }
        let y = DVector::from_iterator(n, series.records.iter().map(|r| r.sales / y_max));

        let beta = solve_ridge(&x, &y, &layout.penalties(params)).ok_or_else(|| {
            PlanError::Numeric(format!(
                "seasonal regression for '{}' is numerically unsolvable",
                series.sku
            ))
        })?;
        debug!(sku = %series.sku, columns = p, ?layout, "seasonal regression fitted");

        let values: Vec<f64> = horizon_dates(last, horizon_days)?
            .into_iter()
            .map(|date| {
                let row = builder.row(date, &future_regressors(params, date));
                let scaled: f64 = row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum();
                scaled * y_max
            })
            .collect();

        finalize(self.choice(), last, &values, None)
    }
}
