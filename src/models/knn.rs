//! K-nearest-neighbours on calendar features.
//!
//! Each historical day becomes a feature vector `(day of month, month, weekend)`,
//! z-scored on the history. A future day is predicted as the inverse-distance
//! weighted mean of its `k` nearest historical analogues; exact matches share
//! the prediction equally. Distance ties prefer more recent history.

use tracing::debug;

use crate::domain::{CleanedSeries, MIN_HISTORY_DAYS, ModelChoice, ModelParams, day_features, horizon_dates};
use crate::error::PlanError;
use crate::math::Standardizer;
use crate::models::{Forecaster, ModelForecast, ensure_history, finalize};

const EXACT_MATCH_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct KnnModel;

impl Forecaster for KnnModel {
    fn choice(&self) -> ModelChoice {
        ModelChoice::Knn
    }

    fn min_history(&self, params: &ModelParams) -> usize {
        MIN_HISTORY_DAYS.max(params.knn_k)
    }

    fn forecast(
        &self,
        series: &CleanedSeries,
        horizon_days: usize,
        params: &ModelParams,
    ) -> Result<ModelForecast, PlanError> {
        let last = ensure_history(self.choice(), series, self.min_history(params))?;

        let rows: Vec<Vec<f64>> = series.records.iter().map(|r| calendar_vector(r.date)).collect();
        let scaler = Standardizer::fit(&rows);
        let train: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();
        let targets = series.values();
        let k = params.knn_k.min(train.len());

        debug!(sku = %series.sku, k, n = train.len(), "knn training set");

        let values: Vec<f64> = horizon_dates(last, horizon_days)?
            .into_iter()
            .map(|date| {
                let query = scaler.transform(&calendar_vector(date));
                predict_one(&train, &targets, &query, k)
            })
            .collect();

        finalize(self.choice(), last, &values, None)
    }
}

fn calendar_vector(date: chrono::NaiveDate) -> Vec<f64> {
    let f = day_features(date);
    vec![
        f.day_of_month as f64,
        f.month as f64,
        if f.is_weekend { 1.0 } else { 0.0 },
    ]
}

fn predict_one(train: &[Vec<f64>], targets: &[f64], query: &[f64], k: usize) -> f64 {
    let mut dists: Vec<(f64, usize)> = train
        .iter()
        .enumerate()
        .map(|(i, row)| (euclidean(row, query), i))
        .collect();

    dists.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
    });
    let nearest = &dists[..k];

    let exact: Vec<f64> = nearest
        .iter()
        .filter(|(d, _)| *d < EXACT_MATCH_EPS)
        .map(|&(_, i)| targets[i])
        .collect();
    if !exact.is_empty() {
        return exact.iter().sum::<f64>() / exact.len() as f64;
    }

    let mut sw = 0.0;
    let mut swy = 0.0;
    for &(d, i) in nearest {
        let w = 1.0 / d;
        sw += w;
        swy += w * targets[i];
    }
    if sw > 0.0 { swy / sw } else { 0.0 }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
