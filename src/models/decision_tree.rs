//! Regression tree (CART) on calendar and regressor features.
//!
//! Features per day: month, weekend flag, marketing spend, festival flag,
//! event flag. Splits minimise the summed squared error of the two children;
//! thresholds sit halfway between adjacent distinct values. Ties are broken by
//! feature order, then by the lower threshold, so fits are reproducible.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{CleanedSeries, MIN_HISTORY_DAYS, ModelChoice, ModelParams, Regressors, day_features, horizon_dates};
use crate::error::PlanError;
use crate::models::{Forecaster, ModelForecast, ensure_history, finalize, future_regressors};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTreeModel;

impl Forecaster for DecisionTreeModel {
    fn choice(&self) -> ModelChoice {
        ModelChoice::DecisionTree
    }

    fn min_history(&self, params: &ModelParams) -> usize {
        MIN_HISTORY_DAYS.max(2 * params.tree_min_samples_leaf)
    }

    fn forecast(
        &self,
        series: &CleanedSeries,
        horizon_days: usize,
        params: &ModelParams,
    ) -> Result<ModelForecast, PlanError> {
        let last = ensure_history(self.choice(), series, self.min_history(params))?;

        let rows: Vec<[f64; 5]> = series
            .records
            .iter()
            .map(|r| feature_row(r.date, &r.regressors))
            .collect();
        let targets = series.values();

        let tree = RegressionTree::fit(
            &rows,
            &targets,
            params.tree_max_depth,
            params.tree_min_samples_leaf.max(1),
        );
        debug!(sku = %series.sku, leaves = tree.leaf_count(), "decision tree fitted");

        let values: Vec<f64> = horizon_dates(last, horizon_days)?
            .into_iter()
            .map(|date| tree.predict(&feature_row(date, &future_regressors(params, date))))
            .collect();

        finalize(self.choice(), last, &values, None)
    }
}

fn feature_row(date: NaiveDate, regressors: &Regressors) -> [f64; 5] {
    let f = day_features(date);
    [
        f.month as f64,
        if f.is_weekend { 1.0 } else { 0.0 },
        regressors.marketing_spend,
        regressors.festival_flag,
        regressors.event_flag,
    ]
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct RegressionTree {
    root: Node,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    pub(crate) fn fit<const D: usize>(
        rows: &[[f64; D]],
        targets: &[f64],
        max_depth: usize,
        min_leaf: usize,
    ) -> Self {
        let indices: Vec<usize> = (0..rows.len()).collect();
        Self {
            root: grow(rows, targets, indices, 0, max_depth, min_leaf),
        }
    }

    pub(crate) fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub(crate) fn leaf_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Split { left, right, .. } => count(left) + count(right),
            }
        }
        count(&self.root)
    }
}

fn grow<const D: usize>(
    rows: &[[f64; D]],
    targets: &[f64],
    indices: Vec<usize>,
    depth: usize,
    max_depth: usize,
    min_leaf: usize,
) -> Node {
    let (mean, sse) = mean_sse(targets, &indices);
    if depth >= max_depth || indices.len() < 2 * min_leaf || sse <= MIN_GAIN {
        return Node::Leaf(mean);
    }

    let Some(best) = best_split(rows, targets, &indices, min_leaf) else {
        return Node::Leaf(mean);
    };
    if sse - best.sse <= MIN_GAIN {
        return Node::Leaf(mean);
    }

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| rows[i][best.feature] <= best.threshold);

    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow(rows, targets, left_idx, depth + 1, max_depth, min_leaf)),
        right: Box::new(grow(rows, targets, right_idx, depth + 1, max_depth, min_leaf)),
    }
}

fn mean_sse(targets: &[f64], indices: &[usize]) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n;
    let sse = indices
        .iter()
        .map(|&i| (targets[i] - mean) * (targets[i] - mean))
        .sum();
    (mean, sse)
}

fn best_split<const D: usize>(
    rows: &[[f64; D]],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
    let mut best: Option<BestSplit> = None;

    for feature in 0..D {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let y = targets[order[pos]];
            left_sum += y;
            left_sq += y * y;

            let here = rows[order[pos]][feature];
            let next = rows[order[pos + 1]][feature];
            if next <= here {
                continue;
            }
            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);

            let better = match &best {
                None => true,
                Some(b) => sse < b.sse - MIN_GAIN,
            };
            if better {
                best = Some(BestSplit {
                    feature,
                    threshold: 0.5 * (here + next),
                    sse,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{daily_series, start};

    #[test]
    fn tree_separates_two_groups() {
        let rows = vec![[0.0], [0.0], [0.0], [1.0], [1.0], [1.0]];
        let targets = vec![10.0, 12.0, 11.0, 50.0, 52.0, 51.0];
        let tree = RegressionTree::fit(&rows, &targets, 10, 2);
        assert!((tree.predict(&[0.0]) - 11.0).abs() < 1e-9);
        assert!((tree.predict(&[1.0]) - 51.0).abs() < 1e-9);
    }

    #[test]
    fn min_leaf_limits_splits() {
        let rows = vec![[0.0], [1.0], [2.0], [3.0]];
        let targets = vec![1.0, 2.0, 3.0, 4.0];
        let tree = RegressionTree::fit(&rows, &targets, 10, 2);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let rows = vec![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0]];
        let tree = RegressionTree::fit(&rows, &[7.0, 7.0, 7.0], 10, 1);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict(&[5.0, 5.0]), 7.0);
    }

    #[test]
    fn weekends_are_learned() {
        let values: Vec<f64> = (0..56)
            .map(|i| {
                let date = start() + chrono::Duration::days(i);
                if day_features(date).is_weekend { 300.0 } else { 100.0 }
            })
            .collect();
        let series = daily_series(start(), &values);
        let out = DecisionTreeModel
            .forecast(&series, 14, &ModelParams::default())
            .unwrap();
        for p in &out.points {
            let expected = if day_features(p.date).is_weekend { 300.0 } else { 100.0 };
            assert!((p.forecast - expected).abs() < 1e-9, "{}", p.date);
        }
    }
}
