//! Small descriptive statistics and smoothing helpers.
//!
//! The EWMA uses the "adjusted" form (weights `(1-α)^i` normalised over the
//! observations seen so far), so a constant series smooths to exactly that
//! constant from the first value on.

/// Smoothing factor for a span: `α = 2 / (span + 1)`.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span.max(1) as f64 + 1.0)
}

/// Adjusted exponentially weighted moving average at every position.
pub fn ewma_series(values: &[f64], span: usize) -> Vec<f64> {
    let decay = 1.0 - span_alpha(span);
    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|&x| {
            num = x + decay * num;
            den = 1.0 + decay * den;
            num / den
        })
        .collect()
}

/// Last value of `ewma_series`, or `None` for an empty input.
pub fn ewma_last(values: &[f64], span: usize) -> Option<f64> {
    ewma_series(values, span).last().copied()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Weighted mean; `None` when the total weight is not positive.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let mut sw = 0.0;
    let mut swx = 0.0;
    for (&x, &w) in values.iter().zip(weights.iter()) {
        sw += w;
        swx += w * x;
    }
    if sw > 0.0 { Some(swx / sw) } else { None }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    median_mut(&mut sorted)
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Linear recency weights from 1.0 (oldest) to `max_weight` (newest).
pub fn recency_weights(n: usize, max_weight: f64) -> Vec<f64> {
    if n <= 1 {
        return vec![max_weight.max(1.0); n];
    }
    (0..n)
        .map(|i| 1.0 + (max_weight - 1.0) * i as f64 / (n as f64 - 1.0))
        .collect()
}

/// Z-score scaling fitted on training columns.
#[derive(Debug, Clone)]
pub struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    /// Fit on row-major feature vectors. Constant columns get scale 1.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map(Vec::len).unwrap_or(0);
        let mut means = Vec::with_capacity(dims);
        let mut scales = Vec::with_capacity(dims);
        for j in 0..dims {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let m = mean(&column).unwrap_or(0.0);
            let s = std_dev(&column).unwrap_or(0.0);
            means.push(m);
            scales.push(if s > 1e-12 { s } else { 1.0 });
        }
        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect()
    }
}
