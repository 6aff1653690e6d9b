//! Penalized least squares solver.
//!
//! The seasonal regression solves small problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2 + Σ_j λ_j β_j^2
//! ```
//!
//! Implementation choices:
//! - The ridge penalty is expressed as extra rows `sqrt(λ_j) e_j` with target 0,
//!   so one SVD least-squares solve handles both plain and penalized fits.
//! - SVD is used because the design matrix is tall (more rows than columns) and
//!   Fourier columns can be nearly collinear on short histories.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ridge-penalized least squares with one penalty per column.
///
/// A penalty of 0 leaves the column unpenalized (e.g. the intercept).
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if penalties.len() != p {
        return None;
    }

    let penalized: Vec<usize> = (0..p).filter(|&j| penalties[j] > 0.0).collect();
    let rows = n + penalized.len();

    let mut xa = DMatrix::<f64>::zeros(rows, p);
    let mut ya = DVector::<f64>::zeros(rows);
    xa.rows_mut(0, n).copy_from(x);
    ya.rows_mut(0, n).copy_from(y);

    for (k, &j) in penalized.iter().enumerate() {
        xa[(n + k, j)] = penalties[j].sqrt();
    }

    solve_least_squares(&xa, &ya)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_shrinks_only_penalized_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let free = solve_ridge(&x, &y, &[0.0, 0.0]).unwrap();
        assert!((free[1] - 3.0).abs() < 1e-10);

        let shrunk = solve_ridge(&x, &y, &[0.0, 100.0]).unwrap();
        assert!(shrunk[1].abs() < 3.0);
        assert!(shrunk[1] > 0.0);
    }

    #[test]
    fn ridge_rejects_penalty_length_mismatch() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_ridge(&x, &y, &[0.0]).is_none());
    }
}
