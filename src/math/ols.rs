//! Linear least squares for damped Gauss-Newton steps.
//!
//! Each Levenberg-Marquardt iteration solves
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! which is the ordinary least squares problem of the stacked system
//! `[J; √λ D] δ = [-r; 0]`, solved with SVD without forming `JᵀJ`. Columns
//! can be close to collinear when observations cover a narrow elevation band.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser singular-value cutoffs.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the damped step `[J; √λ D] δ = [-r; 0]`.
///
/// `scale` holds the diagonal of `D`; it must have one entry per column of `J`.
pub fn damped_step(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    lambda: f64,
    scale: &DVector<f64>,
) -> Option<DVector<f64>> {
    let (m, n) = jacobian.shape();
    let sqrt_lambda = lambda.max(0.0).sqrt();

    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jacobian);
    for j in 0..n {
        a[(m + j, j)] = sqrt_lambda * scale[j];
    }

    let mut b = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        b[i] = -residuals[i];
    }

    solve_least_squares(&a, &b)
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
    fn undamped_step_is_gauss_newton() {
        // r(x) = J x - y at x = 0 gives r = -y; the undamped step solves J δ = y.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = DVector::from_row_slice(&[-2.0, -5.0, -8.0]);
        let scale = DVector::from_element(2, 1.0);

        let delta = damped_step(&j, &r, 0.0, &scale).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-10);
        assert!((delta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn heavy_damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let r = DVector::from_row_slice(&[-1.0, -1.0]);
        let scale = DVector::from_element(2, 1.0);

        let small = damped_step(&j, &r, 1e6, &scale).unwrap();
        assert!(small.norm() < 1e-5);
    }
}
