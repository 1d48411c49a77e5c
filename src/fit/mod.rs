// src/fit/mod.rs
//! Trendline fitting: closed-form linear regression plus polynomial
//! regression over a normalized x-domain. Both return evaluable models;
//! degenerate inputs (fewer than two distinct x values) return None rather
//! than letting NaN leak into chart output.

pub mod solve;

use tracing::debug;

/// Fixed pass count for the gradient-descent strategy.
const GRADIENT_PASSES: usize = 1000;
/// Fixed learning rate for the gradient-descent strategy.
const LEARNING_RATE: f64 = 1e-4;

/// Ordinary least squares line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Polynomial fit over x normalized into [0, 1]. Coefficients are private:
/// they only mean anything relative to the normalization captured at fit
/// time, so the model is exposed as an evaluator.
#[derive(Debug, Clone)]
pub struct PolyModel {
    coeffs: Vec<f64>,
    x_min: f64,
    x_max: f64,
}

impl PolyModel {
    /// Evaluate at `x`, re-normalizing with the bounds captured at fit time.
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.x_min) / (self.x_max - self.x_min);
        self.coeffs
            .iter()
            .enumerate()
            .map(|(p, c)| c * t.powi(p as i32))
            .sum()
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }
}

/// A fitted trendline, linear or polynomial, evaluable at any x.
#[derive(Debug, Clone)]
pub enum TrendModel {
    Linear(LinearModel),
    Poly(PolyModel),
}

impl TrendModel {
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            TrendModel::Linear(m) => m.eval(x),
            TrendModel::Poly(m) => m.eval(x),
        }
    }
}

/// How polynomial coefficients are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStrategy {
    /// Fixed-rate gradient descent, 1000 passes. No convergence check or
    /// adaptive rate; inputs are at most a few hundred points and the result
    /// only feeds a visual overlay.
    GradientDescent,
    /// Exact solve of the normal equations via Gaussian elimination.
    NormalEquations,
}

/// Closed-form OLS. None when fewer than two points or all x are identical
/// (zero denominator).
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearModel> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        debug!(n = points.len(), "linear fit degenerate: zero variance in x");
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    Some(LinearModel { slope, intercept })
}

/// Fit a polynomial of the given degree. None when the x-range collapses
/// (normalization would divide by zero) or, for the exact strategy, when the
/// normal equations are singular.
pub fn poly_fit(points: &[(f64, f64)], degree: usize, strategy: FitStrategy) -> Option<PolyModel> {
    if points.len() < 2 {
        return None;
    }
    let x_min = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let x_max = points
        .iter()
        .map(|(x, _)| *x)
        .fold(f64::NEG_INFINITY, f64::max);
    if x_max - x_min < 1e-12 {
        debug!(n = points.len(), "polynomial fit degenerate: single x value");
        return None;
    }

    // Normalize x into [0, 1] so higher powers stay tame.
    let normalized: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, y)| ((x - x_min) / (x_max - x_min), y))
        .collect();

    let coeffs = match strategy {
        FitStrategy::GradientDescent => fit_gradient(&normalized, degree),
        FitStrategy::NormalEquations => fit_normal(&normalized, degree)?,
    };

    Some(PolyModel {
        coeffs,
        x_min,
        x_max,
    })
}

/// Per-point incremental squared-error descent over a fixed pass count.
fn fit_gradient(points: &[(f64, f64)], degree: usize) -> Vec<f64> {
    let mut coeffs = vec![0.0; degree + 1];
    for _ in 0..GRADIENT_PASSES {
        for &(t, y) in points {
            let predicted: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(p, c)| c * t.powi(p as i32))
                .sum();
            let err = y - predicted;
            for (p, c) in coeffs.iter_mut().enumerate() {
                *c += LEARNING_RATE * err * t.powi(p as i32);
            }
        }
    }
    coeffs
}

/// Exact least squares via the normal equations (X^T X) c = X^T y.
fn fit_normal(points: &[(f64, f64)], degree: usize) -> Option<Vec<f64>> {
    let n = degree + 1;
    let mut a = vec![vec![0.0; n]; n];
    let mut b = vec![0.0; n];
    for &(t, y) in points {
        for row in 0..n {
            b[row] += y * t.powi(row as i32);
            for col in 0..n {
                a[row][col] += t.powi((row + col) as i32);
            }
        }
    }
    solve::solve(&a, &b)
}

/// Evaluate a model at each x, yielding the overlay vector a chart draws on
/// top of the raw series.
pub fn overlay(model: &TrendModel, xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| model.eval(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fit_recovers_exact_line() {
        let model = linear_fit(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]).unwrap();
        assert!((model.slope - 2.0).abs() < 1e-9);
        assert!(model.intercept.abs() < 1e-9);
        assert!((model.eval(10.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn linear_fit_with_intercept() {
        let model = linear_fit(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((model.slope - 2.0).abs() < 1e-9);
        assert!((model.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn linear_fit_identical_x_fails_explicitly() {
        assert!(linear_fit(&[(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)]).is_none());
        assert!(linear_fit(&[(1.0, 1.0)]).is_none());
    }

    #[test]
    fn normal_equations_fit_parabola_exactly() {
        // y = t^2 on the normalized domain: points (0,0), (5,?), (10,?)
        let points: Vec<(f64, f64)> = (0..=10)
            .map(|i| {
                let x = i as f64;
                let t = x / 10.0;
                (x, 3.0 * t * t - 2.0 * t + 1.0)
            })
            .collect();
        let model = poly_fit(&points, 2, FitStrategy::NormalEquations).unwrap();
        for &(x, y) in &points {
            assert!((model.eval(x) - y).abs() < 1e-6, "x={x}");
        }
    }

    #[test]
    fn normal_equations_interpolates_between_points() {
        let points = [(0.0, 1.0), (5.0, 2.0), (10.0, 5.0)];
        let model = poly_fit(&points, 2, FitStrategy::NormalEquations).unwrap();
        // degree 2 through 3 points is exact at the points
        for &(x, y) in &points {
            assert!((model.eval(x) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn gradient_descent_produces_finite_model() {
        let points: Vec<(f64, f64)> = (0..100).map(|i| (i as f64, 5.0)).collect();
        let model = poly_fit(&points, 2, FitStrategy::GradientDescent).unwrap();
        let y = model.eval(50.0);
        assert!(y.is_finite());
        // fixed-rate descent moves toward the flat target from zero
        assert!(y > 0.0 && y < 6.0);
    }

    #[test]
    fn poly_fit_single_x_fails_explicitly() {
        let points = [(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)];
        assert!(poly_fit(&points, 2, FitStrategy::GradientDescent).is_none());
        assert!(poly_fit(&points, 2, FitStrategy::NormalEquations).is_none());
    }

    #[test]
    fn model_renormalizes_new_x_with_fit_bounds() {
        let points = [(2000.0, 1.0), (2010.0, 2.0), (2020.0, 3.0)];
        let model = poly_fit(&points, 1, FitStrategy::NormalEquations).unwrap();
        assert!((model.eval(2015.0) - 2.5).abs() < 1e-6);
        assert_eq!(model.degree(), 1);
    }

    #[test]
    fn overlay_evaluates_every_x() {
        let model = TrendModel::Linear(LinearModel {
            slope: 2.0,
            intercept: 0.0,
        });
        assert_eq!(overlay(&model, &[1.0, 2.0, 3.0]), vec![2.0, 4.0, 6.0]);
    }
}
