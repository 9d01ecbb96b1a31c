//! Levenberg–Marquardt driver.
//!
//! Minimization is done by the `levenberg-marquardt` crate (a MINPACK port).
//! This module maps `FitConfig` settings onto it and its termination reason
//! onto the converged / failed split the fitter reports.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{DMatrix, DVector, Dyn, storage::Owned};
use tracing::debug;

/// A residual model over dynamically sized vectors.
///
/// `residuals_at`/`jacobian_at` evaluate at an arbitrary point; the
/// `LeastSquaresProblem` impl evaluates at the problem's current parameters.
pub trait FitProblem:
    LeastSquaresProblem<
        f64,
        Dyn,
        Dyn,
        ResidualStorage = Owned<f64, Dyn>,
        JacobianStorage = Owned<f64, Dyn, Dyn>,
        ParameterStorage = Owned<f64, Dyn>,
    >
{
    fn residuals_at(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian `∂r/∂x` at `x`; `r` is `r(x)`.
    fn jacobian_at(&self, x: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64> {
        forward_difference_jacobian(|v| self.residuals_at(v), x, r)
    }
}

/// Residuals handed to the minimizer; `None` stops it on non-finite values.
pub fn finite_residuals(r: DVector<f64>) -> Option<DVector<f64>> {
    r.iter().all(|v| v.is_finite()).then_some(r)
}

/// Forward-difference step for parameter value `x`.
pub fn fd_step(x: f64) -> f64 {
    f64::EPSILON.sqrt() * x.abs().max(1.0)
}

/// Forward-difference Jacobian, one column per parameter.
pub fn forward_difference_jacobian<F>(f: F, params: &DVector<f64>, r0: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let m = r0.len();
    let k = params.len();
    let mut jac = DMatrix::<f64>::zeros(m, k);
    let mut x = params.clone();
    for j in 0..k {
        x[j] = params[j] + fd_step(params[j]);
        let r1 = f(&x);
        // Actual step after rounding.
        let dh = x[j] - params[j];
        for i in 0..m {
            jac[(i, j)] = (r1[i] - r0[i]) / dh;
        }
        x[j] = params[j];
    }
    jac
}

#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Iteration budget; the minimizer allows `max_iterations · (k + 1)`
    /// residual evaluations.
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
        }
    }
}

/// Why the minimizer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Relative cost reduction or step size below tolerance.
    Converged,
    ResidualsZero,
    /// Residuals orthogonal to the Jacobian columns (gradient below `gtol`).
    Orthogonal,
    /// Tolerances are below machine precision at the current point.
    NoFurtherReduction,
    EvaluationLimit,
    Failed(String),
}

impl Termination {
    fn from_reason(reason: &TerminationReason) -> Self {
        match reason {
            TerminationReason::Converged { .. } => Self::Converged,
            TerminationReason::ResidualsZero => Self::ResidualsZero,
            TerminationReason::Orthogonal => Self::Orthogonal,
            TerminationReason::NoImprovementPossible(_) => Self::NoFurtherReduction,
            TerminationReason::LostPatience => Self::EvaluationLimit,
            other => Self::Failed(format!("{other:?}")),
        }
    }

    pub fn converged(&self) -> bool {
        !matches!(self, Self::EvaluationLimit | Self::Failed(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Converged => "relative reduction below tolerance".to_string(),
            Self::ResidualsZero => "residual vanished".to_string(),
            Self::Orthogonal => "gradient below tolerance".to_string(),
            Self::NoFurtherReduction => "no further reduction possible".to_string(),
            Self::EvaluationLimit => "iteration limit reached".to_string(),
            Self::Failed(reason) => format!("minimizer stopped: {reason}"),
        }
    }
}

/// State at the point the minimizer returned.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub evaluations: usize,
    pub termination: Termination,
}

impl LmReport {
    pub fn converged(&self) -> bool {
        self.termination.converged()
    }
}

/// Minimize `‖r(x)‖²` from the problem's current parameters.
pub fn minimize<P: FitProblem>(problem: P, opts: &LmOptions) -> LmReport {
    let solver = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iterations);
    let (problem, report) = solver.minimize(problem);

    let termination = Termination::from_reason(&report.termination);
    let params = problem.params();
    let residuals = problem.residuals_at(&params);
    let jacobian = problem.jacobian_at(&params, &residuals);
    let cost = residuals.norm_squared();
    debug!(
        evaluations = report.number_of_evaluations,
        cost,
        termination = ?report.termination,
        "minimizer finished"
    );

    LmReport {
        params,
        residuals,
        jacobian,
        cost,
        evaluations: report.number_of_evaluations,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = p0 · exp(p1 · t)
    struct Exponential {
        t: Vec<f64>,
        y: Vec<f64>,
        params: DVector<f64>,
    }

    impl FitProblem for Exponential {
        fn residuals_at(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t.iter().zip(&self.y).map(|(&t, &y)| p[0] * (p[1] * t).exp() - y),
            )
        }
    }

    impl LeastSquaresProblem<f64, Dyn, Dyn> for Exponential {
        type ResidualStorage = Owned<f64, Dyn>;
        type JacobianStorage = Owned<f64, Dyn, Dyn>;
        type ParameterStorage = Owned<f64, Dyn>;

        fn set_params(&mut self, x: &DVector<f64>) {
            self.params.copy_from(x);
        }

        fn params(&self) -> DVector<f64> {
            self.params.clone()
        }

        fn residuals(&self) -> Option<DVector<f64>> {
            finite_residuals(self.residuals_at(&self.params))
        }

        fn jacobian(&self) -> Option<DMatrix<f64>> {
            let r = self.residuals_at(&self.params);
            Some(self.jacobian_at(&self.params, &r))
        }
    }

    struct Rosenbrock {
        params: DVector<f64>,
    }

    impl FitProblem for Rosenbrock {
        fn residuals_at(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_row_slice(&[10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]])
        }

        fn jacobian_at(&self, p: &DVector<f64>, _r: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_row_slice(2, 2, &[-20.0 * p[0], 10.0, -1.0, 0.0])
        }
    }

    impl LeastSquaresProblem<f64, Dyn, Dyn> for Rosenbrock {
        type ResidualStorage = Owned<f64, Dyn>;
        type JacobianStorage = Owned<f64, Dyn, Dyn>;
        type ParameterStorage = Owned<f64, Dyn>;

        fn set_params(&mut self, x: &DVector<f64>) {
            self.params.copy_from(x);
        }

        fn params(&self) -> DVector<f64> {
            self.params.clone()
        }

        fn residuals(&self) -> Option<DVector<f64>> {
            finite_residuals(self.residuals_at(&self.params))
        }

        fn jacobian(&self) -> Option<DMatrix<f64>> {
            let r = self.residuals_at(&self.params);
            Some(self.jacobian_at(&self.params, &r))
        }
    }

    fn rosenbrock() -> Rosenbrock {
        Rosenbrock {
            params: DVector::from_row_slice(&[-1.2, 1.0]),
        }
    }

    #[test]
    fn recovers_exponential_parameters_from_exact_data() {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y = t.iter().map(|&t| 3.0 * (-0.7 * t).exp()).collect();
        let problem = Exponential {
            t,
            y,
            params: DVector::from_row_slice(&[1.0, -0.1]),
        };
        let report = minimize(problem, &LmOptions::default());
        assert!(report.converged(), "{:?}", report.termination);
        assert!((report.params[0] - 3.0).abs() < 1e-8);
        assert!((report.params[1] + 0.7).abs() < 1e-8);
        assert!(report.cost < 1e-20);
    }

    #[test]
    fn solves_rosenbrock_with_analytic_jacobian() {
        let report = minimize(rosenbrock(), &LmOptions::default());
        assert!(report.converged(), "{:?}", report.termination);
        assert!((report.params[0] - 1.0).abs() < 1e-8);
        assert!((report.params[1] - 1.0).abs() < 1e-8);
        assert_eq!(report.jacobian.shape(), (2, 2));
    }

    #[test]
    fn evaluation_limit_is_not_convergence() {
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let report = minimize(rosenbrock(), &opts);
        assert_eq!(report.termination, Termination::EvaluationLimit);
        assert!(!report.converged());
        assert!(report.evaluations >= 1);
    }

    #[test]
    fn non_finite_residuals_stop_the_minimizer() {
        let problem = Exponential {
            t: vec![0.0, 1.0, 2.0],
            y: vec![1.0, f64::NAN, 0.5],
            params: DVector::from_row_slice(&[1.0, -0.1]),
        };
        let report = minimize(problem, &LmOptions::default());
        assert!(matches!(report.termination, Termination::Failed(_)));
        assert!(!report.converged());
    }

    #[test]
    fn forward_difference_matches_analytic_jacobian() {
        let problem = rosenbrock();
        let p = DVector::from_row_slice(&[0.5, 2.0]);
        let r = problem.residuals_at(&p);
        let fd = forward_difference_jacobian(|x| problem.residuals_at(x), &p, &r);
        let exact = problem.jacobian_at(&p, &r);
        for (a, b) in fd.iter().zip(exact.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
