//! Residual definitions for the two fit strategies.
//!
//! Both problems share the parameter layout `[ln Kd, ln alpha, scaling?]`.
//! ODR appends one shift per sample, in log10 decades of `L_total`.

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, storage::Owned};

use crate::domain::{ConditionSeries, FitConfig};
use crate::error::AppError;
use crate::fit::lm::{FitProblem, fd_step, finite_residuals, forward_difference_jacobian};
use crate::models::{fitted_plp, species_at};

/// Observed signal prepared for fitting: normalized, with per-sample weight
/// and inverse sigma.
#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    pub l_total: Vec<f64>,
    /// `y_obs / y_scale`.
    pub y: Vec<f64>,
    pub weight: Vec<f64>,
    pub inv_sigma: Vec<f64>,
    pub y_scale: f64,
}

impl NormalizedSeries {
    /// Normalize a validated series.
    pub fn new(series: &ConditionSeries, config: &FitConfig) -> Result<Self, AppError> {
        let max_abs = series.y_obs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if max_abs == 0.0 {
            return Err(AppError::config("Observed signal is identically zero."));
        }
        let y_scale = if config.fit_scaling { max_abs } else { 1.0 };

        let inv_sigma = series
            .y_err
            .iter()
            .map(|&e| {
                if config.use_errors && e > 0.0 {
                    y_scale / e
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self {
            l_total: series.l_total.clone(),
            y: series.y_obs.iter().map(|v| v / y_scale).collect(),
            weight: series.weight.clone(),
            inv_sigma,
            y_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.l_total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_total.is_empty()
    }

    /// Effective least-squares weight `w / σ²`.
    fn effective_weight(&self, i: usize) -> f64 {
        self.weight[i] * self.inv_sigma[i] * self.inv_sigma[i]
    }

    /// Weighted least-squares factor mapping `plp` onto `y`.
    pub fn closed_form_scaling(&self, plp: &[f64]) -> Option<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, &f) in plp.iter().enumerate() {
            let u = self.effective_weight(i);
            num += u * f * self.y[i];
            den += u * f * f;
        }
        let s = num / den;
        (s.is_finite() && s > 0.0).then_some(s)
    }

    /// `Σ w/σ² (s·f − y)²`.
    pub fn weighted_sse(&self, model: &[f64], scaling: f64) -> f64 {
        model
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let d = scaling * f - self.y[i];
                self.effective_weight(i) * d * d
            })
            .sum()
    }

    fn data_residual(&self, i: usize, model: f64) -> f64 {
        self.weight[i].sqrt() * (model - self.y[i]) * self.inv_sigma[i]
    }
}

/// Model parameters decoded from a minimizer vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub kd: f64,
    pub alpha: f64,
    pub scaling: f64,
}

pub fn encode(kd: f64, alpha: f64, scaling: Option<f64>) -> Vec<f64> {
    let mut x = vec![kd.ln(), alpha.ln()];
    if let Some(s) = scaling {
        x.push(s);
    }
    x
}

pub fn decode(x: &DVector<f64>, fit_scaling: bool) -> Decoded {
    Decoded {
        kd: x[0].exp(),
        alpha: x[1].exp(),
        scaling: if fit_scaling { x[2] } else { 1.0 },
    }
}

/// Least squares with error in the signal only.
pub struct LsqProblem<'a> {
    pub data: &'a NormalizedSeries,
    pub p_total: f64,
    pub fit_scaling: bool,
    params: DVector<f64>,
}

impl<'a> LsqProblem<'a> {
    pub fn new(data: &'a NormalizedSeries, p_total: f64, fit_scaling: bool, x0: DVector<f64>) -> Self {
        Self {
            data,
            p_total,
            fit_scaling,
            params: x0,
        }
    }
}

impl FitProblem for LsqProblem<'_> {
    fn residuals_at(&self, x: &DVector<f64>) -> DVector<f64> {
        let d = decode(x, self.fit_scaling);
        let plp = fitted_plp(&self.data.l_total, d.kd, d.alpha, self.p_total);
        DVector::from_iterator(
            plp.len(),
            plp.iter()
                .enumerate()
                .map(|(i, &f)| self.data.data_residual(i, d.scaling * f)),
        )
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for LsqProblem<'_> {
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

/// Orthogonal distance regression: each sample may shift along `log10 L`.
///
/// Residual layout is `n` data rows followed by `n` shift-penalty rows.
pub struct OdrProblem<'a> {
    pub data: &'a NormalizedSeries,
    pub p_total: f64,
    pub fit_scaling: bool,
    /// Uncertainty of `log10 L_total`.
    pub x_sigma_decades: f64,
    params: DVector<f64>,
}

impl<'a> OdrProblem<'a> {
    /// `head` is `[ln Kd, ln alpha, scaling?]`; all shifts start at zero.
    pub fn new(data: &'a NormalizedSeries, p_total: f64, fit_scaling: bool, x_sigma_decades: f64, head: &[f64]) -> Self {
        let mut x = head.to_vec();
        x.resize(head.len() + data.len(), 0.0);
        Self {
            data,
            p_total,
            fit_scaling,
            x_sigma_decades,
            params: DVector::from_vec(x),
        }
    }

    pub fn param_count(&self) -> usize {
        if self.fit_scaling { 3 } else { 2 }
    }

    fn shifted_l(&self, i: usize, delta: f64) -> f64 {
        self.data.l_total[i] * 10f64.powf(delta)
    }

    fn model_at(&self, d: Decoded, i: usize, delta: f64) -> f64 {
        d.scaling * species_at(d.kd, d.alpha, self.p_total, self.shifted_l(i, delta)).plp
    }

    /// Penalty weight; zero-weight samples keep a unit penalty so their shift
    /// stays pinned at zero.
    fn penalty_weight(&self, i: usize) -> f64 {
        let w = self.data.weight[i];
        if w > 0.0 { w.sqrt() } else { 1.0 }
    }

    /// Shifts in decades at the current parameters.
    pub fn shifts(&self) -> &[f64] {
        &self.params.as_slice()[self.param_count()..]
    }

    /// Data rows only (the shift penalty excluded).
    fn data_residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let d = decode(x, self.fit_scaling);
        let k = self.param_count();
        let n = self.data.len();
        DVector::from_iterator(
            n,
            (0..n).map(|i| self.data.data_residual(i, self.model_at(d, i, x[k + i]))),
        )
    }
}

impl FitProblem for OdrProblem<'_> {
    fn residuals_at(&self, x: &DVector<f64>) -> DVector<f64> {
        let k = self.param_count();
        let n = self.data.len();
        let data = self.data_residuals(x);
        let mut r = DVector::<f64>::zeros(2 * n);
        r.rows_mut(0, n).copy_from(&data);
        for i in 0..n {
            r[n + i] = self.penalty_weight(i) * x[k + i] / self.x_sigma_decades;
        }
        r
    }

    /// Model columns by forward difference; each shift only touches its own
    /// data and penalty row, so those columns are filled per sample.
    fn jacobian_at(&self, x: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64> {
        let k = self.param_count();
        let n = self.data.len();
        let mut jac = DMatrix::<f64>::zeros(2 * n, k + n);

        let head = x.rows(0, k).into_owned();
        let data_r0 = r.rows(0, n).into_owned();
        let head_jac = forward_difference_jacobian(
            |h| {
                let mut full = x.clone();
                full.rows_mut(0, k).copy_from(h);
                self.data_residuals(&full)
            },
            &head,
            &data_r0,
        );
        jac.view_mut((0, 0), (n, k)).copy_from(&head_jac);

        let d = decode(x, self.fit_scaling);
        for i in 0..n {
            let delta = x[k + i];
            let shifted = delta + fd_step(delta);
            let h = shifted - delta;
            let r1 = self.data.data_residual(i, self.model_at(d, i, shifted));
            jac[(i, k + i)] = (r1 - r[i]) / h;
            jac[(n + i, k + i)] = self.penalty_weight(i) / self.x_sigma_decades;
        }
        jac
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for OdrProblem<'_> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> ConditionSeries {
        let l = vec![0.0, 0.05, 0.5, 5.0, 50.0];
        let y = fitted_plp(&l, 2.5, 1000.0, 0.1).iter().map(|v| 20.0 * v).collect();
        ConditionSeries::new(l, y, vec![0.0, 0.1, 0.1, 0.1, 0.0], vec![1.0, 1.0, 0.5, 1.0, 0.0])
    }

    #[test]
    fn normalization_uses_max_abs_signal() {
        let s = series();
        let norm = NormalizedSeries::new(&s, &FitConfig::default()).unwrap();
        let max = norm.y.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!((max - 1.0).abs() < 1e-15);

        let raw = FitConfig {
            fit_scaling: false,
            ..FitConfig::default()
        };
        let norm = NormalizedSeries::new(&s, &raw).unwrap();
        assert_eq!(norm.y_scale, 1.0);
        assert_eq!(norm.y, s.y_obs);
    }

    #[test]
    fn zero_signal_is_a_configuration_error() {
        let mut s = series();
        s.y_obs = vec![0.0; 5];
        assert!(matches!(
            NormalizedSeries::new(&s, &FitConfig::default()),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn sigmas_only_apply_when_requested_and_positive() {
        let s = series();
        let cfg = FitConfig {
            use_errors: true,
            ..FitConfig::default()
        };
        let norm = NormalizedSeries::new(&s, &cfg).unwrap();
        assert_eq!(norm.inv_sigma[0], 1.0);
        assert!((norm.inv_sigma[1] - norm.y_scale / 0.1).abs() < 1e-12);
    }

    #[test]
    fn lsq_residuals_vanish_at_generating_parameters() {
        let s = series();
        let norm = NormalizedSeries::new(&s, &FitConfig::default()).unwrap();
        let x = DVector::from_vec(encode(2.5, 1000.0, Some(20.0 / norm.y_scale)));
        let problem = LsqProblem::new(&norm, 0.1, true, x);
        let r = problem.residuals().unwrap();
        assert!(r.amax() < 1e-12);
    }

    #[test]
    fn closed_form_scaling_recovers_signal_factor() {
        let s = series();
        let norm = NormalizedSeries::new(&s, &FitConfig::default()).unwrap();
        let plp = fitted_plp(&norm.l_total, 2.5, 1000.0, 0.1);
        let scale = norm.closed_form_scaling(&plp).unwrap();
        assert!((scale - 20.0 / norm.y_scale).abs() < 1e-10);
        assert!(norm.weighted_sse(&plp, scale) < 1e-20);
    }

    #[test]
    fn odr_jacobian_matches_full_forward_difference() {
        let s = series();
        let norm = NormalizedSeries::new(&s, &FitConfig::default()).unwrap();
        let mut problem = OdrProblem::new(&norm, 0.1, true, 0.1, &encode(2.0, 700.0, Some(1.1)));
        assert_eq!(problem.shifts(), &[0.0; 5]);
        let mut x = problem.params();
        x.rows_mut(3, 5).copy_from_slice(&[0.0, 0.01, -0.02, 0.03, 0.0]);
        problem.set_params(&x);
        let r = problem.residuals().unwrap();
        assert_eq!(r.len(), 10);

        let fast = problem.jacobian().unwrap();
        let full = forward_difference_jacobian(|v| problem.residuals_at(v), &x, &r);
        assert_eq!(fast.shape(), full.shape());
        for (a, b) in fast.iter().zip(full.iter()) {
            assert!((a - b).abs() < 1e-6 * (1.0 + b.abs()), "{a} vs {b}");
        }
    }
}
