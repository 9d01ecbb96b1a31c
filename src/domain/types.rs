//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::fmt;

use clap::ValueEnum;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which cost the minimizer works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// Least squares, error only in the observed signal.
    #[value(name = "lsq")]
    LeastSquares,
    /// Orthogonal distance regression, error in both axes.
    #[value(name = "odr")]
    OrthogonalDistance,
}

impl FitStrategy {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LeastSquares => "least squares",
            Self::OrthogonalDistance => "orthogonal distance",
        }
    }
}

/// Float width used for model sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

/// Immutable chemistry parameters: `Kd`, cooperativity `alpha` and total protein.
///
/// `new` rejects non-physical values. The free functions in
/// `models::equilibrium` take raw values instead, so trial points proposed by
/// the minimizer still evaluate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemistrySystem<T = f64> {
    kd: T,
    alpha: T,
    p_total: T,
}

impl<T: Float + fmt::Display> ChemistrySystem<T> {
    pub fn new(kd: T, alpha: T, p_total: T) -> Result<Self, AppError> {
        for (name, value) in [("Kd", kd), ("alpha", alpha), ("P_total", p_total)] {
            if !(value.is_finite() && value > T::zero()) {
                return Err(AppError::config(format!(
                    "{name} must be finite and > 0 (got {value})."
                )));
            }
        }
        Ok(Self { kd, alpha, p_total })
    }
}

impl<T: Float> ChemistrySystem<T> {
    pub fn kd(&self) -> T {
        self.kd
    }

    pub fn alpha(&self) -> T {
        self.alpha
    }

    pub fn p_total(&self) -> T {
        self.p_total
    }
}

/// Titration data: one entry per total-ligand condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSeries {
    pub l_total: Vec<f64>,
    pub y_obs: Vec<f64>,
    pub y_err: Vec<f64>,
    pub weight: Vec<f64>,
}

impl ConditionSeries {
    pub fn new(l_total: Vec<f64>, y_obs: Vec<f64>, y_err: Vec<f64>, weight: Vec<f64>) -> Self {
        Self {
            l_total,
            y_obs,
            y_err,
            weight,
        }
    }

    /// Append one `(L_total, Y_obs, Y_err, weight)` row.
    pub fn push(&mut self, l_total: f64, y_obs: f64, y_err: f64, weight: f64) {
        self.l_total.push(l_total);
        self.y_obs.push(y_obs);
        self.y_err.push(y_err);
        self.weight.push(weight);
    }

    pub fn len(&self) -> usize {
        self.l_total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_total.is_empty()
    }

    /// Check shape and value ranges.
    ///
    /// `min_len` is the number of free parameters of the fit that will consume
    /// the series.
    pub fn validate(&self, min_len: usize) -> Result<(), AppError> {
        let n = self.l_total.len();
        if self.y_obs.len() != n || self.y_err.len() != n || self.weight.len() != n {
            return Err(AppError::config(format!(
                "Series columns have mismatched lengths: L_total={n}, Y_obs={}, Y_err={}, weight={}.",
                self.y_obs.len(),
                self.y_err.len(),
                self.weight.len()
            )));
        }
        if n < min_len {
            return Err(AppError::config(format!(
                "Series has {n} samples; at least {min_len} are needed for the free parameters."
            )));
        }
        for i in 0..n {
            let l = self.l_total[i];
            if !(l.is_finite() && l >= 0.0) {
                return Err(AppError::config(format!(
                    "L_total[{i}] must be finite and >= 0 (got {l})."
                )));
            }
            if !self.y_obs[i].is_finite() {
                return Err(AppError::config(format!("Y_obs[{i}] is not finite.")));
            }
            let e = self.y_err[i];
            if !(e.is_finite() && e >= 0.0) {
                return Err(AppError::config(format!(
                    "Y_err[{i}] must be finite and >= 0 (got {e})."
                )));
            }
            let w = self.weight[i];
            if !(w.is_finite() && (0.0..=1.0).contains(&w)) {
                return Err(AppError::config(format!(
                    "weight[{i}] must lie in [0, 1] (got {w})."
                )));
            }
        }
        if self.weight.iter().all(|&w| w == 0.0) {
            return Err(AppError::config("All sample weights are zero."));
        }
        Ok(())
    }
}

/// Model parameters: an initial guess, a fitted value or a standard error.
///
/// `scaling` maps `[PLP]` onto the (normalized) observed signal. `None` means
/// the fit compared `[PLP]` with the raw signal directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub kd: f64,
    pub alpha: f64,
    pub scaling: Option<f64>,
}

impl FitParams {
    pub fn new(kd: f64, alpha: f64, scaling: Option<f64>) -> Self {
        Self { kd, alpha, scaling }
    }
}

impl fmt::Display for FitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kd={:.6e}, alpha={:.6e}", self.kd, self.alpha)?;
        if let Some(s) = self.scaling {
            write!(f, ", scaling={s:.6e}")?;
        }
        Ok(())
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    /// Weighted objective at the solution (sum of squared residuals).
    pub sse: f64,
    pub rmse: f64,
    pub bic: f64,
    /// Coefficient of determination on the normalized signal.
    pub r_squared: f64,
    pub n: usize,
    pub dof: usize,
}

/// Outcome of a single `fit` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub params: FitParams,
    pub std_errors: Option<FitParams>,
    /// Row-major covariance in parameter order `kd, alpha[, scaling]`.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub quality: FitQuality,
    pub strategy: FitStrategy,
    pub evaluations: usize,
    pub termination: String,
    /// Divisor applied to `y_obs` before fitting (1 when scaling is not fitted).
    pub y_scale: f64,
}

/// Explicit fit configuration, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub strategy: FitStrategy,
    /// Fit a linear factor between `[PLP]` and the normalized signal.
    pub fit_scaling: bool,
    /// Use `Y_err` as per-sample sigma where it is positive.
    pub use_errors: bool,
    /// Independent-variable uncertainty for ODR, in log10 decades of `L_total`.
    pub x_sigma_decades: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Start-grid steps per axis (0 disables multi-start seeding).
    pub grid_steps: usize,
    /// Half-width of the start grid around the initial guess, in decades.
    pub grid_span_decades: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            strategy: FitStrategy::LeastSquares,
            fit_scaling: true,
            use_errors: false,
            x_sigma_decades: 0.1,
            max_iterations: 500,
            tolerance: 1e-12,
            grid_steps: 0,
            grid_span_decades: 1.0,
        }
    }
}

impl FitConfig {
    /// Number of free model parameters (excluding ODR shifts).
    pub fn param_count(&self) -> usize {
        if self.fit_scaling { 3 } else { 2 }
    }
}

/// Per-sample fitted value and residual on the normalized signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResidual {
    pub l_total: f64,
    pub y_obs: f64,
    pub y_norm: f64,
    pub y_fit: f64,
    pub residual: f64,
    pub weight: f64,
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: String,
    pub input: String,
    pub p_total: f64,
    pub result: FitResult,
    pub data: FitData,
    pub grid: FitGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitData {
    pub l_total: Vec<f64>,
    pub y_norm: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitGrid {
    pub l_total: Vec<f64>,
    pub y_fit: Vec<f64>,
}
