//! Fit `(Kd, alpha[, scaling])` to a titration series.
//!
//! Given:
//! - total-ligand concentrations `L_i`
//! - observed signal `y_i` with optional errors and weights `w_i`
//! - the total protein concentration
//! - an initial guess
//!
//! we:
//! - validate everything up front (no minimizer call on bad input)
//! - normalize the signal by `max |y|`
//! - optionally reseed from a parallel start grid
//! - minimize with Levenberg–Marquardt (`levenberg-marquardt` crate) on
//!   `[ln Kd, ln alpha, scaling?]`
//! - report standard errors from `s²·(JᵀJ)⁻¹`

use nalgebra::DVector;
use tracing::{info, instrument, warn};

use crate::domain::{
    ConditionSeries, FitConfig, FitGrid, FitParams, FitQuality, FitResult, FitStrategy, SampleResidual,
};
use crate::error::AppError;
use crate::fit::lm::{LmOptions, LmReport, minimize};
use crate::fit::problem::{LsqProblem, NormalizedSeries, OdrProblem, decode, encode};
use crate::fit::start_grid::{best_start, start_grid};
use crate::math::{inverse_gram, log_space};
use crate::models::fitted_plp;

/// Singular values below this fraction of the largest make the covariance unavailable.
const COVARIANCE_RCOND: f64 = 1e-12;

/// Run one fit.
#[instrument(skip_all, name = "fit", fields(strategy = ?config.strategy, n = series.len()))]
pub fn fit(
    series: &ConditionSeries,
    p_total: f64,
    initial: &FitParams,
    config: &FitConfig,
) -> Result<FitResult, AppError> {
    validate_inputs(series, p_total, initial, config)?;
    let data = NormalizedSeries::new(series, config)?;
    let (kd0, alpha0, seeded_scaling) = seed(&data, p_total, initial, config)?;
    let scaling0 = if config.fit_scaling {
        let s = initial.scaling.or(seeded_scaling).unwrap_or_else(|| {
            data.closed_form_scaling(&fitted_plp(&data.l_total, kd0, alpha0, p_total))
                .unwrap_or(1.0)
        });
        Some(s)
    } else {
        None
    };
    info!(
        kd = kd0,
        alpha = alpha0,
        scaling = ?scaling0,
        y_scale = data.y_scale,
        "starting fit"
    );

    let opts = LmOptions {
        max_iterations: config.max_iterations,
        ftol: config.tolerance,
        xtol: config.tolerance,
        ..LmOptions::default()
    };
    let x0 = encode(kd0, alpha0, scaling0);

    let report = match config.strategy {
        FitStrategy::LeastSquares => minimize(
            LsqProblem::new(&data, p_total, config.fit_scaling, DVector::from_vec(x0)),
            &opts,
        ),
        FitStrategy::OrthogonalDistance => minimize(
            OdrProblem::new(&data, p_total, config.fit_scaling, config.x_sigma_decades, &x0),
            &opts,
        ),
    };

    let d = decode(&report.params, config.fit_scaling);
    let params = FitParams::new(d.kd, d.alpha, config.fit_scaling.then_some(d.scaling));

    if !report.converged() {
        let reason = report.termination.describe();
        warn!(evaluations = report.evaluations, %reason, last = %params, "fit did not converge");
        return Err(AppError::FitFailed {
            reason,
            evaluations: report.evaluations,
            last: params,
        });
    }

    let k = config.param_count();
    let n = data.len();
    let dof = n.saturating_sub(k);
    let (covariance, std_errors) = match covariance(&report, k, dof, &params) {
        Some(cov) => {
            let se = FitParams::new(
                cov[0][0].sqrt(),
                cov[1][1].sqrt(),
                config.fit_scaling.then(|| cov[2][2].sqrt()),
            );
            (Some(cov), Some(se))
        }
        None => (None, None),
    };

    let model: Vec<f64> = fitted_plp(&data.l_total, d.kd, d.alpha, p_total)
        .iter()
        .map(|f| d.scaling * f)
        .collect();
    let quality = quality(&data, &model, report.cost, k, dof);

    info!(
        %params,
        sse = quality.sse,
        r_squared = quality.r_squared,
        evaluations = report.evaluations,
        termination = %report.termination.describe(),
        "fit converged"
    );

    Ok(FitResult {
        params,
        std_errors,
        covariance,
        quality,
        strategy: config.strategy,
        evaluations: report.evaluations,
        termination: report.termination.describe(),
        y_scale: data.y_scale,
    })
}

fn validate_inputs(
    series: &ConditionSeries,
    p_total: f64,
    initial: &FitParams,
    config: &FitConfig,
) -> Result<(), AppError> {
    if !(p_total.is_finite() && p_total > 0.0) {
        return Err(AppError::config(format!(
            "P_total must be finite and > 0 (got {p_total})."
        )));
    }
    series.validate(config.param_count())?;
    for (name, value) in [("Kd", initial.kd), ("alpha", initial.alpha)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(AppError::config(format!(
                "Initial {name} must be finite and > 0 (got {value})."
            )));
        }
    }
    if let Some(s) = initial.scaling {
        if !s.is_finite() {
            return Err(AppError::config(format!("Initial scaling is not finite (got {s}).")));
        }
    }
    if config.strategy == FitStrategy::OrthogonalDistance
        && !(config.x_sigma_decades.is_finite() && config.x_sigma_decades > 0.0)
    {
        return Err(AppError::config(format!(
            "ODR x-sigma must be finite and > 0 decades (got {}).",
            config.x_sigma_decades
        )));
    }
    if config.max_iterations == 0 {
        return Err(AppError::config("Iteration limit must be >= 1."));
    }
    if !(config.tolerance.is_finite() && config.tolerance >= 0.0) {
        return Err(AppError::config(format!(
            "Tolerance must be finite and >= 0 (got {}).",
            config.tolerance
        )));
    }
    Ok(())
}

/// Starting `(Kd, alpha, scaling?)`, from the start grid when enabled.
fn seed(
    data: &NormalizedSeries,
    p_total: f64,
    initial: &FitParams,
    config: &FitConfig,
) -> Result<(f64, f64, Option<f64>), AppError> {
    if config.grid_steps == 0 {
        return Ok((initial.kd, initial.alpha, None));
    }
    let grid = start_grid(initial.kd, initial.alpha, config.grid_span_decades, config.grid_steps)?;
    match best_start(data, p_total, config.fit_scaling, &grid) {
        Some(best) => {
            info!(
                kd = best.kd,
                alpha = best.alpha,
                sse = best.sse,
                candidates = grid.len(),
                "start grid selected seed"
            );
            Ok((best.kd, best.alpha, Some(best.scaling)))
        }
        None => {
            warn!("start grid produced no finite candidate; using the initial guess");
            Ok((initial.kd, initial.alpha, None))
        }
    }
}

/// Parameter covariance in natural units, parameter order `kd, alpha[, scaling]`.
fn covariance(report: &LmReport, k: usize, dof: usize, params: &FitParams) -> Option<Vec<Vec<f64>>> {
    if dof == 0 {
        return None;
    }
    let inv = inverse_gram(&report.jacobian, COVARIANCE_RCOND)?;
    let s2 = report.cost / dof as f64;
    // d(x)/d(ln x) = x for the log-space parameters.
    let gain = [params.kd, params.alpha, 1.0];
    let mut cov = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in 0..k {
            cov[i][j] = s2 * inv[(i, j)] * gain[i] * gain[j];
        }
    }
    let finite = cov.iter().flatten().all(|v| v.is_finite()) && (0..k).all(|i| cov[i][i] >= 0.0);
    finite.then_some(cov)
}

fn quality(data: &NormalizedSeries, model: &[f64], sse: f64, k: usize, dof: usize) -> FitQuality {
    let n = data.len();
    let nf = n as f64;

    let w_sum: f64 = data.weight.iter().sum();
    let y_mean = data.y.iter().zip(&data.weight).map(|(y, w)| w * y).sum::<f64>() / w_sum;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..n {
        let w = data.weight[i];
        ss_res += w * (data.y[i] - model[i]).powi(2);
        ss_tot += w * (data.y[i] - y_mean).powi(2);
    }
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    let bic = nf * (sse / nf).max(f64::MIN_POSITIVE).ln() + k as f64 * nf.ln();

    FitQuality {
        sse,
        rmse: (sse / nf).sqrt(),
        bic,
        r_squared,
        n,
        dof,
    }
}

/// `scaling · [PLP]` at `l_total` for fitted parameters.
pub fn fitted_signal(result: &FitResult, p_total: f64, l_total: &[f64]) -> Vec<f64> {
    let s = result.params.scaling.unwrap_or(1.0);
    fitted_plp(l_total, result.params.kd, result.params.alpha, p_total)
        .into_iter()
        .map(|f| s * f)
        .collect()
}

/// Per-sample fitted values and residuals on the normalized signal.
pub fn compute_residuals(series: &ConditionSeries, p_total: f64, result: &FitResult) -> Vec<SampleResidual> {
    let y_fit = fitted_signal(result, p_total, &series.l_total);
    (0..series.len())
        .map(|i| {
            let y_norm = series.y_obs[i] / result.y_scale;
            SampleResidual {
                l_total: series.l_total[i],
                y_obs: series.y_obs[i],
                y_norm,
                y_fit: y_fit[i],
                residual: y_norm - y_fit[i],
                weight: series.weight[i],
            }
        })
        .collect()
}

/// Ligand grid for drawing a fitted curve over the data range.
///
/// Log-spaced over the positive `L_total` values; falls back to the sorted
/// data points when the positive range is empty or a single value.
pub fn curve_grid(l_total: &[f64], steps: usize) -> Vec<f64> {
    let positive = l_total.iter().copied().filter(|&l| l > 0.0 && l.is_finite());
    let (min, max) = positive.fold((f64::INFINITY, 0.0_f64), |(lo, hi), l| (lo.min(l), hi.max(l)));
    if let Ok(grid) = log_space(min, max, steps) {
        return grid;
    }
    let mut sorted = l_total.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Fitted curve sampled on `curve_grid`.
pub fn fit_grid(series: &ConditionSeries, p_total: f64, result: &FitResult, steps: usize) -> FitGrid {
    let l_total = curve_grid(&series.l_total, steps);
    let y_fit = fitted_signal(result, p_total, &l_total);
    FitGrid { l_total, y_fit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::lm::Termination;

    const KD: f64 = 2.5;
    const ALPHA: f64 = 1000.0;
    const P_TOTAL: f64 = 0.1;

    fn synthetic(n: usize) -> ConditionSeries {
        let l = log_space(1e-3, 1e3, n).unwrap();
        let y = fitted_plp(&l, KD, ALPHA, P_TOTAL).iter().map(|v| 20.0 * v).collect();
        ConditionSeries::new(l, y, vec![0.0; n], vec![1.0; n])
    }

    fn guess() -> FitParams {
        FitParams::new(2.0, 700.0, None)
    }

    fn assert_recovered(result: &FitResult) {
        assert!((result.params.kd / KD - 1.0).abs() < 0.01, "Kd={}", result.params.kd);
        assert!((result.params.alpha / ALPHA - 1.0).abs() < 0.01, "alpha={}", result.params.alpha);
        let scale = result.params.scaling.unwrap() * result.y_scale;
        assert!((scale / 20.0 - 1.0).abs() < 0.01, "scale={scale}");
    }

    #[test]
    fn least_squares_recovers_generating_parameters() {
        let series = synthetic(37);
        let result = fit(&series, P_TOTAL, &guess(), &FitConfig::default()).unwrap();
        assert_recovered(&result);
        assert_eq!(result.strategy, FitStrategy::LeastSquares);
        assert_eq!(result.quality.n, 37);
        assert_eq!(result.quality.dof, 34);
        assert!(result.quality.sse < 1e-20);
        assert!(result.quality.r_squared > 0.999_999);
    }

    #[test]
    fn orthogonal_distance_recovers_generating_parameters() {
        let series = synthetic(37);
        let config = FitConfig {
            strategy: FitStrategy::OrthogonalDistance,
            ..FitConfig::default()
        };
        let result = fit(&series, P_TOTAL, &guess(), &config).unwrap();
        assert_recovered(&result);
        assert_eq!(result.strategy, FitStrategy::OrthogonalDistance);
    }

    #[test]
    fn start_grid_seeding_still_converges() {
        let series = synthetic(25);
        let config = FitConfig {
            grid_steps: 5,
            grid_span_decades: 1.0,
            ..FitConfig::default()
        };
        let result = fit(&series, P_TOTAL, &FitParams::new(0.5, 50.0, None), &config).unwrap();
        assert_recovered(&result);
    }

    #[test]
    fn noisy_data_yields_finite_standard_errors() {
        let mut series = synthetic(37);
        for (i, y) in series.y_obs.iter_mut().enumerate() {
            *y *= if i % 2 == 0 { 1.01 } else { 0.99 };
        }
        let result = fit(&series, P_TOTAL, &guess(), &FitConfig::default()).unwrap();
        let se = result.std_errors.unwrap();
        assert!(se.kd.is_finite() && se.kd > 0.0);
        assert!(se.alpha.is_finite() && se.alpha > 0.0);
        assert!(se.scaling.unwrap().is_finite());
        let cov = result.covariance.unwrap();
        assert_eq!(cov.len(), 3);
        assert!((cov[0][1] - cov[1][0]).abs() <= 1e-9 * (cov[0][0] * cov[1][1]).sqrt());
        assert!((result.params.kd / KD - 1.0).abs() < 0.1);
    }

    #[test]
    fn fixed_scale_compares_raw_signal() {
        let l = log_space(1e-3, 1e3, 30).unwrap();
        let y = fitted_plp(&l, KD, ALPHA, P_TOTAL);
        let series = ConditionSeries::new(l, y, vec![0.0; 30], vec![1.0; 30]);
        let config = FitConfig {
            fit_scaling: false,
            ..FitConfig::default()
        };
        let result = fit(&series, P_TOTAL, &guess(), &config).unwrap();
        assert_eq!(result.y_scale, 1.0);
        assert!(result.params.scaling.is_none());
        assert!((result.params.kd / KD - 1.0).abs() < 0.01);
        assert!((result.params.alpha / ALPHA - 1.0).abs() < 0.01);
    }

    #[test]
    fn configuration_errors_are_raised_before_fitting() {
        let good = synthetic(10);
        let cfg = FitConfig::default();

        let mut s = good.clone();
        s.weight.pop();
        assert!(matches!(fit(&s, P_TOTAL, &guess(), &cfg), Err(AppError::Configuration(_))));

        let short = synthetic(2);
        assert!(matches!(fit(&short, P_TOTAL, &guess(), &cfg), Err(AppError::Configuration(_))));

        assert!(matches!(fit(&good, 0.0, &guess(), &cfg), Err(AppError::Configuration(_))));

        let mut s = good.clone();
        s.l_total[3] = f64::NAN;
        assert!(matches!(fit(&s, P_TOTAL, &guess(), &cfg), Err(AppError::Configuration(_))));

        let mut s = good.clone();
        s.y_err[0] = -1.0;
        assert!(matches!(fit(&s, P_TOTAL, &guess(), &cfg), Err(AppError::Configuration(_))));

        let bad_guess = FitParams::new(-1.0, 700.0, None);
        assert!(matches!(fit(&good, P_TOTAL, &bad_guess, &cfg), Err(AppError::Configuration(_))));

        let mut s = good.clone();
        s.y_obs = vec![0.0; 10];
        assert!(matches!(fit(&s, P_TOTAL, &guess(), &cfg), Err(AppError::Configuration(_))));
    }

    #[test]
    fn iteration_cap_reports_fit_failure_with_last_estimate() {
        let series = synthetic(37);
        let config = FitConfig {
            max_iterations: 1,
            ..FitConfig::default()
        };
        let far = FitParams::new(0.01, 2.0, None);
        let err = fit(&series, P_TOTAL, &far, &config).unwrap_err();
        match &err {
            AppError::FitFailed { evaluations, last, reason } => {
                assert!(*evaluations >= 1);
                assert!(last.kd.is_finite() && last.alpha.is_finite());
                assert_eq!(*reason, Termination::EvaluationLimit.describe());
            }
            other => panic!("expected FitFailed, got {other:?}"),
        }
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn residual_table_matches_fit() {
        let series = synthetic(12);
        let result = fit(&series, P_TOTAL, &guess(), &FitConfig::default()).unwrap();
        let rows = compute_residuals(&series, P_TOTAL, &result);
        assert_eq!(rows.len(), 12);
        for row in &rows {
            assert!(row.residual.abs() < 1e-8);
            assert!((row.y_norm * result.y_scale - row.y_obs).abs() < 1e-12);
        }
    }

    #[test]
    fn curve_grid_spans_positive_data_range() {
        let grid = curve_grid(&[0.0, 0.01, 5.0, 1.0], 50);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.01);
        assert_eq!(grid[49], 5.0);

        assert_eq!(curve_grid(&[0.0, 2.0, 0.0], 10), vec![0.0, 0.0, 2.0]);
    }
}
