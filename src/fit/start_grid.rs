//! Multi-start seeding for the minimizer.
//!
//! The cost surface in `(Kd, alpha)` can have long flat valleys, so a poor
//! initial guess may stall far from the optimum. With seeding enabled we:
//!
//! - lay a log-spaced grid of `(Kd, alpha)` pairs around the initial guess
//! - score every pair in parallel by weighted SSE, with the signal factor
//!   solved in closed form
//! - hand the best pair to Levenberg–Marquardt
//!
//! Scoring is deterministic: ties resolve to the lowest grid index.

use rayon::prelude::*;

use crate::error::AppError;
use crate::fit::problem::NormalizedSeries;
use crate::math::log_span_around;
use crate::models::fitted_plp;

/// One scored start point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartCandidate {
    pub kd: f64,
    pub alpha: f64,
    pub scaling: f64,
    pub sse: f64,
}

/// Cartesian `(Kd, alpha)` grid spanning `±span_decades` around the guess.
pub fn start_grid(kd: f64, alpha: f64, span_decades: f64, steps: usize) -> Result<Vec<(f64, f64)>, AppError> {
    let kds = log_span_around(kd, span_decades, steps)?;
    let alphas = log_span_around(alpha, span_decades, steps)?;
    let mut out = Vec::with_capacity(kds.len() * alphas.len());
    for &k in &kds {
        for &a in &alphas {
            out.push((k, a));
        }
    }
    Ok(out)
}

/// Best-scoring candidate, or `None` if none evaluates to a finite cost.
///
/// Without `fit_scaling` the factor is fixed at 1.
pub fn best_start(
    data: &NormalizedSeries,
    p_total: f64,
    fit_scaling: bool,
    grid: &[(f64, f64)],
) -> Option<StartCandidate> {
    let scored: Vec<(usize, StartCandidate)> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &(kd, alpha))| {
            let plp = fitted_plp(&data.l_total, kd, alpha, p_total);
            let scaling = if fit_scaling {
                data.closed_form_scaling(&plp).unwrap_or(1.0)
            } else {
                1.0
            };
            let sse = data.weighted_sse(&plp, scaling);
            sse.is_finite().then_some((
                idx,
                StartCandidate {
                    kd,
                    alpha,
                    scaling,
                    sse,
                },
            ))
        })
        .collect();

    scored
        .into_iter()
        .min_by(|a, b| a.1.sse.total_cmp(&b.1.sse).then(a.0.cmp(&b.0)))
        .map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConditionSeries, FitConfig};
    use crate::math::log_space;

    #[test]
    fn grid_is_cartesian_and_centered() {
        let grid = start_grid(1.0, 100.0, 1.0, 3).unwrap();
        assert_eq!(grid.len(), 9);
        let (kd, alpha) = grid[4];
        assert!((kd - 1.0).abs() < 1e-12);
        assert!((alpha - 100.0).abs() < 1e-9);
    }

    #[test]
    fn best_start_finds_generating_point() {
        let l = log_space(1e-3, 1e3, 25).unwrap();
        let y = fitted_plp(&l, 2.5, 1000.0, 0.1).iter().map(|v| 7.0 * v).collect();
        let series = ConditionSeries::new(l, y, vec![0.0; 25], vec![1.0; 25]);
        let data = NormalizedSeries::new(&series, &FitConfig::default()).unwrap();

        // 2.5 and 1000 both sit on this grid.
        let grid = start_grid(0.25, 100.0, 2.0, 5).unwrap();
        let best = best_start(&data, 0.1, true, &grid).unwrap();
        assert!((best.kd / 2.5 - 1.0).abs() < 1e-9);
        assert!((best.alpha / 1000.0 - 1.0).abs() < 1e-9);
        assert!(best.sse < 1e-20);
    }
}
