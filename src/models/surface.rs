//! Solution-space sweeps.
//!
//! - `species_sweep`: all three species along a ligand grid, at any float width
//! - `solution_surface`: `[PLP]` over a (cooperativity × ligand) grid at fixed
//!   `Kd` and `P_total`, used to chart how cooperativity shapes the dimer
//!   response
//!
//! Rows of the surface are independent, so they are evaluated in parallel. Each
//! row is exactly `fitted_plp` at that alpha, so the result does not depend on
//! scheduling.

use num_traits::Float;
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::ChemistrySystem;
use crate::models::equilibrium::fitted_plp;

/// One row of a species sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepRow<T> {
    pub l_total: T,
    pub p: T,
    pub pl: T,
    pub plp: T,
    pub p_frac: T,
    pub pl_frac: T,
    pub plp_frac: T,
}

/// Species along `l_grid`, with fractions of `P_total`.
pub fn species_sweep<T: Float>(system: &ChemistrySystem<T>, l_grid: &[T]) -> Vec<SweepRow<T>> {
    let profile = system.species(l_grid);
    let p_total = system.p_total();
    l_grid
        .iter()
        .enumerate()
        .map(|(i, &l)| SweepRow {
            l_total: l,
            p: profile.p[i],
            pl: profile.pl[i],
            plp: profile.plp[i],
            p_frac: profile.p[i] / p_total,
            pl_frac: profile.pl[i] / p_total,
            plp_frac: profile.plp[i] / p_total,
        })
        .collect()
}

/// `[PLP]` over an alpha × ligand grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionSurface {
    pub kd: f64,
    pub p_total: f64,
    pub l_total: Vec<f64>,
    pub alpha: Vec<f64>,
    /// `plp[i][j]` is at `alpha[i]`, `l_total[j]`.
    pub plp: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfacePoint {
    pub log10_l_total: f64,
    pub log10_alpha: f64,
    pub plp: f64,
}

impl SolutionSurface {
    /// Flatten to long format (one record per grid node, alpha-major).
    pub fn points(&self) -> Vec<SurfacePoint> {
        let mut out = Vec::with_capacity(self.alpha.len() * self.l_total.len());
        for (i, &alpha) in self.alpha.iter().enumerate() {
            for (j, &l) in self.l_total.iter().enumerate() {
                out.push(SurfacePoint {
                    log10_l_total: l.log10(),
                    log10_alpha: alpha.log10(),
                    plp: self.plp[i][j],
                });
            }
        }
        out
    }

    /// Largest `[PLP]` on the grid with its `(alpha, L_total)` location.
    pub fn peak(&self) -> Option<(f64, f64, f64)> {
        let mut best: Option<(f64, f64, f64)> = None;
        for (i, row) in self.plp.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if best.is_none_or(|(_, _, b)| v > b) {
                    best = Some((self.alpha[i], self.l_total[j], v));
                }
            }
        }
        best
    }
}

pub fn solution_surface(kd: f64, p_total: f64, l_grid: &[f64], alpha_grid: &[f64]) -> SolutionSurface {
    let plp = alpha_grid
        .par_iter()
        .map(|&alpha| fitted_plp(l_grid, kd, alpha, p_total))
        .collect();
    SolutionSurface {
        kd,
        p_total,
        l_total: l_grid.to_vec(),
        alpha: alpha_grid.to_vec(),
        plp,
    }
}
