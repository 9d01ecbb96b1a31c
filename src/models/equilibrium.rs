//! Equilibrium speciation for ligand-bridged homodimerization.
//!
//! Species: free protein `P`, singly bound `PL`, and the ligand-bridged dimer
//! `PLP`. Eliminating free ligand from the binding equilibria and the mass
//! balance `P + PL + 2·PLP = P_total` leaves a monic cubic in `[P]`:
//!
//! ```text
//! a = 2·Kd/alpha + 2·L - P_total
//! b = (Kd + 2·L - 2·P_total)·(Kd/alpha)
//! c = -Kd²·P_total/alpha
//! ```
//!
//! after which
//!
//! ```text
//! PL  = 2·Kd·L·P / (Kd² + 2·Kd·P + alpha·P²)
//! PLP = alpha·L·P² / (Kd² + 2·Kd·P + alpha·P²)
//! ```
//!
//! Everything here is generic over `num_traits::Float`, so the same code runs
//! in single or double precision.
//!
//! For physical inputs the free-protein root lies in `[0, P_total]`
//! (`f(0) = c < 0` and `f(P_total) > 0`). If the closed-form root lands outside
//! that interval, or fails the residual check, it is re-solved by bracketed
//! Newton–bisection on the interval.
//!
//! Degenerate samples (solver error, non-finite root, vanishing denominator)
//! evaluate to zero instead of NaN. The minimizer cannot recover from NaN
//! residuals; a zero keeps the trial point finite and merely scores it badly.

use num_traits::Float;
use tracing::trace;

use crate::domain::ChemistrySystem;
use crate::math::cubic::lit;
use crate::math::{is_accurate_root, refine_root_in_bracket, solve_real_root};

/// Cubic coefficients for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicCoefficients<T> {
    pub a: T,
    pub b: T,
    pub c: T,
}

/// Equilibrium concentrations for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesConcentrations<T> {
    pub p: T,
    pub pl: T,
    pub plp: T,
    /// Set when any value was replaced by the zero sentinel.
    pub degenerate: bool,
}

/// Concentrations across a whole series, index-aligned with `L_total`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesProfile<T> {
    pub p: Vec<T>,
    pub pl: Vec<T>,
    pub plp: Vec<T>,
}

impl<T> SpeciesProfile<T> {
    pub fn len(&self) -> usize {
        self.p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }
}

pub fn coefficients<T: Float>(kd: T, alpha: T, p_total: T, l_total: T) -> CubicCoefficients<T> {
    let two = lit::<T>(2.0);
    let kd_over_alpha = kd / alpha;
    CubicCoefficients {
        a: two * kd_over_alpha + two * l_total - p_total,
        b: (kd + two * l_total - two * p_total) * kd_over_alpha,
        c: -(kd * kd) * p_total / alpha,
    }
}

/// Relative residual accepted for a closed-form root before re-solving.
const ROOT_REL_TOL: f64 = 1e-10;

fn is_physical<T: Float>(kd: T, alpha: T, p_total: T, l_total: T) -> bool {
    let positive = |v: T| v.is_finite() && v > T::zero();
    positive(kd) && positive(alpha) && positive(p_total) && l_total.is_finite() && l_total >= T::zero()
}

fn ensure_physical_root<T: Float>(coef: CubicCoefficients<T>, root: T, p_total: T) -> T {
    let CubicCoefficients { a, b, c } = coef;
    let in_range = root >= T::zero() && root <= p_total;
    let rel_tol = lit::<T>(ROOT_REL_TOL).max(lit::<T>(64.0) * T::epsilon());
    if in_range && is_accurate_root(a, b, c, root, rel_tol) {
        return root;
    }
    match refine_root_in_bracket(a, b, c, T::zero(), p_total) {
        Some(refined) => {
            trace!("closed-form root re-solved inside [0, P_total]");
            refined
        }
        None => root,
    }
}

fn finite_or_zero<T: Float>(v: T, degenerate: &mut bool) -> T {
    if v.is_finite() {
        v
    } else {
        *degenerate = true;
        T::zero()
    }
}

/// Speciation at a single total-ligand concentration.
pub fn species_at<T: Float>(kd: T, alpha: T, p_total: T, l_total: T) -> SpeciesConcentrations<T> {
    let coef = coefficients(kd, alpha, p_total, l_total);
    let CubicCoefficients { a, b, c } = coef;
    let mut degenerate = false;

    let p = match solve_real_root(a, b, c) {
        Ok(sol) => {
            trace!(branch = ?sol.branch, "cubic branch selected");
            let root = if is_physical(kd, alpha, p_total, l_total) {
                ensure_physical_root(coef, sol.root, p_total)
            } else {
                sol.root
            };
            finite_or_zero(root, &mut degenerate)
        }
        Err(err) => {
            trace!(%err, "cubic degenerate; substituting zero");
            degenerate = true;
            T::zero()
        }
    };

    let two = lit::<T>(2.0);
    let denom = kd * kd + two * kd * p + alpha * p * p;
    let (pl, plp) = if denom == T::zero() || !denom.is_finite() {
        degenerate = true;
        (T::zero(), T::zero())
    } else {
        (
            finite_or_zero(two * kd * l_total * p / denom, &mut degenerate),
            finite_or_zero(alpha * l_total * p * p / denom, &mut degenerate),
        )
    };

    if degenerate {
        trace!("numeric degeneracy in speciation; zero sentinel applied");
    }

    SpeciesConcentrations {
        p,
        pl,
        plp,
        degenerate,
    }
}

/// Speciation over a series of total-ligand concentrations.
pub fn evaluate<T: Float>(kd: T, alpha: T, p_total: T, l_total: &[T]) -> SpeciesProfile<T> {
    let n = l_total.len();
    let mut out = SpeciesProfile {
        p: Vec::with_capacity(n),
        pl: Vec::with_capacity(n),
        plp: Vec::with_capacity(n),
    };
    for &l in l_total {
        let s = species_at(kd, alpha, p_total, l);
        out.p.push(s.p);
        out.pl.push(s.pl);
        out.plp.push(s.plp);
    }
    out
}

/// Dimer concentrations only: the quantity compared with the observed signal.
pub fn fitted_plp<T: Float>(l_total: &[T], kd: T, alpha: T, p_total: T) -> Vec<T> {
    l_total
        .iter()
        .map(|&l| species_at(kd, alpha, p_total, l).plp)
        .collect()
}

/// Total-ligand concentration at which `[PLP]` peaks for a given `Kd` and `P_total`.
pub fn max_plp_ligand<T: Float>(kd: T, p_total: T) -> T {
    (kd + p_total) / lit(2.0)
}

impl<T: Float> ChemistrySystem<T> {
    pub fn species(&self, l_total: &[T]) -> SpeciesProfile<T> {
        evaluate(self.kd(), self.alpha(), self.p_total(), l_total)
    }

    pub fn plp(&self, l_total: &[T]) -> Vec<T> {
        fitted_plp(l_total, self.kd(), self.alpha(), self.p_total())
    }
}
