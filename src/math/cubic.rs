//! Closed-form real root of a monic cubic `x³ + a x² + b x + c = 0`.
//!
//! With
//!
//! ```text
//! Q = (3b - a²) / 9
//! R = (9ab - 27c - 2a³) / 54
//! D = Q³ + R²
//! ```
//!
//! the root is taken from one of two branches:
//!
//! - `D > 0` (one real root): cartesian form `-a/3 + S + T`, `S = cbrt(R + √D)`,
//!   `T = cbrt(R - √D)`
//! - `D <= 0` (three real roots): polar form `2√(-Q)·cos(θ/3) - a/3`,
//!   `θ = acos(R / √(-Q³))`, which is the largest of the three
//!
//! For the dimerization cubic this is always the free-protein root.
//!
//! Numerical notes:
//! - Cube roots are real cube roots (`Float::cbrt`), negative for a negative
//!   radicand. A fractional power would produce NaN there.
//! - In the cartesian branch the smaller of `S`, `T` is recovered from
//!   `S·T = -Q`, which avoids cancellation in `R - √D` when `|R| ≈ √D`.
//! - The `acos` argument is clamped to `[-1, 1]`.
//! - When `L_total ≫ P_total` the root is a small difference of large terms and
//!   `acos` is evaluated next to `-1`. The closed-form root is then polished by
//!   a few guarded Newton steps on the undepressed cubic; a step is kept only if it
//!   lowers `|f(x)|`, so the selected root never changes.

use num_traits::Float;
use thiserror::Error;

/// Which closed-form path produced the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubicBranch {
    Cartesian,
    Polar,
    /// `Q = R = 0`: the root is exactly `-a/3`.
    TripleRoot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicRoot<T> {
    pub root: T,
    pub branch: CubicBranch,
}

/// A cubic that has no usable closed-form root.
///
/// The equilibrium model treats these as numeric degeneracies and substitutes
/// a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CubicError {
    #[error("non-finite cubic coefficients or intermediates")]
    NonFinite,
    #[error("polar branch selected with -Q³ underflowed to zero while R != 0")]
    InconsistentPolar,
}

/// Convert an `f64` literal into `T`.
#[inline]
pub(crate) fn lit<T: Float>(v: f64) -> T {
    T::from(v).unwrap_or_else(T::nan)
}

/// Depressed-cubic quantities `(Q, R)` for `x³ + a x² + b x + c`.
pub fn depressed_terms<T: Float>(a: T, b: T, c: T) -> (T, T) {
    let q = (lit::<T>(3.0) * b - a * a) / lit(9.0);
    let r = (lit::<T>(9.0) * a * b - lit::<T>(27.0) * c - lit::<T>(2.0) * a * a * a) / lit(54.0);
    (q, r)
}

/// Maximum Newton refinement steps after the closed form.
const NEWTON_STEPS: usize = 3;

/// Solve for the physically relevant real root.
pub fn solve_real_root<T: Float>(a: T, b: T, c: T) -> Result<CubicRoot<T>, CubicError> {
    let closed = closed_form_root(a, b, c)?;
    if closed.branch == CubicBranch::TripleRoot {
        return Ok(closed);
    }
    Ok(CubicRoot {
        root: polish_root(a, b, c, closed.root),
        branch: closed.branch,
    })
}

/// Branch-selected closed-form root, without refinement.
pub fn closed_form_root<T: Float>(a: T, b: T, c: T) -> Result<CubicRoot<T>, CubicError> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(CubicError::NonFinite);
    }

    let (q, r) = depressed_terms(a, b, c);
    let q3 = q * q * q;
    let d = q3 + r * r;
    if !d.is_finite() {
        return Err(CubicError::NonFinite);
    }

    let shift = a / lit(3.0);

    if q == T::zero() && r == T::zero() {
        return Ok(CubicRoot {
            root: -shift,
            branch: CubicBranch::TripleRoot,
        });
    }

    if d > T::zero() {
        let sqrt_d = d.sqrt();
        // Larger-magnitude cube root first; R = 0 here implies Q > 0 and either sign works.
        let big = if r >= T::zero() {
            (r + sqrt_d).cbrt()
        } else {
            (r - sqrt_d).cbrt()
        };
        let small = if big == T::zero() { T::zero() } else { -q / big };
        let root = big + small - shift;
        if !root.is_finite() {
            return Err(CubicError::NonFinite);
        }
        return Ok(CubicRoot {
            root,
            branch: CubicBranch::Cartesian,
        });
    }

    let neg_q3 = -q3;
    if !(neg_q3 > T::zero()) {
        // -Q³ underflowed; with R = 0 this is still the triple root.
        if r == T::zero() {
            return Ok(CubicRoot {
                root: -shift,
                branch: CubicBranch::TripleRoot,
            });
        }
        return Err(CubicError::InconsistentPolar);
    }

    let cos_arg = (r / neg_q3.sqrt()).max(-T::one()).min(T::one());
    let theta = cos_arg.acos();
    let root = lit::<T>(2.0) * (-q).sqrt() * (theta / lit(3.0)).cos() - shift;
    if !root.is_finite() {
        return Err(CubicError::NonFinite);
    }
    Ok(CubicRoot {
        root,
        branch: CubicBranch::Polar,
    })
}

fn eval_cubic<T: Float>(a: T, b: T, c: T, x: T) -> T {
    ((x + a) * x + b) * x + c
}

fn eval_slope<T: Float>(a: T, b: T, x: T) -> T {
    (lit::<T>(3.0) * x + lit::<T>(2.0) * a) * x + b
}

/// Whether `x` zeroes the cubic to within `rel_tol` of the magnitude of its terms.
pub fn is_accurate_root<T: Float>(a: T, b: T, c: T, x: T, rel_tol: T) -> bool {
    if !x.is_finite() {
        return false;
    }
    let scale = (x * x * x).abs() + (a * x * x).abs() + (b * x).abs() + c.abs();
    eval_cubic(a, b, c, x).abs() <= rel_tol * scale
}

/// Upper bound on safeguarded Newton–bisection steps.
const MAX_BRACKET_STEPS: usize = 200;

/// Root of the cubic inside `[lo, hi]` by safeguarded Newton–bisection.
///
/// Returns `None` when `f(lo)` and `f(hi)` do not straddle zero.
pub fn refine_root_in_bracket<T: Float>(a: T, b: T, c: T, lo: T, hi: T) -> Option<T> {
    let f_lo = eval_cubic(a, b, c, lo);
    let f_hi = eval_cubic(a, b, c, hi);
    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return None;
    }
    if f_lo == T::zero() {
        return Some(lo);
    }
    if f_hi == T::zero() {
        return Some(hi);
    }
    if (f_lo < T::zero()) == (f_hi < T::zero()) {
        return None;
    }

    // Orient so that f(neg) < 0 < f(pos).
    let (mut neg, mut pos) = if f_lo < T::zero() { (lo, hi) } else { (hi, lo) };
    let half = lit::<T>(0.5);
    let mut x = half * (lo + hi);
    let mut dx_old = (hi - lo).abs();
    let mut dx = dx_old;
    let mut fx = eval_cubic(a, b, c, x);
    let mut dfx = eval_slope(a, b, x);
    let tol = lit::<T>(4.0) * T::epsilon();

    for _ in 0..MAX_BRACKET_STEPS {
        let newton_leaves_bracket = ((x - pos) * dfx - fx) * ((x - neg) * dfx - fx) > T::zero();
        let newton_too_slow = (lit::<T>(2.0) * fx).abs() > (dx_old * dfx).abs();
        dx_old = dx;
        if newton_leaves_bracket || newton_too_slow || dfx == T::zero() {
            dx = half * (pos - neg);
            x = neg + dx;
        } else {
            dx = fx / dfx;
            x = x - dx;
        }
        if dx.abs() <= tol * x.abs() || dx == T::zero() {
            break;
        }
        fx = eval_cubic(a, b, c, x);
        if fx == T::zero() {
            break;
        }
        dfx = eval_slope(a, b, x);
        if fx < T::zero() {
            neg = x;
        } else {
            pos = x;
        }
    }
    Some(x)
}

fn polish_root<T: Float>(a: T, b: T, c: T, mut x: T) -> T {
    let mut fx = eval_cubic(a, b, c, x);
    for _ in 0..NEWTON_STEPS {
        if fx == T::zero() {
            break;
        }
        let dfx = eval_slope(a, b, x);
        if dfx == T::zero() || !dfx.is_finite() {
            break;
        }
        let next = x - fx / dfx;
        let f_next = eval_cubic(a, b, c, next);
        if !(f_next.abs() < fx.abs()) {
            break;
        }
        x = next;
        fx = f_next;
    }
    x
}

/// Elementwise `solve_real_root`; each sample picks its own branch.
pub fn solve_real_roots<T: Float>(
    coefficients: &[(T, T, T)],
) -> Vec<Result<CubicRoot<T>, CubicError>> {
    coefficients
        .iter()
        .map(|&(a, b, c)| solve_real_root(a, b, c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(a: f64, b: f64, c: f64, x: f64) -> f64 {
        ((x + a) * x + b) * x + c
    }

    #[test]
    fn polar_branch_finds_largest_of_three_roots() {
        // (x + 1)(x² + 2x - 1) = x³ + 3x² + x - 1, roots -1, -1 ± √2.
        let sol = solve_real_root(3.0, 1.0, -1.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::Polar);
        assert!((sol.root - (2.0_f64.sqrt() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn cartesian_branch_handles_negative_radicand() {
        // (x - 2)(x² + x + 1) = x³ - x² - x - 2; single real root 2.
        let sol = solve_real_root(-1.0, -1.0, -2.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::Cartesian);
        assert!((sol.root - 2.0).abs() < 1e-12);

        // x³ + x + 10 = (x + 2)(x² - 2x + 5): R < 0, so both radicands are negative.
        let sol = solve_real_root(0.0, 1.0, 10.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::Cartesian);
        assert!((sol.root + 2.0).abs() < 1e-12);
    }

    #[test]
    fn triple_root_returns_exact_shift() {
        // (x - 2)³ = x³ - 6x² + 12x - 8
        let sol = solve_real_root(-6.0, 12.0, -8.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::TripleRoot);
        assert_eq!(sol.root, 2.0);

        let sol = solve_real_root(0.0, 0.0, 0.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::TripleRoot);
        assert_eq!(sol.root, 0.0);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        assert_eq!(solve_real_root(f64::NAN, 1.0, 1.0), Err(CubicError::NonFinite));
        assert_eq!(solve_real_root(1.0, f64::INFINITY, 1.0), Err(CubicError::NonFinite));
    }

    #[test]
    fn root_satisfies_cubic_across_branches() {
        let cases = [
            (3.0, 1.0, -1.0),
            (-1.0, -1.0, -2.0),
            (0.5, -4.0, 0.25),
            (200.0, 0.198, -1e-4),
            (-0.9, 0.0025, -0.0001),
        ];
        for (a, b, c) in cases {
            let x = solve_real_root(a, b, c).unwrap().root;
            let scale = x.abs().powi(3) + (a * x * x).abs() + (b * x).abs() + c.abs();
            assert!(
                eval(a, b, c, x).abs() <= 1e-9 * scale,
                "residual too large for ({a}, {b}, {c}) at x={x}"
            );
        }
    }

    #[test]
    fn branch_selection_is_per_sample() {
        let roots = solve_real_roots(&[(3.0, 1.0, -1.0), (-1.0, -1.0, -2.0), (-6.0, 12.0, -8.0)]);
        let branches: Vec<_> = roots.iter().map(|r| r.unwrap().branch).collect();
        assert_eq!(
            branches,
            vec![CubicBranch::Polar, CubicBranch::Cartesian, CubicBranch::TripleRoot]
        );
    }

    #[test]
    fn polishing_recovers_small_root_under_large_shift() {
        // L_total ≫ P_total regime: tiny positive root next to a root near -2000.
        let (a, b, c) = (2000.0, 5.0, -6.25e-4);
        let closed = closed_form_root(a, b, c).unwrap();
        let polished = solve_real_root(a, b, c).unwrap();
        assert_eq!(closed.branch, polished.branch);
        assert!(eval(a, b, c, polished.root).abs() <= eval(a, b, c, closed.root).abs());
        assert!(polished.root > 0.0);
        assert!(eval(a, b, c, polished.root).abs() < 1e-15);
    }

    #[test]
    fn bracketed_refinement_finds_root_inside_interval() {
        // x³ + 3x² + x - 1 has a single root in [0, 1].
        let x = refine_root_in_bracket(3.0, 1.0, -1.0, 0.0, 1.0).unwrap();
        assert!((x - (2.0_f64.sqrt() - 1.0)).abs() < 1e-14);
        assert!(is_accurate_root(3.0, 1.0, -1.0, x, 1e-12));

        // No sign change on [1, 2].
        assert!(refine_root_in_bracket(3.0, 1.0, -1.0, 1.0, 2.0).is_none());
    }

    #[test]
    fn zero_discriminant_double_root_uses_polar_branch() {
        // x³ - 3x + 2 = (x - 1)²(x + 2): Q = -1, R = -1, D = 0.
        let (q, r) = depressed_terms(0.0_f64, -3.0, 2.0);
        assert_eq!((q, r), (-1.0, -1.0));
        assert_eq!(q * q * q + r * r, 0.0);

        let sol = closed_form_root(0.0_f64, -3.0, 2.0).unwrap();
        assert_eq!(sol.branch, CubicBranch::Polar);
        assert!((sol.root - 1.0).abs() < 1e-12);
    }

    #[test]
    fn underflowed_polar_terms_with_nonzero_r_are_rejected() {
        // Q = -1e-120 and R = 1e-200: Q³ and R² both underflow, so D = 0 and -Q³ = 0.
        let (q, r) = depressed_terms(0.0_f64, -3e-120, -2e-200);
        assert!(q < 0.0 && r > 0.0);
        assert_eq!(q * q * q, 0.0);
        assert_eq!(
            closed_form_root(0.0_f64, -3e-120, -2e-200),
            Err(CubicError::InconsistentPolar)
        );
        assert_eq!(
            solve_real_root(0.0_f64, -3e-120, -2e-200),
            Err(CubicError::InconsistentPolar)
        );
    }

    #[test]
    fn single_precision_agrees_with_double() {
        let d = solve_real_root(3.0_f64, 1.0, -1.0).unwrap().root;
        let s = solve_real_root(3.0_f32, 1.0, -1.0).unwrap().root;
        assert!((s as f64 - d).abs() < 1e-5);
    }
}
