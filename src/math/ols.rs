//! Parameter covariance from a least-squares Jacobian.
//!
//! SVD rather than forming `JᵀJ` and inverting it: the `Kd` and `alpha`
//! columns can be close to collinear, and squaring the condition number would
//! hurt.

use nalgebra::DMatrix;

/// `(JᵀJ)⁻¹` for a full-column-rank `J`.
///
/// Returns `None` when the smallest singular value is below `rcond` times the
/// largest (the parameters are not separately identifiable).
pub fn inverse_gram(j: &DMatrix<f64>, rcond: f64) -> Option<DMatrix<f64>> {
    if j.ncols() == 0 || j.nrows() < j.ncols() {
        return None;
    }
    let svd = j.clone().svd(false, true);
    let s = &svd.singular_values;
    let s_max = s.max();
    let s_min = s.min();
    if !(s_max.is_finite() && s_max > 0.0 && s_min > rcond * s_max) {
        return None;
    }
    let v_t = svd.v_t.as_ref()?;
    // (JᵀJ)⁻¹ = V Σ⁻² Vᵀ
    let mut scaled = v_t.clone();
    for i in 0..scaled.nrows() {
        let s2 = s[i] * s[i];
        for k in 0..scaled.ncols() {
            scaled[(i, k)] /= s2;
        }
    }
    let inv = v_t.transpose() * scaled;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
