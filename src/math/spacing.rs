//! Log-spaced grids.
//!
//! Titrations span several decades of ligand concentration, so sweeps, surfaces,
//! synthetic data and the fit start grid all sample in log space.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::config(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Log grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the endpoints exactly.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Log-spaced points spanning `±span_decades` around `center`.
pub fn log_span_around(center: f64, span_decades: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(span_decades.is_finite() && span_decades > 0.0) {
        return Err(AppError::config(format!(
            "Grid span must be finite and > 0 decades (got {span_decades})."
        )));
    }
    let factor = 10f64.powf(span_decades);
    log_space(center / factor, center * factor, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert_eq!(v[0], 0.1);
        assert_eq!(v[v.len() - 1], 10.0);
        assert!((v[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_invalid_ranges() {
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 10.0, 1).is_err());
    }

    #[test]
    fn span_is_symmetric_in_decades() {
        let v = log_span_around(100.0, 1.0, 3).unwrap();
        assert!((v[0] - 10.0).abs() < 1e-9);
        assert!((v[1] - 100.0).abs() < 1e-9);
        assert!((v[2] - 1000.0).abs() < 1e-9);
    }
}
