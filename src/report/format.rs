//! Formatted terminal output.
//!
//! Formatting lives in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::domain::{FitParams, FitResult, SampleResidual};
use crate::models::SweepRow;

/// Fit summary: run header, parameters with standard errors, diagnostics.
pub fn format_fit_summary(input: &Path, p_total: f64, result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== ligfit - ligand-bridged dimer fit ===\n");
    out.push_str(&format!("Input: {}\n", input.display()));
    out.push_str(&format!("Strategy: {}\n", result.strategy.display_name()));
    out.push_str(&format!(
        "P_total: {p_total:.6e} | samples: n={} | y_scale={:.6e}\n",
        result.quality.n, result.y_scale
    ));
    out.push_str(&format!(
        "Termination: {} (evaluations={})\n",
        result.termination, result.evaluations
    ));

    out.push_str("\nParameters:\n");
    let se = result.std_errors.as_ref();
    out.push_str(&param_line("Kd", result.params.kd, se.map(|s| s.kd)));
    out.push_str(&param_line("alpha", result.params.alpha, se.map(|s| s.alpha)));
    if let Some(s) = result.params.scaling {
        out.push_str(&param_line("scaling", s, se.and_then(|e| e.scaling)));
    }
    if se.is_none() {
        out.push_str("  (standard errors unavailable: no residual degrees of freedom or singular Jacobian)\n");
    }

    let q = &result.quality;
    out.push_str("\nQuality:\n");
    out.push_str(&format!(
        "  SSE={:.6e} RMSE={:.6e} BIC={:.3} R^2={:.6} dof={}\n",
        q.sse, q.rmse, q.bic, q.r_squared, q.dof
    ));
    out.push('\n');

    out
}

/// Summary for a failed fit, reporting the last estimate.
pub fn format_fit_failure(reason: &str, evaluations: usize, last: &FitParams) -> String {
    format!("Fit failed after {evaluations} evaluations ({reason}).\nLast estimate: {last}\n")
}

fn param_line(name: &str, value: f64, se: Option<f64>) -> String {
    match se {
        Some(se) => format!("  {name:<8} {value:>14.6e} +/- {se:.3e}\n"),
        None => format!("  {name:<8} {value:>14.6e}\n"),
    }
}

/// Per-sample residual table on the normalized signal.
pub fn format_residual_table(rows: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>12} {:>12} {:>10} {:>10} {:>11} {:>6}\n",
            "L_total", "Y_obs", "Y_norm", "Y_fit", "residual", "weight"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<12} {:-<12} {:-<10} {:-<10} {:-<11} {:-<6}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:>12.4e} {:>12.4e} {:>10.4} {:>10.4} {:>11.3e} {:>6.2}\n",
            r.l_total, r.y_obs, r.y_norm, r.y_fit, r.residual, r.weight
        ));
    }
    out
}

/// Species sweep table (concentrations and fractions of `P_total`).
pub fn format_sweep_table<T: Copy + Into<f64>>(rows: &[SweepRow<T>]) -> String {
    let mut out = format!(
        "{:>12} {:>12} {:>12} {:>12} {:>8} {:>8} {:>8}\n",
        "L_total", "P", "PL", "PLP", "P%", "PL%", "2PLP%"
    );
    for r in rows {
        let [l, p, pl, plp, pf, plf, plpf]: [f64; 7] = [
            r.l_total.into(),
            r.p.into(),
            r.pl.into(),
            r.plp.into(),
            r.p_frac.into(),
            r.pl_frac.into(),
            r.plp_frac.into(),
        ];
        out.push_str(&format!(
            "{l:>12.4e} {p:>12.4e} {pl:>12.4e} {plp:>12.4e} {:>8.2} {:>8.2} {:>8.2}\n",
            100.0 * pf,
            100.0 * plf,
            200.0 * plpf
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChemistrySystem, FitQuality, FitStrategy};
    use crate::models::species_sweep;

    fn result(with_se: bool) -> FitResult {
        FitResult {
            params: FitParams::new(2.5, 1000.0, Some(1.25)),
            std_errors: with_se.then(|| FitParams::new(0.01, 5.0, Some(0.002))),
            covariance: None,
            quality: FitQuality {
                sse: 1e-4,
                rmse: 1e-3,
                bic: -120.0,
                r_squared: 0.999,
                n: 10,
                dof: 7,
            },
            strategy: FitStrategy::LeastSquares,
            evaluations: 6,
            termination: "gradient below tolerance".to_string(),
            y_scale: 16.0,
        }
    }

    #[test]
    fn summary_lists_parameters_with_errors() {
        let txt = format_fit_summary(Path::new("run.txt"), 0.1, &result(true));
        assert!(txt.contains("Strategy: least squares"));
        assert!(txt.contains("Kd"));
        assert!(txt.contains("+/- 1.000e-2"));
        assert!(txt.contains("scaling"));
        assert!(!txt.contains("unavailable"));

        let txt = format_fit_summary(Path::new("run.txt"), 0.1, &result(false));
        assert!(txt.contains("unavailable"));
        assert!(!txt.contains("+/-"));
    }

    #[test]
    fn residual_table_has_one_line_per_sample() {
        let rows = vec![
            SampleResidual {
                l_total: 0.5,
                y_obs: 10.0,
                y_norm: 0.5,
                y_fit: 0.25,
                residual: 0.25,
                weight: 1.0,
            };
            3
        ];
        let txt = format_residual_table(&rows);
        assert_eq!(txt.lines().count(), 5);
        assert!(txt.lines().next().unwrap().ends_with("weight"));
    }

    #[test]
    fn sweep_table_percentages_account_for_all_protein() {
        let sys = ChemistrySystem::new(1.0, 1.0, 1.0).unwrap();
        let rows = species_sweep(&sys, &[1.0]);
        let txt = format_sweep_table(&rows);
        let line = txt.lines().nth(1).unwrap();
        let pct: Vec<f64> = line
            .split_whitespace()
            .skip(4)
            .map(|v| v.parse().unwrap())
            .collect();
        assert!((pct.iter().sum::<f64>() - 100.0).abs() < 0.02);
    }

    #[test]
    fn failure_message_carries_last_estimate() {
        let txt = format_fit_failure("iteration limit reached", 3, &FitParams::new(2.0, 700.0, None));
        assert!(txt.contains("after 3 evaluations"));
        assert!(txt.contains("Kd=2.000000e0"));
    }
}
