//! The `ligfit fit` workflow without any printing:
//! input file -> fit -> residuals -> fitted grid -> fit file

use std::path::Path;

use tracing::info;

use crate::domain::{FitConfig, FitFile, FitParams, FitResult, SampleResidual};
use crate::error::AppError;
use crate::fit::{compute_residuals, curve_grid, fit};
use crate::io::{InputFile, build_fit_file, read_input_file};
use crate::models::fitted_plp;
use crate::plot::render_xy_plot;

/// All computed outputs of a single `ligfit fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub result: FitResult,
    pub residuals: Vec<SampleResidual>,
    pub fit_file: FitFile,
}

/// Read and log an input file.
pub fn load_input(path: &Path) -> Result<InputFile, AppError> {
    let input = read_input_file(path)?;
    info!(path = %path.display(), samples = input.series.len(), "input loaded");
    Ok(input)
}

/// Fit a parsed input; `path` is recorded in the fit file.
pub fn run_fit(path: &Path, input: &InputFile, config: &FitConfig) -> Result<FitRun, AppError> {
    let p_total = input.header.prot_total;
    let result = fit(&input.series, p_total, &input.header.initial_guess(), config)?;
    let residuals = compute_residuals(&input.series, p_total, &result);
    let fit_file = build_fit_file(path, &input.series, p_total, &result);
    Ok(FitRun {
        result,
        residuals,
        fit_file,
    })
}

/// Plot the data against the curve of a (possibly unconverged) parameter estimate.
pub fn diagnostic_plot(input: &InputFile, config: &FitConfig, estimate: &FitParams, width: usize, height: usize) -> String {
    let series = &input.series;
    let y_scale = if config.fit_scaling {
        let max = series.y_obs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if max > 0.0 { max } else { 1.0 }
    } else {
        1.0
    };
    let points: Vec<(f64, f64)> = series
        .l_total
        .iter()
        .zip(&series.y_obs)
        .map(|(&l, &y)| (l, y / y_scale))
        .collect();

    let grid = curve_grid(&series.l_total, width.max(2) * 2);
    let scaling = estimate.scaling.unwrap_or(1.0);
    let curve: Vec<(f64, f64)> = fitted_plp(&grid, estimate.kd, estimate.alpha, input.header.prot_total)
        .into_iter()
        .zip(&grid)
        .map(|(plp, &l)| (l, scaling * plp))
        .collect();

    render_xy_plot(&points, &curve, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate};
    use crate::io::{InputHeader, write_input_file};

    fn write_synthetic(dir: &Path) -> std::path::PathBuf {
        let series = simulate(&SimulationSpec {
            signal_scale: 20.0,
            ..SimulationSpec::default()
        })
        .unwrap();
        let header = InputHeader {
            prot_total: 0.1,
            init_kd: 2.0,
            init_alpha: 700.0,
        };
        let path = dir.join("synthetic.txt");
        write_input_file(&path, &header, Some(&series)).unwrap();
        path
    }

    #[test]
    fn pipeline_fits_a_written_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_synthetic(dir.path());

        let input = load_input(&path).unwrap();
        let run = run_fit(&path, &input, &FitConfig::default()).unwrap();
        assert!((run.result.params.kd / 2.5 - 1.0).abs() < 0.01);
        assert!((run.result.params.alpha / 1000.0 - 1.0).abs() < 0.01);
        assert_eq!(run.residuals.len(), input.series.len());
        assert_eq!(run.fit_file.p_total, 0.1);
        assert_eq!(run.fit_file.data.l_total, input.series.l_total);
        assert_eq!(run.fit_file.input, path.display().to_string());
    }

    #[test]
    fn failed_fit_leaves_input_for_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_synthetic(dir.path());
        let mut input = load_input(&path).unwrap();
        input.header.init_kd = 0.01;
        input.header.init_alpha = 2.0;
        let config = FitConfig {
            max_iterations: 1,
            ..FitConfig::default()
        };

        let err = run_fit(&path, &input, &config).unwrap_err();
        let last = err.last_estimate().unwrap();
        let txt = diagnostic_plot(&input, &config, last, 40, 10);
        assert_eq!(txt.lines().count(), 11);
    }

    #[test]
    fn diagnostic_plot_renders_for_any_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_synthetic(dir.path());
        let input = load_input(&path).unwrap();

        let txt = diagnostic_plot(&input, &FitConfig::default(), &FitParams::new(50.0, 1.0, None), 40, 10);
        assert_eq!(txt.lines().count(), 11);
        assert!(txt.starts_with("Plot: log10(L_total)=[-3.000, 3.000]"));
    }
}
