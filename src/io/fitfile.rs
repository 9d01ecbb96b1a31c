//! Read/write fit JSON files.
//!
//! A fit file is the portable record of one fit:
//! - fitted parameters, uncertainties and quality diagnostics
//! - the normalized data that was fitted
//! - a precomputed fitted grid for quick replotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{SecondsFormat, Utc};

use crate::domain::{ConditionSeries, FitData, FitFile, FitResult};
use crate::error::AppError;
use crate::fit::fit_grid;

/// Points in the stored fitted grid.
pub const GRID_POINTS: usize = 201;

pub fn build_fit_file(input: &Path, series: &ConditionSeries, p_total: f64, result: &FitResult) -> FitFile {
    FitFile {
        tool: concat!("ligfit ", env!("CARGO_PKG_VERSION")).to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        input: input.display().to_string(),
        p_total,
        result: result.clone(),
        data: FitData {
            l_total: series.l_total.clone(),
            y_norm: series.y_obs.iter().map(|y| y / result.y_scale).collect(),
        },
        grid: fit_grid(series, p_total, result, GRID_POINTS),
    }
}

pub fn write_fit_json(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), fit)
        .map_err(|e| AppError::parse(path, format!("Failed to write fit JSON: {e}")))
}

pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::parse(path, format!("Invalid fit JSON: {e}")))
}

/// Default output path: `ligfit_<input stem>.json` next to the input.
pub fn default_output_path(input: &Path) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    input.with_file_name(format!("ligfit_{stem}.json"))
}
