//! CSV exports.
//!
//! Every export is a flat table with a header row, easy to consume in
//! spreadsheets or downstream scripts:
//!
//! - fit residuals (`l_total,y_obs,y_norm,y_fit,residual,weight`)
//! - species sweeps
//! - `[PLP]` surfaces in long format

use std::path::Path;

use serde::Serialize;

use crate::domain::SampleResidual;
use crate::error::AppError;
use crate::models::{SolutionSurface, SweepRow};

/// Serialize `rows` to a CSV file, one record per row.
pub fn write_csv_rows<S: Serialize>(path: &Path, rows: &[S]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))
}

pub fn write_residuals_csv(path: &Path, residuals: &[SampleResidual]) -> Result<(), AppError> {
    write_csv_rows(path, residuals)
}

pub fn write_sweep_csv<T: Serialize>(path: &Path, rows: &[SweepRow<T>]) -> Result<(), AppError> {
    write_csv_rows(path, rows)
}

/// Long format: `log10_l_total,log10_alpha,plp`.
pub fn write_surface_csv(path: &Path, surface: &SolutionSurface) -> Result<(), AppError> {
    write_csv_rows(path, &surface.points())
}

fn csv_error(path: &Path, err: csv::Error) -> AppError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return AppError::io(path, source);
        }
        return AppError::parse(path, "CSV I/O failure");
    }
    AppError::parse(path, format!("CSV encoding failed: {err}"))
}
