//! Titration input files.
//!
//! Layout:
//!
//! ```text
//! <comment line>
//! {"prot_total": 0.1, "init_kd": 2.0, "init_alpha": 700.0}
//! <comment line>
//! L_total Y_obs Y_err weight
//! ...
//! ```
//!
//! Data rows are whitespace-separated reals. Text lines between the JSON line
//! and the first data row are skipped (the template writes a
//! `<Your Data Here>` placeholder there); once data has started every
//! non-blank line must be a data row.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ConditionSeries, FitParams};
use crate::error::AppError;

pub const DATA_PLACEHOLDER: &str = "<Your Data Here>";

const HEADER_COMMENT: &str = "The next line contains a JSON dump of fitting parameters";
const DATA_COMMENT: &str =
    "The remaining lines contain space-separated data: [L]_total (M), Y_obs (RFU or other), Y-error, weighting (0-1)";

/// Fitting parameters stored on the second line of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputHeader {
    pub prot_total: f64,
    pub init_kd: f64,
    pub init_alpha: f64,
}

impl InputHeader {
    /// Initial guess for the fitter (scaling is left to the fitter).
    pub fn initial_guess(&self) -> FitParams {
        FitParams::new(self.init_kd, self.init_alpha, None)
    }
}

#[derive(Debug, Clone)]
pub struct InputFile {
    pub header: InputHeader,
    pub series: ConditionSeries,
}

pub fn read_input_file(path: &Path) -> Result<InputFile, AppError> {
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    parse_input(&text, path)
}

/// Parse input-file text; `path` is only used in error messages.
pub fn parse_input(text: &str, path: &Path) -> Result<InputFile, AppError> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(json_line) = lines.get(1) else {
        return Err(AppError::parse(
            path,
            "expected a comment line followed by a JSON parameter line",
        ));
    };

    let header: InputHeader = serde_json::from_str(json_line.trim()).map_err(|e| {
        if e.classify() == serde_json::error::Category::Data {
            AppError::config(format!("{} line 2: {e}", path.display()))
        } else {
            AppError::parse(path, format!("line 2 is not a JSON object: {e}"))
        }
    })?;

    let mut series = ConditionSeries::default();
    let mut started = false;
    for (idx, raw) in lines.iter().enumerate().skip(2) {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_row(line) {
            Some([l, y, e, w]) => {
                started = true;
                series.push(l, y, e, w);
            }
            None if started => {
                return Err(AppError::config(format!(
                    "{} line {line_no}: expected four numbers `L_total Y_obs Y_err weight`, got '{line}'",
                    path.display()
                )));
            }
            None if idx == 2 || line == DATA_PLACEHOLDER => {
                debug!(line = line_no, "header text skipped");
            }
            None => {
                warn!(line = line_no, text = line, "skipping non-data line before first data row");
            }
        }
    }

    debug!(samples = series.len(), path = %path.display(), "input parsed");
    Ok(InputFile { header, series })
}

fn parse_row(line: &str) -> Option<[f64; 4]> {
    let mut out = [0.0; 4];
    let mut tokens = line.split_whitespace();
    for slot in &mut out {
        *slot = tokens.next()?.parse().ok()?;
    }
    tokens.next().is_none().then_some(out)
}

/// Render an input file: the three header lines, then data rows or the placeholder.
pub fn render_input(header: &InputHeader, series: Option<&ConditionSeries>) -> Result<String, AppError> {
    let json = serde_json::to_string(header)
        .map_err(|e| AppError::config(format!("Failed to encode input parameters: {e}")))?;
    let mut out = format!("{HEADER_COMMENT}\n{json}\n{DATA_COMMENT}\n");
    match series {
        Some(s) if !s.is_empty() => {
            for i in 0..s.len() {
                out.push_str(&format!(
                    "{} {} {} {}\n",
                    s.l_total[i], s.y_obs[i], s.y_err[i], s.weight[i]
                ));
            }
        }
        _ => {
            out.push_str(DATA_PLACEHOLDER);
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn write_input_file(
    path: &Path,
    header: &InputHeader,
    series: Option<&ConditionSeries>,
) -> Result<(), AppError> {
    let text = render_input(header, series)?;
    fs::write(path, text).map_err(|e| AppError::io(path, e))
}
