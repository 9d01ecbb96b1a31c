//! Interactive prompts for `ligfit makeinput`.
//!
//! Kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the prompt fills in whatever the flags left out
//!
//! Prompts are generic over reader/writer so they can be driven from tests.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::error::AppError;
use crate::io::InputHeader;

/// Ask one question and return the trimmed answer.
///
/// End of input is an error; there is no sensible default to fall back to.
pub fn prompt_line<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, question: &str) -> Result<String, AppError> {
    write!(writer, "{question}")
        .and_then(|_| writer.flush())
        .map_err(|e| AppError::config(format!("Failed to write prompt: {e}")))?;

    let mut input = String::new();
    let bytes = reader
        .read_line(&mut input)
        .map_err(|e| AppError::config(format!("Failed to read input: {e}")))?;
    if bytes == 0 {
        return Err(AppError::config(
            "No input received. Pass the values as flags, e.g. `ligfit makeinput run.txt --prot-total 0.1 --init-kd 1 --init-alpha 10`.",
        ));
    }
    Ok(input.trim().to_string())
}

/// Ask until the answer is a finite, positive real (`1e3` notation accepted).
pub fn prompt_positive<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, question: &str) -> Result<f64, AppError> {
    loop {
        let answer = prompt_line(reader, writer, question)?;
        match answer.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => return Ok(v),
            _ => {
                writeln!(writer, "Invalid value '{answer}': enter a positive number.")
                    .map_err(|e| AppError::config(format!("Failed to write prompt: {e}")))?;
            }
        }
    }
}

/// Resolve the file name and header values, prompting for any that are missing.
pub fn complete_makeinput<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    filename: Option<PathBuf>,
    prot_total: Option<f64>,
    init_kd: Option<f64>,
    init_alpha: Option<f64>,
) -> Result<(PathBuf, InputHeader), AppError> {
    let filename = match filename {
        Some(f) => f,
        None => {
            let name = prompt_line(reader, writer, "Name of input file?: ")?;
            if name.is_empty() {
                return Err(AppError::config("Input file name must not be empty."));
            }
            PathBuf::from(name)
        }
    };

    if prot_total.is_none() || init_kd.is_none() || init_alpha.is_none() {
        writeln!(writer, "Please enter values in uM units; notation like \"1e3\" is valid.")
            .map_err(|e| AppError::config(format!("Failed to write prompt: {e}")))?;
    }

    let mut value = |given: Option<f64>, name: &str, question: &str| -> Result<f64, AppError> {
        match given {
            Some(v) if v.is_finite() && v > 0.0 => Ok(v),
            Some(v) => Err(AppError::config(format!("{name} must be finite and > 0 (got {v})."))),
            None => prompt_positive(reader, writer, question),
        }
    };
    let header = InputHeader {
        prot_total: value(prot_total, "prot_total", "Total protein used in experiments?: ")?,
        init_kd: value(init_kd, "init_kd", "Initial guess for K_d?: ")?,
        init_alpha: value(init_alpha, "init_alpha", "Initial guess for alpha?: ")?,
    };
    Ok((filename, header))
}
