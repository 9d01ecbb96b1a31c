//! Command-line parsing for the ligand-bridged dimer fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Conversion into library configuration happens in
//! `app`.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::domain::Precision;

pub mod prompt;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "ligfit",
    version,
    about = "Fit cooperativity and affinity of ligand-bridged protein dimerization"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all diagnostic logging.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write diagnostics to this file.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit Kd and alpha to a titration input file.
    Fit(FitArgs),
    /// Write a template input file (prompts for missing values).
    #[command(name = "makeinput")]
    MakeInput(MakeInputArgs),
    /// Write an input file of synthetic data from known parameters.
    Simulate(SimulateArgs),
    /// Species concentrations along a ligand sweep.
    Curve(CurveArgs),
    /// [PLP] over a cooperativity x ligand grid (long-format CSV).
    Surface(SurfaceArgs),
    /// Plot a previously saved fit JSON.
    Plot(PlotArgs),
}

/// Options for `ligfit fit`.
#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("strategy").required(true).args(["lsq", "odr"])))]
pub struct FitArgs {
    /// Titration input file.
    pub input: PathBuf,

    /// Fit JSON output (default: ligfit_<input stem>.json next to the input).
    pub output: Option<PathBuf>,

    /// Least squares (error only in Y).
    #[arg(short = 'l', long)]
    pub lsq: bool,

    /// Orthogonal distance regression (error in both axes).
    #[arg(short = 'o', long)]
    pub odr: bool,

    /// Use Y_err as per-sample sigma where it is positive.
    #[arg(long)]
    pub use_errors: bool,

    /// Compare [PLP] with the raw signal instead of fitting a scale factor.
    #[arg(long)]
    pub fixed_scale: bool,

    /// ODR uncertainty of log10(L_total), in decades.
    #[arg(long, value_name = "DECADES", default_value_t = 0.1)]
    pub x_sigma: f64,

    /// Levenberg-Marquardt iteration limit.
    #[arg(long, default_value_t = 500)]
    pub max_iter: usize,

    /// Relative convergence tolerance.
    #[arg(long, default_value_t = 1e-12)]
    pub tol: f64,

    /// Start-grid steps per axis (0 disables multi-start seeding).
    #[arg(long, default_value_t = 0)]
    pub grid_steps: usize,

    /// Start-grid half-width around the initial guess, in decades.
    #[arg(long, value_name = "DECADES", default_value_t = 1.0)]
    pub grid_span: f64,

    /// Export per-sample residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Options for `ligfit makeinput`.
#[derive(Debug, Args, Clone)]
pub struct MakeInputArgs {
    /// File to create (prompted for when omitted).
    pub filename: Option<PathBuf>,

    /// Total protein concentration.
    #[arg(long)]
    pub prot_total: Option<f64>,

    /// Initial guess for Kd.
    #[arg(long)]
    pub init_kd: Option<f64>,

    /// Initial guess for alpha.
    #[arg(long)]
    pub init_alpha: Option<f64>,
}

/// Ligand grid shared by the sweep-style commands.
#[derive(Debug, Args, Clone)]
pub struct LigandGridArgs {
    /// Lowest total ligand concentration.
    #[arg(long, default_value_t = 1e-3)]
    pub l_min: f64,

    /// Highest total ligand concentration.
    #[arg(long, default_value_t = 1e3)]
    pub l_max: f64,

    /// Number of log-spaced ligand points.
    #[arg(long, default_value_t = 25)]
    pub points: usize,
}

/// Options for `ligfit simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Input file to write.
    pub output: PathBuf,

    #[arg(long)]
    pub kd: f64,

    #[arg(long)]
    pub alpha: f64,

    #[arg(long)]
    pub prot_total: f64,

    #[command(flatten)]
    pub grid: LigandGridArgs,

    /// Noise sigma as a fraction of the peak signal.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// RNG seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Observed signal per unit [PLP].
    #[arg(long, default_value_t = 1.0)]
    pub signal_scale: f64,
}

/// Options for `ligfit curve`.
#[derive(Debug, Args, Clone)]
pub struct CurveArgs {
    #[arg(long)]
    pub kd: f64,

    #[arg(long)]
    pub alpha: f64,

    #[arg(long)]
    pub prot_total: f64,

    #[command(flatten)]
    pub grid: LigandGridArgs,

    /// Float width used for the computation.
    #[arg(long, value_enum, default_value_t = Precision::Double)]
    pub precision: Precision,

    /// Write the sweep to CSV instead of printing a table.
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

/// Options for `ligfit surface`.
#[derive(Debug, Args, Clone)]
pub struct SurfaceArgs {
    #[arg(long)]
    pub kd: f64,

    #[arg(long)]
    pub prot_total: f64,

    #[arg(long, default_value_t = 1e-2)]
    pub l_min: f64,

    #[arg(long, default_value_t = 1e4)]
    pub l_max: f64,

    #[arg(long, default_value_t = 61)]
    pub l_points: usize,

    #[arg(long, default_value_t = 1e-2)]
    pub alpha_min: f64,

    #[arg(long, default_value_t = 1e4)]
    pub alpha_max: f64,

    #[arg(long, default_value_t = 61)]
    pub alpha_points: usize,

    /// Long-format CSV output.
    #[arg(long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Fit JSON file produced by `ligfit fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
