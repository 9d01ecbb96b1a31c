//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - runs fits and writes fit files
//! - writes template and synthetic input files
//! - computes species sweeps and solution surfaces
//! - prints reports/plots

use std::path::Path;

use clap::Parser;
use tracing::info;

use crate::cli::{Command, CurveArgs, FitArgs, MakeInputArgs, PlotArgs, SimulateArgs, SurfaceArgs};
use crate::domain::{ChemistrySystem, FitConfig, FitStrategy, Precision};
use crate::error::AppError;
use crate::io::InputHeader;
use crate::math::log_space;

pub mod pipeline;

/// Entry point for the `ligfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::MakeInput(args) => handle_makeinput(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Curve(args) => handle_curve(args),
        Command::Surface(args) => handle_surface(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let input = pipeline::load_input(&args.input)?;

    let run = match pipeline::run_fit(&args.input, &input, &config) {
        Ok(run) => run,
        Err(err) => {
            if let AppError::FitFailed {
                reason,
                evaluations,
                last,
            } = &err
            {
                println!("{}", crate::report::format_fit_failure(reason, *evaluations, last));
                if !args.no_plot {
                    println!(
                        "{}",
                        pipeline::diagnostic_plot(&input, &config, last, args.width, args.height)
                    );
                }
            }
            return Err(err);
        }
    };

    println!(
        "{}",
        crate::report::format_fit_summary(&args.input, input.header.prot_total, &run.result)
    );
    println!("{}", crate::report::format_residual_table(&run.residuals));

    if !args.no_plot {
        let plot = crate::plot::render_ascii_plot(&run.residuals, &run.fit_file.grid, args.width, args.height);
        println!("{plot}");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| crate::io::default_output_path(&args.input));
    crate::io::write_fit_json(&output, &run.fit_file)?;
    info!(path = %output.display(), "fit written");

    if let Some(path) = &args.export {
        crate::io::write_residuals_csv(path, &run.residuals)?;
        info!(path = %path.display(), "residuals exported");
    }

    Ok(())
}

fn handle_makeinput(args: MakeInputArgs) -> Result<(), AppError> {
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let mut writer = std::io::stdout();
    let (path, header) = crate::cli::prompt::complete_makeinput(
        &mut reader,
        &mut writer,
        args.filename,
        args.prot_total,
        args.init_kd,
        args.init_alpha,
    )?;

    crate::io::write_input_file(&path, &header, None)?;
    println!("Wrote template input file '{}'.", path.display());
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = crate::data::SimulationSpec {
        kd: args.kd,
        alpha: args.alpha,
        p_total: args.prot_total,
        signal_scale: args.signal_scale,
        l_min: args.grid.l_min,
        l_max: args.grid.l_max,
        points: args.grid.points,
        noise: args.noise,
        seed: args.seed,
    };
    let series = crate::data::simulate(&spec)?;
    let header = InputHeader {
        prot_total: args.prot_total,
        init_kd: args.kd,
        init_alpha: args.alpha,
    };

    crate::io::write_input_file(&args.output, &header, Some(&series))?;
    println!(
        "Wrote {} synthetic samples to '{}'.",
        series.len(),
        args.output.display()
    );
    Ok(())
}

fn handle_curve(args: CurveArgs) -> Result<(), AppError> {
    let grid = log_space(args.grid.l_min, args.grid.l_max, args.grid.points)?;

    match args.precision {
        Precision::Single => {
            let system = ChemistrySystem::new(args.kd as f32, args.alpha as f32, args.prot_total as f32)?;
            let grid: Vec<f32> = grid.iter().map(|&l| l as f32).collect();
            let rows = crate::models::species_sweep(&system, &grid);
            emit_sweep(&rows, args.output.as_deref())
        }
        Precision::Double => {
            let system = ChemistrySystem::new(args.kd, args.alpha, args.prot_total)?;
            let rows = crate::models::species_sweep(&system, &grid);
            emit_sweep(&rows, args.output.as_deref())
        }
    }
}

fn emit_sweep<T>(rows: &[crate::models::SweepRow<T>], output: Option<&Path>) -> Result<(), AppError>
where
    T: Copy + Into<f64> + serde::Serialize,
{
    match output {
        Some(path) => {
            crate::io::write_sweep_csv(path, rows)?;
            println!("Wrote {} sweep rows to '{}'.", rows.len(), path.display());
        }
        None => print!("{}", crate::report::format_sweep_table(rows)),
    }
    Ok(())
}

fn handle_surface(args: SurfaceArgs) -> Result<(), AppError> {
    ChemistrySystem::new(args.kd, 1.0, args.prot_total)?;
    let l_grid = log_space(args.l_min, args.l_max, args.l_points)?;
    let alpha_grid = log_space(args.alpha_min, args.alpha_max, args.alpha_points)?;

    let surface = crate::models::solution_surface(args.kd, args.prot_total, &l_grid, &alpha_grid);
    crate::io::write_surface_csv(&args.output, &surface)?;

    if let Some((alpha, l, plp)) = surface.peak() {
        info!(alpha, l_total = l, plp, "surface peak");
    }
    println!(
        "Wrote {}x{} surface to '{}'. [PLP] peaks near L_total = {:.6e}.",
        alpha_grid.len(),
        l_grid.len(),
        args.output.display(),
        crate::models::max_plp_ligand(args.kd, args.prot_total)
    );
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fit = crate::io::read_fit_json(&args.fit)?;
    let plot = crate::plot::render_ascii_plot_from_fit_file(&fit, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        strategy: if args.odr {
            FitStrategy::OrthogonalDistance
        } else {
            FitStrategy::LeastSquares
        },
        fit_scaling: !args.fixed_scale,
        use_errors: args.use_errors,
        x_sigma_decades: args.x_sigma,
        max_iterations: args.max_iter,
        tolerance: args.tol,
        grid_steps: args.grid_steps,
        grid_span_decades: args.grid_span,
    }
}
