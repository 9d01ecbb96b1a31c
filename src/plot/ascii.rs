//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! The x axis is `log10(L_total)`; samples at `L_total = 0` are pinned to the
//! left edge.
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line

use crate::domain::{FitFile, FitGrid, SampleResidual};

/// Plot normalized observations against the fitted grid.
pub fn render_ascii_plot(residuals: &[SampleResidual], grid: &FitGrid, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = residuals.iter().map(|r| (r.l_total, r.y_norm)).collect();
    let curve: Vec<(f64, f64)> = grid.l_total.iter().copied().zip(grid.y_fit.iter().copied()).collect();
    render_xy_plot(&points, &curve, width, height)
}

/// Replot a saved fit.
pub fn render_ascii_plot_from_fit_file(fit: &FitFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = fit
        .data
        .l_total
        .iter()
        .copied()
        .zip(fit.data.y_norm.iter().copied())
        .collect();
    let curve: Vec<(f64, f64)> = fit
        .grid
        .l_total
        .iter()
        .copied()
        .zip(fit.grid.y_fit.iter().copied())
        .collect();
    render_xy_plot(&points, &curve, width, height)
}

/// Plot `(L_total, y)` points and a curve on a log ligand axis.
pub fn render_xy_plot(points: &[(f64, f64)], curve: &[(f64, f64)], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = log_x_range(points.iter().chain(curve)).unwrap_or((-3.0, 3.0));
    let (y_min, y_max) = y_range(points.iter().chain(curve)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so points overlay it.
    draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);

    for &(l, y) in points {
        if !y.is_finite() {
            continue;
        }
        let x = map_x(log_x(l, x_min), x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = 'o';
    }

    let mut out = format!(
        "Plot: log10(L_total)=[{x_min:.3}, {x_max:.3}] | y=[{y_min:.3}, {y_max:.3}]\n"
    );
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn log_x(l: f64, floor: f64) -> f64 {
    if l > 0.0 { l.log10() } else { floor }
}

fn log_x_range<'a>(xy: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64)> {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    for &(l, _) in xy {
        if l > 0.0 && l.is_finite() {
            min_x = min_x.min(l.log10());
            max_x = max_x.max(l.log10());
        }
    }
    if !(min_x.is_finite() && max_x.is_finite()) {
        return None;
    }
    if max_x > min_x {
        Some((min_x, max_x))
    } else {
        Some((min_x - 0.5, max_x + 0.5))
    }
}

fn y_range<'a>(xy: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in xy {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y max is row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(l, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(log_x(l, x_min), x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, row, '-');
        } else {
            grid[row][x] = '-';
        }
        prev = Some((x, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
