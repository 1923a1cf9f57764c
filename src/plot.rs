//! Grouped bar chart of job completion times.
//!
//! One group per comparison point, one bar per series within each group. Charts are rendered as
//! SVG and written atomically to a timestamped file.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use plotters::{
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    results::{ComparisonPoint, Series},
    Error, Result,
};

const CHART_SIZE: (u32, u32) = (640, 480);
/// Fraction of each group's width covered by bars.
const GROUP_WIDTH: f64 = 0.6;
/// Pixels between a bar top and its value label.
const VALUE_LABEL_PADDING: i32 = 3;

/// Format `v` with 3 significant figures the way printf `%.3g` does.
pub fn format_sig3(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{v}");
    }
    let sci = format!("{v:.2e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };
    if !(-4..3).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        trim_fraction(&format!("{:.*}", (2 - exp) as usize, v)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Width of each bar and the offset of each bar center from its group center, for `n` series.
pub fn bar_layout(n: usize) -> (f64, Vec<f64>) {
    let width = GROUP_WIDTH / n as f64;
    let offsets = (0..n)
        .map(|i| width * (i as f64 * 2.0 + 1.0 - n as f64) / 2.0)
        .collect();
    (width, offsets)
}

/// Render the chart as an SVG document.
pub fn render_svg(series: &[Series], grid: &[ComparisonPoint]) -> Result<String> {
    if series.is_empty() || grid.is_empty() {
        return Err(Error::InvalidInput(
            "chart needs at least one series and one comparison point".to_string(),
        ));
    }
    if let Some(s) = series.iter().find(|s| s.jct.len() != grid.len()) {
        return Err(Error::InvalidInput(format!(
            "series {} has {} values for {} comparison points",
            s.label,
            s.jct.len(),
            grid.len()
        )));
    }

    let y_max = value_axis_max(series)?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        draw(&root, series, grid, y_max).map_err(|e| Error::Render(e.to_string()))?;
        root.present().map_err(|e| Error::Render(e.to_string()))?;
    }
    Ok(svg)
}

/// Upper bound of the value axis, leaving headroom above the tallest bar for its label.
fn value_axis_max(series: &[Series]) -> Result<f64> {
    if let Some(s) = series.iter().find(|s| s.jct.iter().any(|v| !v.is_finite())) {
        return Err(Error::Render(format!(
            "series {} has a value that is not finite",
            s.label
        )));
    }
    let max_jct = series
        .iter()
        .flat_map(|s| s.jct.iter().copied())
        .fold(0.0f64, f64::max);
    let y_max = if max_jct > 0.0 { max_jct * 1.15 } else { 1.0 };
    if y_max.is_finite() {
        Ok(y_max)
    } else {
        Err(Error::Render(format!(
            "largest value {max_jct} is out of range for the chart axis"
        )))
    }
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    series: &[Series],
    grid: &[ComparisonPoint],
    y_max: f64,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let groups = grid.len() as f64;

    let mut chart = ChartBuilder::on(root)
        .caption("Job Completion Times by K and L", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..groups - 0.5, 0f64..y_max)?;

    let group_label = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < grid.len() {
            grid[i as usize].to_string()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(grid.len() * 4)
        .x_label_formatter(&group_label)
        .x_desc("(K, L)")
        .y_desc("JCT/s")
        .draw()?;

    let (width, offsets) = bar_layout(series.len());
    let value_style = TextStyle::from(("sans-serif", 12).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    for (i, (s, offset)) in series.iter().zip(offsets).enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let bars = s.jct.iter().enumerate().map(|(g, jct)| {
            let center = g as f64 + offset;
            Rectangle::new(
                [(center - width / 2.0, 0.0), (center + width / 2.0, *jct)],
                color.filled(),
            )
        });
        chart
            .draw_series(bars)?
            .label(s.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

        chart.draw_series(s.jct.iter().enumerate().map(|(g, jct)| {
            EmptyElement::at((g as f64 + offset, *jct))
                + Text::new(
                    format_sig3(*jct),
                    (0, -VALUE_LABEL_PADDING),
                    value_style.clone(),
                )
        }))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Render the chart into a new timestamped SVG file in `output_dir` and return its path.
///
/// The file is only created once rendering has succeeded.
pub fn save_chart(
    series: &[Series],
    grid: &[ComparisonPoint],
    output_dir: &Path,
) -> Result<PathBuf> {
    let svg = render_svg(series, grid)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.6f");
    let path = output_dir.join(format!("{timestamp}.svg"));

    let mut tmp = NamedTempFile::new_in(output_dir)?;
    tmp.write_all(svg.as_bytes())?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
    info!("saved chart to {}", path.display());
    Ok(path)
}
