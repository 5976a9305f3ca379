//! Timing chart rendering using plotters (PNG output).
//!
//! Text needs a TrueType font registered at runtime. When none can be found
//! the chart is still drawn (series, markers, grid) without any text.

use crate::artifact;
use crate::config::ChartConfig;
use crate::error::{PipelineError, Result};
use crate::results;
use crate::schema::TimingRecord;
use log::{debug, warn};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CHART_TITLE: &str = "CPU vs GPU Vector Addition Performance";
const FONT_FAMILY: &str = "sans-serif";

/// Font files tried when the configuration names none.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Which measurement a series plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Cpu,
    Accelerator,
}

impl SeriesKind {
    pub fn label(self) -> &'static str {
        match self {
            SeriesKind::Cpu => "CPU",
            SeriesKind::Accelerator => "GPU",
        }
    }

    fn color(self) -> RGBColor {
        match self {
            SeriesKind::Cpu => BLUE,
            SeriesKind::Accelerator => RED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub kind: SeriesKind,
    /// (vector size, seconds)
    pub points: Vec<(f64, f64)>,
}

/// Everything that gets drawn, derived deterministically from the records.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl ChartSpec {
    /// CPU series always; accelerator series only if any size has a value.
    pub fn from_records(records: &[TimingRecord]) -> Self {
        let cpu = Series {
            kind: SeriesKind::Cpu,
            points: records
                .iter()
                .map(|r| (r.size as f64, r.cpu_seconds))
                .collect(),
        };
        let accelerator_points: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| r.accelerator_seconds.map(|s| (r.size as f64, s)))
            .collect();

        let mut series = vec![cpu];
        if !accelerator_points.is_empty() {
            series.push(Series {
                kind: SeriesKind::Accelerator,
                points: accelerator_points,
            });
        }

        Self {
            title: CHART_TITLE.to_string(),
            x_label: "Vector Size".to_string(),
            y_label: "Time (seconds)".to_string(),
            series,
        }
    }

    fn x_range(&self) -> std::ops::Range<f64> {
        let (min, max) = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.0))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        if !min.is_finite() {
            return 0.0..1.0;
        }
        let pad = ((max - min) * 0.05).max(max.abs() * 0.05).max(1.0);
        (min - pad).max(0.0)..max + pad
    }

    fn y_range(&self) -> std::ops::Range<f64> {
        let max = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .fold(0.0f64, f64::max);
        if max > 0.0 {
            0.0..max * 1.1
        } else {
            0.0..1.0
        }
    }
}

fn chart_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Chart(e.to_string())
}

fn font_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

/// Registers a chart font once per process. The first call decides; later
/// calls return the same answer.
fn ensure_font(explicit: Option<&Path>) -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| {
        for path in font_candidates(explicit) {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps registered fonts for the life of the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                debug!("chart font: {}", path.display());
                return true;
            }
            debug!("unusable font file: {}", path.display());
        }
        warn!("no usable TrueType font found; rendering chart without text");
        false
    })
}

fn size_label(x: &f64) -> String {
    if *x >= 1_000_000.0 {
        format!("{:.1}M", x / 1_000_000.0)
    } else if *x >= 1_000.0 {
        format!("{:.0}k", x / 1_000.0)
    } else {
        format!("{x:.0}")
    }
}

fn seconds_label(y: &f64) -> String {
    format!("{y:.4}")
}

fn draw(spec: &ChartSpec, path: &Path, cfg: &ChartConfig, with_text: bool) -> Result<()> {
    let root = BitMapBackend::new(path, (cfg.width, cfg.height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if with_text {
        builder
            .caption(&spec.title, (FONT_FAMILY, 22))
            .x_label_area_size(50)
            .y_label_area_size(80);
    } else {
        // Zero-sized label areas are never created, so nothing asks for glyphs.
        builder.x_label_area_size(0).y_label_area_size(0);
    }
    let mut chart = builder
        .build_cartesian_2d(spec.x_range(), spec.y_range())
        .map_err(chart_err)?;

    let x_fmt = size_label;
    let y_fmt = seconds_label;
    let mut mesh = chart.configure_mesh();
    if with_text {
        mesh.x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt);
    } else {
        mesh.disable_x_axis()
            .disable_y_axis()
            .x_labels(0)
            .y_labels(0);
    }
    mesh.draw().map_err(chart_err)?;

    for series in &spec.series {
        let color = series.kind.color();
        let line = chart
            .draw_series(LineSeries::new(
                series.points.iter().copied(),
                color.stroke_width(2),
            ))
            .map_err(chart_err)?;
        if with_text {
            line.label(series.kind.label()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        }
        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
            )
            .map_err(chart_err)?;
    }

    if with_text {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT_FAMILY, 16))
            .draw()
            .map_err(chart_err)?;
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Renders `spec` as a PNG replacing `path`.
pub fn render_png(spec: &ChartSpec, path: &Path, cfg: &ChartConfig) -> Result<()> {
    let with_text = ensure_font(cfg.font.as_deref());
    let staged = artifact::staging_file(path)?;
    draw(spec, staged.path(), cfg, with_text)?;
    artifact::commit(staged, path)
}

/// Reads the result table at `results_path` and writes the chart to `chart_path`.
///
/// A missing or malformed table is an error and leaves any previous chart untouched.
pub fn plot(results_path: &Path, chart_path: &Path, cfg: &ChartConfig) -> Result<ChartSpec> {
    let records = results::read_results(results_path)?;
    let spec = ChartSpec::from_records(&records);
    render_png(&spec, chart_path, cfg)?;
    Ok(spec)
}
