//! One-page PDF report.
//!
//! The page layout is fixed: title, static prose, the GPU environment
//! section, an optional test verification section and the timing chart.
//! Every input is optional; a missing one shrinks the page instead of
//! failing it.

use crate::artifact;
use crate::config::ArtifactPaths;
use crate::error::{PipelineError, Result};
use crate::metadata;
use crate::schema::DeviceMetadata;
use log::{debug, warn};
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::image_crate::ImageDecoder;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const REPORT_TITLE: &str = "GPU Vector Addition Performance Report";

const DESCRIPTION: &str = "Experiment: CPU vs GPU vector addition using Rust (CPU) and wgpu (GPU)";
const OBSERVATION: &str =
    "Observation: GPU acceleration does not outperform CPU for moderate vector sizes.";
const REASON: &str =
    "Reason: kernel launch overhead and host-device memory transfer dominate computation.";
const CONCLUSION: &str =
    "Conclusion: GPUs provide benefits when workload size is large enough to amortize overhead.";

pub const METADATA_MISSING: &str = "  GPU metadata not available.";
pub const CPU_FALLBACK: &str = "  GPU not available. CPU fallback used.";

// A4, millimetres.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_X: f32 = 20.0;
const TITLE_Y: f32 = PAGE_HEIGHT - 20.0;
const BODY_TOP_Y: f32 = PAGE_HEIGHT - 35.0;
const LINE_HEIGHT: f32 = 4.7;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 11.0;
const FIGURE_X: f32 = 20.0;
const FIGURE_Y: f32 = 30.0;
const FIGURE_WIDTH: f32 = 170.0;
/// Space kept between the last text line and the top of the figure.
const FIGURE_GAP: f32 = 5.0;
const MIN_FIGURE_HEIGHT: f32 = 20.0;

/// Outcome of the external test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed,
    /// The runner itself could not be started.
    NotRun(String),
}

/// Source of the test verification line.
pub trait TestStatusProvider {
    fn test_status(&self) -> TestStatus;
}

/// Runs a program and maps its exit code: 0 passes, anything else fails.
#[derive(Debug, Clone)]
pub struct CommandTestStatus {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandTestStatus {
    /// `program arg...` from a configured command line.
    pub fn from_command_line(cmd: &[String]) -> Option<Self> {
        let (program, args) = cmd.split_first()?;
        Some(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
        })
    }

    /// This executable's `check` subcommand pointed at `paths`.
    pub fn self_check(paths: &ArtifactPaths) -> std::io::Result<Self> {
        let program = std::env::current_exe()?;
        let mut args = Vec::new();
        for (flag, path) in [
            ("--results", &paths.results),
            ("--metadata", &paths.metadata),
            ("--chart", &paths.chart),
        ] {
            args.push(flag.to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        args.push("check".to_string());
        Ok(Self { program, args })
    }
}

impl TestStatusProvider for CommandTestStatus {
    fn test_status(&self) -> TestStatus {
        debug!("running test command: {} {:?}", self.program.display(), self.args);
        match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => TestStatus::Passed,
            Ok(_) => TestStatus::Failed,
            Err(e) => TestStatus::NotRun(e.to_string()),
        }
    }
}

/// Page content, independent of the PDF backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub lines: Vec<String>,
    /// Chart to embed; `None` when the image file does not exist.
    pub figure: Option<PathBuf>,
}

/// The "GPU Environment" section body for an optional metadata record.
pub fn environment_lines(meta: Option<&DeviceMetadata>) -> Vec<String> {
    let Some(meta) = meta else {
        return vec![METADATA_MISSING.to_string()];
    };
    if !meta.available {
        return vec![CPU_FALLBACK.to_string()];
    }
    let unknown = || "Unknown".to_string();
    vec![
        format!(
            "  GPU Device: {}",
            meta.device_name.clone().unwrap_or_else(unknown)
        ),
        format!(
            "  GPU Memory: {}",
            meta.memory_megabytes
                .map(|mb| format!("{mb} MB"))
                .unwrap_or_else(unknown)
        ),
        format!(
            "  Runtime Version: {}",
            meta.runtime_version.clone().unwrap_or_else(unknown)
        ),
        format!(
            "  Library Version: {}",
            meta.library_version.clone().unwrap_or_else(unknown)
        ),
    ]
}

/// The "Unit Test Verification" section body.
pub fn test_status_lines(status: &TestStatus) -> Vec<String> {
    match status {
        TestStatus::Passed => vec!["  All acceptance checks passed.".to_string()],
        TestStatus::Failed => vec![
            "  Some acceptance checks failed.".to_string(),
            "  See the check output for details.".to_string(),
        ],
        TestStatus::NotRun(reason) => vec![format!("  Could not run acceptance checks: {reason}")],
    }
}

/// Metadata for the report; unreadable files count as missing.
fn load_metadata(path: &Path) -> Option<DeviceMetadata> {
    if !path.exists() {
        debug!("no metadata at {}", path.display());
        return None;
    }
    match metadata::read_metadata(path) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!("ignoring unreadable metadata: {e}");
            None
        }
    }
}

impl ReportDocument {
    pub fn assemble(
        metadata_path: &Path,
        chart_path: &Path,
        tests: Option<&dyn TestStatusProvider>,
    ) -> Self {
        let mut lines = vec![
            DESCRIPTION.to_string(),
            String::new(),
            OBSERVATION.to_string(),
            REASON.to_string(),
            String::new(),
            CONCLUSION.to_string(),
            String::new(),
            "GPU Environment:".to_string(),
        ];
        lines.extend(environment_lines(load_metadata(metadata_path).as_ref()));

        if let Some(provider) = tests {
            lines.push(String::new());
            lines.push("Unit Test Verification:".to_string());
            lines.extend(test_status_lines(&provider.test_status()));
        }

        let figure = chart_path.exists().then(|| chart_path.to_path_buf());
        if figure.is_none() {
            debug!("no chart at {}", chart_path.display());
        }

        Self {
            title: REPORT_TITLE.to_string(),
            lines,
            figure,
        }
    }

    /// Lines of the environment section, for callers that want to echo it.
    pub fn environment_section(&self) -> &[String] {
        let start = self
            .lines
            .iter()
            .position(|l| l == "GPU Environment:")
            .map(|i| i + 1)
            .unwrap_or(self.lines.len());
        let end = self.lines[start..]
            .iter()
            .position(|l| !l.starts_with("  "))
            .map(|i| start + i)
            .unwrap_or(self.lines.len());
        &self.lines[start..end]
    }

    /// Renders the page, replacing `path`.
    pub fn write_pdf(&self, path: &Path) -> Result<()> {
        let (doc, page, layer) =
            PdfDocument::new(self.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;

        layer.use_text(self.title.as_str(), TITLE_SIZE, Mm(MARGIN_X), Mm(TITLE_Y), &bold);
        let mut y = BODY_TOP_Y;
        for line in &self.lines {
            if !line.is_empty() {
                layer.use_text(line.as_str(), BODY_SIZE, Mm(MARGIN_X), Mm(y), &regular);
            }
            y -= LINE_HEIGHT;
        }

        if let Some(figure) = &self.figure {
            match load_figure(figure) {
                Ok((image, width_px, height_px)) => {
                    let dpi = figure_dpi(width_px, height_px, self.figure_max_height());
                    image.add_to_layer(
                        layer.clone(),
                        ImageTransform {
                            translate_x: Some(Mm(FIGURE_X)),
                            translate_y: Some(Mm(FIGURE_Y)),
                            dpi: Some(dpi),
                            ..Default::default()
                        },
                    );
                }
                Err(e) => warn!("skipping chart {}: {e}", figure.display()),
            }
        }

        let mut staged = artifact::staging_file(path)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            doc.save(&mut writer).map_err(pdf_err)?;
        }
        artifact::commit(staged, path)
    }
}

impl ReportDocument {
    /// Height between the figure's bottom edge and the end of the text block.
    fn figure_max_height(&self) -> f32 {
        let text_bottom = BODY_TOP_Y - self.lines.len() as f32 * LINE_HEIGHT;
        (text_bottom - FIGURE_GAP - FIGURE_Y).max(MIN_FIGURE_HEIGHT)
    }
}

/// DPI that fits a `width_px` x `height_px` image into FIGURE_WIDTH by
/// `max_height` millimetres, keeping its aspect ratio.
fn figure_dpi(width_px: u32, height_px: u32, max_height: f32) -> f32 {
    let by_width = width_px as f32 * 25.4 / FIGURE_WIDTH;
    let by_height = height_px as f32 * 25.4 / max_height;
    by_width.max(by_height)
}

fn pdf_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Pdf(e.to_string())
}

/// Decodes a PNG for embedding; returns the image and its pixel size.
fn load_figure(path: &Path) -> std::result::Result<(Image, u32, u32), String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let decoder = PngDecoder::new(file).map_err(|e| e.to_string())?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }
    let image = Image::try_from(decoder).map_err(|e| e.to_string())?;
    Ok((image, width, height))
}

/// Assembles the report from the artifacts in `paths` and writes the PDF.
pub fn generate(
    paths: &ArtifactPaths,
    tests: Option<&dyn TestStatusProvider>,
) -> Result<ReportDocument> {
    let doc = ReportDocument::assemble(&paths.metadata, &paths.chart, tests);
    doc.write_pdf(&paths.report)?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartConfig;
    use crate::plot;
    use crate::schema::{DeviceInfo, TimingRecord};
    use std::fs;
    use tempfile::tempdir;

    /// True if the PDF has an image XObject (`/Subtype /Image`, any spacing).
    fn has_image_xobject(pdf: &[u8]) -> bool {
        let key = b"/Subtype";
        pdf.windows(key.len())
            .enumerate()
            .filter(|(_, w)| *w == key)
            .any(|(i, _)| {
                let rest = &pdf[i + key.len()..];
                let start = rest
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(rest.len());
                rest[start..].starts_with(b"/Image")
            })
    }

    struct Fixed(TestStatus);

    impl TestStatusProvider for Fixed {
        fn test_status(&self) -> TestStatus {
            self.0.clone()
        }
    }

    #[test]
    fn test_missing_metadata_reads_not_available() {
        let dir = tempdir().unwrap();
        let doc = ReportDocument::assemble(
            &dir.path().join("missing.json"),
            &dir.path().join("missing.png"),
            None,
        );
        assert_eq!(doc.environment_section(), [METADATA_MISSING.to_string()]);
        assert!(doc.figure.is_none());
        assert!(!doc.lines.iter().any(|l| l.contains("Unit Test")));
    }

    #[test]
    fn test_unavailable_gpu_reads_cpu_fallback() {
        let lines = environment_lines(Some(&DeviceMetadata::unavailable("none")));
        assert_eq!(lines, vec![CPU_FALLBACK.to_string()]);
    }

    #[test]
    fn test_available_gpu_lists_memory() {
        let meta = DeviceMetadata::from_device(DeviceInfo {
            name: "Test GPU".into(),
            memory_bytes: Some(8192 * 1024 * 1024),
            runtime_version: Some("12.2".into()),
            library_version: None,
        });
        let lines = environment_lines(Some(&meta));
        assert_eq!(lines[0], "  GPU Device: Test GPU");
        assert_eq!(lines[1], "  GPU Memory: 8192 MB");
        assert_eq!(lines[3], "  Library Version: Unknown");
    }

    #[test]
    fn test_unreadable_metadata_degrades() {
        let dir = tempdir().unwrap();
        let meta_path = dir.path().join("gpu_metadata.json");
        fs::write(&meta_path, "{ not json").unwrap();
        let doc = ReportDocument::assemble(&meta_path, &dir.path().join("none.png"), None);
        assert_eq!(doc.environment_section(), [METADATA_MISSING.to_string()]);
    }

    #[test]
    fn test_status_section_variants() {
        let dir = tempdir().unwrap();
        let meta = dir.path().join("m.json");
        let chart = dir.path().join("c.png");

        let passed = ReportDocument::assemble(&meta, &chart, Some(&Fixed(TestStatus::Passed)));
        assert!(passed.lines.contains(&"  All acceptance checks passed.".to_string()));

        let failed = ReportDocument::assemble(&meta, &chart, Some(&Fixed(TestStatus::Failed)));
        assert!(failed.lines.contains(&"  Some acceptance checks failed.".to_string()));

        let not_run = ReportDocument::assemble(
            &meta,
            &chart,
            Some(&Fixed(TestStatus::NotRun("no such file".into()))),
        );
        assert!(not_run
            .lines
            .iter()
            .any(|l| l.contains("Could not run acceptance checks: no such file")));
    }

    #[test]
    fn test_command_status_maps_spawn_failure() {
        let provider = CommandTestStatus {
            program: PathBuf::from("/definitely/not/a/program"),
            args: vec![],
        };
        assert!(matches!(provider.test_status(), TestStatus::NotRun(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_status_maps_exit_code() {
        let pass = CommandTestStatus::from_command_line(&["true".into()]).unwrap();
        assert_eq!(pass.test_status(), TestStatus::Passed);

        let fail = CommandTestStatus::from_command_line(&["false".into()]).unwrap();
        assert_eq!(fail.test_status(), TestStatus::Failed);
    }

    #[test]
    fn test_command_line_parsing() {
        assert!(CommandTestStatus::from_command_line(&[]).is_none());
        let cmd = CommandTestStatus::from_command_line(&["cargo".into(), "test".into()]).unwrap();
        assert_eq!(cmd.program, PathBuf::from("cargo"));
        assert_eq!(cmd.args, vec!["test".to_string()]);
    }

    #[test]
    fn test_pdf_written_without_figure() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::under(dir.path());

        let doc = generate(&paths, None).unwrap();
        assert!(doc.figure.is_none());

        let bytes = fs::read(&paths.report).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!has_image_xobject(&bytes));
    }

    #[test]
    fn test_chart_is_embedded_in_pdf() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::under(dir.path());
        let spec = plot::ChartSpec::from_records(&[
            TimingRecord {
                size: 1_000,
                cpu_seconds: 0.001,
                accelerator_seconds: Some(0.002),
            },
            TimingRecord {
                size: 2_000,
                cpu_seconds: 0.002,
                accelerator_seconds: Some(0.0025),
            },
        ]);
        let cfg = ChartConfig {
            width: 200,
            height: 150,
            font: None,
        };
        plot::render_png(&spec, &paths.chart, &cfg).unwrap();

        let doc = generate(&paths, None).unwrap();
        assert_eq!(doc.figure.as_deref(), Some(paths.chart.as_path()));
        assert!(has_image_xobject(&fs::read(&paths.report).unwrap()));
    }

    #[test]
    fn test_figure_dpi_keeps_page_layout() {
        // A landscape chart is limited by the page width.
        let wide = figure_dpi(800, 600, 150.0);
        assert!((800.0 * 25.4 / wide - FIGURE_WIDTH).abs() < 1e-3);

        // A tall chart is limited by the space under the text.
        let tall = figure_dpi(800, 2000, 150.0);
        assert!((2000.0 * 25.4 / tall - 150.0).abs() < 1e-3);
        assert!(800.0 * 25.4 / tall <= FIGURE_WIDTH);
    }

    #[test]
    fn test_figure_stays_below_text() {
        let dir = tempdir().unwrap();
        let doc = ReportDocument::assemble(
            &dir.path().join("m.json"),
            &dir.path().join("c.png"),
            Some(&Fixed(TestStatus::Failed)),
        );
        let text_bottom = BODY_TOP_Y - doc.lines.len() as f32 * LINE_HEIGHT;
        assert!(FIGURE_Y + doc.figure_max_height() <= text_bottom);
    }

    #[test]
    fn test_undecodable_figure_is_skipped() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::under(dir.path());
        fs::create_dir_all(paths.chart.parent().unwrap()).unwrap();
        fs::write(&paths.chart, b"not a png").unwrap();

        let doc = generate(&paths, None).unwrap();
        assert!(doc.figure.is_some());
        let bytes = fs::read(&paths.report).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!has_image_xobject(&bytes));
    }
}
