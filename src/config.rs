//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once at process start (defaults, then an
//! optional TOML file, then command-line overrides) and handed to every
//! stage. Stages never consult global path state.
//!
//! ```toml
//! [paths]
//! results = "performance/performance_results.txt"
//! metadata = "performance/gpu_metadata.json"
//! chart = "reports/figures/vector_add_performance.png"
//! report = "reports/performance_report.pdf"
//!
//! [benchmark]
//! sizes = [1000000, 5000000, 10000000]
//! seed = 0
//! accelerator = "auto"
//!
//! [chart]
//! width = 800
//! height = 600
//!
//! [report]
//! run_checks = true
//! ```

use crate::error::{PipelineError, Result};
use crate::AcceleratorMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default problem sizes, in elements.
pub const DEFAULT_SIZES: [usize; 3] = [1_000_000, 5_000_000, 10_000_000];

/// Root configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: ArtifactPaths,

    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Where each stage reads and writes its artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// Result table written by the timing harness.
    pub results: PathBuf,
    /// Device metadata record written by the collector.
    pub metadata: PathBuf,
    /// Chart image written by the plotter.
    pub chart: PathBuf,
    /// PDF written by the report assembler.
    pub report: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            results: PathBuf::from("performance/performance_results.txt"),
            metadata: PathBuf::from("performance/gpu_metadata.json"),
            chart: PathBuf::from("reports/figures/vector_add_performance.png"),
            report: PathBuf::from("reports/performance_report.pdf"),
        }
    }
}

impl ArtifactPaths {
    /// All artifacts rooted under `dir`, keeping the default layout.
    pub fn under(dir: &Path) -> Self {
        let d = Self::default();
        Self {
            results: dir.join(d.results),
            metadata: dir.join(d.metadata),
            chart: dir.join(d.chart),
            report: dir.join(d.report),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Strictly ascending vector lengths to time.
    pub sizes: Vec<usize>,
    /// Seed for the input vectors.
    pub seed: u64,
    pub accelerator: AcceleratorMode,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
            seed: 0,
            accelerator: AcceleratorMode::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    /// TrueType font for chart text. Common system locations are tried when unset.
    pub font: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Include the test verification section.
    pub run_checks: bool,
    /// Program and arguments reporting test status through its exit code.
    /// Defaults to this binary's own `check` subcommand.
    pub check_command: Option<Vec<String>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            run_checks: true,
            check_command: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Missing sections keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| PipelineError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = &self.benchmark.sizes;
        if sizes.is_empty() {
            return Err(PipelineError::config("benchmark.sizes must not be empty"));
        }
        if sizes.contains(&0) {
            return Err(PipelineError::config("benchmark.sizes must be positive"));
        }
        if sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::config(
                "benchmark.sizes must be strictly ascending",
            ));
        }
        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(PipelineError::config("chart dimensions must be non-zero"));
        }
        if let Some(cmd) = &self.report.check_command {
            if cmd.is_empty() || cmd[0].trim().is_empty() {
                return Err(PipelineError::config(
                    "report.check_command must name a program",
                ));
            }
        }
        Ok(())
    }
}
