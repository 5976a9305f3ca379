//! Runs every stage in order against one configuration.

use crate::accel::Capability;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::plot::ChartSpec;
use crate::report::{ReportDocument, TestStatusProvider};
use crate::schema::{DeviceMetadata, TimingRecord};
use crate::{harness, metadata, plot, report};
use log::info;

/// What each stage produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub records: Vec<TimingRecord>,
    pub metadata: DeviceMetadata,
    pub chart: ChartSpec,
    pub report: ReportDocument,
}

/// bench, gpu-info, plot, report. The first fatal error stops the run;
/// artifacts written by earlier stages stay in place.
pub fn run_all(
    cfg: &PipelineConfig,
    capability: &Capability,
    tests: Option<&dyn TestStatusProvider>,
) -> Result<PipelineRun> {
    let paths = &cfg.paths;

    info!("stage: bench");
    let records = harness::run_and_write(&cfg.benchmark, capability, &paths.results)?;

    info!("stage: gpu-info");
    let metadata = metadata::collect_and_write(capability, &paths.metadata)?;

    info!("stage: plot");
    let chart = plot::plot(&paths.results, &paths.chart, &cfg.chart)?;

    info!("stage: report");
    let report = report::generate(paths, tests)?;

    Ok(PipelineRun {
        records,
        metadata,
        chart,
        report,
    })
}
