use std::cell::Cell;
use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use vector_add_perf::accel::{Accelerator, AcceleratorError, Capability};
use vector_add_perf::checks;
use vector_add_perf::config::{ArtifactPaths, PipelineConfig, DEFAULT_SIZES};
use vector_add_perf::pipeline::run_all;
use vector_add_perf::report::{TestStatus, TestStatusProvider, CPU_FALLBACK};
use vector_add_perf::results;
use vector_add_perf::schema::DeviceInfo;

/// In-process device: adds on the host and reports a fixed duration.
struct FakeAccelerator {
    calls: Cell<usize>,
    fail_on_call: Option<usize>,
}

impl FakeAccelerator {
    fn healthy() -> Self {
        Self {
            calls: Cell::new(0),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: Cell::new(0),
            fail_on_call: Some(call),
        }
    }
}

impl Accelerator for FakeAccelerator {
    fn device_info(&self) -> Result<DeviceInfo, AcceleratorError> {
        Ok(DeviceInfo {
            name: "Fake GPU".to_string(),
            memory_bytes: Some(8192 * 1024 * 1024),
            runtime_version: Some("12.2".to_string()),
            library_version: Some("550.54.14".to_string()),
        })
    }

    fn timed_add(&self, a: &[f32], b: &[f32]) -> Result<Duration, AcceleratorError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on_call == Some(call) {
            return Err(AcceleratorError::Execution("device lost".to_string()));
        }
        let sum: f32 = a.iter().zip(b).map(|(x, y)| x + y).sum();
        assert!(sum.is_finite());
        Ok(Duration::from_micros(a.len() as u64 / 10 + 1))
    }
}

/// Runs the addition but cannot say what it is.
struct UnnamedAccelerator;

impl Accelerator for UnnamedAccelerator {
    fn device_info(&self) -> Result<DeviceInfo, AcceleratorError> {
        Err(AcceleratorError::Query("no device attributes".to_string()))
    }

    fn timed_add(&self, _a: &[f32], _b: &[f32]) -> Result<Duration, AcceleratorError> {
        Ok(Duration::from_micros(3))
    }
}

struct FixedStatus(TestStatus);

impl TestStatusProvider for FixedStatus {
    fn test_status(&self) -> TestStatus {
        self.0.clone()
    }
}

fn small_config(dir: &std::path::Path) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        paths: ArtifactPaths::under(dir),
        ..Default::default()
    };
    cfg.benchmark.sizes = vec![1_000, 5_000, 10_000];
    cfg.chart.width = 320;
    cfg.chart.height = 240;
    cfg
}

#[test]
fn test_cpu_only_pipeline_at_default_sizes() {
    let dir = tempdir().unwrap();
    let mut cfg = small_config(dir.path());
    cfg.benchmark.sizes = DEFAULT_SIZES.to_vec();
    let capability = Capability::Unavailable("no accelerator in test".to_string());
    let status = FixedStatus(TestStatus::Passed);

    let run = run_all(&cfg, &capability, Some(&status)).unwrap();

    let table = results::read_results(&cfg.paths.results).unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.iter().all(|r| r.accelerator_seconds.is_none()));
    assert!(table.iter().all(|r| r.cpu_seconds >= 0.0));
    let text = fs::read_to_string(&cfg.paths.results).unwrap();
    assert_eq!(text.matches(results::ABSENT_MARKER).count(), 3);

    let meta: serde_json::Value =
        serde_json::from_slice(&fs::read(&cfg.paths.metadata).unwrap()).unwrap();
    assert_eq!(meta["available"], serde_json::Value::Bool(false));
    assert!(meta.get("device_name").is_none());

    assert_eq!(run.chart.series.len(), 1);
    assert!(run.report.lines.contains(&CPU_FALLBACK.to_string()));
    assert!(run
        .report
        .lines
        .contains(&"  All acceptance checks passed.".to_string()));
    assert!(fs::read(&cfg.paths.report).unwrap().starts_with(b"%PDF"));

    let outcomes = checks::run_checks(&cfg.paths);
    assert!(checks::all_passed(&outcomes), "{outcomes:?}");
}

#[test]
fn test_accelerated_pipeline() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path());
    let capability = Capability::Available(Box::new(FakeAccelerator::healthy()));

    let run = run_all(&cfg, &capability, None).unwrap();

    assert!(run.records.iter().all(|r| r.accelerator_seconds.is_some()));
    assert!(run.metadata.available);
    assert_eq!(run.metadata.memory_megabytes, Some(8192));
    assert_eq!(run.chart.series.len(), 2);
    assert!(run
        .report
        .environment_section()
        .contains(&"  GPU Memory: 8192 MB".to_string()));

    let meta: serde_json::Value =
        serde_json::from_slice(&fs::read(&cfg.paths.metadata).unwrap()).unwrap();
    assert_eq!(meta["device_name"], "Fake GPU");
    assert_eq!(meta["memory_megabytes"], 8192);

    assert!(checks::all_passed(&checks::run_checks(&cfg.paths)));
}

#[test]
fn test_metadata_is_idempotent() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path());

    let first_cap = Capability::Available(Box::new(FakeAccelerator::healthy()));
    run_all(&cfg, &first_cap, None).unwrap();
    let first = fs::read(&cfg.paths.metadata).unwrap();

    let second_cap = Capability::Available(Box::new(FakeAccelerator::healthy()));
    run_all(&cfg, &second_cap, None).unwrap();
    let second = fs::read(&cfg.paths.metadata).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_mid_run_failure_drops_accelerator_column() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path());
    let capability = Capability::Available(Box::new(FakeAccelerator::failing_on(1)));

    let run = run_all(&cfg, &capability, None).unwrap();

    assert_eq!(run.records.len(), 3);
    assert!(run.records.iter().all(|r| r.accelerator_seconds.is_none()));
    assert_eq!(run.chart.series.len(), 1);
}

#[test]
fn test_rerun_replaces_previous_table() {
    let dir = tempdir().unwrap();
    let mut cfg = small_config(dir.path());
    let capability = Capability::Unavailable("off".to_string());

    run_all(&cfg, &capability, None).unwrap();
    cfg.benchmark.sizes = vec![2_000];
    run_all(&cfg, &capability, None).unwrap();

    let table = results::read_results(&cfg.paths.results).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].size, 2_000);
}

#[test]
fn test_unidentified_accelerator_keeps_artifacts_consistent() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path());
    let capability = Capability::Available(Box::new(UnnamedAccelerator));

    let run = run_all(&cfg, &capability, None).unwrap();

    assert!(!run.metadata.available);
    assert!(run.records.iter().all(|r| r.accelerator_seconds.is_none()));
    assert_eq!(run.chart.series.len(), 1);
    assert_eq!(run.report.environment_section(), [CPU_FALLBACK.to_string()]);
}
