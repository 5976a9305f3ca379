use std::hint::black_box;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::accel::{Accelerator, Capability};
use crate::config::BenchmarkConfig;
use crate::dataset;
use crate::error::{PipelineError, Result};
use crate::results;
use crate::schema::TimingRecord;

#[derive(Clone, Debug)]
pub struct Measured<T> {
    pub value: T,
    pub elapsed: Duration,
}

/// Times a single call of `f`. No warm-up, no repetition.
pub fn measure_once<T>(f: impl FnOnce() -> T) -> Measured<T> {
    let start = Instant::now();
    let value = black_box(f());
    let elapsed = start.elapsed();
    Measured { value, elapsed }
}

/// Elementwise `a + b` into a freshly allocated vector.
pub fn add_cpu(a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
    let mut out: Vec<f32> = Vec::new();
    out.try_reserve_exact(a.len())
        .map_err(|_| PipelineError::Allocation { len: a.len() })?;
    out.extend(a.iter().zip(b).map(|(x, y)| x + y));
    Ok(out)
}

/// Measures every configured size on the CPU and, when given, the accelerator.
///
/// Accelerator values are all-or-nothing for a run: if the device fails at
/// any size, the values already collected are dropped and the device is not
/// used again, so the table never mixes measured and absent entries.
pub fn run(cfg: &BenchmarkConfig, accelerator: Option<&dyn Accelerator>) -> Result<Vec<TimingRecord>> {
    let mut accelerator = accelerator;
    let mut records: Vec<TimingRecord> = Vec::with_capacity(cfg.sizes.len());

    for &size in &cfg.sizes {
        let (a, b) = dataset::generate_inputs(size, cfg.seed)?;

        let cpu = measure_once(|| add_cpu(&a, &b));
        cpu.value?;
        let cpu_seconds = cpu.elapsed.as_secs_f64();

        let mut accelerator_seconds = None;
        if let Some(acc) = accelerator {
            match acc.timed_add(&a, &b) {
                Ok(elapsed) => accelerator_seconds = Some(elapsed.as_secs_f64()),
                Err(e) => {
                    warn!("accelerator failed at size {size}: {e}; recording the run as CPU-only");
                    accelerator = None;
                    for r in records.iter_mut() {
                        r.accelerator_seconds = None;
                    }
                }
            }
        }

        info!(
            "size {size}: cpu {cpu_seconds:.6}s, accelerator {}",
            accelerator_seconds
                .map(|s| format!("{s:.6}s"))
                .unwrap_or_else(|| results::ABSENT_MARKER.to_string())
        );
        records.push(TimingRecord {
            size,
            cpu_seconds,
            accelerator_seconds,
        });
    }

    Ok(records)
}

/// Runs the harness and replaces the result table at `path`.
///
/// Nothing is written unless every size was measured. An accelerator that
/// cannot identify itself is not timed.
pub fn run_and_write(
    cfg: &BenchmarkConfig,
    capability: &Capability,
    path: &Path,
) -> Result<Vec<TimingRecord>> {
    let records = run(cfg, capability.identified_accelerator())?;
    results::write_results(path, &records)?;
    Ok(records)
}
