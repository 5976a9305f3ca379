use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;
use std::process::ExitCode;
use vector_add_perf::accel::Capability;
use vector_add_perf::config::PipelineConfig;
use vector_add_perf::report::{CommandTestStatus, ReportDocument, TestStatusProvider};
use vector_add_perf::{checks, harness, metadata, pipeline, plot, report, AcceleratorMode};

#[derive(Subcommand, Debug)]
enum Command {
    /// Time CPU and accelerator vector addition and write the result table.
    Bench,

    /// Probe the accelerator and write the device metadata record.
    GpuInfo,

    /// Render the result table as a chart.
    Plot,

    /// Assemble the PDF report from metadata and chart.
    Report {
        /// Leave out the unit test verification section.
        #[arg(long, default_value_t = false)]
        skip_checks: bool,
    },

    /// Check that the artifacts exist and have the expected shape (JSON output).
    Check,

    /// bench, gpu-info, plot and report in order.
    All {
        #[arg(long, default_value_t = false)]
        skip_checks: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "vector-add-perf")]
#[command(about = "CPU vs GPU vector addition benchmark and report pipeline")]
struct Args {
    /// TOML configuration file; command-line flags take precedence.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_name = "PATH", global = true)]
    results: Option<PathBuf>,

    #[arg(long, value_name = "PATH", global = true)]
    metadata: Option<PathBuf>,

    #[arg(long, value_name = "PATH", global = true)]
    chart: Option<PathBuf>,

    #[arg(long, value_name = "PATH", global = true)]
    report: Option<PathBuf>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, value_enum, global = true)]
    accelerator: Option<AcceleratorMode>,

    /// Where `check` writes its JSON outcomes. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

impl Args {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(p) = &self.results {
            cfg.paths.results = p.clone();
        }
        if let Some(p) = &self.metadata {
            cfg.paths.metadata = p.clone();
        }
        if let Some(p) = &self.chart {
            cfg.paths.chart = p.clone();
        }
        if let Some(p) = &self.report {
            cfg.paths.report = p.clone();
        }
        if let Some(seed) = self.seed {
            cfg.benchmark.seed = seed;
        }
        if let Some(mode) = self.accelerator {
            cfg.benchmark.accelerator = mode;
        }
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

fn test_provider(cfg: &PipelineConfig, skip: bool) -> anyhow::Result<Option<CommandTestStatus>> {
    if skip || !cfg.report.run_checks {
        return Ok(None);
    }
    let provider = match &cfg.report.check_command {
        Some(cmd) => CommandTestStatus::from_command_line(cmd),
        None => Some(
            CommandTestStatus::self_check(&cfg.paths).context("locating the current executable")?,
        ),
    };
    Ok(provider)
}

fn print_environment(doc: &ReportDocument) {
    println!("GPU Environment:");
    for line in doc.environment_section() {
        println!("{line}");
    }
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = args.pipeline_config()?;
    let paths = &cfg.paths;

    match &args.cmd {
        Command::Bench => {
            let capability = Capability::probe(cfg.benchmark.accelerator);
            harness::run_and_write(&cfg.benchmark, &capability, &paths.results)
                .context("benchmark failed")?;
            println!("Benchmark completed. Results saved to {}", paths.results.display());
        }
        Command::GpuInfo => {
            let capability = Capability::probe(cfg.benchmark.accelerator);
            metadata::collect_and_write(&capability, &paths.metadata)
                .context("writing GPU metadata")?;
            println!("GPU metadata written to {}", paths.metadata.display());
        }
        Command::Plot => {
            plot::plot(&paths.results, &paths.chart, &cfg.chart).context("plotting results")?;
            println!("Plot saved to {}", paths.chart.display());
        }
        Command::Report { skip_checks } => {
            let provider = test_provider(&cfg, *skip_checks)?;
            let doc = report::generate(
                paths,
                provider.as_ref().map(|p| p as &dyn TestStatusProvider),
            )
            .context("generating report")?;
            print_environment(&doc);
            println!("PDF report generated: {}", paths.report.display());
        }
        Command::Check => {
            let outcomes = checks::run_checks(paths);
            for o in &outcomes {
                let status = if o.passed { "PASS" } else { "FAIL" };
                eprintln!("{status} {}: {}", o.name, o.detail);
            }
            if let Some(out) = &args.out {
                checks::write_outcomes(out, &outcomes)
                    .with_context(|| format!("writing {}", out.display()))?;
            } else {
                println!("{}", checks::encode(&outcomes)?);
            }
            if !checks::all_passed(&outcomes) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::All { skip_checks } => {
            let capability = Capability::probe(cfg.benchmark.accelerator);
            let provider = test_provider(&cfg, *skip_checks)?;
            let run = pipeline::run_all(
                &cfg,
                &capability,
                provider.as_ref().map(|p| p as &dyn TestStatusProvider),
            )
            .context("pipeline failed")?;
            println!("Benchmark completed. Results saved to {}", paths.results.display());
            println!("GPU metadata written to {}", paths.metadata.display());
            println!("Plot saved to {}", paths.chart.display());
            print_environment(&run.report);
            println!("PDF report generated: {}", paths.report.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
