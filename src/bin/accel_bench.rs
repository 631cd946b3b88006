//! Accelerator throughput benchmark CLI.

use accel_bench::benchmarks::{
    BenchmarkError, BenchmarkResult, ConfigLoader, Environment, SuiteRunner, WorkloadKind,
};
use accel_bench::report;
use env_logger::Env;
use log::error;
use std::env;
use std::io::{self, Write};

const DEFAULT_CONFIG: &str = "configs/suite.json";

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        error!("Benchmark execution failed: {}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

struct Options {
    config_path: String,
    workloads: Vec<WorkloadKind>,
}

fn run() -> BenchmarkResult<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    let config = ConfigLoader::load_suite_config(&options.config_path)?;
    let env = Environment::detect(&config);
    print!("{}", report::header(&env.system));
    println!();

    let runner = SuiteRunner::new(env, config)?;
    let suite = runner.run_selected_with(&options.workloads, |event| {
        if let Some(text) = report::progress(&event) {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
    });

    print!("{}", report::final_report(&suite));
    Ok(())
}

/// `None` when the arguments only asked for informational output.
fn parse_args(args: &[String]) -> BenchmarkResult<Option<Options>> {
    let mut options = Options {
        config_path: DEFAULT_CONFIG.to_string(),
        workloads: WorkloadKind::ALL.to_vec(),
    };
    let mut selected = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list" => {
                list_workloads();
                return Ok(None);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--config" => {
                let path = iter.next().ok_or_else(|| missing_value(arg))?;
                options.config_path = path.clone();
            }
            "--workload" => {
                let name = iter.next().ok_or_else(|| missing_value(arg))?;
                selected.push(WorkloadKind::from_name(name)?);
            }
            name => selected.push(WorkloadKind::from_name(name)?),
        }
    }

    if !selected.is_empty() {
        options.workloads = selected;
    }
    Ok(Some(options))
}

fn missing_value(flag: &str) -> BenchmarkError {
    BenchmarkError::InvalidConfiguration {
        field: flag.to_string(),
        message: "Missing value; see --help".to_string(),
    }
}

fn list_workloads() {
    println!("Available workloads:");
    for kind in WorkloadKind::ALL {
        println!("  {:<10} - {}", kind.name(), kind.description());
    }
}

fn print_usage() {
    println!("Usage:");
    println!("  accel-bench                          # Run all workloads");
    println!("  accel-bench --list                   # List available workloads");
    println!("  accel-bench <workload>               # Run specific workloads");
    println!("  accel-bench --workload <workload>");
    println!("  accel-bench --config <path>          # Default: {}", DEFAULT_CONFIG);
    println!();
    list_workloads();
}
