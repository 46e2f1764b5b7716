//! Integration Test Harness
//!
//! Runs the codec test categories as separate `cargo test` targets and
//! reports a summary.
//!
//! ```text
//! cargo run -p integration-tests
//! cargo run -p integration-tests -- --category adversarial_tests
//! cargo run -p integration-tests -- --filter union
//! RUST_LOG=msrpc_ndr=trace cargo run -p integration-tests -- --verbose
//! ```

use std::process::{Command, ExitCode};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// (test target, summary)
const CATEGORIES: &[(&str, &str)] = &[
    (
        "codec_scenario_tests",
        "Generated-style records: pointers, arrays, unions, lists",
    ),
    ("adversarial_tests", "Oversized headers, truncation, noise"),
    ("concurrency_tests", "Independent encodes and decodes in parallel"),
];

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "NDR codec integration test harness")]
struct Args {
    /// Run only this category (test target name)
    #[arg(short, long)]
    category: Option<String>,

    /// Only run tests whose name contains this string
    #[arg(short, long)]
    filter: Option<String>,

    /// List categories and exit
    #[arg(short, long)]
    list: bool,

    /// Debug-level harness logging
    #[arg(short, long)]
    verbose: bool,
}

struct CategoryResult {
    target: &'static str,
    passed: bool,
    duration: Duration,
    detail: String,
}

fn run_category(target: &'static str, filter: Option<&str>) -> CategoryResult {
    let mut cmd = Command::new("cargo");
    cmd.args(["test", "-p", "integration-tests", "--test", target, "--"]);
    if let Some(filter) = filter {
        cmd.arg(filter);
    }
    debug!("Running {:?}", cmd);

    let start = Instant::now();
    let (passed, detail) = match cmd.status() {
        Ok(status) if status.success() => (true, "ok".to_string()),
        Ok(status) => (false, format!("exit code {:?}", status.code())),
        Err(e) => {
            error!("Failed to launch cargo for {}: {}", target, e);
            (false, e.to_string())
        }
    };

    CategoryResult {
        target,
        passed,
        duration: start.elapsed(),
        detail,
    }
}

fn print_summary(results: &[CategoryResult], total: Duration) {
    let failed = results.iter().filter(|r| !r.passed).count();

    println!("\n{}", "=".repeat(72));
    println!(
        "{} categories, {} passed, {} failed in {:.2?}",
        results.len(),
        results.len() - failed,
        failed,
        total
    );
    println!("{}", "-".repeat(72));
    for r in results {
        let status = if r.passed { "PASS" } else { "FAIL" };
        println!("{:<26} {:<6} {:>10.2?}  {}", r.target, status, r.duration, r.detail);
    }
    println!("{}", "=".repeat(72));
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }

    if args.list {
        for (target, summary) in CATEGORIES {
            println!("{:<26} {}", target, summary);
        }
        return ExitCode::SUCCESS;
    }

    let selected: Vec<&'static str> = CATEGORIES
        .iter()
        .map(|&(target, _)| target)
        .filter(|target| args.category.as_deref().map_or(true, |c| c == *target))
        .collect();
    if selected.is_empty() {
        error!("Unknown category {:?}; use --list", args.category);
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    let results: Vec<CategoryResult> = selected
        .into_iter()
        .map(|target| {
            info!("Running {}", target);
            run_category(target, args.filter.as_deref())
        })
        .collect();
    print_summary(&results, start.elapsed());

    if results.iter().all(|r| r.passed) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
