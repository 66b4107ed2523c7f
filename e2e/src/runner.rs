//! Runs registered cases against the gateway for their mode and reports per mode

use colored::Colorize;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use crate::types::{GatewayMode, SharedBackendState, TestResult};

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered e2e case
pub struct TestCase {
    pub name: &'static str,
    pub mode: GatewayMode,
    pub description: &'static str,
    pub run: Box<dyn Fn(TestContext) -> TestFuture + Send + Sync>,
}

/// Everything a case needs: both gateways and the mock providers behind them
#[derive(Clone)]
pub struct TestContext {
    pub buffered_addr: String,
    pub streaming_addr: String,
    pub backend_state: SharedBackendState,
    pub http_client: reqwest::Client,
}

impl TestContext {
    pub fn addr(&self, mode: GatewayMode) -> &str {
        match mode {
            GatewayMode::Buffered => &self.buffered_addr,
            GatewayMode::Streaming => &self.streaming_addr,
        }
    }
}

/// Results of one run, in execution order
pub struct RunReport {
    pub results: Vec<TestResult>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    fn tally(&self, mode: GatewayMode) -> (usize, usize) {
        let (passed, failed): (Vec<&TestResult>, Vec<&TestResult>) = self
            .results
            .iter()
            .filter(|r| r.mode == mode)
            .partition(|r| r.passed());
        (passed.len(), failed.len())
    }
}

/// Run the selected cases, buffered-mode cases first, then streaming
pub async fn run_tests(cases: Vec<TestCase>, ctx: TestContext, filter: Option<&str>) -> RunReport {
    let rule = "═".repeat(56);
    println!("\n{}", rule.bright_blue());
    println!("{}", "  commentary-gateway e2e".bright_white().bold());
    println!("{}", rule.bright_blue());

    let mut report = RunReport { results: Vec::new() };

    for mode in GatewayMode::ALL {
        let selected: Vec<&TestCase> = cases
            .iter()
            .filter(|c| c.mode == mode)
            .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
            .collect();
        if selected.is_empty() {
            continue;
        }

        println!(
            "\n  {} mode @ {} ({} case(s))",
            mode.to_string().bright_white().bold(),
            ctx.addr(mode).bright_cyan(),
            selected.len()
        );

        for case in selected {
            report.results.push(run_case(case, &ctx).await);
        }
    }

    print_summary(&report);
    report
}

async fn run_case(case: &TestCase, ctx: &TestContext) -> TestResult {
    // Each case starts with empty provider queues
    ctx.backend_state.lock().unwrap().clear();

    print!("    {} {} ... ", "▶".bright_blue(), case.name);
    let start = Instant::now();
    let outcome = (case.run)(ctx.clone()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(()) => {
            println!("{} {}", "ok".bright_green().bold(), format!("{duration_ms}ms").dimmed());
            None
        }
        Err(e) => {
            println!("{} {}", "FAILED".bright_red().bold(), format!("{duration_ms}ms").dimmed());
            for cause in e.chain() {
                println!("        {}", cause.to_string().red());
            }
            Some(format!("{e:#}"))
        }
    };

    TestResult {
        name: case.name,
        mode: case.mode,
        error,
        duration_ms,
    }
}

fn print_summary(report: &RunReport) {
    println!("\n{}", "─".repeat(56).bright_blue());
    for mode in GatewayMode::ALL {
        let (passed, failed) = report.tally(mode);
        if passed + failed == 0 {
            continue;
        }
        let line = format!("  {:<10} {} passed, {} failed", mode.to_string(), passed, failed);
        if failed == 0 {
            println!("{}", line.bright_green());
        } else {
            println!("{}", line.bright_red());
        }
    }

    let failures: Vec<&TestResult> = report.results.iter().filter(|r| !r.passed()).collect();
    if !failures.is_empty() {
        println!("\n  {}", "Failures:".bright_red().bold());
        for result in failures {
            println!(
                "    [{}] {}: {}",
                result.mode,
                result.name,
                result.error.as_deref().unwrap_or_default()
            );
        }
    }
    println!();
}

/// Print the registry grouped by gateway mode
pub fn list_tests(cases: &[TestCase]) {
    for mode in GatewayMode::ALL {
        println!("\n{}", format!("{mode} mode").bright_white().bold());
        for case in cases.iter().filter(|c| c.mode == mode) {
            println!("  {:<40} {}", case.name.bright_cyan(), case.description);
        }
    }
    println!();
}
