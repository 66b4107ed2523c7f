//! commentary-gateway e2e test runner
//!
//! Default (no args): spawns the gateway twice (buffered and streaming mode)
//! against mock providers, runs all tests, kills both.
//!
//!   cargo run                          # auto-detect gateway binary, run all tests
//!   cargo run -- list                  # list all tests
//!   cargo run -- run                   # connect to already-running gateways
//!   cargo run -- spawn-and-run [opts]  # explicit paths / ports

mod backend;
mod client;
mod runner;
mod tests;
mod types;

use clap::{Parser, Subcommand};
use colored::Colorize;
use runner::{list_tests, run_tests, RunReport, TestContext};
use tests::all_tests;

/// Default gateway binary candidates, tried in order
const DEFAULT_GATEWAY_BINS: &[&str] = &[
    "../target/release/commentary-gateway",
    "../target/debug/commentary-gateway",
];

const DEFAULT_BUFFERED_CONFIG: &str = "test_configs/buffered.yaml";
const DEFAULT_STREAMING_CONFIG: &str = "test_configs/streaming.yaml";
const DEFAULT_BACKEND_PORT: u16 = 18080;
const DEFAULT_BUFFERED_PORT: u16 = 18066;
const DEFAULT_STREAMING_PORT: u16 = 18067;

#[derive(Parser)]
#[command(
    name = "e2e",
    about = "End-to-end tests for commentary-gateway",
    long_about = "Runs all e2e tests by default (no arguments needed).\n\
                  Spawns the gateway binary in both modes, runs tests, then kills it."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Only run tests whose name contains this string (applies to default run)
    #[arg(long, short, global = true)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to already-running gateways and run tests
    Run {
        /// Address of the buffered-mode gateway
        #[arg(long, default_value = "127.0.0.1:18066")]
        buffered_addr: String,

        /// Address of the streaming-mode gateway
        #[arg(long, default_value = "127.0.0.1:18067")]
        streaming_addr: String,

        /// Port for the mock providers - must match the gateway configs
        #[arg(long, default_value_t = DEFAULT_BACKEND_PORT)]
        backend_port: u16,

        /// Only run tests whose name contains this string
        #[arg(long, short)]
        filter: Option<String>,
    },

    /// List all available tests
    List,

    /// Spawn the gateway binary, run all tests, then kill it
    SpawnAndRun {
        /// Path to the commentary-gateway binary
        #[arg(long)]
        gateway_bin: Option<String>,

        /// Config for the buffered-mode gateway
        #[arg(long, default_value = DEFAULT_BUFFERED_CONFIG)]
        buffered_config: String,

        /// Config for the streaming-mode gateway
        #[arg(long, default_value = DEFAULT_STREAMING_CONFIG)]
        streaming_config: String,

        /// Port for the mock providers - must match the configs
        #[arg(long, default_value_t = DEFAULT_BACKEND_PORT)]
        backend_port: u16,

        /// Only run tests whose name contains this string
        #[arg(long, short)]
        filter: Option<String>,
    },
}

/// Where each spawned gateway comes from
struct SpawnPlan {
    gateway_bin: String,
    buffered_config: String,
    streaming_config: String,
    backend_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // ── No subcommand: default full run ──────────────────────────────────
        None => {
            let plan = SpawnPlan {
                gateway_bin: find_gateway_bin()?,
                buffered_config: DEFAULT_BUFFERED_CONFIG.to_string(),
                streaming_config: DEFAULT_STREAMING_CONFIG.to_string(),
                backend_port: DEFAULT_BACKEND_PORT,
            };
            do_spawn_and_run(plan, cli.filter).await?;
        }

        // ── list ─────────────────────────────────────────────────────────────
        Some(Command::List) => {
            list_tests(&all_tests());
        }

        // ── run (connect to existing gateways) ───────────────────────────────
        Some(Command::Run {
            buffered_addr,
            streaming_addr,
            backend_port,
            filter,
        }) => {
            let filter = filter.or(cli.filter);
            println!("Starting mock providers on port {}...", backend_port);
            let backend_state = backend::start(backend_port).await?;
            println!("Mock providers running on 127.0.0.1:{}", backend_port);

            let ctx = TestContext {
                buffered_addr,
                streaming_addr,
                backend_state,
                http_client: client::build_client(),
            };

            let report = run_tests(all_tests(), ctx, filter.as_deref()).await;
            exit_on_failure(&report);
        }

        // ── spawn-and-run ─────────────────────────────────────────────────────
        Some(Command::SpawnAndRun {
            gateway_bin,
            buffered_config,
            streaming_config,
            backend_port,
            filter,
        }) => {
            let filter = filter.or(cli.filter);
            let gateway_bin = match gateway_bin {
                Some(p) => p,
                None => find_gateway_bin()?,
            };
            let plan = SpawnPlan {
                gateway_bin,
                buffered_config,
                streaming_config,
                backend_port,
            };
            do_spawn_and_run(plan, filter).await?;
        }
    }

    Ok(())
}

/// Shared implementation for spawn-and-run (used by both default and explicit subcommand)
async fn do_spawn_and_run(plan: SpawnPlan, filter: Option<String>) -> anyhow::Result<()> {
    println!("Starting mock providers on port {}...", plan.backend_port);
    let backend_state = backend::start(plan.backend_port).await?;
    println!("Mock providers running on 127.0.0.1:{}", plan.backend_port);

    let mut buffered = spawn_gateway(&plan.gateway_bin, &plan.buffered_config, DEFAULT_BUFFERED_PORT)?;
    let mut streaming =
        spawn_gateway(&plan.gateway_bin, &plan.streaming_config, DEFAULT_STREAMING_PORT)?;

    let buffered_addr = format!("127.0.0.1:{}", DEFAULT_BUFFERED_PORT);
    let streaming_addr = format!("127.0.0.1:{}", DEFAULT_STREAMING_PORT);
    println!("Waiting for gateways at {} and {}...", buffered_addr, streaming_addr);
    wait_for_gateway(&buffered_addr).await?;
    wait_for_gateway(&streaming_addr).await?;
    println!("Gateways are ready!\n");

    let ctx = TestContext {
        buffered_addr,
        streaming_addr,
        backend_state,
        http_client: client::build_client(),
    };

    let report = run_tests(all_tests(), ctx, filter.as_deref()).await;

    buffered.kill().await.ok();
    streaming.kill().await.ok();

    exit_on_failure(&report);
    Ok(())
}

fn spawn_gateway(bin: &str, config: &str, port: u16) -> anyhow::Result<tokio::process::Child> {
    println!("Spawning gateway: {} run --config {} --port {}", bin, config, port);
    tokio::process::Command::new(bin)
        .arg("run")
        .arg("--config")
        .arg(config)
        .arg("--port")
        .arg(port.to_string())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", bin, e))
}

/// Find the gateway binary, trying release then debug builds
fn find_gateway_bin() -> anyhow::Result<String> {
    for candidate in DEFAULT_GATEWAY_BINS {
        if std::path::Path::new(candidate).exists() {
            println!("Using gateway binary: {}", candidate.bright_cyan());
            return Ok(candidate.to_string());
        }
    }
    Err(anyhow::anyhow!(
        "No gateway binary found. Tried: {}\nBuild with: cd .. && cargo build --release",
        DEFAULT_GATEWAY_BINS.join(", ")
    ))
}

/// Exit with code 1 if any tests failed
fn exit_on_failure(report: &RunReport) {
    if report.failed() > 0 {
        std::process::exit(1);
    }
}

/// Wait for a gateway to start accepting connections (retry with backoff)
async fn wait_for_gateway(addr: &str) -> anyhow::Result<()> {
    let client = client::build_client();
    let ready_url = format!("http://{}/", addr);

    for attempt in 0..30 {
        tokio::time::sleep(tokio::time::Duration::from_millis(200 + attempt * 100)).await;
        if client.get(&ready_url).send().await.is_ok() {
            return Ok(());
        }
    }

    Err(anyhow::anyhow!(
        "Gateway did not start within timeout. Is the binary correct? Check: {}",
        addr
    ))
}
