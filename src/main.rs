//! commentary-gateway: HTTP gateway for AI-generated commentary
//!
//! Sits between a browser-extension client and two LLM providers and provides:
//! - Buffered (`{"output_text"}`) or streamed plain-text responses
//! - Fallback from the preferred provider to the other one
//! - Server-side API keys and stored instructions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use commentary_gateway::{
    backends::{build_backends, BackendId, TextBackend},
    config::{AppConfig, SecretsConfig, ServeMode},
    instructions::{InstructionStore, StaticInstructionStore},
    run_server,
    secrets::load_api_keys,
    GatewayState,
};

#[derive(Parser)]
#[command(name = "commentary-gateway")]
#[command(version = "0.1.0")]
#[command(about = "Dual-backend gateway for AI-generated commentary")]
#[command(long_about = "
commentary-gateway accepts a short prompt and returns AI-generated commentary:
  - Buffered mode: one JSON document per request
  - Streaming mode: a chunked text/plain body as tokens arrive
  - OpenAI and xAI backends with automatic fallback

Example usage:
  commentary-gateway run --config config.yaml
  commentary-gateway run --mode streaming --port 8080
  commentary-gateway test-backends --prompt \"Say hi\"
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override serving mode
        #[arg(long, value_enum)]
        mode: Option<ServeMode>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Send a one-shot prompt to each provider and report the result
    TestBackends {
        /// Prompt to send
        #[arg(long, default_value = "Say hello in five words.")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter));
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run { port, mode } => {
            run_gateway(cli.config, port, mode).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config)?;
        }
        Commands::TestBackends { prompt } => {
            test_backends(cli.config, &prompt).await?;
        }
    }

    Ok(())
}

/// Run the gateway server
async fn run_gateway(
    config_path: PathBuf,
    port_override: Option<u16>,
    mode_override: Option<ServeMode>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(&config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(mode) = mode_override {
        config.mode = mode;
    }

    tracing::info!("Loading configuration from {:?}", config_path);

    let keys = load_api_keys(&config.secrets)?;
    let backends = build_backends(&config.providers, &keys)?;

    let store = StaticInstructionStore::from_config(&config.instructions)?;
    tracing::info!(entries = store.len(), "Instruction store ready");

    // Work-item requests must not discover a missing instruction at request time
    if config.mode.is_streaming() {
        if let Some(ref key) = config.instructions.work_item_key {
            store.require(key).await?;
            tracing::info!(key = %key, "Work-item instruction found");
        }
    }

    let state = GatewayState::new(config, backends, Arc::new(store));
    run_server(state).await?;

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match AppConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("  Mode: {}", config.mode);
            println!("\nBackends:");
            println!("  Default: {}", config.default_backend);
            println!("  Fallback: {}", config.fallback.enabled);
            for id in BackendId::ALL {
                let provider = config.providers.get(id);
                println!("  {}:", id);
                println!("    URL: {}", provider.base_url());
                println!("    Model: {}", provider.model);
                println!("    Timeout: {}s", provider.timeout_seconds);
                if let Some(ref tls) = provider.tls {
                    if tls.accept_invalid_certs {
                        println!("    TLS: Accepting invalid certificates");
                    }
                    if let Some(ref ca) = tls.ca_cert_path {
                        println!("    TLS CA: {}", ca);
                    }
                }
            }
            println!("\nSecrets:");
            match config.secrets {
                SecretsConfig::Env { ref var, .. } => println!("  Source: env ({})", var),
                SecretsConfig::File { ref path, .. } => println!("  Source: file ({})", path),
                SecretsConfig::Vars { .. } => println!("  Source: vars"),
            }
            let names = config.secrets.key_names();
            println!("  Keys: {}, {}", names.openai_key, names.xai_key);
            println!("\nInstructions:");
            println!("  Inline entries: {}", config.instructions.entries.len());
            if let Some(ref file) = config.instructions.file {
                println!("  File: {}", file);
            }
            if let Some(ref key) = config.instructions.work_item_key {
                println!("  Work-item key: {}", key);
            }
            println!("\nStreaming:");
            println!("  Idle timeout: {}s", config.streaming.idle_timeout_seconds);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Send one prompt to each provider
async fn test_backends(config_path: PathBuf, prompt: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(&config_path);
    let keys = load_api_keys(&config.secrets)?;
    let backends = build_backends(&config.providers, &keys)?;

    let mut failures = 0;
    for id in BackendId::ALL {
        let provider = config.providers.get(id);
        println!("Testing {} ({}, model {})", id, provider.base_url(), provider.model);

        let start = std::time::Instant::now();
        match backends.get(id).generate_complete(prompt, None).await {
            Ok(text) => {
                println!("✓ {} responded in {}ms", id, start.elapsed().as_millis());
                println!("  Response: {}", text.trim());
            }
            Err(e) => {
                println!("✗ {}: {}", id, e.cause);
                failures += 1;
            }
        }
        println!();
    }

    if failures == BackendId::ALL.len() {
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
