//! Gyft CLI
//!
//! Runs the HTTP server, or a single generation from the command line.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gyft_core::{GenerationError, GenerationKind};
use gyft_server::{create_router, gemini_pipeline, AppState, Config, ServerError};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Gyft - AI course generation
///
/// Generates coding courses, quizzes and answers with a generative model and
/// serves them over HTTP.
#[derive(Parser, Debug)]
#[command(name = "gyft")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: gyft.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one generation and print the result as JSON
    Generate {
        /// What to generate: course, questions or qa
        #[arg(value_parser = parse_kind)]
        kind: GenerationKind,

        /// Topic, section text or question
        text: String,
    },

    /// Validate the configuration and the API key
    CheckConfig,
}

fn parse_kind(s: &str) -> Result<GenerationKind, String> {
    GenerationKind::from_str_case_insensitive(s)
        .ok_or_else(|| format!("unknown kind '{s}' (expected course, questions or qa)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so `generate` output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command {
        Command::Serve { port, host } => serve(args.config.as_deref(), port, host).await,
        Command::Generate { kind, text } => generate(args.config.as_deref(), kind, &text).await,
        Command::CheckConfig => check_config(args.config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Starts the HTTP server and runs until Ctrl+C.
async fn serve(
    config_path: Option<&str>,
    port: Option<u16>,
    host: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    config.validate()?;

    // Fail on a missing key before binding.
    let pipeline = gemini_pipeline(&config)?;
    print_config(&config);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::bind_failed(addr.as_str(), e.to_string()))?;

    let router = create_router(AppState::new(config, pipeline));

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(%addr, "Server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Runs one generation and prints the normalized JSON to stdout.
///
/// On failure the raw and extracted model text go to stderr before the
/// error is returned.
async fn generate(
    config_path: Option<&str>,
    kind: GenerationKind,
    text: &str,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let pipeline = gemini_pipeline(&config)?;

    match pipeline.generate(kind, text).await {
        Ok(generated) => {
            println!("{}", serde_json::to_string_pretty(&generated)?);
            Ok(())
        }
        Err(e) => {
            print_diagnostics(&e);
            Err(e.into())
        }
    }
}

/// Loads and validates configuration, then checks the API key is present.
fn check_config(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.api_key()?;

    print_config(&config);
    println!();
    println!(
        "Configuration OK (API key found in {})",
        config.gateway.api_key_env
    );
    Ok(())
}

/// Loads configuration from the given path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the configuration summary. The API key is never printed.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.gateway.model);
    println!("  Endpoint: {}", config.gateway.endpoint);
    println!("  API key variable: {}", config.gateway.api_key_env);
    println!("  Timeout: {}s", config.gateway.timeout_secs);
    println!("  Listen address: {}", config.bind_addr());
    println!(
        "  Page size: {} (max {})",
        config.catalog.default_page_size, config.catalog.max_page_size
    );
}

fn print_diagnostics(error: &GenerationError) {
    eprintln!("Generation failed [{}]", error.tag());
    if let Some(raw) = error.raw_text() {
        eprintln!("--- raw model reply ---\n{raw}\n--- end raw ---");
    }
    if let Some(extracted) = error.extracted_text() {
        eprintln!("--- extracted payload ---\n{extracted}\n--- end extracted ---");
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, shutting down");
    }
}
