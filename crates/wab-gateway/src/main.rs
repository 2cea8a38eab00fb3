//! wa-bridge: WhatsApp ⇄ Dialogflow webhook bridge
//!
//! Usage:
//!   wa-bridge                   - Start the webhook server
//!   wa-bridge --config <path>   - Start with an explicit TOML config file
//!   wa-bridge --help            - Show help

use tracing_subscriber::EnvFilter;
use wab_core::Config;
use wab_whatsapp::WhatsAppBot;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Webhook server, optionally with a config file
    Server { config_path: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_args(&args)?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("wa-bridge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match config_path {
        Some(path) => Config::from_toml_file(&path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting wa-bridge...");
    tracing::info!(
        "Dialogflow project: {} (language {})",
        config.dialogflow.project_id,
        config.dialogflow.language_code
    );

    let bot = WhatsAppBot::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create Dialogflow client: {}", e))?;

    bot.start().await?;

    Ok(())
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> anyhow::Result<RunMode> {
    let mut config_path = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config_path = Some(path.clone());
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config_path })
}

/// Print help message
fn print_help() {
    println!("wa-bridge - WhatsApp (Twilio) to Dialogflow bridge");
    println!();
    println!("Usage:");
    println!("  wa-bridge                  Start the webhook server");
    println!("  wa-bridge --config <path>  Load settings from a TOML file");
    println!("  wa-bridge --help           Show this help message");
    println!("  wa-bridge --version        Show version");
    println!();
    println!("Without --config, ./wa-bridge.toml is used when present.");
    println!();
    println!("Environment Variables:");
    println!("  DIALOGFLOW_PROJECT_ID           Dialogflow agent project (required)");
    println!("  DIALOGFLOW_CREDENTIALS_PATH     Service account key file (required,");
    println!("                                  falls back to GOOGLE_APPLICATION_CREDENTIALS)");
    println!("  LANGUAGE_CODE                   Query language (default: en-US)");
    println!("  DIALOGFLOW_API_BASE_URL         Dialogflow endpoint (default: https://dialogflow.googleapis.com)");
    println!("  DIALOGFLOW_TIMEOUT_SECS         detectIntent timeout (default: 30)");
    println!("  TWILIO_AUTH_TOKEN               Enables webhook signature validation");
    println!("  TWILIO_WEBHOOK_URL              Public webhook URL used for signatures");
    println!("  HOST / PORT                     Listen address (default: 0.0.0.0:3000)");
    println!("  WEBHOOK_PATH                    Webhook route (default: /webhook/whatsapp)");
}
