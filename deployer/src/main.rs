//! intoxicode deployer - Entry Point
//!
//! Receives signed CI and push webhooks and redeploys the intoxicode web
//! service: sync sources, install the latest release binary, rebuild, restart.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use deployer::app::options::AppOptions;
use deployer::app::run::run;
use deployer::filesys::file::File;
use deployer::logs::{init_logging, LogOptions};
use deployer::storage::layout::StorageLayout;
use deployer::storage::settings::load_settings;
use deployer::utils::version_info;

use secrecy::SecretString;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(PathBuf::from(path)),
        None => layout.settings_file(),
    };
    let mut settings = match load_settings(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(host) = cli_args.get("host") {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli_args.get("port") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => {
                eprintln!("Invalid port: {port}");
                return ExitCode::FAILURE;
            }
        }
    }

    // Initialize logging; the guard flushes the log file on exit
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
    };
    let (_log_guard, logging) = match init_logging(log_options) {
        Ok(guard) => (guard, true),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            (None, false)
        }
    };

    // The webhook secret is required
    let secret = match env::var(&settings.secret_env_var) {
        Ok(secret) if !secret.is_empty() => SecretString::from(secret),
        _ => {
            fatal(
                logging,
                format!(
                    "Webhook secret not set: export {} before starting",
                    settings.secret_env_var
                ),
            );
            return ExitCode::FAILURE;
        }
    };

    let options = match AppOptions::from_settings(&settings, secret) {
        Ok(options) => options,
        Err(e) => {
            fatal(logging, format!("Invalid configuration: {e}"));
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Running intoxicode deployer {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        fatal(logging, format!("Failed to run the deployer: {e}"));
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Report an error that stops the process, on stderr when no logger is installed
fn fatal(logging: bool, message: String) {
    if logging {
        error!("{message}");
    } else {
        eprintln!("{message}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
