// src/main.rs

use actix_web::web;
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use local_ip_address::local_ip;
use qrcode::render::unicode;
use qrcode::QrCode;
use serde_json::{Map, Value};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

// Module declarations
mod calculator;
mod cli;
mod client;
mod config;
mod converter;
mod logging;
mod server;
mod templater;
mod ui;

// Crate imports for convenience
use crate::cli::{Cli, Command, ConfigAction};
use crate::client::{Num2VidClient, Submission};
use crate::config::{Config, CONFIG_ENV_VAR, DEFAULT_VID_FORMAT, KEY_VID_FORMAT};
use crate::converter::Converter;
use crate::server::run_server;
use crate::ui::{
    default_save_path, expand_user_path, play_video_locally, prompt_submission, SubmitRequest,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run_app().await {
        eprintln!("\nApplication Error: {}", err);
        process::exit(1);
    }
}

async fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli_args = Cli::parse();

    // The calculator needs no config.
    if let Command::Calc { expr } = &cli_args.command {
        logging::init_logging(None, "warn")?;
        println!("{}", calculator::calculate(expr)?);
        return Ok(());
    }

    let config_path = resolve_config_path(cli_args.config)?;
    let config = Config::open(&config_path)?;

    match cli_args.command {
        Command::Serve => serve(config).await,
        Command::Submit { num, output, open } => submit(config, num, output, open).await,
        Command::Config { action } => edit_config(config, action),
        Command::Calc { .. } => Ok(()),
    }
}

/// Picks the config path from `--config`, falling back to `NUM2VID_CONFIG`.
fn resolve_config_path(flag: Option<String>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let raw = match flag.or_else(|| env::var(CONFIG_ENV_VAR).ok()) {
        Some(raw) => raw,
        None => {
            return Err(format!(
                "No config given. Pass --config or set the '{}' environment variable.",
                CONFIG_ENV_VAR
            )
            .into())
        }
    };
    let path = PathBuf::from(shellexpand::tilde(&raw).into_owned());
    if !path.is_file() {
        return Err(format!(
            "The config path '{}' doesn't exist or is not a file.",
            path.display()
        )
        .into());
    }
    Ok(path)
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(log_file) = logging::init_logging(config.logging_output_dir().as_deref(), "info")? {
        println!("Logging to: {}", log_file.display());
    }

    let host = config.host();
    let port = config.port()?;
    let converter = Converter::new(Arc::new(Mutex::new(config)));
    let output_dir = converter.ensure_output_dir()?;
    log::info!("Videos are written to '{}'", output_dir.display());

    let server = run_server(host.clone(), port, web::Data::new(converter))?;
    println!("num2vid server is running at http://{}:{}", host, port);
    print_lan_address(&host, port);

    // Runs until Ctrl-C; actix handles the signal and shuts down gracefully.
    server.await?;
    println!("Server stopped.");
    Ok(())
}

/// When listening on all interfaces, shows the LAN URL and a QR code for it.
fn print_lan_address(host: &str, port: u16) {
    let unspecified = host.parse::<IpAddr>().map(|ip| ip.is_unspecified()).unwrap_or(false);
    if !unspecified {
        return;
    }
    match local_ip() {
        Ok(ip) => {
            let url = format!("http://{}:{}", ip, port);
            println!("Reachable on your network at {}", url);
            if let Ok(code) = QrCode::new(url.as_bytes()) {
                println!(
                    "Scan QR code to open the calculator on another device:\n{}",
                    code.render::<unicode::Dense1x2>().build()
                );
            }
        }
        Err(e) => eprintln!("Warning: Could not get local IP address: {}", e),
    }
}

async fn submit(
    config: Config,
    num: Option<u64>,
    output: Option<String>,
    open_after: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(None, "warn")?;

    let save_path = output.as_deref().map(expand_user_path).transpose()?;
    let request = match num {
        Some(num) => SubmitRequest {
            num,
            save_path: save_path.unwrap_or_else(|| {
                default_save_path(num, &config.get_str_or(KEY_VID_FORMAT, DEFAULT_VID_FORMAT))
            }),
        },
        None => prompt_submission(&config, save_path, &ColorfulTheme::default())?,
    };

    let client = Num2VidClient::from_config(&config)?;
    println!(
        "Requesting video for {} from {}...",
        request.num,
        client.base_url()
    );

    if let Submission::Saved(path) = client.submit(request.num, Some(&request.save_path)).await? {
        println!("Saved video to '{}'.", path.display());
        if open_after {
            play_video_locally(&path)?;
        }
    }
    Ok(())
}

fn edit_config(mut config: Config, action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            println!("# {}", config.path().display());
            println!("{}", serde_json::to_string_pretty(config.values())?);
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => return Err(format!("Config key '{}' is not set.", key).into()),
        },
        ConfigAction::Set { key, value } => {
            let parsed = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            let mut change = Map::new();
            change.insert(key.clone(), parsed);
            let values = config.update(change).clone();
            config.save(values)?;
            println!("Set '{}' in {}.", key, config.path().display());
        }
        ConfigAction::Clear => {
            config.clear()?;
            println!("Cleared {}.", config.path().display());
        }
    }
    Ok(())
}
