//! Webhook relay binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use webhook_relay::{Method, Payload};
use webhook_relay_sdk::{RelayClient, RelayClientBuilder, to_payload};
use webhook_relay_server::{RelayConfig, RelayServer, init_tracing, load_config};

#[derive(Parser)]
#[command(name = "webhook-relay")]
#[command(about = "Receive, dispatch and forward webhooks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// TOML configuration file
        #[arg(long, env = "WEBHOOK_RELAY_CONFIG")]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Shared secret callers must present
        #[arg(long)]
        secret: Option<String>,
    },

    /// Send one webhook and print the delivery result
    Send {
        /// Target URL
        #[arg(long)]
        url: String,

        /// JSON object to send
        #[arg(long, default_value = "{}")]
        data: String,

        /// Secret presented to the target
        #[arg(long)]
        secret: Option<String>,

        /// Extra header as `Name: value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,

        /// HTTP method
        #[arg(long, default_value = "POST")]
        method: String,

        /// Caller-visible attempts
        #[arg(long, default_value_t = 1)]
        attempts: u32,

        /// TOML configuration file for sender settings
        #[arg(long, env = "WEBHOOK_RELAY_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Send one webhook to several URLs in order
    Batch {
        /// Target URLs
        #[arg(long = "url", required = true)]
        urls: Vec<String>,

        /// JSON object to send
        #[arg(long, default_value = "{}")]
        data: String,

        /// Secret presented to every target
        #[arg(long)]
        secret: Option<String>,

        /// Extra header as `Name: value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,

        /// TOML configuration file for sender settings
        #[arg(long, env = "WEBHOOK_RELAY_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            secret,
        } => {
            let mut config = read_config(config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(secret) = secret {
                config.receiver.secret = Some(secret);
            }

            let _guard = init_tracing(&config.server.log_level, config.server.log_file.as_deref())?;
            RelayServer::new(config)?.run().await?;
        }
        Commands::Send {
            url,
            data,
            secret,
            headers,
            method,
            attempts,
            config,
        } => {
            let config = read_config(config)?;
            let _guard = init_tracing("warn", None)?;

            let client = relay_client(&config, secret, &headers, &method)?;
            let payload = parse_data(&data)?;
            let result = if attempts > 1 {
                client.send_with_retry(&url, &payload, attempts).await
            } else {
                client.send(&url, &payload).await
            };

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Batch {
            urls,
            data,
            secret,
            headers,
            config,
        } => {
            let config = read_config(config)?;
            let _guard = init_tracing("warn", None)?;

            let client = relay_client(&config, secret, &headers, "POST")?;
            let payload = parse_data(&data)?;
            let results = client.send_batch(urls.as_slice(), &payload).await;

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Loads the file if given, then applies environment overrides.
fn read_config(path: Option<PathBuf>) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// Builds a client from the `[sender]` settings and the command's flags.
fn relay_client(
    config: &RelayConfig,
    secret: Option<String>,
    headers: &[String],
    method: &str,
) -> Result<RelayClient, Box<dyn std::error::Error>> {
    let mut builder = RelayClientBuilder::new()
        .config(config.sender.to_sender_config())
        .maybe_secret(secret)
        .method(Method::from_bytes(method.to_uppercase().as_bytes())?);
    for header in headers {
        let (name, value) = parse_header(header)?;
        builder = builder.header(name, value);
    }
    Ok(builder.build()?)
}

fn parse_data(data: &str) -> Result<Payload, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(data)?;
    Ok(to_payload(&value)?)
}

fn parse_header(header: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("header must look like 'Name: value', got '{header}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}
