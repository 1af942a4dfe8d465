// restgate - Declarative HTTP gateway for REST services
// Author: kelexine (https://github.com/kelexine)

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use restgate::cli::{Args, Command};
use restgate::config::AppConfig;
use restgate::metrics::gather_metrics;
use restgate::models::{DescriptorFile, Reply};
use restgate::utils::logging;
use restgate::{Gateway, GatewayBuilder};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = AppConfig::load(args.config.as_deref())?;

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting restgate v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Check { descriptors } => {
            let gateway = build_gateway(&config, &descriptors)?;
            for (service, route) in gateway.routes() {
                println!(
                    "{} {} {} -> {}",
                    route.alias(),
                    route.operation_id,
                    route.method,
                    route.url.to_string().replacen(
                        &format!("${{{}}}", route.alias()),
                        service.base_url(),
                        1
                    )
                );
            }
            info!("All descriptors compiled");
        }
        Command::Call {
            descriptors,
            service,
            operation,
            args,
            timeout,
            metrics,
        } => {
            let gateway = build_gateway(&config, &descriptors)?;
            let call = call(&gateway, &service, &operation, args);

            // Phase 3: Run the call until it completes, times out, or is interrupted.
            // Losing the race drops the call, which cancels it without a fallback.
            let result = tokio::select! {
                result = call => result,
                _ = deadline(timeout) => {
                    warn!("Call timed out, cancelling");
                    bail!("call to {}::{} timed out", service, operation);
                }
                _ = shutdown_signal() => {
                    warn!("Call cancelled");
                    bail!("call to {}::{} cancelled", service, operation);
                }
            };
            result?;

            if metrics {
                print!("{}", gather_metrics());
            }
        }
    }

    Ok(())
}

fn build_gateway(config: &AppConfig, descriptors: &Path) -> Result<Gateway> {
    let file = DescriptorFile::load(descriptors)
        .with_context(|| format!("failed to load descriptors from {}", descriptors.display()))?;
    let gateway = GatewayBuilder::from_config(config).descriptors(file).build()?;
    Ok(gateway)
}

async fn call(gateway: &Gateway, service: &str, operation: &str, args: Vec<Value>) -> Result<()> {
    let client = gateway.service(service)?;
    match client.invoke(operation, args).await? {
        Reply::Single(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
        }
        Reply::Stream(mut stream) => {
            while let Some(item) = stream.next().await {
                println!("{}", serde_json::to_string(&item?.to_json())?);
            }
        }
        Reply::Empty => {
            info!("{}::{} completed", service, operation);
        }
    }
    Ok(())
}

async fn deadline(timeout: Option<u64>) {
    match timeout {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending::<()>().await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
