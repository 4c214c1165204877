//! Runs an OpAMP agent configured from the environment until Ctrl-C.
//!
//! `OPAMP_CONFIG_FILE` points at a YAML settings file; without it the `OPAMP_*` variables are
//! read. `OPAMP_LOG_LEVEL` picks the log level.

use log::LevelFilter;
use opamp_http_agent::attributes::Attributes;
use opamp_http_agent::remoteconfig::InstrumentationLibraryConfig;
use opamp_http_agent::{AgentCallbacks, ClientConfig, ClientError, OpampClient};
use simple_logger::SimpleLogger;
use std::str::FromStr;
use std::sync::Arc;

struct LoggingCallbacks;

impl AgentCallbacks for LoggingCallbacks {
    fn on_resource_attributes_resolved(&self, attributes: &Attributes) {
        for (key, value) in attributes {
            log::info!("Resource attribute {} = {}", key, value);
        }
    }

    fn on_instrumentation_libraries_config(&self, configs: &[InstrumentationLibraryConfig]) {
        for config in configs {
            log::info!(
                "Instrumentation library {} {}",
                config.name,
                if config.enabled { "enabled" } else { "disabled" }
            );
        }
    }
}

#[cfg(feature = "config")]
fn load_config() -> Result<ClientConfig, ClientError> {
    match std::env::var("OPAMP_CONFIG_FILE") {
        Ok(path) => ClientConfig::from_file(path),
        Err(_) => ClientConfig::from_env(),
    }
}

#[cfg(not(feature = "config"))]
fn load_config() -> Result<ClientConfig, ClientError> {
    ClientConfig::from_env()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("OPAMP_LOG_LEVEL")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info);
    SimpleLogger::new().with_level(level).init()?;

    let config = load_config()?;
    log::info!(
        "Connecting device {} to {}",
        config.device_id,
        config.endpoint()?
    );

    let mut client = OpampClient::new(config, Arc::new(LoggingCallbacks))?;
    client.start().await?;
    log::info!("Agent {} is {}", client.instance_id(), client.phase());

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    if let Err(e) = client.shutdown().await {
        log::warn!("Disconnect was not delivered: {}", e);
    }
    Ok(())
}
