use crate::api::ClientError;
use crate::attributes::{self, Attributes};
use crate::opamp::spec::{PackageStatus, PackageStatusEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Path the OpAMP server listens on for HTTP clients
pub const OPAMP_PATH: &str = "/v1/opamp";

pub const ENV_SERVER_HOST: &str = "OPAMP_SERVER_HOST";
pub const ENV_DEVICE_ID: &str = "OPAMP_DEVICE_ID";
pub const ENV_POLLING_INTERVAL_MS: &str = "OPAMP_POLLING_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "OPAMP_REQUEST_TIMEOUT_MS";

pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Settings a client is constructed from.
///
/// Properties:
///
/// * `device_id`: identifier of the device this agent runs for. Sent in the device id header
/// of every request and used as the service name when the server never answers.
/// * `server_host`: `host:port` of the OpAMP server, or a full `http(s)://` URL.
/// * `polling_interval_ms`: time between heartbeats.
/// * `request_timeout_ms`: upper bound on a single request/response exchange.
/// * `identifying_attributes`: extra attributes that identify the agent. The client always adds
/// its own `service.instance.id`.
/// * `non_identifying_attributes`: free form attributes describing the agent.
/// * `initial_package_statuses`: packages reported with every full state message.
/// * `compression`: gzip request bodies.
/// * `report_host_attributes`: add `os.type`, `os.version` and `host.name` to the
/// non-identifying attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(alias = "deviceId")]
    pub device_id: String,
    #[serde(alias = "serverHost")]
    pub server_host: String,
    #[serde(default = "default_polling_interval_ms", alias = "pollingIntervalMs")]
    pub polling_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms", alias = "requestTimeoutMs")]
    pub request_timeout_ms: u64,
    #[serde(default, alias = "identifyingAttributes")]
    pub identifying_attributes: Option<Attributes>,
    #[serde(default, alias = "nonIdentifyingAttributes")]
    pub non_identifying_attributes: Option<Attributes>,
    #[serde(alias = "initialPackageStatuses")]
    pub initial_package_statuses: Vec<PackageInfo>,
    #[serde(default)]
    pub compression: bool,
    #[serde(default, alias = "reportHostAttributes")]
    pub report_host_attributes: bool,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            device_id: "".to_string(),
            server_host: "127.0.0.1:4320".to_string(),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            identifying_attributes: None,
            non_identifying_attributes: None,
            initial_package_statuses: vec![],
            compression: false,
            report_host_attributes: false,
        }
    }
}

impl ClientConfig {
    pub fn new(device_id: &str, server_host: &str) -> ClientConfig {
        ClientConfig {
            device_id: device_id.to_string(),
            server_host: server_host.to_string(),
            ..Default::default()
        }
    }

    /// Reads the settings from `OPAMP_*` environment variables.
    pub fn from_env() -> Result<ClientConfig, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<ClientConfig, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClientError::Config(format!("{} environment variable not set", key)))
        };
        let millis = |key: &str, default: u64| match lookup(key) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ClientError::Config(format!("{} is not a number of milliseconds: {}", key, e))),
            None => Ok(default),
        };

        let config = ClientConfig {
            device_id: required(ENV_DEVICE_ID)?,
            server_host: required(ENV_SERVER_HOST)?,
            polling_interval_ms: millis(ENV_POLLING_INTERVAL_MS, DEFAULT_POLLING_INTERVAL_MS)?,
            request_timeout_ms: millis(ENV_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS)?,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_yaml_str(contents: &str) -> Result<ClientConfig, ClientError> {
        let config: ClientConfig = serde_yaml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("unreadable client settings: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ClientError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&contents)
    }

    /// Checks mandatory fields and that every attribute can be put on the wire.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.device_id.trim().is_empty() {
            return Err(ClientError::Config("device id must not be empty".to_string()));
        }
        if self.server_host.trim().is_empty() {
            return Err(ClientError::Config("server host must not be empty".to_string()));
        }
        if self.polling_interval_ms == 0 {
            return Err(ClientError::Config("polling interval must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("request timeout must be positive".to_string()));
        }
        self.endpoint()?;

        let mut names = HashSet::new();
        for pkg in &self.initial_package_statuses {
            if pkg.name.is_empty() {
                return Err(ClientError::Config("package name must not be empty".to_string()));
            }
            if !names.insert(pkg.name.as_str()) {
                return Err(ClientError::Config(format!("package {} is listed twice", pkg.name)));
            }
        }

        attributes::encode(self.identifying_attributes.as_ref())?;
        attributes::encode(self.non_identifying_attributes.as_ref())?;
        Ok(())
    }

    /// Full URL messages are posted to.
    pub fn endpoint(&self) -> Result<url::Url, ClientError> {
        let host = self.server_host.trim().trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let mut address = url::Url::parse(&base)
            .map_err(|e| ClientError::Config(format!("invalid server host {:?}: {}", self.server_host, e)))?;
        if address.path().is_empty() || address.path() == "/" {
            address.set_path(OPAMP_PATH);
        }
        Ok(address)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Installation state of a reported package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    #[default]
    Installed,
    InstallPending,
    Installing,
    InstallFailed,
    Downloading,
}

impl From<PackageState> for PackageStatusEnum {
    fn from(state: PackageState) -> PackageStatusEnum {
        match state {
            PackageState::Installed => PackageStatusEnum::Installed,
            PackageState::InstallPending => PackageStatusEnum::InstallPending,
            PackageState::Installing => PackageStatusEnum::Installing,
            PackageState::InstallFailed => PackageStatusEnum::InstallFailed,
            PackageState::Downloading => PackageStatusEnum::Downloading,
        }
    }
}

/// A package the agent reports to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default, alias = "agentHasVersion")]
    pub version: String,
    #[serde(default)]
    pub status: PackageState,
    #[serde(default, alias = "errorMessage")]
    pub error_message: String,
}

impl PackageInfo {
    pub fn new(name: &str, version: &str) -> PackageInfo {
        PackageInfo {
            name: name.to_string(),
            version: version.to_string(),
            status: PackageState::Installed,
            error_message: "".to_string(),
        }
    }

    pub fn to_status(&self) -> PackageStatus {
        PackageStatus {
            name: self.name.clone(),
            agent_has_version: self.version.clone(),
            status: PackageStatusEnum::from(self.status) as i32,
            error_message: self.error_message.clone(),
            ..Default::default()
        }
    }
}
