use crate::api::TransportError;
use async_trait::async_trait;

pub mod spec {
    include!(concat!(env!("OUT_DIR"), "/opamp.proto.rs"));
}

use spec::{AgentToServer, ServerToAgent};

#[async_trait]
/// The `Transport` trait is what different carriers implement to move one OpAMP exchange.
///
/// An implementation performs exactly one request/response round trip per call and never
/// retries on its own: retry policy belongs to the orchestrator.
pub trait Transport: Send + Sync {
    /// Human readable description of where messages go, used in logs
    fn target(&self) -> &str;
    async fn send(&self, message: &AgentToServer) -> Result<ServerToAgent, TransportError>;
}

pub mod util {
    use std::time::{SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    /// Mints a time-ordered (version 7) UUID for a new client instance.
    pub fn generate_instance_id() -> Uuid {
        Uuid::now_v7()
    }

    /// Wall clock time as nanoseconds since the Unix epoch, 0 if the clock is before it.
    pub fn unix_time_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0)
    }
}

pub mod defaults {
    use super::spec::*;
    use crate::attributes::Attributes;
    use crate::config::PackageInfo;
    use std::collections::HashMap;
    use sysinfo::{System, SystemExt};

    pub const SERVICE_INSTANCE_ID: &str = "service.instance.id";
    pub const SERVICE_NAME: &str = "service.name";

    /// Capabilities advertised on every outbound message.
    pub fn agent_capabilities() -> u64 {
        (AgentCapabilities::ReportsStatus as u64)
            | (AgentCapabilities::AcceptsRemoteConfig as u64)
            | (AgentCapabilities::ReportsRemoteConfig as u64)
            | (AgentCapabilities::ReportsPackageStatuses as u64)
            | (AgentCapabilities::ReportsHealth as u64)
    }

    /// Lifecycle health reported alongside full state and disconnect messages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HealthStatus {
        Starting,
        Healthy,
        Terminated,
    }

    impl HealthStatus {
        pub fn as_str(&self) -> &'static str {
            match self {
                HealthStatus::Starting => "Starting",
                HealthStatus::Healthy => "Healthy",
                HealthStatus::Terminated => "Terminated",
            }
        }

        pub fn is_healthy(&self) -> bool {
            *self == HealthStatus::Healthy
        }

        fn last_error(&self) -> &'static str {
            match self {
                HealthStatus::Starting => "agent is starting",
                HealthStatus::Healthy => "",
                HealthStatus::Terminated => "agent is shutting down",
            }
        }
    }

    pub fn agent_health(status: HealthStatus, start_time_unix_nano: u64) -> ComponentHealth {
        ComponentHealth {
            healthy: status.is_healthy(),
            start_time_unix_nano,
            last_error: status.last_error().to_string(),
            status: status.as_str().to_string(),
            status_time_unix_nano: super::util::unix_time_nanos(),
            component_health_map: HashMap::new(),
        }
    }

    /// Whether the server asked for a complete description of the agent.
    pub fn report_full_state_requested(flags: u64) -> bool {
        flags & (ServerToAgentFlags::ReportFullState as u64) != 0
    }

    pub fn package_statuses(packages: &[PackageInfo]) -> PackageStatuses {
        let packages: HashMap<String, PackageStatus> = packages
            .iter()
            .map(|pkg| (pkg.name.clone(), pkg.to_status()))
            .collect();

        PackageStatuses {
            packages,
            server_provided_all_packages_hash: vec![],
            error_message: "".to_string(),
        }
    }

    /// Attributes used when the server never supplied any: the device id stands in for the
    /// service name.
    pub fn fallback_resource_attributes(device_id: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(SERVICE_NAME.to_string(), device_id.into());
        attributes
    }

    /// Describes the machine the agent runs on.
    pub fn host_attributes() -> Attributes {
        let sys = System::new();
        let mut attributes = Attributes::new();
        attributes.insert("os.type".to_string(), std::env::consts::OS.into());
        if let Some(version) = sys.kernel_version() {
            attributes.insert("os.version".to_string(), version.into());
        }
        if let Some(host) = sys.host_name() {
            attributes.insert("host.name".to_string(), host.into());
        }
        attributes
    }
}
