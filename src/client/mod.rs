//! The OpAMP client: bootstrap, heartbeat and disconnect around a [`Transport`].

use crate::api::{AgentCallbacks, ClientError};
use crate::attributes::{self, Attributes};
use crate::config::ClientConfig;
use crate::opamp::spec::{
    AgentDescription, PackageStatuses, RemoteConfigStatus, RemoteConfigStatuses, ServerToAgent,
};
use crate::opamp::defaults::{self, HealthStatus};
use crate::opamp::{util, Transport};
use crate::remoteconfig;
use crate::state::Phase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

mod message;
mod resolver;
mod scheduler;

pub use message::OutboundMessage;
pub use resolver::ResourceAttributes;
pub use scheduler::HeartbeatScheduler;

use resolver::AttributeResolver;

/// Full state exchanges tried before bootstrap gives up
pub const BOOTSTRAP_ATTEMPTS: usize = 5;
/// Fixed pause between two bootstrap attempts
pub const BOOTSTRAP_RETRY_INTERVAL: Duration = Duration::from_secs(2);
/// Reported back when a pushed config has no instrumentation libraries section
pub const MISSING_LIBRARIES_ERROR: &str = "missing instrumentation libraries remote config";

// Mutable per-message state. Held for the whole exchange so sends never interleave.
struct Outbound {
    sequence_num: u64,
    remote_config_status: Option<RemoteConfigStatus>,
}

/// Everything a send needs, shared between the client and its heartbeat task.
struct Session {
    instance_id: String,
    agent_description: AgentDescription,
    package_statuses: PackageStatuses,
    started_at_unix_nano: u64,
    transport: Arc<dyn Transport>,
    callbacks: Arc<dyn AgentCallbacks>,
    outbound: Mutex<Outbound>,
}

impl Session {
    /// The one place messages leave the client. Increments the sequence number, stamps it
    /// together with the instance uid and the latest remote config status, then waits for
    /// the exchange to finish.
    async fn send(&self, message: OutboundMessage) -> Result<ServerToAgent, ClientError> {
        let mut outbound = self.outbound.lock().await;
        outbound.sequence_num += 1;

        let kind = message.kind();
        let wire = message.into_wire(
            self.instance_id.as_bytes(),
            outbound.sequence_num,
            outbound.remote_config_status.clone(),
        );
        log::debug!(
            "Sending {} #{} to {}",
            kind,
            wire.sequence_num,
            self.transport.target()
        );
        log::trace!("Outbound: {:?}", wire);

        let response = self.transport.send(&wire).await?;
        log::trace!("Inbound: {:?}", response);
        Ok(response)
    }

    fn full_state(&self, status: HealthStatus) -> OutboundMessage {
        OutboundMessage::FullState {
            agent_description: self.agent_description.clone(),
            package_statuses: self.package_statuses.clone(),
            health: defaults::agent_health(status, self.started_at_unix_nano),
        }
    }

    async fn send_full_state(&self, status: HealthStatus) -> Result<ServerToAgent, ClientError> {
        self.send(self.full_state(status)).await
    }

    /// Hands instrumentation library settings to the host and records how that went.
    /// Never fails: a bad section is logged and reported back to the server.
    async fn apply_remote_config(&self, response: &ServerToAgent) {
        let remote_config = match response.remote_config.as_ref() {
            Some(remote_config) => remote_config,
            None => return,
        };
        let bundle = match remote_config.config.as_ref() {
            Some(bundle) => bundle,
            None => return,
        };

        let mut status = RemoteConfigStatus {
            last_remote_config_hash: remote_config.config_hash.clone(),
            status: RemoteConfigStatuses::Applied as i32,
            error_message: "".to_string(),
        };
        match remoteconfig::extract_instrumentation_libraries(bundle) {
            Ok(configs) => self.callbacks.on_instrumentation_libraries_config(&configs),
            Err(ClientError::MissingSection(section)) => {
                log::warn!("Remote config carries no {} section", section);
                status.status = RemoteConfigStatuses::Failed as i32;
                status.error_message = MISSING_LIBRARIES_ERROR.to_string();
            }
            Err(e) => {
                log::warn!("Ignoring instrumentation libraries config: {}", e);
                status.status = RemoteConfigStatuses::Failed as i32;
                status.error_message = e.to_string();
            }
        }

        self.outbound.lock().await.remote_config_status = Some(status);
    }

    /// One heartbeat tick. Nothing here fails the loop.
    async fn heartbeat(&self) {
        let response = match self.send(OutboundMessage::Heartbeat).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Heartbeat failed: {}", e);
                return;
            }
        };
        self.apply_remote_config(&response).await;

        if defaults::report_full_state_requested(response.flags) {
            log::info!("Server requested full state, resending");
            // The resync response is not checked for the flag again
            match self.send_full_state(HealthStatus::Healthy).await {
                Ok(response) => self.apply_remote_config(&response).await,
                Err(e) => log::warn!("Full state resync failed: {}", e),
            }
        }
    }

    async fn bootstrap_attempt(&self) -> Result<(Attributes, ServerToAgent), ClientError> {
        let response = self.send_full_state(HealthStatus::Starting).await?;
        let sdk = response
            .remote_config
            .as_ref()
            .and_then(|remote_config| remote_config.config.as_ref())
            .ok_or_else(|| ClientError::missing_section(remoteconfig::SDK_SECTION))
            .and_then(|bundle| remoteconfig::extract_sdk(bundle, &self.instance_id));
        match sdk {
            Ok(sdk) => Ok((sdk.resource_attributes, response)),
            Err(e) => {
                // Whatever config came with a failed attempt is still acknowledged
                self.apply_remote_config(&response).await;
                Err(e)
            }
        }
    }

    /// Runs the full state exchange until the server hands out resource attributes, and
    /// resolves the attribute hook either way.
    async fn bootstrap(&self, resolver: AttributeResolver) {
        for attempt in 1..=BOOTSTRAP_ATTEMPTS {
            match self.bootstrap_attempt().await {
                Ok((resource_attributes, response)) => {
                    log::info!(
                        "Bootstrapped {} on attempt {}",
                        self.instance_id,
                        attempt
                    );
                    self.callbacks
                        .on_resource_attributes_resolved(&resource_attributes);
                    resolver.resolve(resource_attributes);
                    self.apply_remote_config(&response).await;
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "Bootstrap attempt {}/{} failed: {}",
                        attempt,
                        BOOTSTRAP_ATTEMPTS,
                        e
                    );
                }
            }
            if attempt < BOOTSTRAP_ATTEMPTS {
                tokio::time::sleep(BOOTSTRAP_RETRY_INTERVAL).await;
            }
        }

        log::error!(
            "Giving up on bootstrap after {} attempts, continuing with fallback resource attributes",
            BOOTSTRAP_ATTEMPTS
        );
        self.callbacks
            .on_resource_attributes_resolved(resolver.fallback());
        resolver.resolve_fallback();
    }
}

/// An OpAMP agent talking to one server.
///
/// The client moves through [`Phase::Bootstrapping`], [`Phase::Steady`] and
/// [`Phase::Disconnected`], in that order only. Once disconnected it cannot be started again.
///
/// ```no_run
/// use opamp_http_agent::{ClientConfig, NoopCallbacks, OpampClient};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), opamp_http_agent::ClientError> {
/// let config = ClientConfig::new("device-1", "127.0.0.1:4320");
/// let mut client = OpampClient::new(config, Arc::new(NoopCallbacks))?;
/// let attributes = client.resource_attributes();
/// client.start().await?;
/// if let Some(attributes) = attributes {
///     println!("{:?}", attributes.await);
/// }
/// client.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct OpampClient {
    session: Arc<Session>,
    scheduler: HeartbeatScheduler,
    resolver: Option<AttributeResolver>,
    resource_attributes: Option<ResourceAttributes>,
    phase: Phase,
}

impl OpampClient {
    /// Builds a client talking HTTP to `config.server_host`.
    #[cfg(feature = "http")]
    pub fn new(
        config: ClientConfig,
        callbacks: Arc<dyn AgentCallbacks>,
    ) -> Result<OpampClient, ClientError> {
        let transport = crate::httpclient::HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport), callbacks)
    }

    /// Builds a client on top of any transport.
    ///
    /// Fails when the configuration is invalid, including attribute values that cannot be
    /// encoded.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        callbacks: Arc<dyn AgentCallbacks>,
    ) -> Result<OpampClient, ClientError> {
        config.validate()?;
        let instance_id = util::generate_instance_id();

        let agent_description = describe_agent(&config, &instance_id)?;
        let package_statuses = defaults::package_statuses(&config.initial_package_statuses);
        let (resolver, resource_attributes) = AttributeResolver::channel(
            defaults::fallback_resource_attributes(&config.device_id),
        );

        log::debug!(
            "Created OpAMP client {} for device {}",
            instance_id,
            config.device_id
        );

        Ok(OpampClient {
            session: Arc::new(Session {
                instance_id: instance_id.to_string(),
                agent_description,
                package_statuses,
                started_at_unix_nano: util::unix_time_nanos(),
                transport,
                callbacks,
                outbound: Mutex::new(Outbound {
                    sequence_num: 0,
                    remote_config_status: None,
                }),
            }),
            scheduler: HeartbeatScheduler::new(config.polling_interval()),
            resolver: Some(resolver),
            resource_attributes: Some(resource_attributes),
            phase: Phase::Bootstrapping,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.session.instance_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The attribute hook. Handed out once; later calls return `None`.
    pub fn resource_attributes(&mut self) -> Option<ResourceAttributes> {
        self.resource_attributes.take()
    }

    /// Bootstraps against the server and schedules heartbeats.
    ///
    /// Returns once bootstrap has succeeded or given up; it does not wait for heartbeats.
    /// Only server reachability is retried here, so the only error is calling it twice.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        let resolver = match (self.phase, self.resolver.take()) {
            (Phase::Bootstrapping, Some(resolver)) => resolver,
            _ => {
                return Err(ClientError::InvalidPhase {
                    operation: "start",
                    phase: self.phase,
                })
            }
        };

        self.session.bootstrap(resolver).await;
        self.transition(Phase::Steady, "start")?;

        let session = self.session.clone();
        self.scheduler.start(move || {
            let session = session.clone();
            async move { session.heartbeat().await }
        });
        Ok(())
    }

    /// Stops heartbeats and sends the disconnect message.
    ///
    /// The outcome of that single exchange is returned as is. A heartbeat already on the
    /// wire is not interrupted.
    pub async fn shutdown(&mut self) -> Result<ServerToAgent, ClientError> {
        self.scheduler.cancel();
        self.transition(Phase::Disconnected, "shut down")?;

        // Never started: the host still gets its attributes
        if let Some(resolver) = self.resolver.take() {
            self.session
                .callbacks
                .on_resource_attributes_resolved(resolver.fallback());
            resolver.resolve_fallback();
        }

        let health = defaults::agent_health(
            HealthStatus::Terminated,
            self.session.started_at_unix_nano,
        );
        self.session
            .send(OutboundMessage::Disconnect { health })
            .await
    }

    fn transition(&mut self, next: Phase, operation: &'static str) -> Result<(), ClientError> {
        match self.phase.evaluate(next) {
            Some(phase) => {
                self.phase = phase;
                Ok(())
            }
            None => Err(ClientError::InvalidPhase {
                operation,
                phase: self.phase,
            }),
        }
    }
}

/// Identifying attributes are the caller's plus the instance id, which always wins.
/// Non-identifying ones optionally start from the host description, caller values on top.
fn describe_agent(config: &ClientConfig, instance_id: &Uuid) -> Result<AgentDescription, ClientError> {
    let mut identifying = config.identifying_attributes.clone().unwrap_or_default();
    identifying.insert(
        defaults::SERVICE_INSTANCE_ID.to_string(),
        instance_id.to_string().into(),
    );

    let non_identifying = if config.report_host_attributes {
        let mut merged = defaults::host_attributes();
        if let Some(attributes) = config.non_identifying_attributes.as_ref() {
            merged.extend(attributes.clone());
        }
        Some(merged)
    } else {
        config.non_identifying_attributes.clone()
    };

    Ok(AgentDescription {
        identifying_attributes: attributes::encode(Some(&identifying))?.unwrap_or_default(),
        non_identifying_attributes: attributes::encode(non_identifying.as_ref())?
            .unwrap_or_default(),
    })
}
