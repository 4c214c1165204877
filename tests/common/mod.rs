#![allow(dead_code)]

use async_trait::async_trait;
use opamp_http_agent::attributes::{self, Attributes};
use opamp_http_agent::opamp::spec::{
    AgentConfigFile, AgentConfigMap, AgentRemoteConfig, AgentToServer, ServerToAgent,
};
use opamp_http_agent::opamp::Transport;
use opamp_http_agent::remoteconfig::{
    InstrumentationLibraryConfig, INSTRUMENTATION_LIBRARIES_SECTION, SDK_SECTION,
};
use opamp_http_agent::{AgentCallbacks, TransportError, TransportErrorKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const TARGET: &str = "scripted://opamp";

type Reply = Result<ServerToAgent, TransportError>;

/// In-memory transport answering from a script, then from a fixed reply.
pub struct ScriptedTransport {
    sent: Mutex<Vec<(Instant, AgentToServer)>>,
    script: Mutex<VecDeque<Reply>>,
    otherwise: Box<dyn Fn() -> Reply + Send + Sync>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Reply>) -> ScriptedTransport {
        Self::with_fallback(script, || Ok(ServerToAgent::default()))
    }

    pub fn failing() -> ScriptedTransport {
        Self::with_fallback(vec![], || Err(unreachable_server()))
    }

    pub fn with_fallback<F>(script: Vec<Reply>, otherwise: F) -> ScriptedTransport
    where
        F: Fn() -> Reply + Send + Sync + 'static,
    {
        ScriptedTransport {
            sent: Mutex::new(vec![]),
            script: Mutex::new(script.into()),
            otherwise: Box::new(otherwise),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every exchange takes this long.
    pub fn slow(mut self, delay: Duration) -> ScriptedTransport {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<AgentToServer> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.sent().iter().map(|m| m.sequence_num).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn target(&self) -> &str {
        TARGET
    }

    async fn send(&self, message: &AgentToServer) -> Result<ServerToAgent, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), message.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        scripted.unwrap_or_else(|| (self.otherwise)())
    }
}

pub fn unreachable_server() -> TransportError {
    TransportError::new(TransportErrorKind::Connect, TARGET, "connection refused")
}

/// Callbacks that remember what they were given.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub resolved: Mutex<Vec<Attributes>>,
    pub libraries: Mutex<Vec<Vec<InstrumentationLibraryConfig>>>,
}

impl AgentCallbacks for RecordingCallbacks {
    fn on_resource_attributes_resolved(&self, attributes: &Attributes) {
        self.resolved.lock().unwrap().push(attributes.clone());
    }

    fn on_instrumentation_libraries_config(&self, configs: &[InstrumentationLibraryConfig]) {
        self.libraries.lock().unwrap().push(configs.to_vec());
    }
}

pub fn remote_config(sections: &[(&str, &str)], hash: &str) -> ServerToAgent {
    ServerToAgent {
        remote_config: Some(AgentRemoteConfig {
            config: Some(AgentConfigMap {
                config_map: sections
                    .iter()
                    .map(|(name, body)| {
                        (
                            name.to_string(),
                            AgentConfigFile {
                                body: body.as_bytes().to_vec(),
                                content_type: "application/json".to_string(),
                            },
                        )
                    })
                    .collect(),
            }),
            config_hash: hash.as_bytes().to_vec(),
        }),
        ..ServerToAgent::default()
    }
}

pub fn sdk_body(attributes: &[(&str, &str)]) -> String {
    let pairs: Vec<serde_json::Value> = attributes
        .iter()
        .map(|(key, value)| serde_json::json!({"key": key, "value": value}))
        .collect();
    serde_json::json!({"remoteResourceAttributes": pairs, "traceSignal": {}}).to_string()
}

pub fn sdk_response(attributes: &[(&str, &str)]) -> ServerToAgent {
    let sdk = sdk_body(attributes);
    remote_config(&[(SDK_SECTION, sdk.as_str())], "sdk-only")
}

pub fn sdk_response_with_libraries(
    attributes: &[(&str, &str)],
    libraries: &str,
    hash: &str,
) -> ServerToAgent {
    let sdk = sdk_body(attributes);
    remote_config(
        &[
            (SDK_SECTION, sdk.as_str()),
            (INSTRUMENTATION_LIBRARIES_SECTION, libraries),
        ],
        hash,
    )
}

pub fn flagged(flags: u64) -> ServerToAgent {
    ServerToAgent {
        flags,
        ..ServerToAgent::default()
    }
}

pub fn is_heartbeat(message: &AgentToServer) -> bool {
    message.agent_description.is_none()
        && message.package_statuses.is_none()
        && message.agent_disconnect.is_none()
        && message.health.is_none()
}

/// The reported health status string, if the message carries health at all.
pub fn health_status(message: &AgentToServer) -> Option<String> {
    message.health.as_ref().map(|health| health.status.clone())
}

pub fn is_full_state(message: &AgentToServer) -> bool {
    message.agent_description.is_some() && message.package_statuses.is_some()
}

pub fn identifying_attributes(message: &AgentToServer) -> Attributes {
    attributes::decode(
        message
            .agent_description
            .as_ref()
            .map(|d| d.identifying_attributes.as_slice()),
    )
}

pub fn non_identifying_attributes(message: &AgentToServer) -> Attributes {
    attributes::decode(
        message
            .agent_description
            .as_ref()
            .map(|d| d.non_identifying_attributes.as_slice()),
    )
}
