use crate::opamp::defaults;
use crate::opamp::spec::{
    AgentDescription, AgentDisconnect, AgentToServer, ComponentHealth, PackageStatuses,
    RemoteConfigStatus,
};

/// What a single outbound message carries.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Identity and sequence number only
    Heartbeat,
    /// Complete description of the agent, its packages and its health
    FullState {
        agent_description: AgentDescription,
        package_statuses: PackageStatuses,
        health: ComponentHealth,
    },
    /// Last message of a client
    Disconnect { health: ComponentHealth },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Heartbeat => "heartbeat",
            OutboundMessage::FullState { .. } => "full state",
            OutboundMessage::Disconnect { .. } => "disconnect",
        }
    }

    /// Builds the wire message, stamped with the sender's identity and sequence number.
    pub fn into_wire(
        self,
        instance_uid: &[u8],
        sequence_num: u64,
        remote_config_status: Option<RemoteConfigStatus>,
    ) -> AgentToServer {
        let mut message = AgentToServer {
            instance_uid: instance_uid.to_vec(),
            sequence_num,
            capabilities: defaults::agent_capabilities(),
            remote_config_status,
            ..AgentToServer::default()
        };

        match self {
            OutboundMessage::Heartbeat => {}
            OutboundMessage::FullState {
                agent_description,
                package_statuses,
                health,
            } => {
                message.agent_description = Some(agent_description);
                message.package_statuses = Some(package_statuses);
                message.health = Some(health);
            }
            OutboundMessage::Disconnect { health } => {
                message.agent_disconnect = Some(AgentDisconnect {});
                message.health = Some(health);
            }
        }
        message
    }
}
