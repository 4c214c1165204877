//! # OpAMP HTTP Agent Client
//!
//! An OpAMP client for agents that learn their identity and settings from a management server.
//!
//! The client talks to the server over plain HTTP POSTs and is built around a small lifecycle:
//!
//! * Bootstrap: report the full agent state and pick the resource attributes out of the
//!   server's `SDK` configuration section, retrying a fixed number of times
//! * Heartbeat: report in on a fixed interval and resend the full state when asked to
//! * Disconnect: tell the server the agent is going away
//!
//! Configuration pushed by the server is handed to the host through callbacks; the resource
//! attributes are also available as a one-shot future.
//!
//! ## Not supported
//! The following will *not* be supported by this library
//!
//! * Websocket transport
//! * Applying instrumentation settings (that is left to the host)
//! * Persisting identity or configuration between runs
//! * Authentication at the protocol level
//!
//! # Integrating opamp-http-agent
//!
//! ```toml
//! opamp-http-agent = { version = "0.1.0", features = ["http", "config"] }
//! ```
//!
//! Hosts that want to react to server pushed configuration implement
//!
//! ```
//! # use opamp_http_agent::{attributes::Attributes, remoteconfig::InstrumentationLibraryConfig};
//! pub trait AgentCallbacks: Send + Sync {
//!     fn on_resource_attributes_resolved(&self, attributes: &Attributes) {}
//!     fn on_instrumentation_libraries_config(&self, configs: &[InstrumentationLibraryConfig]) {}
//! }
//! ```
//!
//! and drive the client like so:
//!
//! ```no_run
//! use opamp_http_agent::{ClientConfig, NoopCallbacks, OpampClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), opamp_http_agent::ClientError> {
//! let config = ClientConfig::from_env()?;
//! let mut client = OpampClient::new(config, Arc::new(NoopCallbacks))?;
//! let resource_attributes = client.resource_attributes();
//!
//! // Returns once bootstrap succeeded or gave up; heartbeats continue in the background
//! client.start().await?;
//!
//! // ... run the agent ...
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Under the hood
//!
//! ### Finite State Machine
//!
//! [`state::Phase`] tracks the client: bootstrapping, steady and disconnected. Transitions only
//! move forward and are logged at debug level.
//!
//! ### Transport
//!
//! The client sends through the [`opamp::Transport`] trait. [`httpclient::HttpTransport`] is the
//! HTTP implementation; tests and other carriers can plug in their own. Every message passes
//! through a single send path that stamps the instance uid and the next sequence number, so
//! the server always sees `1, 2, 3, ...` from one client.
//!
//! ### Remote configuration
//!
//! [`remoteconfig`] turns the server's JSON sections into typed values and [`attributes`]
//! converts attribute maps to and from their wire form.
//!
//! ## Logging
//!
//! The library logs through the `log` crate and never installs a logger. The `opamp-agent`
//! binary uses `simple_logger`, with the level taken from `OPAMP_LOG_LEVEL`.
//!

pub mod api;
pub mod attributes;
pub mod client;
pub mod config;
#[cfg(feature = "http")]
pub mod httpclient;
pub mod opamp;
pub mod remoteconfig;
pub mod state;

pub use api::{AgentCallbacks, ClientError, NoopCallbacks, TransportError, TransportErrorKind};
pub use client::{OpampClient, ResourceAttributes};
pub use config::{ClientConfig, PackageInfo, PackageState};
pub use state::Phase;
