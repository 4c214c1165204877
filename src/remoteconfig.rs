//! Typed view of the remote configuration pushed by the OpAMP server.
//!
//! A server bundle is a map of named sections whose bodies are JSON documents. Two sections are
//! understood here: `SDK`, which carries the resource attributes the server computed for this
//! agent, and `InstrumentationLibraries`, which switches individual libraries on or off.
//! Bodies are parsed straight into the structs below; anything that does not fit is rejected as
//! a whole.

use crate::api::ClientError;
use crate::attributes::{self, Attributes};
use crate::opamp::defaults::SERVICE_INSTANCE_ID;
use crate::opamp::spec::AgentConfigMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SDK_SECTION: &str = "SDK";
pub const INSTRUMENTATION_LIBRARIES_SECTION: &str = "InstrumentationLibraries";

/// One `{key, value}` entry of the SDK section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttribute {
    pub key: String,
    pub value: Value,
}

/// Body of the `SDK` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSdkConfig {
    pub remote_resource_attributes: Vec<ResourceAttribute>,
    /// Trace signal settings, passed through untouched
    #[serde(default)]
    pub trace_signal: Value,
}

/// One entry of the `InstrumentationLibraries` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationLibraryConfig {
    pub name: String,
    pub enabled: bool,
}

/// SDK settings after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkConfig {
    pub resource_attributes: Attributes,
    pub trace_signal_config: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRemoteConfig {
    pub sdk: SdkConfig,
    pub instrumentation_libraries: Vec<InstrumentationLibraryConfig>,
}

/// Extracts and validates both sections of a bundle.
///
/// The instrumentation libraries section is checked first, then the SDK section. The
/// `service.instance.id` attribute is always set to `instance_id`, replacing whatever the
/// server sent under that key.
pub fn extract(bundle: &AgentConfigMap, instance_id: &str) -> Result<ParsedRemoteConfig, ClientError> {
    let instrumentation_libraries = extract_instrumentation_libraries(bundle)?;
    let sdk = extract_sdk(bundle, instance_id)?;
    Ok(ParsedRemoteConfig {
        sdk,
        instrumentation_libraries,
    })
}

/// Extracts only the `SDK` section.
pub fn extract_sdk(bundle: &AgentConfigMap, instance_id: &str) -> Result<SdkConfig, ClientError> {
    let parsed: ParsedSdkConfig = parse_section(bundle, SDK_SECTION)?;

    let mut resource_attributes = attributes::from_pairs(
        parsed
            .remote_resource_attributes
            .into_iter()
            .map(|attr| (attr.key, attr.value)),
    );
    resource_attributes.insert(SERVICE_INSTANCE_ID.to_string(), instance_id.into());

    Ok(SdkConfig {
        resource_attributes,
        trace_signal_config: parsed.trace_signal,
    })
}

/// Extracts only the `InstrumentationLibraries` section.
pub fn extract_instrumentation_libraries(
    bundle: &AgentConfigMap,
) -> Result<Vec<InstrumentationLibraryConfig>, ClientError> {
    parse_section(bundle, INSTRUMENTATION_LIBRARIES_SECTION)
}

fn parse_section<T: DeserializeOwned>(bundle: &AgentConfigMap, section: &str) -> Result<T, ClientError> {
    let body = match bundle.config_map.get(section) {
        Some(file) if !file.body.is_empty() => &file.body,
        _ => return Err(ClientError::missing_section(section)),
    };
    serde_json::from_slice(body).map_err(|e| ClientError::malformed_section(section, e))
}
