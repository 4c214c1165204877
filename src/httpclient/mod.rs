use crate::api::{ClientError, TransportError, TransportErrorKind};
use crate::config::ClientConfig;
use crate::opamp::{
    spec::{AgentToServer, ServerToAgent},
    Transport,
};
use async_trait::async_trait;
use prost::Message as ProstMessage;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client as ReqwestClient;
use std::time::Duration;

pub mod gzip;

/// Media type of OpAMP messages over HTTP
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";
/// Header carrying the device identifier the agent was launched for
pub const DEVICE_ID_HEADER: &str = "X-Odigos-DeviceId";

/// The `HttpTransport` performs OpAMP exchanges as plain HTTP POSTs.
///
/// Properties:
///
/// * `address`: full URL of the server's OpAMP endpoint.
/// * `device_id`: value of the device id header.
/// * `client`: a dedicated reqwest client. It carries no middleware, so the exchange never
/// reaches whatever request tracing the host process has installed.
/// * `timeout`: bound on one exchange, from request start to the last body byte.
/// * `compress`: gzip outbound bodies.
pub struct HttpTransport {
    address: url::Url,
    target: String,
    device_id: String,
    client: ReqwestClient,
    timeout: Duration,
    compress: bool,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<HttpTransport, ClientError> {
        let address = config.endpoint()?;
        let client = ReqwestClient::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            target: address.to_string(),
            address,
            device_id: config.device_id.clone(),
            client,
            timeout: config.request_timeout(),
            compress: config.compression,
        })
    }

    fn failure(&self, kind: TransportErrorKind, reason: &str) -> TransportError {
        TransportError::new(kind, &self.target, reason)
    }

    fn request_failure(&self, e: reqwest::Error) -> TransportError {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Connect
        };
        let err = self.failure(kind, &e.to_string());
        match e.status() {
            Some(status) => err.with_status(status.as_u16()),
            None => err,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn target(&self) -> &str {
        &self.target
    }

    async fn send(&self, message: &AgentToServer) -> Result<ServerToAgent, TransportError> {
        let request_body = message.encode_to_vec();

        let mut request = self
            .client
            .post(self.address.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .header(DEVICE_ID_HEADER, self.device_id.as_str());

        if self.compress {
            log::trace!("Sending a compressed payload");
            let compressed = gzip::compress(&request_body)
                .map_err(|e| self.failure(TransportErrorKind::Encode, &e))?;
            request = request
                .header(CONTENT_ENCODING, "gzip")
                .header(ACCEPT_ENCODING, "gzip")
                .body(compressed);
        } else {
            request = request.body(request_body);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::debug!("Request send failure: {}", e);
                return Err(self.request_failure(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            log::debug!("Request failure: {}", status.as_str());
            return Err(self
                .failure(
                    TransportErrorKind::Status,
                    status.canonical_reason().unwrap_or("unexpected status"),
                )
                .with_status(status.as_u16()));
        }

        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .map(|encoding| encoding.as_bytes().eq_ignore_ascii_case(b"gzip"))
            .unwrap_or(false);

        let response_body = response
            .bytes()
            .await
            .map_err(|e| self.request_failure(e).with_status(status.as_u16()))?;

        // Check for compressed response and decompress if necessary
        let server_message = if gzipped {
            let decompressed = gzip::decompress(&response_body).map_err(|e| {
                self.failure(TransportErrorKind::Body, &e)
                    .with_status(status.as_u16())
            })?;
            ServerToAgent::decode(decompressed.as_slice())
        } else {
            ServerToAgent::decode(response_body.as_ref())
        };

        server_message.map_err(|e| {
            self.failure(TransportErrorKind::Decode, &e.to_string())
                .with_status(status.as_u16())
        })
    }
}
