mod common;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use common::{remote_config, sdk_body};
use opamp_http_agent::httpclient::{gzip, HttpTransport, DEVICE_ID_HEADER, PROTOBUF_CONTENT_TYPE};
use opamp_http_agent::opamp::spec::{AgentToServer, ServerToAgent};
use opamp_http_agent::opamp::Transport;
use opamp_http_agent::remoteconfig::SDK_SECTION;
use opamp_http_agent::{ClientConfig, NoopCallbacks, OpampClient, TransportErrorKind};
use prost::Message;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<(HeaderMap, AgentToServer)>>>;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn transport_for(addr: SocketAddr) -> HttpTransport {
    HttpTransport::new(&ClientConfig::new("dev1", &addr.to_string())).unwrap()
}

fn heartbeat(sequence_num: u64) -> AgentToServer {
    AgentToServer {
        instance_uid: b"0190a1b2-0000-7000-8000-000000000000".to_vec(),
        sequence_num,
        ..AgentToServer::default()
    }
}

fn protobuf(message: &ServerToAgent) -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
    (
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        message.encode_to_vec(),
    )
}

/// Answers every message with `reply`, remembering what came in.
fn recording_server(seen: Seen, reply: ServerToAgent) -> Router {
    Router::new().route(
        "/v1/opamp",
        post(move |headers: HeaderMap, body: Bytes| {
            let seen = seen.clone();
            let reply = reply.clone();
            async move {
                let message = AgentToServer::decode(body.as_ref()).unwrap();
                seen.lock().unwrap().push((headers, message));
                protobuf(&reply)
            }
        }),
    )
}

#[tokio::test]
async fn posts_protobuf_with_the_device_header() {
    let seen = Seen::default();
    let reply = ServerToAgent {
        flags: 1,
        ..ServerToAgent::default()
    };
    let addr = serve(recording_server(seen.clone(), reply.clone())).await;
    let transport = transport_for(addr);
    assert_eq!(transport.target(), format!("http://{}/v1/opamp", addr));

    let response = transport.send(&heartbeat(3)).await.unwrap();
    assert_eq!(response, reply);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (headers, message) = &seen[0];
    assert_eq!(headers[header::CONTENT_TYPE], PROTOBUF_CONTENT_TYPE);
    assert_eq!(headers[DEVICE_ID_HEADER], "dev1");
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(message, &heartbeat(3));
}

#[tokio::test]
async fn server_errors_carry_the_status() {
    let app = Router::new().route(
        "/v1/opamp",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = serve(app).await;

    let err = transport_for(addr).send(&heartbeat(1)).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::Status);
    assert_eq!(err.status, Some(500));
    assert!(err.target.ends_with("/v1/opamp"));
}

#[tokio::test]
async fn wrong_path_is_a_status_error() {
    let addr = serve(Router::new().route("/other", post(|| async { "" }))).await;

    let err = transport_for(addr).send(&heartbeat(1)).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::Status);
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let app = Router::new().route(
        "/v1/opamp",
        post(|| async { vec![0xffu8, 0xff, 0xff, 0xff, 0x0f] }),
    );
    let addr = serve(app).await;

    let err = transport_for(addr).send(&heartbeat(1)).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::Decode);
    assert_eq!(err.status, Some(200));
}

#[tokio::test]
async fn slow_server_times_out() {
    let app = Router::new().route(
        "/v1/opamp",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            protobuf(&ServerToAgent::default())
        }),
    );
    let addr = serve(app).await;
    let config = ClientConfig {
        request_timeout_ms: 200,
        ..ClientConfig::new("dev1", &addr.to_string())
    };

    let err = HttpTransport::new(&config)
        .unwrap()
        .send(&heartbeat(1))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn unreachable_server_is_a_connect_error() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = transport_for(addr).send(&heartbeat(1)).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::Connect);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn gzip_bodies_both_ways() {
    let seen = Seen::default();
    let reply = ServerToAgent {
        flags: 1,
        ..ServerToAgent::default()
    };
    let app = {
        let seen = seen.clone();
        let reply = reply.clone();
        Router::new().route(
            "/v1/opamp",
            post(move |headers: HeaderMap, body: Bytes| {
                let seen = seen.clone();
                let reply = reply.clone();
                async move {
                    let raw = gzip::decompress(&body).unwrap();
                    let message = AgentToServer::decode(raw.as_slice()).unwrap();
                    seen.lock().unwrap().push((headers, message));
                    (
                        [
                            (header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE),
                            (header::CONTENT_ENCODING, "gzip"),
                        ],
                        gzip::compress(&reply.encode_to_vec()).unwrap(),
                    )
                }
            }),
        )
    };
    let addr = serve(app).await;
    let config = ClientConfig {
        compression: true,
        ..ClientConfig::new("dev1", &addr.to_string())
    };

    let response = HttpTransport::new(&config)
        .unwrap()
        .send(&heartbeat(9))
        .await
        .unwrap();
    assert_eq!(response, reply);

    let seen = seen.lock().unwrap();
    let (headers, message) = &seen[0];
    assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
    assert_eq!(message.sequence_num, 9);
}

#[tokio::test]
async fn client_runs_against_a_live_server() {
    let seen = Seen::default();
    let sdk = sdk_body(&[("service.name", "checkout")]);
    let reply = remote_config(&[(SDK_SECTION, sdk.as_str())], "hash-1");
    let addr = serve(recording_server(seen.clone(), reply)).await;

    let config = ClientConfig {
        polling_interval_ms: 100,
        ..ClientConfig::new("dev1", &addr.to_string())
    };
    let mut client = OpampClient::new(config, Arc::new(NoopCallbacks)).unwrap();
    let hook = client.resource_attributes().unwrap();

    client.start().await.unwrap();
    let attributes = hook.await;
    assert_eq!(attributes["service.name"], "checkout");
    assert_eq!(attributes["service.instance.id"], client.instance_id());

    tokio::time::sleep(Duration::from_millis(350)).await;
    client.shutdown().await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.len() >= 3);
    let sequence: Vec<u64> = seen.iter().map(|(_, m)| m.sequence_num).collect();
    let expected: Vec<u64> = (1..=seen.len() as u64).collect();
    assert_eq!(sequence, expected);
    assert!(seen.iter().all(|(headers, _)| headers[DEVICE_ID_HEADER] == "dev1"));
    assert!(seen.last().unwrap().1.agent_disconnect.is_some());
}
