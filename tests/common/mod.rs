//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use subapp_server::config::ServerConfig;
use subapp_server::http::{CreateOptions, ServerInstance};

/// Config listening on an ephemeral loopback port, with the module rooted
/// at `module_dir`.
pub fn local_config(module_dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config.module.module_dir = Some(module_dir.to_path_buf());
    config
}

pub async fn new_server() -> ServerInstance {
    ServerInstance::create(CreateOptions::default()).await.unwrap()
}

/// Start `server` on an ephemeral loopback port.
pub async fn listen_local(server: &ServerInstance) -> SocketAddr {
    server
        .listen("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap()
}

pub fn get(uri: &str) -> Request {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_accept(uri: &str, accept: &str) -> Request {
    Request::builder()
        .uri(uri)
        .header("accept", accept)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
