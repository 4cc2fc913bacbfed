//! Shared fixtures: an in-process upstream and a proxy pointed at it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Request};
use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};

use hostrelay::config::model::Config;
use hostrelay::config::rule::ForwardingRule;
use hostrelay::config::ConfigVersion;
use hostrelay::proxy::transport::HyperTransport;
use hostrelay::server::{self, AppState};

pub struct TestProxy {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Upstream that reports what it received as JSON.
pub fn echo_upstream() -> Router {
    Router::new()
        .route(
            "/status/{code}",
            get(|Path(code): Path<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/echo-body", post(|body: Bytes| async move { body }))
        .route("/upgrade", get(switch_to_echo))
        .fallback(echo)
}

/// Accept `Upgrade: echo` and then echo raw bytes back on the connection.
async fn switch_to_echo(mut request: Request) -> Response {
    let protocol = request.headers().get(UPGRADE).and_then(|v| v.to_str().ok());
    if protocol != Some("echo") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let on_upgrade = hyper::upgrade::on(&mut request);
    tokio::spawn(async move {
        let Ok(upgraded) = on_upgrade.await else {
            return;
        };
        let (mut reader, mut writer) = tokio::io::split(TokioIo::new(upgraded));
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, "upgrade")
        .header(UPGRADE, "echo")
        .body(Body::empty())
        .unwrap()
}

async fn echo(request: Request) -> Json<Value> {
    let headers = request.headers();
    let all = |name: &str| -> Vec<String> {
        headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect()
    };
    Json(json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
        "host": all("host"),
        "authorization": all("authorization"),
        "x_custom": all("x-custom"),
        "x_forwarded_for": all("x-forwarded-for"),
        "connection": all("connection"),
        "keep_alive": all("keep-alive"),
        "upgrade": all("upgrade"),
        "te": all("te"),
    }))
}

pub fn test_state(upstream: &str, timeout_ms: u64, listen: SocketAddr) -> Arc<AppState> {
    let mut config = Config::for_upstream(upstream);
    config.upstream.timeout = timeout_ms;
    let rule = ForwardingRule::new(&config, listen).unwrap();
    let transport = Arc::new(HyperTransport::new(&config.upstream));
    Arc::new(AppState::new(
        rule,
        &config,
        transport,
        ConfigVersion::Hash("0123456789abcdef".into()),
        "test",
    ))
}

pub async fn start_proxy(upstream: &str, timeout_ms: u64) -> TestProxy {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = test_state(upstream, timeout_ms, addr);
    let router = server::build_router(state.clone(), None);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestProxy {
        addr,
        state,
        shutdown: Some(shutdown_tx),
    }
}
