//! End-to-end forwarding through a real proxy listener to an in-process upstream.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use common::{echo_upstream, spawn_upstream, start_proxy};

async fn echo_proxy() -> (std::net::SocketAddr, common::TestProxy) {
    let upstream = spawn_upstream(echo_upstream()).await;
    let proxy = start_proxy(&format!("http://{upstream}"), 5_000).await;
    (upstream, proxy)
}

#[tokio::test]
async fn duplicate_authorization_is_collapsed_to_first() {
    let (_, proxy) = echo_proxy().await;

    let mut headers = HeaderMap::new();
    headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer token1"));
    headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer token2"));

    let resp = reqwest::Client::new()
        .get(proxy.url("/"))
        .headers(headers)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["authorization"], serde_json::json!(["Bearer token1"]));
}

#[tokio::test]
async fn single_authorization_passes_unchanged() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["authorization"], serde_json::json!(["Basic dXNlcjpwYXNz"]));
}

#[tokio::test]
async fn other_headers_are_not_deduplicated() {
    let (_, proxy) = echo_proxy().await;

    let mut headers = HeaderMap::new();
    headers.append("x-custom", HeaderValue::from_static("value1"));
    headers.append("x-custom", HeaderValue::from_static("value2"));

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .headers(headers)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["x_custom"], serde_json::json!(["value1", "value2"]));
}

#[tokio::test]
async fn host_is_rewritten_to_upstream() {
    let (upstream, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::get(proxy.url("/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["host"], serde_json::json!([upstream.to_string()]));
}

#[tokio::test]
async fn path_and_query_are_preserved() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::get(proxy.url("/a/b%20c?x=1&y=%2F&x=2"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["uri"], "/a/b%20c?x=1&y=%2F&x=2");
    assert_eq!(echoed["method"], "GET");
}

#[tokio::test]
async fn method_is_preserved() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .delete(proxy.url("/items/7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["method"], "DELETE");
    assert_eq!(echoed["uri"], "/items/7");
}

#[tokio::test]
async fn caller_address_is_appended_to_forwarded_for() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .header("x-forwarded-for", "203.0.113.9")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        echoed["x_forwarded_for"],
        serde_json::json!(["203.0.113.9, 127.0.0.1"])
    );
}

#[tokio::test]
async fn hop_by_hop_headers_are_not_forwarded() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .header("keep-alive", "timeout=5")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["keep_alive"], serde_json::json!([]));
}

#[tokio::test]
async fn upgrade_handshake_headers_reach_upstream() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .header("connection", "Upgrade")
        .header("upgrade", "websocket")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["connection"], serde_json::json!(["Upgrade"]));
    assert_eq!(echoed["upgrade"], serde_json::json!(["websocket"]));
}

#[tokio::test]
async fn te_trailers_is_forwarded() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::Client::new()
        .get(proxy.url("/"))
        .header("te", "trailers")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["te"], serde_json::json!(["trailers"]));
}

/// Read a response head byte by byte so nothing past the blank line is consumed.
async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let byte = tokio::time::timeout(Duration::from_secs(2), stream.read_u8())
            .await
            .expect("response head did not arrive")
            .unwrap();
        head.push(byte);
    }
    String::from_utf8(head).unwrap()
}

#[tokio::test]
async fn upgraded_connection_is_tunneled_both_ways() {
    let (_, proxy) = echo_proxy().await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(
            b"GET /upgrade HTTP/1.1\r\nHost: relay.test\r\nConnection: Upgrade\r\nUpgrade: echo\r\n\r\n",
        )
        .await
        .unwrap();

    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head: {head}");
    assert!(head.to_ascii_lowercase().contains("upgrade: echo"));

    for message in [&b"ping"[..], &b"second frame"[..]] {
        stream.write_all(message).await.unwrap();
        let mut buf = vec![0_u8; message.len()];
        tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
            .await
            .expect("tunneled bytes did not come back")
            .unwrap();
        assert_eq!(buf, message);
    }
    assert_eq!(proxy.state.stats.forwarded.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn upgrade_refused_by_upstream_is_relayed() {
    let (_, proxy) = echo_proxy().await;

    let resp = reqwest::Client::new()
        .get(proxy.url("/upgrade"))
        .header("connection", "Upgrade")
        .header("upgrade", "websocket")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn upstream_status_passes_through() {
    let (_, proxy) = echo_proxy().await;

    for code in [200_u16, 404, 500] {
        let resp = reqwest::get(proxy.url(&format!("/status/{code}")))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), code);
    }
    assert_eq!(proxy.state.stats.forwarded.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn request_body_reaches_upstream() {
    let (_, proxy) = echo_proxy().await;

    let payload = vec![b'z'; 256 * 1024];
    let resp = reqwest::Client::new()
        .post(proxy.url("/echo-body"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), payload.as_slice());
}

type ChunkRx = mpsc::Receiver<Result<Bytes, std::io::Error>>;

/// Upstream whose single response body is fed by the test through `tx`.
async fn streaming_upstream() -> (std::net::SocketAddr, mpsc::Sender<Result<Bytes, std::io::Error>>) {
    let (tx, rx) = mpsc::channel(4);
    let slot: Arc<Mutex<Option<ChunkRx>>> = Arc::new(Mutex::new(Some(rx)));

    let router = Router::new()
        .route(
            "/stream",
            get(|State(slot): State<Arc<Mutex<Option<ChunkRx>>>>| async move {
                match slot.lock().await.take() {
                    Some(rx) => Body::from_stream(ReceiverStream::new(rx)),
                    None => Body::from("stream already taken"),
                }
            }),
        )
        .with_state(slot);

    (spawn_upstream(router).await, tx)
}

async fn read_at_least(resp: &mut reqwest::Response, n: usize) -> Vec<u8> {
    let mut collected = Vec::new();
    while collected.len() < n {
        let chunk = tokio::time::timeout(Duration::from_secs(2), resp.chunk())
            .await
            .expect("chunk did not arrive while upstream body was still open")
            .unwrap()
            .expect("body ended early");
        collected.extend_from_slice(&chunk);
    }
    collected
}

#[tokio::test]
async fn response_body_is_streamed_not_buffered() {
    let (upstream, tx) = streaming_upstream().await;
    let proxy = start_proxy(&format!("http://{upstream}"), 5_000).await;

    tx.send(Ok(Bytes::from_static(b"first"))).await.unwrap();

    let mut resp = reqwest::get(proxy.url("/stream")).await.unwrap();
    assert_eq!(resp.status(), 200);

    // The upstream body is still open here; only streaming can deliver this.
    assert_eq!(read_at_least(&mut resp, 5).await, b"first");

    tx.send(Ok(Bytes::from_static(b"second"))).await.unwrap();
    drop(tx);

    let rest = resp.bytes().await.unwrap();
    assert_eq!(rest.as_ref(), b"second");
}

#[tokio::test]
async fn mid_stream_failure_aborts_the_response() {
    let (upstream, tx) = streaming_upstream().await;
    let proxy = start_proxy(&format!("http://{upstream}"), 5_000).await;

    tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();

    let mut resp = reqwest::get(proxy.url("/stream")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(read_at_least(&mut resp, 7).await, b"partial");

    tx.send(Err(std::io::Error::other("upstream crashed")))
        .await
        .unwrap();

    let rest = tokio::time::timeout(Duration::from_secs(2), resp.bytes())
        .await
        .expect("aborted body should fail promptly");
    assert!(rest.is_err());
}

#[tokio::test]
async fn caller_disconnect_releases_the_upstream_stream() {
    let (upstream, tx) = streaming_upstream().await;
    let proxy = start_proxy(&format!("http://{upstream}"), 5_000).await;

    tx.send(Ok(Bytes::from_static(b"first"))).await.unwrap();

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"GET /stream HTTP/1.1\r\nHost: relay.test\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200"), "unexpected head: {head}");

    let mut seen = Vec::new();
    while !seen.windows(5).any(|w| w == b"first") {
        let mut buf = [0_u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("first chunk did not arrive")
            .unwrap();
        assert!(n > 0, "proxy closed the connection early");
        seen.extend_from_slice(&buf[..n]);
    }

    drop(stream);

    // Keep the upstream writing until the proxy lets go of its body.
    let released = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if tx.send(Ok(Bytes::from(vec![b'x'; 16 * 1024]))).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(
        released.is_ok(),
        "upstream body was still being read after the caller disconnected"
    );
}

#[tokio::test]
async fn unreachable_upstream_returns_502() {
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = start_proxy(&format!("http://{closed}"), 5_000).await;

    let resp = reqwest::get(proxy.url("/anything")).await.unwrap();
    assert_eq!(resp.status(), 502);
    assert_eq!(resp.text().await.unwrap(), "Bad Gateway");
    assert_eq!(proxy.state.stats.failed.load(Ordering::Relaxed), 1);
    assert_eq!(proxy.state.stats.forwarded.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn slow_upstream_returns_504() {
    let upstream = spawn_upstream(echo_upstream()).await;
    let proxy = start_proxy(&format!("http://{upstream}"), 200).await;

    let started = std::time::Instant::now();
    let resp = reqwest::get(proxy.url("/slow")).await.unwrap();
    assert_eq!(resp.status(), 504);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(proxy.state.stats.timed_out.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn health_path_is_forwarded_on_the_proxy_listener() {
    let (_, proxy) = echo_proxy().await;

    let echoed: Value = reqwest::get(proxy.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["uri"], "/health");
}
