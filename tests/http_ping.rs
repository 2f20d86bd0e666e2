//! HTTP probe against a local responder.
//!
//! The responder answers each connection with the next status from a script
//! (repeating the last one) and records the request lines it saw.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use docker_ready::wait::{Condition, HttpPing, StartCondition, WaitEngine};
use docker_ready::{StartupGate, WaitError, WaitFor};
use docker_ready::testing::ScriptedRuntime;

struct Responder {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn responder(statuses: Vec<u16>) -> Responder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/health", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let status = statuses[served.min(statuses.len() - 1)];
            served += 1;

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let text = String::from_utf8_lossy(&request);
            if let Some(line) = text.lines().next() {
                seen.lock().unwrap().push(line.to_string());
            }

            let response = format!(
                "HTTP/1.1 {status} Scripted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    Responder { url, requests }
}

fn engine() -> WaitEngine {
    WaitEngine::new().with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_ok_status_is_ready() {
    let server = responder(vec![200]).await;
    let ping = HttpPing::new(&server.url).unwrap();

    engine()
        .run(&ping, Duration::from_secs(5), "web")
        .await
        .unwrap();

    let requests = server.requests.lock().unwrap();
    assert!(requests[0].starts_with("HEAD /health"), "{requests:?}");
}

#[tokio::test]
async fn test_becomes_ready_after_unavailable() {
    let server = responder(vec![503, 503, 302]).await;
    let ping = HttpPing::new(&server.url).unwrap();

    engine()
        .run(&ping, Duration::from_secs(5), "web")
        .await
        .unwrap();
    assert_eq!(server.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_not_found_times_out() {
    let server = responder(vec![404]).await;
    let ping = HttpPing::new(&server.url).unwrap();

    let err = engine()
        .run(&ping, Duration::from_millis(300), "web")
        .await
        .unwrap_err();
    match err {
        WaitError::Timeout { condition, .. } => {
            assert_eq!(condition, ping.describe());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_not_implemented_aborts_wait() {
    let server = responder(vec![501]).await;
    let ping = HttpPing::new(&server.url)
        .unwrap()
        .with_method("PROPFIND")
        .unwrap();

    let err = engine()
        .run(&ping, Duration::from_secs(30), "web")
        .await
        .unwrap_err();
    assert!(matches!(err, WaitError::Configuration { .. }));
    assert_eq!(server.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_custom_method_and_status() {
    let server = responder(vec![404]).await;
    let ping = StartCondition::pollable(
        HttpPing::new(&server.url)
            .unwrap()
            .with_method("GET")
            .unwrap()
            .with_status_pattern("404")
            .unwrap(),
    );

    engine()
        .run(&ping, Duration::from_secs(5), "web")
        .await
        .unwrap();
    assert!(server.requests.lock().unwrap()[0].starts_with("GET /health"));
}

#[tokio::test]
async fn test_gate_with_http_condition() {
    let server = responder(vec![200]).await;
    let runtime = Arc::new(ScriptedRuntime::replay(Vec::new()));

    let mut gate = StartupGate::new(runtime, "0a1b2c3d4e5f6a7b")
        .no_console()
        .wait_for(WaitFor::HttpPing {
            url: server.url.clone(),
            method: Some("GET".to_string()),
            status: Some("200..299".to_string()),
        });

    gate.start().await.unwrap();
    gate.close().await;
}
