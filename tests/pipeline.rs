//! End-to-end pipeline tests: scripted line sources drained by workers
//! into the shared buffer, read back through the poll endpoint.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tailgate::buffer::SlidingBuffer;
use tailgate::normalize::NormalizeRules;
use tailgate::server::{AppState, router};
use tailgate::source::LineSource;
use tailgate::worker::IngestWorker;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A line source that replays a fixed script, then reports EOF.
struct ScriptedSource {
    lines: VecDeque<String>,
}

impl ScriptedSource {
    fn new(lines: &[String]) -> Self {
        Self {
            lines: lines.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl LineSource for ScriptedSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

fn access_line(client: &str, path: &str, status: u16) -> String {
    format!(r#"{client} - - [10/Oct/2021:13:55:36] "GET {path} HTTP/1.1" {status} 2326 "-" "curl/8""#)
}

#[tokio::test]
async fn concurrent_workers_fill_one_window() {
    let buffer = Arc::new(SlidingBuffer::new(Duration::from_secs(30)));
    let rules = Arc::new(NormalizeRules::default());

    let mut handles = Vec::new();
    for host in ["web1", "web2", "web3"] {
        let lines: Vec<String> = (0..50)
            .map(|i| access_line("10.0.0.7", &format!("/{host}/page/{i}?ref=x"), 200))
            .collect();

        let worker = IngestWorker::new(host, Arc::clone(&rules), Arc::clone(&buffer));
        handles.push(tokio::spawn(async move {
            worker.run(move || Ok(ScriptedSource::new(&lines))).await;
        }));
    }
    for handle in handles {
        handle.await.expect("worker task panicked");
    }

    // Every line from every host landed, parsed and normalized.
    assert_eq!(buffer.len(), 150);
    let hits = buffer.query(0.0);
    assert!(hits.iter().all(|hit| hit.client == "10.0.0.*"));
    assert!(hits.iter().all(|hit| !hit.url.contains('?')));
}

#[tokio::test]
async fn malformed_and_pathless_lines_are_dropped_quietly() {
    let buffer = Arc::new(SlidingBuffer::new(Duration::from_secs(30)));
    let rules = Arc::new(NormalizeRules::default());

    let lines = vec![
        access_line("10.0.0.1", "/ok", 200),
        "complete garbage".to_string(),
        r#"10.0.0.1 - - [10/Oct/2021:13:55:36] "GET" 200 1 "-" "ua""#.to_string(),
        access_line("10.0.0.1", "/also-ok", 404),
    ];

    let worker = IngestWorker::new("web1", rules, Arc::clone(&buffer));
    worker.run(move || Ok(ScriptedSource::new(&lines))).await;

    let hits = buffer.query(0.0);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "/ok");
    assert_eq!(hits[1].url, "/also-ok");
    assert_eq!(hits[1].status, Some(404));
}

#[tokio::test]
async fn poll_endpoint_serves_ingested_hits_over_http() {
    let buffer = Arc::new(SlidingBuffer::new(Duration::from_secs(30)));
    let rules = Arc::new(NormalizeRules::default());

    let lines = vec![access_line("203.0.113.9", "/dashboard?tab=live", 200)];
    let worker = IngestWorker::new("web1", rules, Arc::clone(&buffer));
    worker.run(move || Ok(ScriptedSource::new(&lines))).await;

    let state = AppState {
        buffer,
        default_lookback: 10.0,
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.ok();
    });

    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"GET /?since=-1 HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
        .await
        .expect("send request");

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");
    let raw = String::from_utf8(raw).expect("utf8 response");

    let (head, body) = raw.split_once("\r\n\r\n").expect("header/body split");
    assert!(head.starts_with("HTTP/1.1 200"));
    assert!(head.to_lowercase().contains("access-control-allow-origin: *"));
    assert!(head.to_lowercase().contains("content-type: application/json"));

    let json: serde_json::Value = serde_json::from_str(body).expect("json body");
    assert!(json["since"].as_f64().is_some());
    let hits = json["hits"].as_array().expect("hits array");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["host"], "203.0.113.*");
    assert_eq!(hits[0]["url"], "/dashboard");
    assert_eq!(hits[0]["status"], 200);
    assert_eq!(hits[0]["size"], 2326);
}
