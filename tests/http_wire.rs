//! Client and store gateway against a local listener that replays canned responses.

mod common;

use common::{day, region};
use covid_stats::models::StoredRecord;
use covid_stats::storage::{HttpGateway, PersistenceGateway};
use covid_stats::{Client, ReportSource};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Answers request `n` with `responses[n]` (the last one repeats) and records every raw request.
struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                let n = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(request);
                    seen.len()
                };
                let (status, body) = responses[(n - 1).min(responses.len() - 1)];
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        Self { base_url, requests }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn body_of(request: &str) -> &str {
    request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
}

const TOTAL_BODY: &str =
    r#"{"data":{"date":"2020-03-01","confirmed":5,"deaths":1,"active":4}}"#;

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = CannedServer::start(vec![(500, "{}"), (502, "{}"), (200, TOTAL_BODY)]).await;
    let client = Client::new(format!("{}/api", server.base_url));

    let obs = client.total(&region("USA"), day("2020-03-01")).await.unwrap();
    assert_eq!(obs.day, day("2020-03-01"));
    assert_eq!(obs.confirmed, Some(5));
    assert_eq!(obs.deaths, Some(1));

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(
        requests
            .iter()
            .all(|r| r.starts_with("GET /api/reports/total?date=2020-03-01&iso=USA "))
    );
}

#[tokio::test]
async fn client_errors_fail_on_the_first_attempt() {
    let server = CannedServer::start(vec![(404, r#"{"message":"not found"}"#)]).await;
    let client = Client::new(format!("{}/api", server.base_url));

    let err = client
        .total(&region("USA"), day("2020-03-01"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn persistent_server_errors_stop_after_three_attempts() {
    let server = CannedServer::start(vec![(503, "{}")]).await;
    let client = Client::new(format!("{}/api", server.base_url));

    let started = Instant::now();
    let err = client
        .total(&region("DEU"), day("2020-03-01"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(server.requests().len(), 3);
    // 100ms + 300ms of pauses, nothing after the last attempt
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn gateway_posts_the_bare_record() {
    let server = CannedServer::start(vec![(
        200,
        r#"{"_id":"abc123","iso":"USA","date":"2020-03-01","confirmed":5,"deaths":1,"__v":0}"#,
    )])
    .await;
    let gateway = HttpGateway::new(&server.base_url);
    let record = StoredRecord {
        id: None,
        iso: region("USA"),
        date: day("2020-03-01"),
        confirmed: Some(5),
        deaths: Some(1),
    };

    let stored = gateway.save(&record).await.unwrap();
    assert_eq!(stored.id.as_deref(), Some("abc123"));
    assert_eq!(stored.confirmed, Some(5));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("POST /api/save "));
    assert!(requests[0].to_lowercase().contains("content-type: application/json"));
    let sent: serde_json::Value = serde_json::from_str(body_of(&requests[0])).unwrap();
    assert_eq!(
        sent,
        json!({"iso": "USA", "date": "2020-03-01", "confirmed": 5, "deaths": 1})
    );
}

#[tokio::test]
async fn gateway_retrieve_skips_documents_it_cannot_read() {
    let server = CannedServer::start(vec![(
        200,
        r#"[{"_id":"a1","iso":"USA","date":"2020-03-01","confirmed":5,"deaths":0,"__v":0},{"_id":"a2","iso":"USA","confirmed":7,"deaths":1,"__v":0}]"#,
    )])
    .await;
    let gateway = HttpGateway::new(&server.base_url);

    let records = gateway.retrieve(&region("usa")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, day("2020-03-01"));
    assert!(server.requests()[0].starts_with("GET /api/data/USA "));
}
