//! End-to-end tests over a real listener.

use std::time::Duration;

use pds_backend::config::{AppConfig, Environment};
use pds_backend::observability::AccessLog;
use pds_backend::{HttpServer, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn start(config: AppConfig, access_log: AccessLog) -> (String, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, access_log);
    let rx = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (format!("http://{}", addr), shutdown, handle)
}

#[tokio::test]
async fn test_production_server_writes_access_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs").join("access.log");

    let mut config = AppConfig::default();
    config.environment = Environment::Production;
    config.access_log.path = log_path.to_string_lossy().into_owned();

    let (access_log, writer) = AccessLog::open(config.environment, &config.access_log)
        .await
        .unwrap();
    let writer = writer.expect("production opens a file writer");

    let (base, shutdown, handle) = start(config, access_log).await;

    let client = reqwest::Client::new();
    let created = client
        .post(format!("{}/api/customers", base))
        .json(&json!({ "name": "Abebe", "$where": "1 == 1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    assert_eq!(
        created.headers()["x-ratelimit-remaining"].to_str().unwrap(),
        "99"
    );
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["data"]["data"]["name"], "Abebe");
    assert!(body["data"]["data"].get("$where").is_none());

    let missing = client.get(format!("{}/foo/bar", base)).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["message"], "Can't find /foo/bar on this server");
    drop(client);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server drains after shutdown")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), writer.finish())
        .await
        .expect("access log flushes");

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("127.0.0.1 - - ["));
    assert!(lines[0].contains("\"POST /api/customers HTTP/1.1\" 201"));
    assert!(lines[1].contains("\"GET /foo/bar HTTP/1.1\" 404"));
}

#[tokio::test]
async fn test_cross_origin_rejected_over_the_wire() {
    let (base, shutdown, handle) = start(AppConfig::default(), AccessLog::Console).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/alerts", base))
        .header("origin", "http://attacker.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");

    let allowed = client
        .get(format!("{}/api/alerts", base))
        .header("origin", "http://49.12.106.102")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
    assert_eq!(
        allowed.headers()["access-control-allow-origin"].to_str().unwrap(),
        "http://49.12.106.102"
    );
    drop(client);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
