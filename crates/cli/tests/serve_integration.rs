//! Integration tests for `costguard serve`.
//!
//! Each test starts the server as a child process on a unique port against
//! a temporary fixture-backed configuration, then talks raw HTTP to it.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tempfile::TempDir;

/// Port counter seeded from the process ID so parallel test binaries
/// do not collide.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 30000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

const FLEET: &str = r#"{
  "resources": [
    { "id": "i-1", "kind": "compute-instance", "type_class": "t3.large",
      "state": "running", "created_at": "2026-04-01T08:00:00Z" },
    { "id": "i-2", "kind": "compute-instance", "type_class": "m5.xlarge",
      "state": "running", "created_at": "2026-04-01T09:00:00Z" }
  ],
  "spend": [ { "at": "2026-04-01T09:00:00Z", "amount": "42" } ]
}"#;

fn config_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fleet.json"), FLEET).unwrap();
    std::fs::write(
        dir.path().join("costguard.toml"),
        "[provider]\nkind = \"memory\"\ninventory = \"fleet.json\"\n",
    )
    .unwrap();
    dir
}

/// Kills the server when a test finishes, pass or fail.
struct Server(Child);

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn start_server(port: u16, dir: &TempDir, api_key: Option<&str>) -> Server {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_costguard"));
    cmd.arg("--config")
        .arg(dir.path().join("costguard.toml"))
        .args(["--at", "2026-04-01T12:00:00Z"])
        .arg("serve")
        .arg("--port")
        .arg(port.to_string())
        .env("COSTGUARD_LOG", "warn")
        .env_remove("COSTGUARD_API_KEY")
        .env_remove("COSTGUARD_RATE_LIMIT");
    if let Some(key) = api_key {
        cmd.env("COSTGUARD_API_KEY", key);
    }
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start costguard serve");
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server(child)
}

/// Send a request and return (status, headers, body).
fn http(
    port: u16,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        body.len(),
        header_lines,
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    parse_response(&response)
}

fn parse_response(response: &str) -> (u16, String, String) {
    let (headers, body) = response.split_once("\r\n\r\n").unwrap_or((response, ""));
    let status = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(body)
    } else {
        body.to_string()
    };
    (status, headers.to_string(), body)
}

fn decode_chunked(mut remaining: &str) -> String {
    let mut result = String::new();
    while let Some(line_end) = remaining.find("\r\n") {
        let Ok(size) = usize::from_str_radix(remaining[..line_end].trim(), 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        let end = (start + size).min(remaining.len());
        result.push_str(&remaining[start..end]);
        remaining = remaining.get(end + 2..).unwrap_or("");
    }
    result
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("bad JSON ({}): {}", e, body))
}

#[test]
fn health_returns_ok_with_cors() {
    let port = next_port();
    let dir = config_dir();
    let _server = start_server(port, &dir, None);

    let (status, headers, body) = http(port, "GET", "/health", &[("Origin", "http://ops")], "");
    assert_eq!(status, 200);
    assert_eq!(json(&body)["status"], "ok");
    assert!(headers
        .to_lowercase()
        .contains("access-control-allow-origin: *"));
}

#[test]
fn trigger_then_repeat_is_idempotent() {
    let port = next_port();
    let dir = config_dir();
    let _server = start_server(port, &dir, None);

    let (status, _, body) = http(port, "POST", "/trigger", &[], r#"{"source": "alarm"}"#);
    assert_eq!(status, 200);
    let first = json(&body);
    assert_eq!(first["reason"], "ALARM_TRIGGERED");
    assert_eq!(first["terminated_count"], 2);

    let (status, _, body) = http(port, "POST", "/trigger", &[], r#"{"source": "alarm"}"#);
    assert_eq!(status, 200);
    assert_eq!(json(&body)["terminated_count"], 0);
}

#[test]
fn spend_check_over_http() {
    let port = next_port();
    let dir = config_dir();
    let _server = start_server(port, &dir, None);

    let (status, _, body) = http(port, "POST", "/check-spend", &[], "");
    assert_eq!(status, 200);
    let body = json(&body);
    assert_eq!(body["breach"], false);
    assert_eq!(body["current_daily_spend"], "42");
}

#[test]
fn api_key_guards_run_routes() {
    let port = next_port();
    let dir = config_dir();
    let _server = start_server(port, &dir, Some("s3cret"));

    let (status, _, _) = http(port, "POST", "/enforce-limit", &[], "");
    assert_eq!(status, 401);

    let (status, _, body) = http(
        port,
        "POST",
        "/enforce-limit",
        &[("Authorization", "Bearer s3cret")],
        "",
    );
    assert_eq!(status, 200);
    assert_eq!(json(&body)["running_count"], 2);

    let (status, _, _) = http(port, "GET", "/health", &[], "");
    assert_eq!(status, 200);
}
