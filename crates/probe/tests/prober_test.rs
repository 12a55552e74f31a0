//! Integration tests for HttpProber against loopback stub endpoints

use probe::{HttpMethod, HttpProber, ProbeConfig, Prober, RouteRequest, RouteState, SiteState};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Captured = Arc<Mutex<Vec<String>>>;

/// Read one HTTP/1.1 request (head plus Content-Length body)
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            while buf.len() < head_end + 4 + content_length {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            break;
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// Spawn a stub answering every request with `status` and `body`
async fn spawn_stub(status: u16, body: &'static str) -> (String, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let captured_clone = captured.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let captured = captured_clone.clone();
            tokio::spawn(async move {
                let request = read_request(&mut stream).await;
                captured.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), captured)
}

/// Spawn a stub that accepts connections and never answers
async fn spawn_silent_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _held = stream;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    format!("http://{}", addr)
}

/// An address nothing listens on
async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn prober() -> HttpProber {
    HttpProber::new(ProbeConfig {
        timeout: Duration::from_millis(300),
        max_response_len: 64,
    })
    .unwrap()
}

#[tokio::test]
async fn test_site_online_for_2xx() {
    for status in [200, 204] {
        let (url, _) = spawn_stub(status, "").await;
        assert_eq!(prober().probe_site(&url, None).await, SiteState::Online, "status {}", status);
    }
}

#[tokio::test]
async fn test_site_offline_for_4xx_and_5xx() {
    for status in [404, 500, 503] {
        let (url, _) = spawn_stub(status, "").await;
        assert_eq!(prober().probe_site(&url, None).await, SiteState::Offline, "status {}", status);
    }
}

#[tokio::test]
async fn test_site_offline_when_refused() {
    let url = refused_url().await;
    assert_eq!(prober().probe_site(&url, None).await, SiteState::Offline);
}

#[tokio::test]
async fn test_site_offline_on_timeout() {
    let url = spawn_silent_stub().await;

    let start = Instant::now();
    let state = prober().probe_site(&url, None).await;

    assert_eq!(state, SiteState::Offline);
    assert!(start.elapsed() < Duration::from_secs(5), "probe must be bounded by its timeout");
}

#[tokio::test]
async fn test_site_probe_sends_bearer_token() {
    let (url, captured) = spawn_stub(200, "").await;

    prober().probe_site(&url, Some("secret-token")).await;

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET / "));
    assert!(requests[0].to_lowercase().contains("authorization: bearer secret-token"));
}

#[tokio::test]
async fn test_route_success_captures_payload() {
    let (url, captured) = spawn_stub(201, "{ \"id\" : 7 }").await;

    let route = RouteRequest {
        method: HttpMethod::Post,
        path: "/api/items",
        body: Some("{\"name\": \"widget\"}"),
    };
    let result = prober().probe_route(route, &format!("{}/", url), Some("t0k")).await;

    assert_eq!(result.state, RouteState::Success);
    assert_eq!(result.response.as_deref(), Some("{\"id\":7}"));

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("POST /api/items "));
    assert!(requests[0].to_lowercase().contains("authorization: bearer t0k"));
    assert!(requests[0].ends_with("{\"name\":\"widget\"}"));
}

#[tokio::test]
async fn test_route_invalid_body_fails_without_request() {
    let (url, captured) = spawn_stub(200, "{}").await;

    let route = RouteRequest {
        method: HttpMethod::Put,
        path: "items/1",
        body: Some("{not json"),
    };
    let result = prober().probe_route(route, &url, None).await;

    assert_eq!(result.state, RouteState::Failure);
    assert!(result.response.unwrap().starts_with("Invalid request body"));
    assert!(captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_route_non_2xx_is_failure() {
    let (url, _) = spawn_stub(500, "{\"error\":\"boom\"}").await;

    let route = RouteRequest {
        method: HttpMethod::Get,
        path: "health",
        body: None,
    };
    let result = prober().probe_route(route, &url, None).await;

    assert_eq!(result.state, RouteState::Failure);
    let message = result.response.unwrap();
    assert!(message.contains("500"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_route_refused_is_failure() {
    let url = refused_url().await;

    let route = RouteRequest {
        method: HttpMethod::Delete,
        path: "/items/1",
        body: None,
    };
    let result = prober().probe_route(route, &url, None).await;

    assert_eq!(result.state, RouteState::Failure);
    assert!(result.response.unwrap().starts_with("Request failed"));
}

#[tokio::test]
async fn test_route_timeout_is_failure() {
    let url = spawn_silent_stub().await;

    let route = RouteRequest {
        method: HttpMethod::Get,
        path: "/slow",
        body: None,
    };
    let result = prober().probe_route(route, &url, None).await;

    assert_eq!(result.state, RouteState::Failure);
}

#[tokio::test]
async fn test_route_response_is_truncated() {
    let long_body: &'static str = Box::leak("x".repeat(500).into_boxed_str());
    let (url, _) = spawn_stub(200, long_body).await;

    let route = RouteRequest {
        method: HttpMethod::Get,
        path: "/big",
        body: None,
    };
    let result = prober().probe_route(route, &url, None).await;

    assert_eq!(result.state, RouteState::Success);
    assert_eq!(result.response.unwrap().len(), 64);
}
