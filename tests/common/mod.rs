//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_gateway::auth::{Identity, TokenValidator};
use edge_gateway::config::{GatewayConfig, JwtConfig, ServiceConfig};
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::GatewayServer;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Start a programmable mock backend; the closure decides the status
/// and body for each request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that records the raw head of every request it sees
/// and answers 200.
pub async fn start_capturing_backend() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        sink.lock().unwrap().push(head);
                        let _ = socket
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                            )
                            .await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, captured)
}

/// Read until the end of the request head.
async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

pub fn service(name: &str, addr: SocketAddr, timeout_secs: u64, max_retries: u32) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        url: format!("http://{addr}"),
        timeout_secs,
        max_retries,
    }
}

/// A service pointing at a port nothing listens on; every attempt is
/// a connection failure.
pub fn dead_service(name: &str, max_retries: u32) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        url: "http://127.0.0.1:1".to_string(),
        timeout_secs: 1,
        max_retries,
    }
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a gateway on an ephemeral port with test-friendly defaults.
pub async fn start_gateway(
    services: Vec<ServiceConfig>,
    tweak: impl FnOnce(&mut GatewayConfig),
) -> TestGateway {
    let mut config = GatewayConfig {
        services,
        ..GatewayConfig::default()
    };
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.jwt.secret_key = TEST_SECRET.to_string();
    config.timeouts.request_secs = 5;
    tweak(&mut config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let rx = shutdown.subscribe();
    let server = GatewayServer::new(config).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway { addr, shutdown }
}

/// Mint a token the test gateway accepts.
pub fn bearer_token() -> String {
    let validator = TokenValidator::new(&JwtConfig {
        secret_key: TEST_SECRET.to_string(),
        issuer: None,
        audience: None,
        expires_in_secs: 3600,
    });
    validator
        .issue(&Identity {
            user_id: "u-1".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: "admin".to_string(),
        })
        .unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
