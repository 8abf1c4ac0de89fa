//! Test helpers shared by the integration-style tests in this crate.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Issues a minimal HTTP/1.1 GET and returns the response status code.
pub(crate) async fn http_get(addr: SocketAddr, path: &str) -> std::io::Result<u16> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;

    let head = String::from_utf8_lossy(&response);
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed status line")
        })?;
    Ok(status)
}

/// Polls an endpoint until it returns the expected status.
///
/// Bounded retries, since server startup is async with no external
/// completion signal to wait on.
pub(crate) async fn assert_endpoint(addr: SocketAddr, path: &str, expected: u16) {
    const ATTEMPTS: usize = 50;
    for attempt in 1..=ATTEMPTS {
        match http_get(addr, path).await {
            Ok(status) if status == expected => return,
            Ok(status) => {
                assert!(
                    attempt < ATTEMPTS,
                    "expected {expected} from {path}, got {status}"
                );
            }
            Err(err) => {
                assert!(
                    attempt < ATTEMPTS,
                    "expected {expected} from {path}, got connect error: {err}"
                );
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Polls an endpoint until connections are refused.
pub(crate) async fn assert_unreachable(addr: SocketAddr, path: &str) {
    const ATTEMPTS: usize = 50;
    for attempt in 1..=ATTEMPTS {
        if http_get(addr, path).await.is_err() {
            return;
        }
        assert!(attempt < ATTEMPTS, "expected {path} to become unreachable");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
