//! Minimal HTTP handling for the shared listener: telling WebSocket
//! upgrades apart from plain requests, and answering the liveness check.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const LIVENESS_BODY: &str = "System monitoring backend running";

const MAX_HEADER_BYTES: usize = 8 * 1024;
const PEEK_RETRY: Duration = Duration::from_millis(5);

/// Peek at the request head (without consuming it) and report whether it
/// asks for a WebSocket upgrade.
pub async fn is_websocket_upgrade(stream: &TcpStream) -> io::Result<bool> {
    let mut buf = vec![0u8; MAX_HEADER_BYTES];
    let mut seen = 0;

    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(false);
        }

        let head = &buf[..n];
        if header_end(head).is_some() || n == buf.len() {
            return Ok(requests_upgrade(head));
        }

        // Same bytes as last time: wait for the rest of the head to arrive
        if n == seen {
            tokio::time::sleep(PEEK_RETRY).await;
        }
        seen = n;
    }
}

/// Answer a plain HTTP request and close the connection.
pub async fn respond_liveness(mut stream: TcpStream) -> io::Result<()> {
    let mut buf = vec![0u8; MAX_HEADER_BYTES];
    let mut len = 0;
    while len < buf.len() {
        let n = stream.read(&mut buf[len..]).await?;
        if n == 0 {
            break;
        }
        len += n;
        if header_end(&buf[..len]).is_some() {
            break;
        }
    }

    let response = match request_path(&buf[..len]) {
        Some("/") | Some("/health") => http_response("200 OK", LIVENESS_BODY),
        Some(_) => http_response("404 Not Found", "Not Found"),
        None => http_response("400 Bad Request", "Bad Request"),
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn requests_upgrade(head: &[u8]) -> bool {
    let head = String::from_utf8_lossy(head);
    head.lines().any(|line| {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("upgrade")
            && value.trim().eq_ignore_ascii_case("websocket")
    })
}

/// Path of a GET/HEAD request line, without query string
fn request_path(head: &[u8]) -> Option<&str> {
    let line_end = head.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&head[..line_end]).ok()?;
    let mut parts = line.split_whitespace();

    let method = parts.next()?;
    if method != "GET" && method != "HEAD" {
        return None;
    }

    let target = parts.next()?;
    Some(target.split('?').next().unwrap_or(target))
}
