//! Helpers shared by the HTTP client tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

/// A request captured by [`serve_once`] or [`serve_each`].
#[derive(Debug)]
pub struct CapturedRequest {
    /// Request line and headers.
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    /// The request line, e.g. `POST /play HTTP/1.1`.
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }
}

/// Accepts one HTTP request, answers it with `status` and `body`, and
/// returns what was received.
pub fn serve_once(
    listener: TcpListener,
    status: &'static str,
    body: &'static str,
) -> JoinHandle<CapturedRequest> {
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        answer(stream, status, body)
    })
}

/// Like [`serve_once`], but answers one request per `(status, body)` pair,
/// each on its own connection.
pub fn serve_each(
    listener: TcpListener,
    responses: Vec<(&'static str, &'static str)>,
) -> JoinHandle<Vec<CapturedRequest>> {
    std::thread::spawn(move || {
        responses
            .into_iter()
            .map(|(status, body)| {
                let (stream, _) = listener.accept().unwrap();
                answer(stream, status, body)
            })
            .collect()
    })
}

fn answer(mut stream: TcpStream, status: &str, body: &str) -> CapturedRequest {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        data.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let head = text[..split].to_string();
            let length = head
                .lines()
                .find_map(|l| {
                    l.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            let received = &text[split + 4..];
            if received.len() >= length {
                // Connection: close keeps clients from reusing the socket.
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
                return CapturedRequest {
                    head,
                    body: received.to_string(),
                };
            }
        }
        if n == 0 {
            panic!("connection closed early");
        }
    }
}
