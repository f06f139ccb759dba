//! The landmark transport: newline-delimited JSON over TCP.
//!
//! The socket is non-blocking and is serviced from the UI loop. Inbound bytes
//! are split into lines and parsed; outbound messages are queued and written
//! as far as the socket accepts them on each call.

use crate::error::TransportError;
use crate::gesture::message::{InboundMessage, OutboundMessage};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outbound bytes allowed to pile up before sends are refused. A few video
/// frames' worth.
const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Longest inbound line kept while waiting for its newline.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A bidirectional message channel to the detection service.
pub trait LandmarkTransport {
    /// Queues a message for sending.
    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Returns every message that has fully arrived since the last poll.
    ///
    /// Malformed or unrecognised messages are dropped.
    fn poll(&mut self) -> Result<Vec<InboundMessage>, TransportError>;

    fn is_connected(&self) -> bool;

    /// Closes the connection. Further sends fail with `NotConnected`.
    fn close(&mut self);
}

/// [`LandmarkTransport`] over a non-blocking TCP socket.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    inbound: LineReader,
    outbound: Vec<u8>,
}

impl TcpTransport {
    /// Connects to the detection service.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: Some(stream),
            inbound: LineReader::new(MAX_LINE_BYTES),
            outbound: Vec::new(),
        })
    }

    /// Bytes queued but not yet written.
    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    fn flush_pending(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        while !self.outbound.is_empty() {
            match stream.write(&self.outbound) {
                Ok(0) => return Err(TransportError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Reads whatever is available, parsing complete lines into `messages`.
    /// Returns false once the peer has closed.
    fn fill_inbound(
        &mut self,
        messages: &mut Vec<InboundMessage>,
    ) -> Result<bool, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => self.inbound.feed(&chunk[..n], messages),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Reassembles newline-delimited messages from arbitrary chunks.
///
/// A partial line longer than `max_line` is thrown away along with the rest
/// of that line, up to and including its newline.
#[derive(Debug)]
struct LineReader {
    partial: Vec<u8>,
    discarding: bool,
    max_line: usize,
}

impl LineReader {
    fn new(max_line: usize) -> Self {
        Self {
            partial: Vec::new(),
            discarding: false,
            max_line,
        }
    }

    fn feed(&mut self, mut chunk: &[u8], messages: &mut Vec<InboundMessage>) {
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    self.discarding = false;
                    chunk = &chunk[newline + 1..];
                }
                None => return,
            }
        }
        self.partial.extend_from_slice(chunk);
        messages.extend(drain_messages(&mut self.partial));
        if self.partial.len() > self.max_line {
            tracing::debug!(
                bytes = self.partial.len(),
                limit = self.max_line,
                "discarding over-long inbound line"
            );
            self.partial = Vec::new();
            self.discarding = true;
        }
    }

    fn clear(&mut self) {
        self.partial = Vec::new();
        self.discarding = false;
    }
}

/// Splits complete lines off the front of `buffer` and parses them.
fn drain_messages(buffer: &mut Vec<u8>) -> Vec<InboundMessage> {
    let mut messages = Vec::new();
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match InboundMessage::parse(text) {
            Ok(message) => messages.push(message),
            Err(e) => tracing::debug!(error = %e, "dropping inbound message"),
        }
    }
    messages
}

impl LandmarkTransport for TcpTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::NotConnected);
        }
        if self.outbound.len() > MAX_PENDING_BYTES {
            return Err(TransportError::Congested {
                pending: self.outbound.len(),
            });
        }
        self.outbound.extend_from_slice(message.to_line()?.as_bytes());
        self.flush_pending()
    }

    fn poll(&mut self) -> Result<Vec<InboundMessage>, TransportError> {
        self.flush_pending()?;
        let mut messages = Vec::new();
        let open = self.fill_inbound(&mut messages)?;
        if !open {
            tracing::info!("landmark transport closed by peer");
            self.close();
        }
        Ok(messages)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.inbound.clear();
        self.outbound.clear();
    }
}

/// Decides when the next video frame is due.
#[derive(Debug, Clone)]
pub struct FrameCadence {
    interval: Duration,
    next_due: Option<Instant>,
}

impl FrameCadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Returns true if a frame should be sent at `now`.
    ///
    /// Missed slots are not made up: after a stall the next frame is one
    /// interval from now.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(next) if now < next => false,
            Some(next) => {
                let following = next + self.interval;
                self.next_due = Some(if following <= now {
                    now + self.interval
                } else {
                    following
                });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.next_due = None;
    }
}

/// Supplies JPEG frames for the outbound video feed.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Vec<u8>>;
}

/// Cycles through the JPEG files of a directory.
pub struct StillFrames {
    paths: Vec<PathBuf>,
    next: usize,
}

impl StillFrames {
    /// Collects `*.jpg`/`*.jpeg` files from `dir`, sorted by name.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_lowercase().as_str(), "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for StillFrames {
    fn next_frame(&mut self) -> Option<Vec<u8>> {
        // Unreadable files are skipped, at most one full cycle per call.
        for _ in 0..self.paths.len() {
            let path = &self.paths[self.next];
            self.next = (self.next + 1) % self.paths.len();
            match std::fs::read(path) {
                Ok(bytes) => return Some(bytes),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping frame"),
            }
        }
        None
    }
}
