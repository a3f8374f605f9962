//! Line-oriented message broker
//!
//! Clients connect over TCP and exchange newline terminated
//! `<topic> <payload>` lines. Inbound lines are handed to the control loop;
//! outbound announcements go to every connected client. Everything runs on
//! the control loop thread with non-blocking sockets.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Sink for outbound `(topic, payload)` messages
pub trait Publish {
    fn publish(&mut self, topic: &str, payload: &str);
}

/// Collects published messages in order
impl Publish for Vec<(String, String)> {
    fn publish(&mut self, topic: &str, payload: &str) {
        self.push((topic.to_string(), payload.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Split one line into topic and payload at the first space.
///
/// A trailing carriage return is dropped. Blank lines yield `None`; a line
/// without a space is a topic with an empty payload.
pub fn split_line(line: &str) -> Option<InboundMessage> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return None;
    }
    let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
    Some(InboundMessage {
        topic: topic.to_string(),
        payload: payload.to_string(),
    })
}

/// Remove every complete line from `buffer`, leaving a trailing partial line in place.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
    }
    lines
}

/// Longest line kept while waiting for its newline
const MAX_LINE_LEN: usize = 1024;

struct Client {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
}

impl Client {
    /// Read whatever is available. Returns `false` once the client is gone.
    fn receive(&mut self, out: &mut Vec<InboundMessage>) -> bool {
        let mut chunk = [0u8; 256];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    info!("Broker: client {} disconnected", self.peer);
                    return false;
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    for line in drain_lines(&mut self.buffer) {
                        debug!("Broker: RX {}: {}", self.peer, line.escape_debug());
                        out.extend(split_line(&line));
                    }
                    if self.buffer.len() > MAX_LINE_LEN {
                        warn!(
                            "Broker: dropping {} bytes from {} without a newline",
                            self.buffer.len(),
                            self.peer
                        );
                        self.buffer.clear();
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Broker: read error from {}: {e}", self.peer);
                    return false;
                }
            }
        }
    }

    /// Write one whole line. Returns `false` once the client should be dropped.
    ///
    /// Sockets are non-blocking, so a client whose send buffer is full gets
    /// disconnected rather than stalling the control loop. It may have
    /// received part of the line.
    fn send(&mut self, line: &[u8]) -> bool {
        match self.stream.write_all(line) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!("Broker: dropping slow client {}: send buffer full", self.peer);
                false
            }
            Err(e) => {
                warn!("Broker: dropping client {}: {e}", self.peer);
                false
            }
        }
    }
}

pub struct LineBroker {
    listener: TcpListener,
    clients: Vec<Client>,
}

impl LineBroker {
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            clients: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    #[cfg(test)]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!("Broker: rejecting {peer}: {e}");
                        continue;
                    }
                    // Announcements are small; don't let Nagle hold them back
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Broker: could not set nodelay for {peer}: {e}");
                    }
                    info!("Broker: client {peer} connected");
                    self.clients.push(Client {
                        stream,
                        peer,
                        buffer: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Broker: accept error: {e}");
                    break;
                }
            }
        }
    }

    /// Accept new clients and collect every complete inbound line.
    pub fn poll(&mut self) -> Vec<InboundMessage> {
        self.accept_pending();
        let mut messages = Vec::new();
        self.clients.retain_mut(|client| client.receive(&mut messages));
        messages
    }
}

/// Sends to every client; clients that do not keep up are disconnected.
impl Publish for LineBroker {
    fn publish(&mut self, topic: &str, payload: &str) {
        debug!("Broker: TX {topic} {payload}");
        let line = format!("{topic} {payload}\n");
        self.clients.retain_mut(|client| client.send(line.as_bytes()));
    }
}
