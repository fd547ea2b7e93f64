//! Scripted WebSocket server for client tests.
//!
//! Each test accepts one connection and drives it by hand: read the upgrade
//! request, answer with whatever status it wants, then exchange raw frames.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wslink::protocol::{Frame, OpCode, compute_accept_key};
use wslink::Error;

pub struct MockServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self { listener, addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn accept(&self) -> ServerConn {
        let (stream, _) = self.listener.accept().await.unwrap();
        ServerConn {
            stream,
            buf: Vec::new(),
        }
    }
}

pub struct ServerConn {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl ServerConn {
    async fn fill(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        let n = self.stream.read(&mut chunk).await.unwrap_or(0);
        self.buf.extend_from_slice(&chunk[..n]);
        n > 0
    }

    /// Read the upgrade request head.
    pub async fn read_request(&mut self) -> String {
        loop {
            if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buf.drain(..pos + 4).collect();
                return String::from_utf8(head).unwrap();
            }
            assert!(self.fill().await, "client closed before sending request");
        }
    }

    /// Read the request and answer with a valid `101`.
    pub async fn upgrade(&mut self) -> String {
        let request = self.read_request().await;
        let key = header(&request, "sec-websocket-key").expect("missing key");
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(&key)
        );
        self.write_raw(response.as_bytes()).await;
        request
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Send an unmasked frame.
    pub async fn send(&mut self, opcode: OpCode, payload: &[u8]) {
        self.write_raw(&server_frame(opcode, payload)).await;
    }

    /// Next client frame, or `None` once the client has closed the stream.
    pub async fn read_frame(&mut self) -> Option<Frame> {
        loop {
            match Frame::parse(&self.buf) {
                Ok((frame, consumed)) => {
                    self.buf.drain(..consumed);
                    return Some(frame);
                }
                Err(Error::IncompleteFrame { .. }) => {
                    if !self.fill().await {
                        return None;
                    }
                }
                Err(e) => panic!("client sent a bad frame: {e}"),
            }
        }
    }

    /// Next client frame that is not a close frame.
    pub async fn read_data_frame(&mut self) -> Frame {
        let frame = self.read_frame().await.expect("stream closed");
        assert_ne!(frame.opcode, OpCode::Close, "unexpected close frame");
        frame
    }

    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Unmasked frame bytes as a server sends them.
pub fn server_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x80 | opcode.as_u8()];
    if payload.len() <= 125 {
        buf.push(payload.len() as u8);
    } else {
        buf.push(126);
        buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    buf.extend_from_slice(payload);
    buf
}

/// Case-insensitive header lookup in a request head.
pub fn header(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}
