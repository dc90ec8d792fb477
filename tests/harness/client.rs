//! Minimal WebSocket client for integration tests.
//!
//! Performs the opening handshake, sends masked frames and reassembles the
//! server's fragmented messages.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use wsrelay::protocol::{Frame, OpCode, compute_accept_key};

const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
    mask_seed: u8,
}

impl TestClient {
    /// Connect and complete the handshake.
    pub async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let mut client = Self::connect_raw(addr).await?;
        client.handshake().await?;
        Ok(client)
    }

    /// Connect without handshaking.
    pub async fn connect_raw(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buf: Vec::new(),
            mask_seed: 0x11,
        })
    }

    pub async fn handshake(&mut self) -> std::io::Result<()> {
        let request = format!(
            "GET /chat HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n"
        );
        self.stream.write_all(request.as_bytes()).await?;

        let response = self.read_until_headers_end().await?;
        let response = String::from_utf8_lossy(&response);
        if !response.starts_with("HTTP/1.1 101 Switching Protocols\r\n") {
            return Err(invalid(format!("unexpected response: {response}")));
        }
        let expected = format!("Sec-WebSocket-Accept: {}\r\n", compute_accept_key(KEY));
        if !response.contains(&expected) {
            return Err(invalid(format!("bad accept key: {response}")));
        }
        Ok(())
    }

    /// Send raw bytes.
    pub async fn send_raw(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(data).await
    }

    /// Send one masked text frame.
    pub async fn send_text(&mut self, text: &str) -> std::io::Result<()> {
        let frame = self.masked(OpCode::Text, text.as_bytes());
        self.send_raw(&frame).await
    }

    /// Send one masked close frame.
    pub async fn send_close(&mut self, reason: &str) -> std::io::Result<()> {
        let frame = self.masked(OpCode::Close, reason.as_bytes());
        self.send_raw(&frame).await
    }

    /// Receive one message, reassembling continuation frames.
    ///
    /// Returns the opcode of the first frame and the full payload, or `None`
    /// once the server closed the connection.
    pub async fn recv_message(&mut self) -> std::io::Result<Option<(OpCode, Vec<u8>)>> {
        let mut opcode = None;
        let mut payload = Vec::new();

        loop {
            match Frame::parse(&self.buf) {
                Ok((frame, consumed)) => {
                    self.buf.drain(..consumed);
                    if frame.mask.is_some() {
                        return Err(invalid("server frame was masked".into()));
                    }
                    opcode.get_or_insert(frame.opcode);
                    let fin = frame.fin;
                    payload.extend_from_slice(&frame.into_payload());
                    if fin {
                        return Ok(opcode.map(|op| (op, payload)));
                    }
                }
                Err(wsrelay::Error::IncompleteFrame { .. }) => {
                    if !self.fill().await? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(invalid(e.to_string())),
            }
        }
    }

    /// Receive one text message within the receive timeout.
    pub async fn recv_text(&mut self) -> std::io::Result<Option<String>> {
        let message = timeout(RECV_TIMEOUT, self.recv_message())
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "recv timed out"))??;
        Ok(message.map(|(_, payload)| String::from_utf8_lossy(&payload).into_owned()))
    }

    /// Check that nothing arrives for `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) -> bool {
        if !self.buf.is_empty() {
            return false;
        }
        timeout(wait, self.recv_message()).await.is_err()
    }

    /// Wait for the server to close the socket.
    pub async fn expect_eof(&mut self) -> std::io::Result<()> {
        let mut scratch = [0u8; 256];
        loop {
            let n = timeout(RECV_TIMEOUT, self.stream.read(&mut scratch))
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no eof"))?;
            match n {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn shutdown(mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }

    fn masked(&mut self, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
        self.mask_seed = self.mask_seed.wrapping_add(0x1d);
        let seed = self.mask_seed;
        let mask = [seed, seed ^ 0x5a, seed.wrapping_mul(3), !seed];
        Frame::new(true, opcode, payload.to_vec())
            .to_bytes(Some(mask))
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default()
    }

    async fn fill(&mut self) -> std::io::Result<bool> {
        let mut chunk = [0u8; 1024];
        let n = self.stream.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n > 0)
    }

    async fn read_until_headers_end(&mut self) -> std::io::Result<Vec<u8>> {
        let deadline = timeout(RECV_TIMEOUT, async {
            loop {
                if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let rest = self.buf.split_off(pos + 4);
                    return Ok(std::mem::replace(&mut self.buf, rest));
                }
                if !self.fill().await? {
                    return Err(invalid("closed during handshake".into()));
                }
            }
        });
        deadline
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timed out"))?
    }
}

fn invalid(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message)
}
