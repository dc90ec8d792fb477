use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::events::SessionEvents;
use super::{CommunicationMode, SessionState};
use crate::codec::{FrameCodec, FrameKind};
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{HandshakeRequest, HandshakeResponse};
use crate::transport::{Transport, WriteCallback};

/// Close reason used when the server ends a session without giving one.
pub const DEFAULT_CLOSE_REASON: &str = "server side disconnected";

/// Identifier of a session.
///
/// Milliseconds since the Unix epoch at construction plus a random offset
/// below 100. Two sessions created in the same millisecond may collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut byte = [0u8; 1];
        let jitter = match getrandom::getrandom(&mut byte) {
            Ok(()) => u64::from(byte[0] % 100),
            Err(_) => 0,
        };
        SessionId(millis + jitter)
    }

    /// Numeric value of the id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct Status {
    state: SessionState,
    mode: CommunicationMode,
    handshake_attempted: bool,
    /// Handshake response handed to the transport, completion outstanding.
    handshake_pending: bool,
    /// Received bytes not yet decoded: data held while `handshake_pending`,
    /// then the tail of a frame split across reads.
    inbound: BytesMut,
    close_notified: bool,
}

struct SessionInner {
    id: SessionId,
    transport: Arc<dyn Transport>,
    limits: Limits,
    codec: FrameCodec,
    status: Mutex<Status>,
    events: SessionEvents,
}

/// Routing decision for one inbound chunk, taken under the status lock.
enum Inbound {
    Handshake,
    Hold,
    Decode,
    Drop(SessionState),
}

/// Server-side state of one accepted connection.
///
/// `ClientSession` is a cheap handle: clones share the same session. The
/// transport driver feeds it events through [`handle_data`],
/// [`handle_error`], [`handle_end`] and [`handle_close`]. The first data
/// chunk is taken as the opening handshake; once the response write
/// completes the session is established and later chunks are decoded into
/// messages.
///
/// Message subscribers accumulate and run in registration order. Error,
/// end, close and connect hold one subscriber each and the last
/// registration wins. No internal lock is held while callbacks run, so a
/// callback may subscribe, send or close on the same session.
///
/// [`handle_data`]: ClientSession::handle_data
/// [`handle_error`]: ClientSession::handle_error
/// [`handle_end`]: ClientSession::handle_end
/// [`handle_close`]: ClientSession::handle_close
#[derive(Clone)]
pub struct ClientSession {
    inner: Arc<SessionInner>,
}

/// Non-owning handle to a [`ClientSession`].
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
    id: SessionId,
}

impl WeakSession {
    /// Get the session back, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ClientSession> {
        self.inner.upgrade().map(|inner| ClientSession { inner })
    }

    /// Id of the referenced session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl std::fmt::Debug for WeakSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSession").field("id", &self.id).finish()
    }
}

impl ClientSession {
    /// Create a session over `transport` with default limits.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_limits(transport, Limits::default())
    }

    /// Create a session over `transport` enforcing `limits` on the handshake
    /// and inbound frames.
    #[must_use]
    pub fn with_limits(transport: Arc<dyn Transport>, limits: Limits) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: SessionId::generate(),
                transport,
                codec: FrameCodec::new(&limits),
                limits,
                status: Mutex::new(Status::default()),
                events: SessionEvents::default(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.status.lock().state
    }

    /// Check if the session has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Check whether a handshake was attempted. Stays `true` after a failed
    /// attempt; failed sessions never retry.
    #[must_use]
    pub fn handshake_attempted(&self) -> bool {
        self.inner.status.lock().handshake_attempted
    }

    #[must_use]
    pub fn communication_mode(&self) -> CommunicationMode {
        self.inner.status.lock().mode
    }

    pub fn set_communication_mode(&self, mode: CommunicationMode) {
        self.inner.status.lock().mode = mode;
    }

    /// Remote address reported by the transport.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.peer_addr()
    }

    /// Number of message subscribers.
    #[must_use]
    pub fn message_subscribers(&self) -> usize {
        self.inner.events.message_count()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
            id: self.inner.id,
        }
    }

    /// Check if both handles refer to the same session.
    #[inline]
    #[must_use]
    pub fn same_session(&self, other: &ClientSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscribe to decoded messages.
    pub fn on_message<F>(&self, callback: F) -> &Self
    where
        F: Fn(&str, &ClientSession) + Send + Sync + 'static,
    {
        self.inner.events.add_message(Arc::new(callback));
        self
    }

    /// Set the transport error subscriber.
    pub fn on_error<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Error, &ClientSession) + Send + Sync + 'static,
    {
        self.inner.events.set_error(Arc::new(callback));
        self
    }

    /// Set the subscriber for the peer ending the stream.
    pub fn on_end<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        self.inner.events.set_end(Arc::new(callback));
        self
    }

    /// Set the subscriber for the transport closing.
    pub fn on_close<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        self.inner.events.set_close(Arc::new(callback));
        self
    }

    /// Set the subscriber for handshake completion.
    pub fn on_connect<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        self.inner.events.set_connect(Arc::new(callback));
        self
    }

    /// Send a text message, split into frames of at most
    /// [`FRAGMENT_SIZE`](crate::codec::FRAGMENT_SIZE) payload bytes.
    ///
    /// # Errors
    ///
    /// - `Error::NotEstablished` before the handshake completed
    /// - `Error::ConnectionClosed` after the session closed
    /// - any error the transport reports while enqueueing
    pub fn send(&self, message: &str) -> Result<()> {
        self.send_frames(message.as_bytes(), FrameKind::Text)
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// Same as [`ClientSession::send`].
    pub fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.send_frames(data, FrameKind::Binary)
    }

    /// Send close frames carrying `reason`. The transport stays up.
    ///
    /// # Errors
    ///
    /// Same as [`ClientSession::send`].
    pub fn close(&self, reason: &str) -> Result<()> {
        debug!(session_id = %self.id(), reason, "closing session");
        self.send_frames(reason.as_bytes(), FrameKind::Close)
    }

    /// Write pre-encoded bytes to the transport as-is.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionClosed` if the session is closed, or the
    /// transport's error.
    pub fn write(&self, frame: Bytes, on_complete: Option<WriteCallback>) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.inner.transport.write(frame, on_complete)
    }

    /// Decode one client frame and return its payload as text.
    ///
    /// # Errors
    ///
    /// Any decode error of [`FrameCodec::decode`].
    pub fn read_frame(&self, frame: &[u8]) -> Result<String> {
        self.inner.codec.decode_text(frame)
    }

    /// Tear down the transport and mark the session closed.
    ///
    /// The close subscriber runs when the transport driver reports the close.
    pub fn destroy(&self) {
        self.inner.status.lock().state = SessionState::Closed;
        self.inner.transport.destroy();
        debug!(session_id = %self.id(), "session destroyed");
    }

    /// Feed bytes received from the transport.
    ///
    /// Once established, bytes are appended to the inbound buffer and every
    /// complete frame at its front is dispatched. A frame split across reads
    /// waits in the buffer for the rest of its bytes.
    pub fn handle_data(&self, data: &[u8]) {
        let route = {
            let mut status = self.inner.status.lock();
            match status.state {
                SessionState::Established => {
                    status.inbound.extend_from_slice(data);
                    Inbound::Decode
                }
                SessionState::Closed => Inbound::Drop(SessionState::Closed),
                SessionState::Handshaking if status.handshake_pending => {
                    status.inbound.extend_from_slice(data);
                    Inbound::Hold
                }
                SessionState::Handshaking if status.handshake_attempted => {
                    Inbound::Drop(SessionState::Handshaking)
                }
                SessionState::Handshaking => {
                    status.handshake_attempted = true;
                    Inbound::Handshake
                }
            }
        };

        match route {
            Inbound::Handshake => self.negotiate(data),
            Inbound::Decode => self.drain_inbound(),
            Inbound::Hold => {
                trace!(session_id = %self.id(), len = data.len(), "holding data until handshake completes");
            }
            Inbound::Drop(state) => {
                warn!(session_id = %self.id(), %state, len = data.len(), "dropping inbound data");
            }
        }
    }

    /// Report a transport error.
    pub fn handle_error(&self, error: Error) {
        debug!(session_id = %self.id(), error = %error, "transport error");
        if let Some(callback) = self.inner.events.error() {
            callback(&error, self);
        }
    }

    /// Report that the peer ended the stream.
    pub fn handle_end(&self) {
        self.inner.status.lock().state = SessionState::Closed;
        debug!(session_id = %self.id(), "peer ended stream");
        if let Some(callback) = self.inner.events.end() {
            callback(self);
        }
    }

    /// Report that the transport closed. The close subscriber runs at most
    /// once per session.
    pub fn handle_close(&self) {
        let first = {
            let mut status = self.inner.status.lock();
            status.state = SessionState::Closed;
            !std::mem::replace(&mut status.close_notified, true)
        };
        if !first {
            return;
        }
        debug!(session_id = %self.id(), "session closed");
        if let Some(callback) = self.inner.events.close() {
            callback(self);
        }
    }

    fn send_frames(&self, payload: &[u8], kind: FrameKind) -> Result<()> {
        match self.state() {
            SessionState::Established => {}
            SessionState::Handshaking => return Err(Error::NotEstablished),
            SessionState::Closed => return Err(Error::ConnectionClosed),
        }
        for frame in FrameCodec::encode(payload, kind) {
            self.inner.transport.write(frame, None)?;
        }
        Ok(())
    }

    fn negotiate(&self, request: &[u8]) {
        let response =
            match HandshakeRequest::parse_with_limit(request, self.inner.limits.max_handshake_size)
            {
                Ok(req) => HandshakeResponse::from_request(&req),
                Err(err) => {
                    warn!(session_id = %self.id(), error = %err, "handshake rejected");
                    return;
                }
            };

        self.inner.status.lock().handshake_pending = true;

        let weak = self.downgrade();
        let on_complete: WriteCallback = Box::new(move |outcome| {
            if let Some(session) = weak.upgrade() {
                session.complete_handshake(outcome);
            }
        });

        if let Err(err) = self.inner.transport.write(response.to_bytes(), Some(on_complete)) {
            self.complete_handshake(Err(err));
        }
    }

    fn complete_handshake(&self, outcome: Result<()>) {
        let outcome = {
            let mut status = self.inner.status.lock();
            if !status.handshake_pending {
                return;
            }
            status.handshake_pending = false;
            let outcome = match outcome {
                Ok(()) if status.state == SessionState::Handshaking => {
                    status.state = SessionState::Established;
                    Ok(())
                }
                Ok(()) => Err(Error::ConnectionClosed),
                Err(err) => Err(err),
            };
            if outcome.is_err() {
                status.inbound.clear();
            }
            outcome
        };

        match outcome {
            Ok(()) => {
                info!(session_id = %self.id(), peer = ?self.peer_addr(), "handshake complete");
                if let Some(callback) = self.inner.events.connect() {
                    callback(self);
                }
                self.drain_inbound();
            }
            Err(err) => {
                warn!(session_id = %self.id(), error = %err, "failed to write handshake response");
            }
        }
    }

    /// Decode and dispatch every complete frame at the front of the inbound
    /// buffer. The status lock is released before each dispatch.
    fn drain_inbound(&self) {
        loop {
            let decoded = {
                let mut status = self.inner.status.lock();
                if status.state != SessionState::Established {
                    trace!(session_id = %self.id(), dropped = status.inbound.len(), "session closed mid-buffer");
                    status.inbound.clear();
                    return;
                }
                if status.inbound.is_empty() {
                    return;
                }

                match self.inner.codec.decode(&status.inbound) {
                    Ok(decoded) => {
                        status.inbound.advance(decoded.consumed);
                        decoded
                    }
                    Err(err) if err.is_incomplete() => {
                        trace!(
                            session_id = %self.id(),
                            buffered = status.inbound.len(),
                            "waiting for the rest of the frame"
                        );
                        return;
                    }
                    Err(err) => {
                        warn!(
                            session_id = %self.id(),
                            error = %err,
                            dropped = status.inbound.len(),
                            "failed to decode frame"
                        );
                        status.inbound.clear();
                        return;
                    }
                }
            };

            if decoded.is_close() {
                debug!(session_id = %self.id(), reason = %decoded.text(), "client sent close frame");
                continue;
            }

            let message = decoded.text();
            for callback in self.inner.events.message() {
                callback(&message, self);
            }
        }
    }
}

impl PartialEq for ClientSession {
    fn eq(&self, other: &Self) -> bool {
        self.same_session(other)
    }
}

impl Eq for ClientSession {}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.inner.status.lock();
        f.debug_struct("ClientSession")
            .field("id", &self.inner.id)
            .field("state", &status.state)
            .field("mode", &status.mode)
            .finish()
    }
}
