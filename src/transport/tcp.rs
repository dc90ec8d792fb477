use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace, warn};

use super::{Transport, WriteCallback};
use crate::error::{Error, Result};
use crate::session::ClientSession;

enum WriteOp {
    Data(Bytes, Option<WriteCallback>),
    Shutdown,
}

/// Events the writer task hands back to the reader task, so that every
/// callback of one connection runs in the same place.
enum WriterEvent {
    Completed(WriteCallback, Result<()>),
    Failed(Error),
}

/// Tokio TCP transport.
///
/// Writes are queued to a dedicated writer task and never block the caller.
/// Completion callbacks run on the connection's [`TcpReader`] task after the
/// bytes were written to the socket.
pub struct TcpTransport {
    ops: mpsc::UnboundedSender<WriteOp>,
    shutdown: Arc<Notify>,
    destroyed: AtomicBool,
    peer: Option<SocketAddr>,
}

impl TcpTransport {
    /// Split `stream`, spawn its writer task, and return the transport along
    /// with the reader that drives the connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(stream: TcpStream, read_buffer_size: usize) -> (Arc<Self>, TcpReader) {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(write_loop(write_half, ops_rx, events_tx));

        let transport = Arc::new(Self {
            ops: ops_tx,
            shutdown: shutdown.clone(),
            destroyed: AtomicBool::new(false),
            peer,
        });
        let reader = TcpReader {
            read_half,
            events: events_rx,
            shutdown,
            buffer_size: read_buffer_size.max(1),
        };
        (transport, reader)
    }

    /// Check whether [`Transport::destroy`] was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Transport for TcpTransport {
    fn write(&self, data: Bytes, on_complete: Option<WriteCallback>) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ConnectionClosed);
        }
        self.ops
            .send(WriteOp::Data(data, on_complete))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.ops.send(WriteOp::Shutdown);
        self.shutdown.notify_one();
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut ops: mpsc::UnboundedReceiver<WriteOp>,
    events: mpsc::UnboundedSender<WriterEvent>,
) {
    let deliver = |event: WriterEvent| {
        // Reader already gone: run the completion here instead of losing it.
        if let Err(mpsc::error::SendError(WriterEvent::Completed(callback, result))) =
            events.send(event)
        {
            callback(result);
        }
    };

    while let Some(op) = ops.recv().await {
        match op {
            WriteOp::Data(data, on_complete) => {
                let result = writer.write_all(&data).await.map_err(Error::from);
                let failure = result.as_ref().err().cloned();
                if let Some(callback) = on_complete {
                    deliver(WriterEvent::Completed(callback, result));
                }
                if let Some(err) = failure {
                    debug!(error = %err, "socket write failed");
                    deliver(WriterEvent::Failed(err));
                    break;
                }
            }
            WriteOp::Shutdown => {
                if let Err(e) = writer.shutdown().await {
                    warn!(error = %e, "failed to shut down socket write half");
                }
                break;
            }
        }
    }

    ops.close();
    while let Ok(op) = ops.try_recv() {
        if let WriteOp::Data(_, Some(callback)) = op {
            deliver(WriterEvent::Completed(callback, Err(Error::ConnectionClosed)));
        }
    }
}

/// Read side of a [`TcpTransport`].
pub struct TcpReader {
    read_half: OwnedReadHalf,
    events: mpsc::UnboundedReceiver<WriterEvent>,
    shutdown: Arc<Notify>,
    buffer_size: usize,
}

impl TcpReader {
    /// Drive the connection until it ends, delivering every socket event to
    /// `session`.
    ///
    /// Each read becomes one [`ClientSession::handle_data`] call. A clean EOF
    /// is reported through [`ClientSession::handle_end`], read and write
    /// failures through [`ClientSession::handle_error`]. The session always
    /// receives [`ClientSession::handle_close`] last.
    pub async fn drive(mut self, session: &ClientSession) {
        let mut buf = BytesMut::with_capacity(self.buffer_size);

        loop {
            buf.reserve(self.buffer_size);

            tokio::select! {
                biased;

                () = self.shutdown.notified() => {
                    trace!(session_id = %session.id(), "transport destroyed");
                    break;
                }
                Some(event) = self.events.recv() => match event {
                    WriterEvent::Completed(callback, result) => callback(result),
                    WriterEvent::Failed(err) => {
                        session.handle_error(err);
                        break;
                    }
                },
                read = self.read_half.read_buf(&mut buf) => match read {
                    Ok(0) => {
                        session.handle_end();
                        break;
                    }
                    Ok(_) => {
                        let chunk = buf.split();
                        session.handle_data(&chunk);
                    }
                    Err(err) => {
                        session.handle_error(err.into());
                        break;
                    }
                },
            }
        }

        session.handle_close();

        // Completions that raced the shutdown still get their outcome.
        self.events.close();
        while let Ok(event) = self.events.try_recv() {
            if let WriterEvent::Completed(callback, result) = event {
                callback(result);
            }
        }
    }
}
