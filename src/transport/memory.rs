use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use super::{Transport, WriteCallback};
use crate::error::{Error, Result};

/// In-memory transport that records every write.
///
/// Writes complete synchronously: the completion callback runs inside
/// [`Transport::write`] with `Ok(())`, or with the configured failure.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    writes: Mutex<Vec<Bytes>>,
    destroyed: AtomicBool,
    fail_writes: Mutex<Option<Error>>,
}

impl MemoryTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write complete with `error`.
    pub fn fail_writes(&self, error: Error) {
        *self.fail_writes.lock() = Some(error);
    }

    /// All writes so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().clone()
    }

    /// All written bytes concatenated.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.writes.lock().iter().flat_map(|w| w.iter().copied()).collect()
    }

    /// Drain the recorded writes.
    pub fn take_writes(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.writes.lock())
    }

    /// Check whether [`Transport::destroy`] was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Transport for MemoryTransport {
    fn write(&self, data: Bytes, on_complete: Option<WriteCallback>) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ConnectionClosed);
        }

        let failure = self.fail_writes.lock().clone();
        let outcome = match failure {
            Some(err) => Err(err),
            None => {
                self.writes.lock().push(data);
                Ok(())
            }
        };

        if let Some(callback) = on_complete {
            callback(outcome);
        }
        Ok(())
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}
