use std::sync::Arc;

use parking_lot::RwLock;

use super::ClientSession;
use crate::error::Error;

/// Callback invoked with each decoded message payload.
pub type MessageCallback = Arc<dyn Fn(&str, &ClientSession) + Send + Sync + 'static>;

/// Callback invoked with a transport error.
pub type ErrorCallback = Arc<dyn Fn(&Error, &ClientSession) + Send + Sync + 'static>;

/// Callback invoked on connect, end and close.
pub type LifecycleCallback = Arc<dyn Fn(&ClientSession) + Send + Sync + 'static>;

/// Registered callbacks of one session.
///
/// Messages fan out to every subscriber in registration order. The other
/// events hold a single subscriber; registering again replaces it.
#[derive(Default)]
pub(crate) struct SessionEvents {
    message: RwLock<Vec<MessageCallback>>,
    error: RwLock<Option<ErrorCallback>>,
    end: RwLock<Option<LifecycleCallback>>,
    close: RwLock<Option<LifecycleCallback>>,
    connect: RwLock<Option<LifecycleCallback>>,
}

impl SessionEvents {
    pub(crate) fn add_message(&self, callback: MessageCallback) {
        self.message.write().push(callback);
    }

    pub(crate) fn set_error(&self, callback: ErrorCallback) {
        *self.error.write() = Some(callback);
    }

    pub(crate) fn set_end(&self, callback: LifecycleCallback) {
        *self.end.write() = Some(callback);
    }

    pub(crate) fn set_close(&self, callback: LifecycleCallback) {
        *self.close.write() = Some(callback);
    }

    pub(crate) fn set_connect(&self, callback: LifecycleCallback) {
        *self.connect.write() = Some(callback);
    }

    /// Copy of the message subscribers, taken before dispatch so callbacks
    /// can subscribe more without deadlocking.
    pub(crate) fn message(&self) -> Vec<MessageCallback> {
        self.message.read().clone()
    }

    pub(crate) fn message_count(&self) -> usize {
        self.message.read().len()
    }

    pub(crate) fn error(&self) -> Option<ErrorCallback> {
        self.error.read().clone()
    }

    pub(crate) fn end(&self) -> Option<LifecycleCallback> {
        self.end.read().clone()
    }

    pub(crate) fn close(&self) -> Option<LifecycleCallback> {
        self.close.read().clone()
    }

    pub(crate) fn connect(&self) -> Option<LifecycleCallback> {
        self.connect.read().clone()
    }
}
