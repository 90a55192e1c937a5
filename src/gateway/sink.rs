//! Notification sinks.

use crate::gateway::{GatewayError, NotificationSink};
use std::sync::Mutex;

/// Writes every announcement to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn send(&self, message: String) -> Result<(), GatewayError> {
        log::info!("[announce] {}", message);
        Ok(())
    }
}

/// Keeps every announcement in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl NotificationSink for CollectingSink {
    async fn send(&self, message: String) -> Result<(), GatewayError> {
        self.messages
            .lock()
            .map_err(|_| GatewayError::Unavailable("sink lock error".to_string()))?
            .push(message);
        Ok(())
    }
}
