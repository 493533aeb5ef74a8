use async_trait::async_trait;
use parking_lot::Mutex;
use thanos_sd_core::{Error, Notifier, Result};

/// Notifier that keeps every message it is handed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Notifier whose deliveries succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Records messages but reports every delivery as failed
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Messages received, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().push(message.to_string());
        if self.fail {
            return Err(Error::Notification("webhook unreachable".to_string()));
        }
        Ok(())
    }
}
