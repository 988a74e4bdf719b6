//! Test helpers shared across the workspace.

use std::sync::Mutex;

use crate::error::Result;
use crate::message::Transport;

/// What a [`RecordingTransport`] captured.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Text(String),
    Media(Vec<u8>),
}

/// A transport that records every reply, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    recorded: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in delivery order.
    pub fn replies(&self) -> Vec<Recorded> {
        self.recorded.lock().expect("recording poisoned").clone()
    }

    /// The recorded text replies only.
    pub fn texts(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Text(t) => Some(t),
                Recorded::Media(_) => None,
            })
            .collect()
    }

    /// The single text reply, panicking unless exactly one was sent.
    pub fn only_text(&self) -> String {
        let replies = self.replies();
        assert_eq!(replies.len(), 1, "expected exactly one reply: {replies:?}");
        match replies.into_iter().next() {
            Some(Recorded::Text(t)) => t,
            other => panic!("expected a text reply, got {other:?}"),
        }
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn reply(&self, text: &str) -> Result<()> {
        self.recorded
            .lock()
            .expect("recording poisoned")
            .push(Recorded::Text(text.to_string()));
        Ok(())
    }

    async fn reply_media(&self, bytes: &[u8]) -> Result<()> {
        self.recorded
            .lock()
            .expect("recording poisoned")
            .push(Recorded::Media(bytes.to_vec()));
        Ok(())
    }
}
