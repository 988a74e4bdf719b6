//! Inbound messages, handler replies, and the outbound transport trait.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of the caller (the user who sent the message).
pub type CallerId = i64;

/// Caller id `0` is reserved: it always passes every permission check.
pub const SUPER_CALLER: CallerId = 0;

/// Where a message came from (and where replies go back to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// One-on-one conversation with the caller.
    Direct,
    /// Group conversation, identified by the group id.
    Group(i64),
}

/// One inbound text message, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw text exactly as the caller typed it.
    pub raw: String,
    /// Who sent it.
    pub caller: CallerId,
    /// Which channel it arrived on.
    pub channel: ChannelKind,
}

impl Message {
    /// Build a direct message from a caller.
    pub fn direct(caller: CallerId, raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            caller,
            channel: ChannelKind::Direct,
        }
    }

    /// Build a group message from a caller.
    pub fn group(caller: CallerId, group: i64, raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            caller,
            channel: ChannelKind::Group(group),
        }
    }
}

/// The outcome a command handler produces.
///
/// `Handled` is a user-facing failure that the handler chose to signal as a
/// value: it renders through the error prefix but is never logged as an
/// internal fault.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A single text reply.
    Text(String),
    /// A preamble plus the main reply, delivered as two segments in order.
    Pair(String, String),
    /// Raw media bytes (image, audio) for transports that support them.
    Media(Vec<u8>),
    /// A user-facing failure signaled as a value.
    Handled(String),
    /// The handler produced nothing. The pipeline treats this as an
    /// internal error (a command must always answer).
    Empty,
}

impl Reply {
    /// Convenience constructor for the common text case.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Reply::Empty } else { Reply::Text(s) }
    }

    /// Convenience constructor for a handled (user-facing) failure.
    pub fn handled(s: impl Into<String>) -> Self {
        Reply::Handled(s.into())
    }
}

/// Outbound side of the messaging transport.
///
/// The dispatch pipeline is transport-agnostic: it only ever calls `reply`
/// and `reply_media`. The console app implements this over stdout; tests use
/// a recording implementation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a text reply to the caller.
    async fn reply(&self, text: &str) -> Result<()>;

    /// Deliver raw media bytes to the caller.
    async fn reply_media(&self, bytes: &[u8]) -> Result<()>;
}
