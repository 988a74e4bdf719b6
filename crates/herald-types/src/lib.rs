//! Foundation types for the herald bot framework.
//!
//! Everything here is transport- and storage-agnostic: the error type shared
//! across the workspace, caller/channel identifiers, the inbound message
//! value, the reply value handlers produce, and the outbound transport trait.

pub mod error;
pub mod message;
pub mod test_util;

pub use error::{HeraldError, Result};
pub use message::{CallerId, ChannelKind, Message, Reply, Transport, SUPER_CALLER};
