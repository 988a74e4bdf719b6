//! Stdout transport for the console app.

use herald_core::types::{Result, Transport};

/// Prints text replies as-is and media as a byte-count placeholder.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for ConsoleTransport {
    async fn reply(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }

    async fn reply_media(&self, bytes: &[u8]) -> Result<()> {
        println!("[media: {} bytes]", bytes.len());
        Ok(())
    }
}
