//! herald console entry point.
//!
//! A stand-in for a real messaging transport: one command line per stdin
//! line, replies on stdout. The caller id comes from `HERALD_UID` (default
//! 1; 0 is the super-caller), configuration from `herald.toml` in the
//! working directory when present.

mod console;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use herald_core::store::{MemoryStore, Store};
use herald_core::{Bot, BotConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = Path::new("herald.toml");
    let config = if config_path.exists() {
        BotConfig::load(config_path)?
    } else {
        BotConfig::default()
    };

    let caller: i64 = std::env::var("HERALD_UID")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    log::info!("starting herald console as caller {caller}");

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let bot = Bot::new(store, config);
    bot.load_command("*").await;

    println!("herald -- type ? for commands");
    let transport = console::ConsoleTransport::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        bot.run(&line, caller, &transport).await;
    }

    log::info!("herald shut down cleanly");
    Ok(())
}
