//! The bot: store + dispatcher + plugin set behind one public surface.

use std::sync::Arc;

use herald_command::{
    BotHandle, CommandInfo, CommandSpec, DispatchConfig, Dispatcher, Plugin, PluginConfig,
};
use herald_store::Store;
use herald_types::{CallerId, Message, Result, Transport};

use crate::config::BotConfig;
use crate::plugins;

/// A fully assembled herald bot.
///
/// Construction is cheap and registers nothing: call [`Bot::load_command`]
/// to actually build and link plugin command trees.
pub struct Bot {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    plugins: Vec<Plugin>,
    config: BotConfig,
}

impl Bot {
    /// A bot over the given store, with the built-in plugins available.
    pub fn new(store: Arc<dyn Store>, config: BotConfig) -> Self {
        let dispatch_config = DispatchConfig {
            error_prefix: config.commands.error_prefix.clone().unwrap_or_default(),
        };
        let dispatcher = Dispatcher::new(Arc::clone(&store), dispatch_config);
        Self {
            store,
            dispatcher,
            plugins: plugins::builtins(),
            config,
        }
    }

    /// Make an additional plugin loadable. Loading still happens through
    /// [`Bot::load_command`].
    pub fn register_plugin(&mut self, plugin: Plugin) {
        self.plugins.push(plugin);
    }

    fn handle(&self) -> BotHandle {
        BotHandle {
            store: Arc::clone(&self.store),
            env_cache: self.dispatcher.env_cache(),
        }
    }

    /// Load every plugin (`"*"`) or one by exact name.
    ///
    /// Failures are logged per plugin and never abort the batch: a failed
    /// plugin simply registers nothing.
    pub async fn load_command(&self, pattern: &str) {
        for plugin in &self.plugins {
            if pattern != "*" && plugin.name != pattern {
                continue;
            }
            match self.load_one(plugin).await {
                Ok(()) => log::info!("loaded plugin {}", plugin.name),
                Err(err) => log::error!("failed to load plugin {}: {err}", plugin.name),
            }
        }
    }

    async fn load_one(&self, plugin: &Plugin) -> Result<()> {
        let config = match self.config.plugin_table(plugin.name) {
            Some(table) => plugin.schema.validate(table)?,
            None => PluginConfig::empty(),
        };
        let spec: CommandSpec = (plugin.build)(&self.handle(), &config)?;
        self.dispatcher.register(spec).await?;
        Ok(())
    }

    /// Pure registry lookup, no store access.
    pub async fn find_command(&self, dotted: &str) -> Option<CommandInfo> {
        self.dispatcher.find(dotted).await
    }

    /// Registry lookup with the caller's scope-prefix fallback.
    pub async fn find_command_with_scope(
        &self,
        dotted: &str,
        caller: CallerId,
    ) -> Result<Option<CommandInfo>> {
        self.dispatcher.find_with_scope(dotted, caller).await
    }

    /// Dispatch one raw line from a caller. All output goes through the
    /// transport; this never fails outward.
    pub async fn run(&self, raw: &str, caller: CallerId, transport: &dyn Transport) {
        self.dispatch(&Message::direct(caller, raw), transport).await;
    }

    /// Dispatch one inbound message.
    pub async fn dispatch(&self, msg: &Message, transport: &dyn Transport) {
        self.dispatcher.run(msg, transport).await;
    }
}
