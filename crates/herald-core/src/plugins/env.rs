//! `env` -- per-caller environment variables.
//!
//! The tokenizer substitutes `$NAME` from these, so `env.set MODE weekly`
//! followed by `rank $MODE` works. Writes invalidate the dispatch-side env
//! cache so the next message sees the new value.

use std::sync::Arc;

use herald_command::{
    ArgSliceExt, ArgValue, BotHandle, CmdError, CommandSpec, ConfigSchema, Plugin, PluginConfig,
};
use herald_types::{Reply, Result};

pub fn plugin() -> Plugin {
    Plugin {
        name: "env",
        schema: ConfigSchema::new(),
        build,
    }
}

fn build(handle: &BotHandle, _cfg: &PluginConfig) -> Result<CommandSpec> {
    let list_store = Arc::clone(&handle.store);
    let set_store = Arc::clone(&handle.store);
    let set_cache = handle.env_cache.clone();
    let del_store = Arc::clone(&handle.store);
    let del_cache = handle.env_cache.clone();

    Ok(CommandSpec::new("env")
        .help("List your environment variables.")
        .arg("$uid")
        .handler(move |args: Vec<ArgValue>| {
            let store = Arc::clone(&list_store);
            async move {
                let uid = args.uid(0)?;
                let vars = store.env_all(uid).await.map_err(CmdError::internal)?;
                if vars.is_empty() {
                    return Ok(Reply::text("(no variables)"));
                }
                let mut lines: Vec<String> =
                    vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
                lines.sort();
                Ok(Reply::Text(lines.join("\n")))
            }
        })
        .sub(
            CommandSpec::new("set")
                .help("Set an environment variable.")
                .arg("$uid")
                .arg("name:str")
                .arg("value:text")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&set_store);
                    let cache = set_cache.clone();
                    async move {
                        let uid = args.uid(0)?;
                        let name = args.str(1)?.to_string();
                        let value = args.text(2)?.to_string();
                        store
                            .env_set(uid, &name, &value)
                            .await
                            .map_err(CmdError::internal)?;
                        cache.invalidate(uid).await;
                        Ok(Reply::Text(format!("{name}={value}")))
                    }
                }),
        )
        .sub(
            CommandSpec::new("del")
                .alias("unset")
                .help("Remove an environment variable.")
                .arg("$uid")
                .arg("name:str")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&del_store);
                    let cache = del_cache.clone();
                    async move {
                        let uid = args.uid(0)?;
                        let name = args.str(1)?.to_string();
                        let removed = store
                            .env_unset(uid, &name)
                            .await
                            .map_err(CmdError::internal)?;
                        if !removed {
                            return Ok(Reply::handled(format!("{name}: not set")));
                        }
                        cache.invalidate(uid).await;
                        Ok(Reply::Text(format!("{name} unset")))
                    }
                }),
        ))
}
