//! `with` -- per-caller scope prefixes.
//!
//! When a command name fails direct lookup, each prefix in the caller's
//! list is tried as `<prefix>.<name>` in order. `with.add rank` lets the
//! caller type `get 42` instead of `rank.get 42`.

use std::sync::Arc;

use herald_command::{
    ArgSliceExt, ArgValue, BotHandle, CmdError, CommandSpec, ConfigSchema, Plugin, PluginConfig,
};
use herald_types::{Reply, Result};

pub fn plugin() -> Plugin {
    Plugin {
        name: "with",
        schema: ConfigSchema::new(),
        build,
    }
}

fn build(handle: &BotHandle, _cfg: &PluginConfig) -> Result<CommandSpec> {
    let list_store = Arc::clone(&handle.store);
    let add_store = Arc::clone(&handle.store);
    let del_store = Arc::clone(&handle.store);

    Ok(CommandSpec::new("with")
        .help("List your scope prefixes, tried in order on lookup failure.")
        .arg("$uid")
        .handler(move |args: Vec<ArgValue>| {
            let store = Arc::clone(&list_store);
            async move {
                let uid = args.uid(0)?;
                let prefixes = store.scope_list(uid).await.map_err(CmdError::internal)?;
                if prefixes.is_empty() {
                    return Ok(Reply::text("(no scopes)"));
                }
                Ok(Reply::Text(prefixes.join(", ")))
            }
        })
        .sub(
            CommandSpec::new("add")
                .help("Append a scope prefix.")
                .arg("$uid")
                .arg("prefix:str")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&add_store);
                    async move {
                        let uid = args.uid(0)?;
                        let prefix = args.str(1)?.to_string();
                        store
                            .scope_add(uid, &prefix)
                            .await
                            .map_err(CmdError::internal)?;
                        Ok(Reply::Text(format!("with {prefix}")))
                    }
                }),
        )
        .sub(
            CommandSpec::new("del")
                .help("Remove a scope prefix.")
                .arg("$uid")
                .arg("prefix:str")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&del_store);
                    async move {
                        let uid = args.uid(0)?;
                        let prefix = args.str(1)?.to_string();
                        let removed = store
                            .scope_remove(uid, &prefix)
                            .await
                            .map_err(CmdError::internal)?;
                        if !removed {
                            return Ok(Reply::handled(format!("{prefix}: not in scope")));
                        }
                        Ok(Reply::Text(format!("without {prefix}")))
                    }
                }),
        ))
}
