//! `alias` -- per-caller command aliases.
//!
//! An alias only ever replaces the first dotted segment of a command name,
//! so `alias.set r rank` makes both `r` and `r.get` work.

use std::sync::Arc;

use herald_command::{
    ArgSliceExt, ArgValue, BotHandle, CmdError, CommandSpec, ConfigSchema, Plugin, PluginConfig,
};
use herald_types::{Reply, Result};

pub fn plugin() -> Plugin {
    Plugin {
        name: "alias",
        schema: ConfigSchema::new(),
        build,
    }
}

fn build(handle: &BotHandle, _cfg: &PluginConfig) -> Result<CommandSpec> {
    let list_store = Arc::clone(&handle.store);
    let set_store = Arc::clone(&handle.store);
    let del_store = Arc::clone(&handle.store);

    Ok(CommandSpec::new("alias")
        .help("List your command aliases.")
        .arg("$uid")
        .handler(move |args: Vec<ArgValue>| {
            let store = Arc::clone(&list_store);
            async move {
                let uid = args.uid(0)?;
                let aliases = store.alias_all(uid).await.map_err(CmdError::internal)?;
                if aliases.is_empty() {
                    return Ok(Reply::text("(no aliases)"));
                }
                let mut lines: Vec<String> = aliases
                    .iter()
                    .map(|(alias, command)| format!("{alias} -> {command}"))
                    .collect();
                lines.sort();
                Ok(Reply::Text(lines.join("\n")))
            }
        })
        .sub(
            CommandSpec::new("set")
                .help("Alias a name to a command (first segment only).")
                .arg("$uid")
                .arg("name:str")
                .arg("command:str")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&set_store);
                    async move {
                        let uid = args.uid(0)?;
                        let name = args.str(1)?.to_string();
                        let command = args.str(2)?.to_string();
                        store
                            .alias_set(uid, &name, &command)
                            .await
                            .map_err(CmdError::internal)?;
                        Ok(Reply::Text(format!("{name} -> {command}")))
                    }
                }),
        )
        .sub(
            CommandSpec::new("del")
                .help("Remove an alias.")
                .arg("$uid")
                .arg("name:str")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&del_store);
                    async move {
                        let uid = args.uid(0)?;
                        let name = args.str(1)?.to_string();
                        let removed = store
                            .alias_unset(uid, &name)
                            .await
                            .map_err(CmdError::internal)?;
                        if !removed {
                            return Ok(Reply::handled(format!("{name}: not aliased")));
                        }
                        Ok(Reply::Text(format!("{name} removed")))
                    }
                }),
        ))
}
