//! `perm` -- permission levels.
//!
//! Reading your own level is open to everyone; `perm.set` requires level 5
//! and additionally re-checks through the `$checkPerm` guard, so the denial
//! is identical whichever gate fires first.

use std::sync::Arc;

use herald_command::{
    ArgSliceExt, ArgValue, BotHandle, CmdError, CommandSpec, ConfigSchema, Plugin, PluginConfig,
};
use herald_types::{Reply, Result, SUPER_CALLER};

/// Level required to change another caller's permission level.
const GRANT_LEVEL: i64 = 5;

pub fn plugin() -> Plugin {
    Plugin {
        name: "perm",
        schema: ConfigSchema::new(),
        build,
    }
}

fn build(handle: &BotHandle, _cfg: &PluginConfig) -> Result<CommandSpec> {
    let get_store = Arc::clone(&handle.store);
    let set_store = Arc::clone(&handle.store);

    Ok(CommandSpec::new("perm")
        .help("Show your permission level.")
        .arg("$uid")
        .handler(move |args: Vec<ArgValue>| {
            let store = Arc::clone(&get_store);
            async move {
                let uid = args.uid(0)?;
                if uid == SUPER_CALLER {
                    return Ok(Reply::text("level: unbounded"));
                }
                let level = store
                    .perm_level(uid)
                    .await
                    .map_err(CmdError::internal)?
                    .unwrap_or(0);
                Ok(Reply::Text(format!("level: {level}")))
            }
        })
        .sub(
            CommandSpec::new("set")
                .help("Assign a permission level to a caller.")
                .perm(GRANT_LEVEL)
                .arg("$checkPerm")
                .arg("user:num:int")
                .arg("level:num:int")
                .handler(move |args: Vec<ArgValue>| {
                    let store = Arc::clone(&set_store);
                    async move {
                        args.guard(0)?.check(GRANT_LEVEL, Some("perm.set"))?;
                        let user = args.num(1)? as i64;
                        let level = args.num(2)? as i64;
                        store
                            .perm_set(user, level)
                            .await
                            .map_err(CmdError::internal)?;
                        Ok(Reply::Text(format!("{user}: level {level}")))
                    }
                }),
        ))
}
