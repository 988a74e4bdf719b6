//! `echo` -- say it back, plus a parser-debugging sub-command.

use herald_command::{
    ArgSliceExt, ArgValue, BotHandle, CommandSpec, ConfigSchema, Plugin, PluginConfig,
};
use herald_types::{ChannelKind, Reply, Result};

pub fn plugin() -> Plugin {
    Plugin {
        name: "echo",
        schema: ConfigSchema::new(),
        build,
    }
}

fn build(_handle: &BotHandle, _cfg: &PluginConfig) -> Result<CommandSpec> {
    Ok(CommandSpec::new("echo")
        .help("Reply with the given text.")
        .arg("text:text")
        .handler(|args: Vec<ArgValue>| async move {
            // An empty echo is an empty reply, which the pipeline reports.
            Ok(Reply::text(args.text(0)?))
        })
        .sub(
            CommandSpec::new("raw")
                .help("Show how the line was parsed.")
                .arg("$msg")
                .arg("$uid")
                .arg("$flags")
                .arg("$tokens")
                .arg("$self")
                .handler(|args: Vec<ArgValue>| async move {
                    let msg = args.msg(0)?;
                    let uid = args.uid(1)?;
                    let channel = match msg.channel {
                        ChannelKind::Direct => "direct".to_string(),
                        ChannelKind::Group(id) => format!("group {id}"),
                    };
                    let (flags, tokens, node) = match (args.get(2), args.get(3), args.get(4)) {
                        (
                            Some(ArgValue::Flags(f)),
                            Some(ArgValue::Tokens(t)),
                            Some(ArgValue::SelfRef(n)),
                        ) => (f, t, n),
                        _ => return Err(herald_command::CmdError::internal("bad context args")),
                    };
                    Ok(Reply::Text(format!(
                        "caller: {uid}\nchannel: {channel}\ntokens: {tokens:?}\nflags: dq={} sq={}\nnode: {node}",
                        flags.dangling_double, flags.dangling_single,
                    )))
                }),
        ))
}
