//! The argument binder: rules + tokens + caller level -> bound argument list.
//!
//! Processing order is part of the contract and mirrors declaration order:
//! per-rule permission gate first, context kinds from the ambient record
//! (never consuming caller text), `text` draining the positional queue,
//! value kinds consuming named-first then positional. Afterwards any
//! unconsumed named key or positional token is an error.

use std::collections::{BTreeMap, VecDeque};

use herald_types::{CallerId, Message};

use crate::error::CmdError;
use crate::registry::NodeId;
use crate::rules::{ArgRule, ArgType, ArgValue, PermGuard, coerce};
use crate::tokenizer::TokenFlags;

/// Ambient per-invocation record the context argument kinds resolve from.
#[derive(Debug, Clone, Copy)]
pub struct BindContext<'a> {
    pub msg: &'a Message,
    pub caller: CallerId,
    /// The caller's effective permission level.
    pub perm: i64,
    pub flags: TokenFlags,
    /// Full token list, command name included.
    pub tokens: &'a [String],
    /// The resolved command node.
    pub self_id: NodeId,
}

/// Bind every rule in declaration order, or fail with the first error.
pub fn bind(
    rules: &[ArgRule],
    positional: Vec<String>,
    mut named: BTreeMap<String, String>,
    ctx: &BindContext<'_>,
) -> Result<Vec<ArgValue>, CmdError> {
    let mut positional: VecDeque<String> = positional.into();
    let mut bound = Vec::with_capacity(rules.len());

    for rule in rules {
        if let Some(level) = rule.perm
            && ctx.perm < level
        {
            return Err(CmdError::denied_for_arg(level, &rule.name, rule.ty.tag()));
        }

        match rule.ty {
            ArgType::Msg => bound.push(ArgValue::Msg(ctx.msg.clone())),
            ArgType::Uid => bound.push(ArgValue::Uid(ctx.caller)),
            ArgType::Flags => bound.push(ArgValue::Flags(ctx.flags)),
            ArgType::Tokens => bound.push(ArgValue::Tokens(ctx.tokens.to_vec())),
            ArgType::SelfRef => bound.push(ArgValue::SelfRef(ctx.self_id)),
            ArgType::CheckPerm => bound.push(ArgValue::CheckPerm(PermGuard::new(ctx.perm))),

            ArgType::Text => {
                let joined: Vec<String> = positional.drain(..).collect();
                bound.push(ArgValue::Text(joined.join(" ")));
            },

            ArgType::Str | ArgType::Bool | ArgType::Num { .. } => {
                let raw = if let Some(value) = named.remove(&rule.name) {
                    if rule.named == Some(false) {
                        return Err(CmdError::Argument {
                            name: rule.name.clone(),
                            ty: rule.ty.tag().to_string(),
                            detail: "forbidden named arg".to_string(),
                        });
                    }
                    Some(value)
                } else if rule.named == Some(true) {
                    // Named-only and not supplied: absent, and the
                    // positional queue is left untouched.
                    bound.push(ArgValue::Absent);
                    continue;
                } else {
                    positional.pop_front()
                };

                match raw {
                    Some(value) => bound.push(coerce(rule, value)?),
                    None if rule.opt => bound.push(ArgValue::Absent),
                    None => return Err(CmdError::TooFewArgs),
                }
            },
        }
    }

    if !named.is_empty() {
        let names: Vec<&str> = named.keys().map(String::as_str).collect();
        return Err(CmdError::UnknownNamed(names.join(", ")));
    }
    if !positional.is_empty() {
        return Err(CmdError::TooManyArgs);
    }

    Ok(bound)
}
