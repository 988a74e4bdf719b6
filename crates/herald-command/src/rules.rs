//! Argument rules: the declarative per-argument type/permission model.
//!
//! Plugins may declare an argument either as a structured [`ArgRule`] or as
//! a compact shorthand string `"name:type:flag..."` (context types are bare
//! tags like `"$msg"`). Shorthand is expanded exactly once at load time;
//! unrecognized type tags or flags fail the plugin's load instead of
//! surfacing at dispatch time.

use herald_types::{CallerId, HeraldError, Message, Result};

use crate::error::CmdError;
use crate::registry::NodeId;
use crate::tokenizer::TokenFlags;

/// Closed set of argument types.
///
/// Context kinds are satisfied from the ambient invocation record and never
/// consume caller-supplied text; value kinds consume tokens or named
/// arguments and coerce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// The inbound message itself.
    Msg,
    /// The caller id.
    Uid,
    /// The tokenizer's quoting flags.
    Flags,
    /// The full token list, command name included.
    Tokens,
    /// The resolved command node.
    SelfRef,
    /// A permission-check guard the handler can invoke itself.
    CheckPerm,
    /// Verbatim string.
    Str,
    /// Strict `true`/`false`.
    Bool,
    /// Floating-point number; `int` additionally requires a 32-bit integer.
    Num { int: bool },
    /// Rest of the line: drains every remaining positional token.
    Text,
}

impl ArgType {
    /// Whether this type is resolved from ambient context.
    pub fn is_context(self) -> bool {
        matches!(
            self,
            ArgType::Msg
                | ArgType::Uid
                | ArgType::Flags
                | ArgType::Tokens
                | ArgType::SelfRef
                | ArgType::CheckPerm
        )
    }

    /// The shorthand tag, as used in error messages and usage lines.
    pub fn tag(self) -> &'static str {
        match self {
            ArgType::Msg => "$msg",
            ArgType::Uid => "$uid",
            ArgType::Flags => "$flags",
            ArgType::Tokens => "$tokens",
            ArgType::SelfRef => "$self",
            ArgType::CheckPerm => "$checkPerm",
            ArgType::Str => "str",
            ArgType::Bool => "bool",
            ArgType::Num { .. } => "num",
            ArgType::Text => "text",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "$msg" => ArgType::Msg,
            "$uid" => ArgType::Uid,
            "$flags" => ArgType::Flags,
            "$tokens" => ArgType::Tokens,
            "$self" => ArgType::SelfRef,
            "$checkPerm" => ArgType::CheckPerm,
            "str" => ArgType::Str,
            "bool" => ArgType::Bool,
            "num" => ArgType::Num { int: false },
            "text" => ArgType::Text,
            _ => return None,
        })
    }
}

/// One positional or named argument declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgRule {
    pub ty: ArgType,
    /// Used for named lookup and error messages; empty for context types.
    pub name: String,
    /// A missing value binds `Absent` instead of failing.
    pub opt: bool,
    /// `Some(true)` = named-only, `Some(false)` = positional-only,
    /// `None` = either.
    pub named: Option<bool>,
    /// Minimum caller level required to supply this argument at all.
    pub perm: Option<i64>,
}

impl ArgRule {
    /// A plain rule of the given type and name, no constraints.
    pub fn new(ty: ArgType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            opt: false,
            named: None,
            perm: None,
        }
    }

    /// A context rule (no name).
    pub fn context(ty: ArgType) -> Self {
        Self::new(ty, "")
    }

    pub fn optional(mut self) -> Self {
        self.opt = true;
        self
    }

    pub fn named_only(mut self) -> Self {
        self.named = Some(true);
        self
    }

    pub fn positional_only(mut self) -> Self {
        self.named = Some(false);
        self
    }

    pub fn require_perm(mut self, level: i64) -> Self {
        self.perm = Some(level);
        self
    }

    /// How this rule renders in a usage line, or `None` for context types.
    ///
    /// Named-only arguments render `[--name: ty]`, optional positionals
    /// `[name: ty]`, required positionals `<name: ty>`; a per-argument
    /// permission requirement is prefixed as `perm N`.
    pub fn usage_fragment(&self) -> Option<String> {
        if self.ty.is_context() {
            return None;
        }
        let perm = self
            .perm
            .map(|p| format!("perm {p} "))
            .unwrap_or_default();
        let body = format!("{perm}{}: {}", self.name, self.ty.tag());
        Some(if self.named == Some(true) {
            format!("[--{body}]")
        } else if self.opt {
            format!("[{body}]")
        } else {
            format!("<{body}>")
        })
    }
}

/// Expand one shorthand declaration into a structured rule.
///
/// Grammar: `"$tag"` for context types, else `"name:type[:flag...]"` with
/// flags `opt`, `named`, `pos`, `int` (`int` only on `num`).
pub fn parse_shorthand(s: &str) -> Result<ArgRule> {
    if s.starts_with('$') && !s.contains(':') {
        let ty = ArgType::from_tag(s)
            .ok_or_else(|| HeraldError::Plugin(format!("{s}: unknown arg type")))?;
        return Ok(ArgRule::context(ty));
    }

    let mut parts = s.split(':');
    let name = parts.next().unwrap_or_default();
    let Some(tag) = parts.next() else {
        return Err(HeraldError::Plugin(format!(
            "{s}: shorthand rule needs name:type"
        )));
    };
    if name.is_empty() {
        return Err(HeraldError::Plugin(format!("{s}: empty arg name")));
    }
    let ty =
        ArgType::from_tag(tag).ok_or_else(|| HeraldError::Plugin(format!("{tag}: unknown arg type")))?;

    let mut rule = ArgRule::new(ty, name);
    for flag in parts {
        match flag {
            "opt" => rule.opt = true,
            "named" => rule.named = Some(true),
            "pos" => rule.named = Some(false),
            "int" => match rule.ty {
                ArgType::Num { .. } => rule.ty = ArgType::Num { int: true },
                _ => {
                    return Err(HeraldError::Plugin(format!(
                        "{s}: int flag only applies to num"
                    )));
                },
            },
            other => {
                return Err(HeraldError::Plugin(format!("{other}: unknown arg flag")));
            },
        }
    }
    Ok(rule)
}

// ---------------------------------------------------------------------------
// Bound values
// ---------------------------------------------------------------------------

/// A permission-check guard handed to handlers declaring `$checkPerm`.
///
/// Carries the caller's effective level; `check` raises the same denial the
/// pipeline produces, so a handler-side check renders identically to a
/// command-level one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermGuard {
    level: i64,
}

impl PermGuard {
    pub fn new(level: i64) -> Self {
        Self { level }
    }

    /// The caller's effective permission level.
    pub fn level(self) -> i64 {
        self.level
    }

    /// Fail with `PermissionDenied` unless the caller reaches `level`.
    pub fn check(self, level: i64, why: Option<&str>) -> std::result::Result<(), CmdError> {
        if self.level < level {
            Err(CmdError::PermissionDenied {
                level,
                reason: why.map(str::to_string),
            })
        } else {
            Ok(())
        }
    }
}

/// One bound argument value, in rule declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Text(String),
    /// An optional argument the caller did not supply.
    Absent,
    Msg(Message),
    Uid(CallerId),
    Flags(TokenFlags),
    Tokens(Vec<String>),
    SelfRef(NodeId),
    CheckPerm(PermGuard),
}

/// Coerce one raw value against a value-typed rule.
///
/// `Str` never fails; `Bool` accepts exactly `true`/`false`; `Num` parses a
/// float and, with the `int` refinement, additionally requires the value to
/// equal its own 32-bit truncation.
pub fn coerce(rule: &ArgRule, raw: String) -> std::result::Result<ArgValue, CmdError> {
    let fail = |detail: &str| CmdError::Argument {
        name: rule.name.clone(),
        ty: rule.ty.tag().to_string(),
        detail: detail.to_string(),
    };
    match rule.ty {
        ArgType::Str => Ok(ArgValue::Str(raw)),
        ArgType::Bool => match raw.as_str() {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err(fail("not a boolean (true or false)")),
        },
        ArgType::Num { int } => {
            let n: f64 = raw.parse().map_err(|_| fail("not a number"))?;
            if !n.is_finite() {
                return Err(fail("not a number"));
            }
            if int && (n.trunc() != n || n < i32::MIN as f64 || n > i32::MAX as f64) {
                return Err(fail("not an integer"));
            }
            Ok(ArgValue::Num(n))
        },
        _ => Err(CmdError::Internal(format!(
            "{}: not a value type",
            rule.ty.tag()
        ))),
    }
}

/// Typed accessors over a bound argument list.
///
/// The binder guarantees the shape, so a mismatch is a programming error and
/// surfaces as `Internal`.
pub trait ArgSliceExt {
    fn str(&self, i: usize) -> std::result::Result<&str, CmdError>;
    fn opt_str(&self, i: usize) -> Option<&str>;
    fn num(&self, i: usize) -> std::result::Result<f64, CmdError>;
    fn opt_num(&self, i: usize) -> Option<f64>;
    fn bool_or(&self, i: usize, default: bool) -> bool;
    fn text(&self, i: usize) -> std::result::Result<&str, CmdError>;
    fn uid(&self, i: usize) -> std::result::Result<CallerId, CmdError>;
    fn msg(&self, i: usize) -> std::result::Result<&Message, CmdError>;
    fn guard(&self, i: usize) -> std::result::Result<PermGuard, CmdError>;
}

fn shape_err(i: usize, want: &str) -> CmdError {
    CmdError::Internal(format!("arg {i}: expected {want}"))
}

impl ArgSliceExt for [ArgValue] {
    fn str(&self, i: usize) -> std::result::Result<&str, CmdError> {
        match self.get(i) {
            Some(ArgValue::Str(s)) | Some(ArgValue::Text(s)) => Ok(s),
            _ => Err(shape_err(i, "str")),
        }
    }

    fn opt_str(&self, i: usize) -> Option<&str> {
        match self.get(i) {
            Some(ArgValue::Str(s)) | Some(ArgValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn num(&self, i: usize) -> std::result::Result<f64, CmdError> {
        match self.get(i) {
            Some(ArgValue::Num(n)) => Ok(*n),
            _ => Err(shape_err(i, "num")),
        }
    }

    fn opt_num(&self, i: usize) -> Option<f64> {
        match self.get(i) {
            Some(ArgValue::Num(n)) => Some(*n),
            _ => None,
        }
    }

    fn bool_or(&self, i: usize, default: bool) -> bool {
        match self.get(i) {
            Some(ArgValue::Bool(b)) => *b,
            _ => default,
        }
    }

    fn text(&self, i: usize) -> std::result::Result<&str, CmdError> {
        match self.get(i) {
            Some(ArgValue::Text(s)) => Ok(s),
            _ => Err(shape_err(i, "text")),
        }
    }

    fn uid(&self, i: usize) -> std::result::Result<CallerId, CmdError> {
        match self.get(i) {
            Some(ArgValue::Uid(u)) => Ok(*u),
            _ => Err(shape_err(i, "uid")),
        }
    }

    fn msg(&self, i: usize) -> std::result::Result<&Message, CmdError> {
        match self.get(i) {
            Some(ArgValue::Msg(m)) => Ok(m),
            _ => Err(shape_err(i, "msg")),
        }
    }

    fn guard(&self, i: usize) -> std::result::Result<PermGuard, CmdError> {
        match self.get(i) {
            Some(ArgValue::CheckPerm(g)) => Ok(*g),
            _ => Err(shape_err(i, "checkPerm")),
        }
    }
}
