//! The layered dispatch error taxonomy.
//!
//! Three propagation classes share this one enum:
//!
//! - user errors (`NotFound`, `NotExecutable`, `PermissionDenied`, every
//!   binder failure, `UnmatchedQuote`) render to the caller and are never
//!   logged as faults;
//! - internal errors (`Internal`, `EmptyReply`) are logged with the resolved
//!   command name and render with the `(internal error)` suffix;
//! - load-time plugin errors use [`herald_types::HeraldError`] instead and
//!   never reach a caller.

/// A failure somewhere between receiving a raw line and delivering a reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CmdError {
    #[error("not found")]
    NotFound,

    /// The resolved node is routing-only (no handler).
    #[error("not executable")]
    NotExecutable,

    /// Caller level below the required level, either for the command itself
    /// or for one specific argument (`reason` names the argument).
    #[error("permission denied{} (require {level})",
            reason.as_ref().map(|r| format!(" for {r}")).unwrap_or_default())]
    PermissionDenied { level: i64, reason: Option<String> },

    /// A value failed coercion against its argument rule.
    #[error("arg ({name}: {ty}): {detail}")]
    Argument {
        name: String,
        ty: String,
        detail: String,
    },

    /// Named arguments were supplied that no rule consumed.
    #[error("{0}: unknown named arg")]
    UnknownNamed(String),

    #[error("too many args")]
    TooManyArgs,

    #[error("too few args")]
    TooFewArgs,

    /// The raw line ended inside a quoted span of the given kind.
    #[error("unmatched {0}")]
    UnmatchedQuote(char),

    /// A handler fault after successful binding, or a store failure mid
    /// dispatch. Always logged before rendering.
    #[error("{0} (internal error)")]
    Internal(String),

    /// The handler completed but produced nothing to send.
    #[error("empty reply")]
    EmptyReply,
}

impl CmdError {
    /// Wrap any displayable cause as an internal fault.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        CmdError::Internal(cause.to_string())
    }

    /// Build the per-argument permission denial the binder raises.
    pub fn denied_for_arg(level: i64, name: &str, ty: &str) -> Self {
        CmdError::PermissionDenied {
            level,
            reason: Some(format!("arg ({name}: {ty})")),
        }
    }

    /// Whether this error belongs to the user-facing class (rendered without
    /// the resolved-name prefix and never logged as a fault).
    pub fn is_permission(&self) -> bool {
        matches!(self, CmdError::PermissionDenied { .. })
    }
}
