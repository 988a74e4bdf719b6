//! The resolution & execution pipeline.
//!
//! One [`Dispatcher::run`] call is the whole per-message state machine:
//! tokenize (empty input becomes `?`), short-circuit on dangling quotes,
//! substitute the caller's alias for the first dotted segment, resolve with
//! scope fallback, gate on the command's permission level, bind arguments,
//! invoke the handler, and render the outcome.
//!
//! Error rendering follows three classes: permission denials are delivered
//! as their own message, every other user error is prefixed with the
//! resolved command name, and internal faults are logged first and carry the
//! `(internal error)` suffix. The pipeline always completes with exactly one
//! reply attempt (two segments for a `Pair`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use herald_store::Store;
use herald_types::{CallerId, Message, Reply, Result, SUPER_CALLER, Transport};

use crate::binder::{BindContext, bind};
use crate::error::CmdError;
use crate::registry::{CommandInfo, CommandSpec, NodeId, Registry};
use crate::tokenizer::{TokenFlags, split_named, tokenize};

/// Dispatch-level configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Prepended to every user-facing error reply.
    pub error_prefix: String,
}

/// Per-caller cache of environment variables, lazily filled from the store.
///
/// Concurrent dispatches for the same caller may race to fill an entry;
/// last write wins, which is fine for a cache of external truth.
#[derive(Clone, Default)]
pub struct EnvCache {
    inner: Arc<RwLock<HashMap<CallerId, HashMap<String, String>>>>,
}

impl EnvCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The caller's env map, from cache or freshly fetched.
    pub async fn get_or_fetch(
        &self,
        caller: CallerId,
        store: &dyn Store,
    ) -> Result<HashMap<String, String>> {
        if let Some(env) = self.inner.read().await.get(&caller) {
            return Ok(env.clone());
        }
        let env = store.env_all(caller).await?;
        self.inner.write().await.insert(caller, env.clone());
        Ok(env)
    }

    /// Drop the cached entry so the next dispatch re-reads the store.
    pub async fn invalidate(&self, caller: CallerId) {
        self.inner.write().await.remove(&caller);
    }
}

/// The dispatch engine: registry + store + env cache + config.
///
/// The registry sits behind a `RwLock`: dispatch takes read locks (held
/// across handler invocation), plugin registration takes the write lock, so
/// a (re)load is an exclusive phase that cannot mutate a node an in-flight
/// dispatch is using.
pub struct Dispatcher {
    registry: RwLock<Registry>,
    store: Arc<dyn Store>,
    env_cache: EnvCache,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, config: DispatchConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            store,
            env_cache: EnvCache::new(),
            config,
        }
    }

    /// A handle on the env cache, for plugins that write env variables.
    pub fn env_cache(&self) -> EnvCache {
        self.env_cache.clone()
    }

    /// Initialize and link one command tree. Exclusive against dispatch.
    pub async fn register(&self, spec: CommandSpec) -> Result<NodeId> {
        self.registry.write().await.register(spec)
    }

    /// Pure registry lookup, no store access.
    pub async fn find(&self, dotted: &str) -> Option<CommandInfo> {
        let registry = self.registry.read().await;
        registry.lookup(dotted).map(|id| registry.info(id))
    }

    /// Registry lookup with the caller's scope-prefix fallback.
    pub async fn find_with_scope(
        &self,
        dotted: &str,
        caller: CallerId,
    ) -> Result<Option<CommandInfo>> {
        let registry = self.registry.read().await;
        Ok(registry
            .lookup_with_scope(dotted, caller, self.store.as_ref())
            .await?
            .map(|id| registry.info(id)))
    }

    /// Dispatch one message. All output goes through the transport; this
    /// never fails outward.
    pub async fn run(&self, msg: &Message, transport: &dyn Transport) {
        let raw = msg.raw.trim_start();
        let raw = if raw.is_empty() { "?" } else { raw };
        log::info!("running by {}: {}", msg.caller, raw);

        let env = match self.env_cache.get_or_fetch(msg.caller, self.store.as_ref()).await {
            Ok(env) => env,
            Err(err) => return self.render_store_fault(transport, &err.to_string()).await,
        };

        let perm = if msg.caller == SUPER_CALLER {
            i64::MAX
        } else {
            match self.store.perm_level(msg.caller).await {
                Ok(level) => level.unwrap_or(0),
                Err(err) => return self.render_store_fault(transport, &err.to_string()).await,
            }
        };

        let (tokens, flags) = tokenize(raw, &env);
        if flags.dangling_double {
            return self
                .reply_err(transport, &CmdError::UnmatchedQuote('"').to_string())
                .await;
        }
        if flags.dangling_single {
            return self
                .reply_err(transport, &CmdError::UnmatchedQuote('\'').to_string())
                .await;
        }

        let (cmd_name, args) = match tokens.split_first() {
            Some((first, rest)) => (first.clone(), rest.to_vec()),
            None => ("?".to_string(), Vec::new()),
        };
        let (positional, named) = split_named(&args);

        // Alias substitution rewrites only the first dotted segment, so
        // scoped sub-paths stay stable under renaming.
        let cooked = match cmd_name.split_once('.') {
            Some((head, tail)) => {
                match self.store.alias_lookup(msg.caller, head).await {
                    Ok(Some(repl)) => format!("{repl}.{tail}"),
                    Ok(None) => cmd_name,
                    Err(err) => return self.render_store_fault(transport, &err.to_string()).await,
                }
            },
            None => match self.store.alias_lookup(msg.caller, &cmd_name).await {
                Ok(Some(repl)) => repl,
                Ok(None) => cmd_name,
                Err(err) => return self.render_store_fault(transport, &err.to_string()).await,
            },
        };

        let outcome = self
            .execute(&cooked, msg, perm, flags, &tokens, positional, named)
            .await;

        match outcome {
            Ok(Reply::Text(text)) => self.deliver(transport, &text).await,
            Ok(Reply::Pair(preamble, main)) => {
                self.deliver(transport, &preamble).await;
                self.deliver(transport, &main).await;
            },
            Ok(Reply::Media(bytes)) => {
                if let Err(err) = transport.reply_media(&bytes).await {
                    log::error!("transport error: {err}");
                }
            },
            Ok(Reply::Handled(text)) => self.reply_err(transport, &text).await,
            Ok(Reply::Empty) => {
                // `execute` converts empty replies; kept for exhaustiveness.
                self.reply_err(transport, &format!("{cooked}: {}", CmdError::EmptyReply))
                    .await;
            },
            Err(err) if err.is_permission() => self.reply_err(transport, &err.to_string()).await,
            Err(err) => {
                self.reply_err(transport, &format!("{cooked}: {err}")).await;
            },
        }
    }

    /// Stages 3-7: resolve, check, bind, invoke.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        cooked: &str,
        msg: &Message,
        perm: i64,
        flags: TokenFlags,
        tokens: &[String],
        positional: Vec<String>,
        named: BTreeMap<String, String>,
    ) -> std::result::Result<Reply, CmdError> {
        let registry = self.registry.read().await;
        let id = registry
            .lookup_with_scope(cooked, msg.caller, self.store.as_ref())
            .await
            .map_err(|err| CmdError::Internal(err.to_string()))?
            .ok_or(CmdError::NotFound)?;

        let node = registry.node(id);
        if !node.executable() {
            return Err(CmdError::NotExecutable);
        }
        if perm < node.perm {
            return Err(CmdError::PermissionDenied {
                level: node.perm,
                reason: None,
            });
        }

        let ctx = BindContext {
            msg,
            caller: msg.caller,
            perm,
            flags,
            tokens,
            self_id: id,
        };
        let bound = bind(node.rules(), positional, named, &ctx)?;

        if let Some(text) = &node.help_reply {
            return Ok(Reply::Text(text.clone()));
        }
        let Some(handler) = node.handler.clone() else {
            return Err(CmdError::NotExecutable);
        };

        match handler(bound).await {
            Ok(Reply::Empty) => {
                log::error!("caught internal error in {cooked}: {}", CmdError::EmptyReply);
                Err(CmdError::Internal(CmdError::EmptyReply.to_string()))
            },
            Ok(reply) => Ok(reply),
            Err(err @ CmdError::PermissionDenied { .. }) => Err(err),
            Err(CmdError::Internal(cause)) => {
                log::error!("caught internal error in {cooked}: {cause}");
                Err(CmdError::Internal(cause))
            },
            Err(other) => {
                log::error!("caught internal error in {cooked}: {other}");
                Err(CmdError::Internal(other.to_string()))
            },
        }
    }

    async fn deliver(&self, transport: &dyn Transport, text: &str) {
        if let Err(err) = transport.reply(text).await {
            log::error!("transport error: {err}");
        }
    }

    async fn reply_err(&self, transport: &dyn Transport, text: &str) {
        let rendered = format!("{}{}", self.config.error_prefix, text);
        self.deliver(transport, &rendered).await;
    }

    /// A store failure before resolution: no command name to prefix with.
    async fn render_store_fault(&self, transport: &dyn Transport, cause: &str) {
        log::error!("store error during dispatch: {cause}");
        self.reply_err(transport, &CmdError::Internal(cause.to_string()).to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use herald_store::MemoryStore;
    use herald_types::test_util::{Recorded, RecordingTransport};
    use herald_types::{ChannelKind, Reply};

    use crate::rules::{ArgSliceExt, ArgValue};

    async fn dispatcher() -> (Arc<Dispatcher>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn Store>,
            DispatchConfig::default(),
        );
        (Arc::new(dispatcher), store)
    }

    fn rank_spec(calls: Arc<AtomicUsize>) -> CommandSpec {
        CommandSpec::new("rank")
            .alias("rk")
            .help("ranking lookups")
            .perm(0)
            .arg("mode:str:opt")
            .arg("n:num:int:opt")
            .handler(move |args: Vec<ArgValue>| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mode = args.opt_str(0).unwrap_or("daily").to_string();
                    let n = args.opt_num(1).map(|n| n as i64).unwrap_or(1);
                    Ok(Reply::Text(format!("{mode}#{n}")))
                }
            })
            .sub(
                CommandSpec::new("get").arg("id:str").handler(|args: Vec<ArgValue>| async move {
                    Ok(Reply::Text(format!("art {}", args.str(0)?)))
                }),
            )
    }

    async fn run_line(dispatcher: &Dispatcher, caller: CallerId, line: &str) -> Vec<String> {
        let transport = RecordingTransport::new();
        dispatcher.run(&Message::direct(caller, line), &transport).await;
        transport.texts()
    }

    #[tokio::test]
    async fn happy_path_binds_and_replies() {
        let (d, _) = dispatcher().await;
        let calls = Arc::new(AtomicUsize::new(0));
        d.register(rank_spec(Arc::clone(&calls))).await.unwrap();

        let replies = run_line(&d, 7, "rank weekly 3").await;
        assert_eq!(replies, vec!["weekly#3"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn named_arguments_reach_the_binder() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();

        let replies = run_line(&d, 7, "rank --n 5").await;
        assert_eq!(replies, vec!["daily#5"]);
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let (d, _) = dispatcher().await;
        let replies = run_line(&d, 7, "nope").await;
        assert_eq!(replies, vec!["nope: not found"]);
    }

    #[tokio::test]
    async fn dotted_name_resolves_subcommand() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        let replies = run_line(&d, 7, "rank.get xyz").await;
        assert_eq!(replies, vec!["art xyz"]);
    }

    #[tokio::test]
    async fn routing_only_node_is_not_executable() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("tools")
                .sub(CommandSpec::new("a").handler(|_| async { Ok(Reply::text("a")) })),
        )
        .await
        .unwrap();
        let replies = run_line(&d, 7, "tools").await;
        assert_eq!(replies, vec!["tools: not executable"]);
    }

    #[tokio::test]
    async fn dangling_double_quote_short_circuits() {
        let (d, _) = dispatcher().await;
        let calls = Arc::new(AtomicUsize::new(0));
        d.register(rank_spec(Arc::clone(&calls))).await.unwrap();

        let replies = run_line(&d, 7, "rank \"oops").await;
        assert_eq!(replies, vec!["unmatched \""]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dangling_single_quote_short_circuits() {
        let (d, _) = dispatcher().await;
        let replies = run_line(&d, 7, "say 'oops").await;
        assert_eq!(replies, vec!["unmatched '"]);
    }

    #[tokio::test]
    async fn empty_input_invokes_root_help() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        let replies = run_line(&d, 7, "   ").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("[subs]"));
        assert!(replies[0].contains("rank"));
    }

    #[tokio::test]
    async fn permission_gate_blocks_before_handler() {
        let (d, store) = dispatcher().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        d.register(
            CommandSpec::new("admin")
                .perm(5)
                .handler(move |_| {
                    let calls = Arc::clone(&calls2);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Reply::text("secret"))
                    }
                }),
        )
        .await
        .unwrap();

        // Level 0 caller: denied, handler never runs, no name prefix.
        let replies = run_line(&d, 7, "admin").await;
        assert_eq!(replies, vec!["permission denied (require 5)"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Granted caller passes.
        store.perm_set(7, 5).await.unwrap();
        let replies = run_line(&d, 7, "admin").await;
        assert_eq!(replies, vec!["secret"]);
    }

    #[tokio::test]
    async fn super_caller_passes_any_gate() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("admin")
                .perm(9000)
                .handler(|_| async { Ok(Reply::text("root")) }),
        )
        .await
        .unwrap();
        let replies = run_line(&d, SUPER_CALLER, "admin").await;
        assert_eq!(replies, vec!["root"]);
    }

    #[tokio::test]
    async fn binder_errors_render_with_command_prefix() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();

        let replies = run_line(&d, 7, "rank daily 3.5").await;
        assert_eq!(replies, vec!["rank: arg (n: num): not an integer"]);

        let replies = run_line(&d, 7, "rank a 1 extra").await;
        assert_eq!(replies, vec!["rank: too many args"]);

        let replies = run_line(&d, 7, "rank --bogus x").await;
        assert_eq!(replies, vec!["rank: bogus: unknown named arg"]);
    }

    #[tokio::test]
    async fn handled_reply_renders_as_user_error() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("fussy").handler(|_| async { Ok(Reply::handled("Illegal mode.")) }),
        )
        .await
        .unwrap();
        let replies = run_line(&d, 7, "fussy").await;
        assert_eq!(replies, vec!["Illegal mode."]);
    }

    #[tokio::test]
    async fn empty_reply_is_internal_error() {
        let (d, _) = dispatcher().await;
        d.register(CommandSpec::new("mute").handler(|_| async { Ok(Reply::Empty) }))
            .await
            .unwrap();
        let replies = run_line(&d, 7, "mute").await;
        assert_eq!(replies, vec!["mute: empty reply (internal error)"]);
    }

    #[tokio::test]
    async fn handler_fault_is_internal_error() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("flaky")
                .handler(|_| async { Err(CmdError::Internal("backend gone".into())) }),
        )
        .await
        .unwrap();
        let replies = run_line(&d, 7, "flaky").await;
        assert_eq!(replies, vec!["flaky: backend gone (internal error)"]);
    }

    #[tokio::test]
    async fn handler_permission_denial_passes_through() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("guarded")
                .arg("$checkPerm")
                .handler(|args: Vec<ArgValue>| async move {
                    args.guard(0)?.check(8, Some("the vault"))?;
                    Ok(Reply::text("opened"))
                }),
        )
        .await
        .unwrap();
        let replies = run_line(&d, 7, "guarded").await;
        // Direct denial message, no command prefix, no internal marker.
        assert_eq!(replies, vec!["permission denied for the vault (require 8)"]);
    }

    #[tokio::test]
    async fn pair_reply_delivers_two_segments() {
        let (d, _) = dispatcher().await;
        d.register(CommandSpec::new("both").handler(|_| async {
            Ok(Reply::Pair("first".into(), "second".into()))
        }))
        .await
        .unwrap();
        let replies = run_line(&d, 7, "both").await;
        assert_eq!(replies, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn media_reply_goes_through_reply_media() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("pic").handler(|_| async { Ok(Reply::Media(vec![1, 2, 3])) }),
        )
        .await
        .unwrap();
        let transport = RecordingTransport::new();
        d.run(&Message::direct(7, "pic"), &transport).await;
        assert_eq!(transport.replies(), vec![Recorded::Media(vec![1, 2, 3])]);
    }

    #[tokio::test]
    async fn error_prefix_applies_to_user_errors() {
        let store = Arc::new(MemoryStore::new());
        let d = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn Store>,
            DispatchConfig {
                error_prefix: "[err] ".to_string(),
            },
        );
        let replies = {
            let transport = RecordingTransport::new();
            d.run(&Message::direct(7, "nope"), &transport).await;
            transport.texts()
        };
        assert_eq!(replies, vec!["[err] nope: not found"]);
    }

    #[tokio::test]
    async fn alias_substitutes_first_segment_only() {
        let (d, store) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        store.alias_set(7, "r", "rank").await.unwrap();

        let replies = run_line(&d, 7, "r").await;
        assert_eq!(replies, vec!["daily#1"]);

        // Nested segments stay untouched: `r.get` -> `rank.get`.
        let replies = run_line(&d, 7, "r.get xyz").await;
        assert_eq!(replies, vec!["art xyz"]);

        // Another caller has no such alias.
        let replies = run_line(&d, 8, "r").await;
        assert_eq!(replies, vec!["r: not found"]);
    }

    #[tokio::test]
    async fn alias_does_not_rewrite_nested_segments() {
        let (d, store) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        // An alias on "get" must not fire in second position.
        store.alias_set(7, "get", "rank").await.unwrap();
        let replies = run_line(&d, 7, "rank.get xyz").await;
        assert_eq!(replies, vec!["art xyz"]);
    }

    #[tokio::test]
    async fn scope_fallback_reaches_nested_command() {
        let (d, store) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        store.scope_add(7, "rank").await.unwrap();

        let replies = run_line(&d, 7, "get xyz").await;
        assert_eq!(replies, vec!["art xyz"]);
    }

    #[tokio::test]
    async fn env_substitution_uses_cached_store_env() {
        let (d, store) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        store.env_set(7, "M", "monthly").await.unwrap();

        let replies = run_line(&d, 7, "rank $M 2").await;
        assert_eq!(replies, vec!["monthly#2"]);

        // The cache hides later store writes until invalidated.
        store.env_set(7, "M", "weekly").await.unwrap();
        let replies = run_line(&d, 7, "rank $M 2").await;
        assert_eq!(replies, vec!["monthly#2"]);

        d.env_cache().invalidate(7).await;
        let replies = run_line(&d, 7, "rank $M 2").await;
        assert_eq!(replies, vec!["weekly#2"]);
    }

    #[tokio::test]
    async fn help_command_executes_on_any_node() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();

        let replies = run_line(&d, 7, "rank.?").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("rank: [perm] 0, [alias] rk"));

        let replies = run_line(&d, 7, "rank.help").await;
        assert!(replies[0].contains("[usage] rank"));
    }

    #[tokio::test]
    async fn help_takes_no_domain_arguments() {
        let (d, _) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        let replies = run_line(&d, 7, "rank.? extra").await;
        assert_eq!(replies, vec!["rank.?: too many args"]);
    }

    #[tokio::test]
    async fn concurrent_callers_are_isolated() {
        let (d, store) = dispatcher().await;
        d.register(
            CommandSpec::new("whoami")
                .arg("$uid")
                .arg("tag:str")
                .handler(|args: Vec<ArgValue>| async move {
                    Ok(Reply::Text(format!("{}:{}", args.uid(0)?, args.str(1)?)))
                }),
        )
        .await
        .unwrap();
        store.env_set(1, "TAG", "one").await.unwrap();
        store.env_set(2, "TAG", "two").await.unwrap();

        let t1 = RecordingTransport::new();
        let t2 = RecordingTransport::new();
        let m1 = Message::direct(1, "whoami $TAG");
        let m2 = Message::direct(2, "whoami $TAG");
        tokio::join!(d.run(&m1, &t1), d.run(&m2, &t2));

        assert_eq!(t1.texts(), vec!["1:one"]);
        assert_eq!(t2.texts(), vec!["2:two"]);
    }

    #[tokio::test]
    async fn group_channel_reaches_handler_via_msg() {
        let (d, _) = dispatcher().await;
        d.register(
            CommandSpec::new("where")
                .arg("$msg")
                .handler(|args: Vec<ArgValue>| async move {
                    let reply = match args.msg(0)?.channel {
                        ChannelKind::Direct => "direct".to_string(),
                        ChannelKind::Group(id) => format!("group {id}"),
                    };
                    Ok(Reply::Text(reply))
                }),
        )
        .await
        .unwrap();
        let transport = RecordingTransport::new();
        d.run(&Message::group(7, 42, "where"), &transport).await;
        assert_eq!(transport.texts(), vec!["group 42"]);
    }

    #[tokio::test]
    async fn find_and_find_with_scope() {
        let (d, store) = dispatcher().await;
        d.register(rank_spec(Arc::new(AtomicUsize::new(0)))).await.unwrap();

        assert!(d.find("rank.get").await.is_some());
        assert!(d.find("get").await.is_none());

        store.scope_add(7, "rank").await.unwrap();
        let info = d.find_with_scope("get", 7).await.unwrap().unwrap();
        assert_eq!(info.name, "get");
        assert!(info.executable);
    }
}
