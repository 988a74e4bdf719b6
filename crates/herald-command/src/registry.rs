//! Command registry: plugin-declared command trees, idempotent
//! initialization, and dotted-path lookup.
//!
//! Plugins declare [`CommandSpec`] trees. Registration initializes a spec
//! exactly once (shorthand-rule normalization plus `?`/`help` injection,
//! recursing into every sub first) and links it into an arena of nodes.
//! Aliases become additional child keys mapping to the *same* [`NodeId`], so
//! the registry is a graph over shared nodes rather than a tree of copies:
//! whatever is reached through one name is reached through all of them.
//!
//! After linking, nodes are never mutated by dispatch; the only writes
//! happen inside the registration phase.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use herald_store::Store;
use herald_types::{CallerId, Reply, Result};

use crate::error::CmdError;
use crate::rules::{ArgRule, ArgValue, parse_shorthand};

/// Index of a node in the registry arena.
///
/// Aliases map to the same id, so `==` answers "is this the identical node".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The synthetic root: every registered plugin hangs under it.
pub(crate) const ROOT: NodeId = NodeId(0);
/// Shared meta node answering `?` on any auto-injected help child.
const META_HELP: NodeId = NodeId(1);
/// The root's own auto-help child; its text refreshes per registration.
const ROOT_HELP: NodeId = NodeId(2);

/// Handler signature: bound arguments in, reply (or dispatch error) out.
pub type Handler =
    Arc<dyn Fn(Vec<ArgValue>) -> BoxFuture<'static, std::result::Result<Reply, CmdError>> + Send + Sync>;

/// One argument declaration, shorthand or already structured.
#[derive(Debug, Clone)]
pub(crate) enum ArgDecl {
    Short(String),
    Rule(ArgRule),
}

impl ArgDecl {
    fn into_rule(self) -> Result<ArgRule> {
        match self {
            ArgDecl::Rule(r) => Ok(r),
            ArgDecl::Short(s) => parse_shorthand(&s),
        }
    }
}

/// A plugin-declared command (sub)tree, before registration.
#[derive(Clone)]
pub struct CommandSpec {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) perm: i64,
    pub(crate) help: Option<String>,
    /// `None` marks "no usage declared" (pure routing nodes); `Some(vec![])`
    /// is an executable command taking no arguments.
    pub(crate) args: Option<Vec<ArgDecl>>,
    pub(crate) handler: Option<Handler>,
    pub(crate) subs: Vec<CommandSpec>,
    pub(crate) inited: bool,
    pub(crate) auto_help: bool,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("perm", &self.perm)
            .field("args", &self.args)
            .field("handler", &self.handler.is_some())
            .field("subs", &self.subs)
            .finish_non_exhaustive()
    }
}

impl CommandSpec {
    /// A new command with the given name and nothing else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            perm: 0,
            help: None,
            args: None,
            handler: None,
            subs: Vec::new(),
            inited: false,
            auto_help: false,
        }
    }

    /// Add an alternative name resolving to this same command.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Minimum caller level required to invoke.
    pub fn perm(mut self, level: i64) -> Self {
        self.perm = level;
        self
    }

    /// Free-text help shown by the injected `?` command.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Declare one argument in shorthand form (`"name:type:flag..."`,
    /// or a bare `"$tag"` for context types).
    pub fn arg(mut self, shorthand: impl Into<String>) -> Self {
        self.args
            .get_or_insert_with(Vec::new)
            .push(ArgDecl::Short(shorthand.into()));
        self
    }

    /// Declare one argument as an already structured rule.
    pub fn arg_rule(mut self, rule: ArgRule) -> Self {
        self.args.get_or_insert_with(Vec::new).push(ArgDecl::Rule(rule));
        self
    }

    /// Attach the handler invoked with the bound argument list.
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<ArgValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Reply, CmdError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |args| Box::pin(f(args))));
        self
    }

    /// Attach a sub-command.
    pub fn sub(mut self, sub: CommandSpec) -> Self {
        self.subs.push(sub);
        self
    }

    /// Initialize this spec: normalize shorthand rules and inject the
    /// `?`/`help` sub. Idempotent; recurses into every existing sub before
    /// wiring this node's own help child.
    pub(crate) fn init(&mut self) -> Result<()> {
        if self.inited {
            return Ok(());
        }
        self.inited = true;

        if let Some(args) = &mut self.args {
            for decl in args.iter_mut() {
                if let ArgDecl::Short(s) = decl {
                    *decl = ArgDecl::Rule(parse_shorthand(s)?);
                }
            }
        }

        for sub in &mut self.subs {
            sub.init()?;
        }

        if !self.subs.iter().any(|s| s.name == "?") {
            let mut help = CommandSpec::new("?");
            help.aliases.push("help".to_string());
            help.help = Some("show this help".to_string());
            help.args = Some(Vec::new());
            help.auto_help = true;
            help.inited = true;
            self.subs.push(help);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) perm: i64,
    pub(crate) help: Option<String>,
    pub(crate) rules: Option<Vec<ArgRule>>,
    pub(crate) handler: Option<Handler>,
    pub(crate) children: HashMap<String, NodeId>,
    /// Precomputed reply for auto-injected help nodes.
    pub(crate) help_reply: Option<String>,
}

impl Node {
    /// A node is executable if it has a handler or is a help node.
    pub(crate) fn executable(&self) -> bool {
        self.handler.is_some() || self.help_reply.is_some()
    }

    pub(crate) fn rules(&self) -> &[ArgRule] {
        self.rules.as_deref().unwrap_or_default()
    }

    fn child_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.children.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Read-only snapshot of one node, for callers outside the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub perm: i64,
    pub executable: bool,
    /// Child keys, aliases included, sorted.
    pub subs: Vec<String>,
    pub help: Option<String>,
}

/// The registry of all loaded commands.
pub struct Registry {
    nodes: Vec<Node>,
}

impl Registry {
    /// An empty registry: a root node whose `?` lists nothing yet.
    pub fn new() -> Self {
        let mut reg = Self { nodes: Vec::new() };

        // ROOT
        reg.nodes.push(Node {
            name: "herald".to_string(),
            aliases: Vec::new(),
            perm: 0,
            help: Some("type <command> ? for details".to_string()),
            rules: None,
            handler: None,
            children: HashMap::new(),
            help_reply: None,
        });

        // META_HELP: answers `?` on any help node, self-referencing.
        reg.nodes.push(Node {
            name: "?".to_string(),
            aliases: vec!["help".to_string()],
            perm: 0,
            help: Some("get help".to_string()),
            rules: Some(Vec::new()),
            handler: None,
            children: HashMap::new(),
            help_reply: Some(
                "?: [perm] 0, [alias] help\n[subs] ?, help\n[usage] ?\n[help] get help"
                    .to_string(),
            ),
        });
        reg.nodes[META_HELP.0]
            .children
            .extend([("?".to_string(), META_HELP), ("help".to_string(), META_HELP)]);

        // ROOT_HELP
        let root_help = reg.new_auto_help_node();
        debug_assert_eq!(root_help, ROOT_HELP);
        reg.nodes[ROOT.0]
            .children
            .extend([("?".to_string(), ROOT_HELP), ("help".to_string(), ROOT_HELP)]);
        reg.refresh_root_help();

        reg
    }

    /// Initialize and link one top-level command tree under the root.
    ///
    /// The spec's aliases become additional root keys on the same node.
    pub fn register(&mut self, mut spec: CommandSpec) -> Result<NodeId> {
        spec.init()?;
        let name = spec.name.clone();
        let aliases = spec.aliases.clone();
        let id = self.link(spec)?;
        self.nodes[ROOT.0].children.insert(name, id);
        for alias in aliases {
            self.nodes[ROOT.0].children.insert(alias, id);
        }
        self.refresh_root_help();
        Ok(id)
    }

    fn link(&mut self, spec: CommandSpec) -> Result<NodeId> {
        let CommandSpec {
            name,
            aliases,
            perm,
            help,
            args,
            handler,
            subs,
            ..
        } = spec;

        let rules = match args {
            Some(decls) => Some(
                decls
                    .into_iter()
                    .map(ArgDecl::into_rule)
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            aliases,
            perm,
            help,
            rules,
            handler,
            children: HashMap::new(),
            help_reply: None,
        });

        let mut help_child = None;
        for sub in subs {
            let sub_name = sub.name.clone();
            let sub_aliases = sub.aliases.clone();
            let child_id = if sub.auto_help {
                let hid = self.new_auto_help_node();
                help_child = Some(hid);
                hid
            } else {
                self.link(sub)?
            };
            self.nodes[id.0].children.insert(sub_name, child_id);
            for alias in sub_aliases {
                self.nodes[id.0].children.insert(alias, child_id);
            }
        }

        // The help child renders its parent only after every sibling key
        // (aliases and the `?`/`help` entries themselves) is in place.
        if let Some(hid) = help_child {
            let text = self.render_help(id);
            self.nodes[hid.0].help_reply = Some(text);
        }

        Ok(id)
    }

    fn new_auto_help_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: "?".to_string(),
            aliases: vec!["help".to_string()],
            perm: 0,
            help: Some("show this help".to_string()),
            rules: Some(Vec::new()),
            handler: None,
            children: HashMap::from([
                ("?".to_string(), META_HELP),
                ("help".to_string(), META_HELP),
            ]),
            help_reply: None,
        });
        id
    }

    fn refresh_root_help(&mut self) {
        let text = self.render_help(ROOT);
        self.nodes[ROOT_HELP.0].help_reply = Some(text);
    }

    /// Assemble the `?` reply for a node: permission, aliases, child names,
    /// usage line built from the argument rules, free-text help.
    fn render_help(&self, id: NodeId) -> String {
        let node = self.node(id);
        let mut out = format!("{}: [perm] {}", node.name, node.perm);
        if !node.aliases.is_empty() {
            out.push_str(&format!(", [alias] {}", node.aliases.join(", ")));
        }

        let names = node.child_names();
        out.push_str(&format!(
            "\n[subs] {}\n",
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            }
        ));

        match &node.rules {
            Some(rules) => {
                let frags: Vec<String> =
                    rules.iter().filter_map(ArgRule::usage_fragment).collect();
                out.push_str("[usage] ");
                out.push_str(&node.name);
                if !frags.is_empty() {
                    out.push(' ');
                    out.push_str(&frags.join(" "));
                }
                out.push('\n');
            },
            None => out.push_str("[no usage]\n"),
        }

        out.push_str(&format!(
            "[help] {}",
            node.help.as_deref().unwrap_or("no information")
        ));
        out
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Snapshot one node for external callers.
    pub fn info(&self, id: NodeId) -> CommandInfo {
        let node = self.node(id);
        CommandInfo {
            name: node.name.clone(),
            aliases: node.aliases.clone(),
            perm: node.perm,
            executable: node.executable(),
            subs: node.child_names().iter().map(|s| s.to_string()).collect(),
            help: node.help.clone(),
        }
    }

    /// Walk a dotted path by exact child keys. No partial matches, no fuzzy
    /// resolution: any unknown segment is a miss. The empty path is the root.
    pub fn lookup(&self, dotted: &str) -> Option<NodeId> {
        let mut now = ROOT;
        if dotted.is_empty() {
            return Some(now);
        }
        for segment in dotted.split('.') {
            now = *self.node(now).children.get(segment)?;
        }
        Some(now)
    }

    /// `lookup`, falling back to the caller's scope ("with") prefixes: each
    /// prefix is tried as `<prefix>.<dotted>` in list order, first hit wins.
    pub async fn lookup_with_scope(
        &self,
        dotted: &str,
        caller: CallerId,
        store: &dyn Store,
    ) -> Result<Option<NodeId>> {
        if let Some(id) = self.lookup(dotted) {
            return Ok(Some(id));
        }
        for prefix in store.scope_list(caller).await? {
            if let Some(id) = self.lookup(&format!("{prefix}.{dotted}")) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
