//! Locally handled directives.
//!
//! Input that starts with the command marker (default `/`) is routed to a
//! handler by verb instead of being sent to generation. Handlers talk to the
//! session only through `CommandContext`, which can emit bot messages, toggle
//! the loading indicator, clear history, update a message by id, read a
//! transcript snapshot, and list the store. They never open a generation
//! stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::debug;

use threadline_types::config::UnknownCommandPolicy;
use threadline_types::error::SessionError;
use threadline_types::message::{ChatMessage, LOADING_PLACEHOLDER, MessageId, MessageKind};

/// What the session exposes to command handlers.
///
/// Object-safe (boxed futures) so the dispatcher can stay independent of the
/// session's store type.
pub trait CommandHost: Send + Sync {
    /// Persist a bot message. It becomes visible through the `created` echo.
    fn emit_bot_message(&self, content: String) -> BoxFuture<'_, Result<MessageId, SessionError>>;

    fn set_loading(&self, loading: bool);

    fn clear_history(&self) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Persist new content for an existing message.
    fn update_message(
        &self,
        id: MessageId,
        content: String,
    ) -> BoxFuture<'_, Result<(), SessionError>>;

    fn snapshot(&self) -> Vec<ChatMessage>;

    /// The store's full listing, independent of which echoes have arrived.
    fn history(&self) -> BoxFuture<'_, Result<Vec<ChatMessage>, SessionError>>;
}

/// One registered verb, as listed by `help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub verb: String,
    pub description: String,
}

/// Everything a handler gets for one invocation.
pub struct CommandContext<'a> {
    host: &'a dyn CommandHost,
    marker: char,
    verb: String,
    args: String,
    catalog: Vec<CommandInfo>,
}

impl<'a> CommandContext<'a> {
    /// Lowercased verb that selected this handler.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Text after the verb, trimmed.
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    /// Registered verbs in sorted order.
    pub fn catalog(&self) -> &[CommandInfo] {
        &self.catalog
    }

    pub async fn emit_bot_message(&self, content: impl Into<String>) -> Result<MessageId, SessionError> {
        self.host.emit_bot_message(content.into()).await
    }

    pub fn set_loading(&self, loading: bool) {
        self.host.set_loading(loading);
    }

    pub async fn clear_history(&self) -> Result<(), SessionError> {
        self.host.clear_history().await
    }

    pub async fn update_message(
        &self,
        id: MessageId,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.host.update_message(id, content.into()).await
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.host.snapshot()
    }

    pub async fn history(&self) -> Result<Vec<ChatMessage>, SessionError> {
        self.host.history().await
    }
}

/// A local directive.
pub trait CommandHandler: Send + Sync {
    /// One-line summary shown by `help`.
    fn description(&self) -> &str;

    fn handle<'a>(&'a self, ctx: CommandContext<'a>) -> BoxFuture<'a, Result<(), SessionError>>;
}

/// Result of routing an input through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler (or the unknown-verb reply) consumed the input.
    Handled,
    /// The input should continue to generation as plain text.
    PassThrough,
}

/// Maps verbs to handlers.
pub struct CommandDispatcher {
    marker: char,
    unknown: UnknownCommandPolicy,
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    /// Dispatcher with the built-in verbs: `help`, `clear`, `echo`, `stats`.
    pub fn new(marker: char, unknown: UnknownCommandPolicy) -> Self {
        let mut dispatcher = Self::empty(marker, unknown);
        dispatcher.register("help", HelpCommand);
        dispatcher.register("clear", ClearCommand);
        dispatcher.register("echo", EchoCommand);
        dispatcher.register("stats", StatsCommand);
        dispatcher
    }

    /// Dispatcher with no verbs registered.
    pub fn empty(marker: char, unknown: UnknownCommandPolicy) -> Self {
        Self {
            marker,
            unknown,
            handlers: BTreeMap::new(),
        }
    }

    /// Register (or replace) the handler for `verb`. Verbs are case-insensitive.
    pub fn register(&mut self, verb: &str, handler: impl CommandHandler + 'static) -> &mut Self {
        self.handlers
            .insert(verb.to_lowercase(), Arc::new(handler));
        self
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    pub fn is_command(&self, input: &str) -> bool {
        input.starts_with(self.marker)
    }

    /// Split a marker-prefixed input into `(verb, args)`.
    pub fn parse(&self, input: &str) -> Option<(String, String)> {
        let body = input.strip_prefix(self.marker)?;
        let mut parts = body.trim_start().splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or_default().to_lowercase();
        let args = parts.next().unwrap_or_default().trim().to_string();
        Some((verb, args))
    }

    pub fn catalog(&self) -> Vec<CommandInfo> {
        self.handlers
            .iter()
            .map(|(verb, handler)| CommandInfo {
                verb: verb.clone(),
                description: handler.description().to_string(),
            })
            .collect()
    }

    /// Route `input` to its handler.
    ///
    /// Non-command input and unknown verbs under the pass-through policy
    /// return `Dispatch::PassThrough`.
    pub async fn dispatch(
        &self,
        input: &str,
        host: &dyn CommandHost,
    ) -> Result<Dispatch, SessionError> {
        let Some((verb, args)) = self.parse(input) else {
            return Ok(Dispatch::PassThrough);
        };

        let Some(handler) = self.handlers.get(&verb) else {
            return match self.unknown {
                UnknownCommandPolicy::PassThrough => {
                    debug!(%verb, "unknown command passed through to generation");
                    Ok(Dispatch::PassThrough)
                }
                UnknownCommandPolicy::Reply => {
                    debug!(%verb, "unknown command");
                    host.emit_bot_message(format!(
                        "Unknown command: {marker}{verb}. Type {marker}help for available commands.",
                        marker = self.marker
                    ))
                    .await?;
                    Ok(Dispatch::Handled)
                }
            };
        };

        debug!(%verb, "dispatching command");
        let ctx = CommandContext {
            host,
            marker: self.marker,
            verb,
            args,
            catalog: self.catalog(),
        };
        handler.handle(ctx).await?;
        Ok(Dispatch::Handled)
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("marker", &self.marker)
            .field("unknown", &self.unknown)
            .field("verbs", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct HelpCommand;

impl CommandHandler for HelpCommand {
    fn description(&self) -> &str {
        "List available commands"
    }

    fn handle<'a>(&'a self, ctx: CommandContext<'a>) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let mut text = String::from("Available commands:");
            for info in ctx.catalog() {
                text.push_str(&format!(
                    "\n{}{} - {}",
                    ctx.marker(),
                    info.verb,
                    info.description
                ));
            }
            ctx.emit_bot_message(text).await?;
            Ok(())
        })
    }
}

struct ClearCommand;

impl CommandHandler for ClearCommand {
    fn description(&self) -> &str {
        "Clear the conversation history"
    }

    fn handle<'a>(&'a self, ctx: CommandContext<'a>) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move { ctx.clear_history().await })
    }
}

struct EchoCommand;

impl CommandHandler for EchoCommand {
    fn description(&self) -> &str {
        "Repeat the given text as a bot message"
    }

    fn handle<'a>(&'a self, ctx: CommandContext<'a>) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let text = if ctx.args().is_empty() {
                format!("Usage: {}echo <text>", ctx.marker())
            } else {
                ctx.args().to_string()
            };
            ctx.emit_bot_message(text).await?;
            Ok(())
        })
    }
}

struct StatsCommand;

impl CommandHandler for StatsCommand {
    fn description(&self) -> &str {
        "Summarize the current conversation"
    }

    fn handle<'a>(&'a self, ctx: CommandContext<'a>) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let id = ctx.emit_bot_message(LOADING_PLACEHOLDER).await?;
            ctx.set_loading(true);

            let result = match ctx.history().await {
                Ok(history) => ctx.update_message(id, summarize(&history, id)).await,
                Err(e) => Err(e),
            };
            ctx.set_loading(false);
            result
        })
    }
}

/// Counts over `history`, leaving out the stats placeholder itself.
fn summarize(history: &[ChatMessage], placeholder: MessageId) -> String {
    let counted: Vec<&ChatMessage> = history.iter().filter(|m| m.id != placeholder).collect();
    let user = counted
        .iter()
        .filter(|m| m.kind == MessageKind::User)
        .count();
    let bot = counted.len() - user;
    let chars: usize = counted.iter().map(|m| m.content.chars().count()).sum();
    format!(
        "{} messages ({user} user, {bot} bot), {chars} characters",
        counted.len()
    )
}
