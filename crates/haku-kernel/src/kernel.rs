//! The Kernel (核): one evaluation host's session state and command flow.
//!
//! The Kernel owns and coordinates the core components:
//! - Scope retention (one retained scope, or a fresh scope per invocation)
//! - Task registry (in-flight invocations, cancellation)
//! - Reactor (indicators, failure rendering, secret redaction)
//! - Interaction router (navigation of displayed paginators)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Kernel (核)                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  Scope       │  │ TaskRegistry │  │ InteractionRouter│  │
//! │  │  (retained?) │  │  (in-flight) │  │  (paginators)    │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! │  ┌──────────────────────────────┐  ┌──────────────────┐    │
//! │  │  Reactor (+ Redactor)        │  │  last result (_) │    │
//! │  └──────────────────────────────┘  └──────────────────┘    │
//! └────────────────────────────────────────────────────────────┘
//!        │ DisplaySurface / AlertChannel / PrivateChannel
//!        ▼
//!      host
//! ```
//!
//! An `eval` runs:
//!
//! ```text
//! registry.register ─▶ reactor.wrap(executor.run(scope, source)) ─▶ per value:
//!   redact ─▶ `_` = value ─▶ inline embed (short) | header + paginator (long)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use haku_types::{Embed, MessageId, Navigation, Rendered, TaskInfo, TaskSelector};
use tokio::time::Instant;

use crate::executor::{ExecutionUnit, ResultStream};
use crate::inspect::inspect;
use crate::interpreter::{Scope, ScopeHandle, Value};
use crate::paginator::{
    escape_fences, InteractionRouter, Layout, PaginatorConfig, PaginatorInterface, RouteOutcome,
};
use crate::reactor::{
    CommandKind, ReactContext, Reactor, Redactor, SessionError, REDACTION_MARKER,
};
use crate::scheduler::{TaskError, TaskGuard, TaskRegistry};
use crate::surface::{AlertChannel, DisplayError, DisplayResult, DisplaySurface, PrivateChannel};

/// Values accepted as "on" for boolean settings.
pub const ENABLED_SYMBOLS: &[&str] = &["true", "t", "yes", "y", "on", "1"];

/// Whether a setting value means "on".
pub fn is_enabled(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    ENABLED_SYMBOLS.contains(&value.as_str())
}

/// Configuration for initializing a kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Name of this kernel (for identification).
    pub name: String,

    /// Whether invocations share one retained scope.
    pub retain: bool,

    /// Maximum characters per paginator page.
    pub max_page_size: usize,

    /// Paginators close after this long without interaction.
    pub paginator_idle_timeout: Duration,

    /// Delay that batches paginator updates.
    pub update_interval: Duration,

    /// Output with more pages than this is sent as a file.
    pub max_pages: usize,

    /// Results longer than this many characters are paginated instead of
    /// rendered inline.
    pub inline_threshold: usize,

    /// How long an invocation runs before the pending indicator shows.
    pub pending_grace: Duration,

    /// Longest wait for any single result. `None` waits forever.
    pub execution_timeout: Option<Duration>,

    /// Text that must never be rendered.
    pub secret: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            retain: false,
            max_page_size: 1985,
            paginator_idle_timeout: Duration::from_secs(7200),
            update_interval: Duration::from_millis(500),
            max_pages: 100,
            inline_threshold: 1024,
            pending_grace: Duration::from_secs(1),
            execution_timeout: None,
            secret: None,
        }
    }
}

impl KernelConfig {
    /// Create a transient kernel config (no retention).
    pub fn transient() -> Self {
        Self {
            name: "transient".to_string(),
            ..Self::default()
        }
    }

    /// Create a kernel config that retains its scope between invocations.
    pub fn retained() -> Self {
        Self {
            name: "retained".to_string(),
            retain: true,
            ..Self::default()
        }
    }

    /// Create a kernel config with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Read overrides from `HAKU_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup("HAKU_RETAIN") {
            config.retain = is_enabled(&value);
        }
        if let Some(value) = lookup("HAKU_MAX_PAGE_SIZE") {
            config.max_page_size = parse_count("HAKU_MAX_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("HAKU_PAGINATOR_IDLE_TIMEOUT") {
            config.paginator_idle_timeout = parse_seconds("HAKU_PAGINATOR_IDLE_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("HAKU_INLINE_THRESHOLD") {
            config.inline_threshold = parse_count("HAKU_INLINE_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("HAKU_EXECUTION_TIMEOUT") {
            config.execution_timeout = Some(parse_seconds("HAKU_EXECUTION_TIMEOUT", &value)?);
        }
        if let Some(value) = lookup("HAKU_SECRET") {
            config.secret = Some(value).filter(|s| !s.is_empty());
        }
        Ok(config)
    }

    /// Set scope retention.
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Set the paginator page size.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the paginator idle timeout.
    pub fn with_paginator_idle_timeout(mut self, timeout: Duration) -> Self {
        self.paginator_idle_timeout = timeout;
        self
    }

    /// Set the inline rendering threshold.
    pub fn with_inline_threshold(mut self, threshold: usize) -> Self {
        self.inline_threshold = threshold;
        self
    }

    /// Set the pending indicator grace period.
    pub fn with_pending_grace(mut self, grace: Duration) -> Self {
        self.pending_grace = grace;
        self
    }

    /// Set the per-result execution timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    /// Set the secret to redact.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

fn parse_count(name: &str, value: &str) -> anyhow::Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{name}={value:?} is not a non-negative integer"))
}

fn parse_seconds(name: &str, value: &str) -> anyhow::Result<Duration> {
    let seconds: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("{name}={value:?} is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds).with_context(|| format!("{name}={value:?} is out of range"))
}

/// One inbound command: who sent it, where, and on which message.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The invoking message. Indicators go here.
    pub id: MessageId,
    pub identity: String,
    pub channel: String,
    /// Whether this is a re-run of an edited message.
    pub edited: bool,
    /// Extra one-shot variables supplied by the host.
    pub extras: HashMap<String, Value>,
}

impl Invocation {
    pub fn new(id: MessageId, identity: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id,
            identity: identity.into(),
            channel: channel.into(),
            edited: false,
            extras: HashMap::new(),
        }
    }

    /// Mark as a re-run of an edited message.
    pub fn edited(mut self) -> Self {
        self.edited = true;
        self
    }

    /// Inject an extra variable for this invocation only.
    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extras.insert(name.into(), value);
        self
    }

    /// The context variables visible to the snippet.
    fn variables(&self) -> HashMap<String, Value> {
        let mut message = BTreeMap::new();
        message.insert("id".to_string(), Value::Int(i64::try_from(self.id.0).unwrap_or(i64::MAX)));
        message.insert("author".to_string(), Value::Str(self.identity.clone()));
        message.insert("channel".to_string(), Value::Str(self.channel.clone()));
        message.insert("edited".to_string(), Value::Bool(self.edited));

        let mut vars = self.extras.clone();
        vars.insert("me".to_string(), Value::Str(self.identity.clone()));
        vars.insert("channel".to_string(), Value::Str(self.channel.clone()));
        vars.insert("message".to_string(), Value::Map(message));
        vars
    }
}

/// Messages one produced value was rendered on.
#[derive(Debug, Clone, Copy, Default)]
struct OutputSlot {
    header: Option<MessageId>,
    paginator: Option<MessageId>,
}

/// Outputs of the latest `eval`, so an edited re-run can reuse them.
#[derive(Debug, Default)]
struct EvalHistory {
    invocation: Option<MessageId>,
    outputs: Vec<OutputSlot>,
}

/// The evaluation kernel.
pub struct Kernel {
    config: KernelConfig,
    surface: Arc<dyn DisplaySurface>,
    reactor: Reactor,
    redactor: Arc<Redactor>,
    tasks: TaskRegistry,
    router: InteractionRouter,
    /// `Some` while retention is on.
    retained: Mutex<Option<ScopeHandle>>,
    last_result: Mutex<Value>,
    history: Mutex<EvalHistory>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Kernel {
    /// Create a kernel rendering through `surface`.
    pub fn new(
        config: KernelConfig,
        surface: Arc<dyn DisplaySurface>,
        alerts: Arc<dyn AlertChannel>,
        private: Arc<dyn PrivateChannel>,
    ) -> Self {
        let redactor = Arc::new(Redactor::new(config.secret.as_deref(), alerts));
        let reactor = Reactor::new(
            Arc::clone(&surface),
            private,
            Arc::clone(&redactor),
            config.pending_grace,
        );
        let retained = config.retain.then(ScopeHandle::default);
        tracing::debug!(name = %config.name, retain = config.retain, "kernel created");
        Self {
            config,
            surface,
            reactor,
            redactor,
            tasks: TaskRegistry::new(),
            router: InteractionRouter::new(),
            retained: Mutex::new(retained),
            last_result: Mutex::new(Value::None),
            history: Mutex::new(EvalHistory::default()),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn tasks_registry(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn router(&self) -> &InteractionRouter {
        &self.router
    }

    /// Whether invocations currently share a retained scope.
    pub fn retention(&self) -> bool {
        lock(&self.retained).is_some()
    }

    /// The scope the next invocation runs against.
    pub fn scope(&self) -> ScopeHandle {
        lock(&self.retained)
            .clone()
            .unwrap_or_else(|| ScopeHandle::new(Scope::new()))
    }

    /// Names bound in the retained scope. Empty when retention is off.
    pub fn scope_names(&self) -> Vec<String> {
        match lock(&self.retained).as_ref() {
            Some(scope) => scope.lock().names().into_iter().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }

    /// The most recent produced value (`_` in snippets).
    pub fn last_result(&self) -> Value {
        lock(&self.last_result).clone()
    }

    /// Screen text shown outside an invocation (scope listings, `_`). A
    /// leak comes back as the redaction marker and raises one alert.
    pub async fn screen(&self, identity: &str, text: String) -> String {
        self.redactor.screen(identity, text).await
    }

    fn paginator_config(&self, owner: &str) -> PaginatorConfig {
        PaginatorConfig::default()
            .with_max_page_size(self.config.max_page_size)
            .with_idle_timeout(self.config.paginator_idle_timeout)
            .with_update_interval(self.config.update_interval)
            .with_max_pages(self.config.max_pages)
            .with_owner(owner)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Evaluation
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate `source` and render each produced value. Returns true if
    /// the invocation failed (the failure has already been rendered).
    #[tracing::instrument(level = "info", skip_all, fields(id = %invocation.id, identity = %invocation.identity, source_len = source.len()))]
    pub async fn eval(&self, invocation: &Invocation, source: &str) -> bool {
        let ctx = self.react_context(invocation, CommandKind::Eval, source);
        self.reactor.wrap(&ctx, self.run_eval(invocation, source)).await
    }

    /// Evaluate `source` and render an inspection report of each produced
    /// value. Returns true if the invocation failed.
    #[tracing::instrument(level = "info", skip_all, fields(id = %invocation.id, identity = %invocation.identity, source_len = source.len()))]
    pub async fn inspect(&self, invocation: &Invocation, source: &str) -> bool {
        let ctx = self.react_context(invocation, CommandKind::Inspect, source);
        self.reactor.wrap(&ctx, self.run_inspect(invocation, source)).await
    }

    fn react_context(&self, invocation: &Invocation, command: CommandKind, source: &str) -> ReactContext {
        ReactContext {
            target: invocation.id,
            identity: invocation.identity.clone(),
            command,
            input: Some(source.to_string()),
        }
    }

    /// Register the invocation and start its run.
    fn start(
        &self,
        invocation: &Invocation,
        command: &str,
        source: &str,
    ) -> Result<(TaskGuard, ResultStream), SessionError> {
        let mut vars = invocation.variables();
        vars.insert("_".to_string(), self.last_result());
        let unit = ExecutionUnit::compile(self.scope(), source, vars)?;
        let guard = self.tasks.register(invocation.identity.clone(), command);
        let stream = unit.with_cancel(guard.cancel_token()).into_stream();
        Ok((guard, stream))
    }

    /// Pull the next result, bounded by the execution timeout.
    async fn pull(&self, stream: &mut ResultStream) -> Result<Option<Value>, SessionError> {
        let next = match self.config.execution_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    stream.cancel_token().cancel();
                    return Err(SessionError::Timeout(limit));
                }
            },
            None => stream.next().await,
        };
        next.transpose().map_err(SessionError::from)
    }

    /// Record `value` as the last result and screen its text. Returns the
    /// text to render, or `None` if it leaked the secret.
    async fn accept(&self, invocation: &Invocation, value: &Value) -> Option<String> {
        *lock(&self.last_result) = value.clone();
        let text = match value {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        };
        if self.redactor.check(&invocation.identity, &text).await {
            None
        } else {
            Some(text)
        }
    }

    async fn run_eval(&self, invocation: &Invocation, source: &str) -> Result<(), SessionError> {
        let (_guard, mut stream) = self.start(invocation, "eval", source)?;
        let previous = self.begin_history(invocation);
        let started = Instant::now();
        let mut index = 0;

        while let Some(value) = self.pull(&mut stream).await? {
            let elapsed = started.elapsed();
            let slot = previous.get(index).copied().unwrap_or_default();
            index += 1;

            let Some(text) = self.accept(invocation, &value).await else {
                let id = self.show(slot.header, Rendered::text(REDACTION_MARKER)).await?;
                self.close_paginator(slot.paginator).await;
                self.record_output(invocation, OutputSlot { header: Some(id), paginator: None });
                return Ok(());
            };

            let rendered = self
                .render_eval(invocation, source, &value, &text, elapsed, slot)
                .await?;
            self.record_output(invocation, rendered);
        }
        Ok(())
    }

    /// Render one value with the two-tier policy.
    async fn render_eval(
        &self,
        invocation: &Invocation,
        source: &str,
        value: &Value,
        text: &str,
        elapsed: Duration,
        slot: OutputSlot,
    ) -> Result<OutputSlot, SessionError> {
        let header = Embed::new()
            .title("Evaluation Complete")
            .description(format!("Output Type: {}", value.type_name()))
            .field("Input", format!("```py\n{}```", escape_fences(source)), false);
        let footer = format!("Evaluated in {:.3}s.", elapsed.as_secs_f64());
        let escaped = escape_fences(text);

        if escaped.chars().count() > self.config.inline_threshold {
            let header_id = self.show(slot.header, Rendered::embed(header.footer(footer))).await?;
            let paginator = PaginatorInterface::with_text(
                Arc::clone(&self.surface),
                self.paginator_config(&invocation.identity).with_language("py"),
                Layout::Embed(Embed::new()),
                text,
            );
            let paginator_id = match slot.paginator {
                Some(id) => match paginator.send_edit(id).await {
                    Err(DisplayError::NotFound(_)) => paginator.send_to().await?,
                    other => other?,
                },
                None => paginator.send_to().await?,
            };
            self.router.register(&paginator);
            return Ok(OutputSlot {
                header: Some(header_id),
                paginator: Some(paginator_id),
            });
        }

        let output = if escaped.trim().is_empty() {
            "\u{200b}".to_string()
        } else {
            escaped
        };
        let embed = header
            .field("Output", format!("```py\n{output}```"), false)
            .footer(footer);
        let header_id = self.show(slot.header, Rendered::embed(embed)).await?;
        self.close_paginator(slot.paginator).await;
        Ok(OutputSlot {
            header: Some(header_id),
            paginator: None,
        })
    }

    async fn run_inspect(&self, invocation: &Invocation, source: &str) -> Result<(), SessionError> {
        let (_guard, mut stream) = self.start(invocation, "inspect", source)?;

        while let Some(value) = self.pull(&mut stream).await? {
            if self.accept(invocation, &value).await.is_none() {
                self.surface.send(Rendered::text(REDACTION_MARKER)).await?;
                return Ok(());
            }
            let report = inspect(&value);
            let embed = Embed::new()
                .title("Evaluation Complete")
                .field("Input", format!("```py\n{}```", escape_fences(source)), false)
                .field("Output", format!("```prolog\n{}```", escape_fences(&report.to_string())), false);
            let payload = self
                .redactor
                .screen_rendered(&invocation.identity, Rendered::embed(embed))
                .await;
            self.surface.send(payload).await?;
        }
        Ok(())
    }

    /// Start tracking outputs for `invocation`. Returns the previous run's
    /// outputs if this is an edited re-run of the same message.
    fn begin_history(&self, invocation: &Invocation) -> Vec<OutputSlot> {
        let mut history = lock(&self.history);
        if invocation.edited && history.invocation == Some(invocation.id) {
            std::mem::take(&mut history.outputs)
        } else {
            *history = EvalHistory {
                invocation: Some(invocation.id),
                outputs: Vec::new(),
            };
            Vec::new()
        }
    }

    fn record_output(&self, invocation: &Invocation, slot: OutputSlot) {
        let mut history = lock(&self.history);
        if history.invocation == Some(invocation.id) {
            history.outputs.push(slot);
        }
    }

    /// Edit `existing` if it is still there, otherwise send a new message.
    async fn show(&self, existing: Option<MessageId>, payload: Rendered) -> DisplayResult<MessageId> {
        if let Some(id) = existing {
            match self.surface.edit(id, payload.clone()).await {
                Ok(()) => return Ok(id),
                Err(DisplayError::NotFound(_)) => {
                    tracing::debug!(%id, "previous output is gone, sending a new one");
                }
                Err(err) => return Err(err),
            }
        }
        self.surface.send(payload).await
    }

    async fn close_paginator(&self, id: Option<MessageId>) {
        if let Some(session) = id.and_then(|id| self.router.get(id)) {
            session.close(crate::paginator::CloseReason::Requested).await;
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Session commands
    // ═══════════════════════════════════════════════════════════════════

    /// Turn scope retention on or off. Enabling starts a fresh scope.
    /// Returns the status message, which is also sent to the surface.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn set_retain(&self, on: bool) -> String {
        let message = {
            let mut retained = lock(&self.retained);
            match (on, retained.is_some()) {
                (true, true) => "Variable retention is already set to ON.",
                (true, false) => {
                    *retained = Some(ScopeHandle::default());
                    "Variable retention is ON. Future REPL sessions will retain their scope."
                }
                (false, false) => "Variable retention is already set to OFF.",
                (false, true) => {
                    *retained = None;
                    "Variable retention is OFF. Future REPL sessions will dispose their scope when done."
                }
            }
        };
        self.notify(message).await;
        message.to_string()
    }

    /// Show the running tasks as a paginated listing.
    #[tracing::instrument(level = "debug", skip_all, fields(identity = %invocation.identity))]
    pub async fn tasks(&self, invocation: &Invocation) -> DisplayResult<MessageId> {
        let tasks = self.tasks.list();
        if tasks.is_empty() {
            return self.surface.send(Rendered::text("No currently running tasks.")).await;
        }
        let paginator = PaginatorInterface::new(
            Arc::clone(&self.surface),
            self.paginator_config(&invocation.identity),
            Layout::Text,
        );
        for task in &tasks {
            paginator.add_line(&task.describe());
        }
        let id = paginator.send_to().await?;
        self.router.register(&paginator);
        Ok(id)
    }

    /// Cancel one task by index, or the most recent with `last`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn cancel(&self, selector: TaskSelector) -> Result<TaskInfo, TaskError> {
        let result = self.tasks.cancel(selector);
        match &result {
            Ok(info) => self.notify(&format!("Cancelled task {}", info.describe())).await,
            Err(err) => self.notify(&err.to_string()).await,
        }
        result
    }

    /// Cancel every task running `command`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn cancel_command(&self, command: &str) -> Vec<TaskInfo> {
        let cancelled = self.tasks.cancel_command(command);
        if cancelled.is_empty() {
            self.notify("No tasks to cancel.").await;
        } else {
            self.notify("Successfully cancelled tasks").await;
        }
        cancelled
    }

    /// Route a navigation request to the paginator displayed on `session`.
    pub async fn navigate(&self, session: MessageId, identity: &str, nav: Navigation) -> RouteOutcome {
        self.router.dispatch(session, identity, nav).await
    }

    async fn notify(&self, text: &str) {
        if let Err(err) = self.surface.send(Rendered::text(text)).await {
            tracing::warn!(error = %err, "failed to send status message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn kernel(config: KernelConfig) -> (Arc<MemorySurface>, Kernel) {
        let surface = Arc::new(MemorySurface::new());
        let kernel = Kernel::new(config, surface.clone(), surface.clone(), surface.clone());
        (surface, kernel)
    }

    fn invocation(id: u64) -> Invocation {
        Invocation::new(MessageId(id), "alice", "general")
    }

    fn output_of(rendered: &Rendered) -> Option<String> {
        rendered.embed.as_ref()?.field_value("Output").map(str::to_string)
    }

    #[test]
    fn config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("HAKU_RETAIN", "Yes"),
            ("HAKU_MAX_PAGE_SIZE", "500"),
            ("HAKU_PAGINATOR_IDLE_TIMEOUT", "30"),
            ("HAKU_EXECUTION_TIMEOUT", "2.5"),
            ("HAKU_SECRET", "abc.def"),
        ]
        .into_iter()
        .collect();
        let config =
            KernelConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).expect("valid");
        assert!(config.retain);
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.paginator_idle_timeout, Duration::from_secs(30));
        assert_eq!(config.execution_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.secret.as_deref(), Some("abc.def"));
        assert_eq!(config.inline_threshold, 1024);
    }

    #[test]
    fn config_rejects_garbage() {
        let err = KernelConfig::from_lookup(|k| (k == "HAKU_MAX_PAGE_SIZE").then(|| "lots".to_string()))
            .expect_err("invalid");
        assert!(err.to_string().contains("HAKU_MAX_PAGE_SIZE"));
    }

    #[test]
    fn enabled_symbols() {
        assert!(is_enabled("ON"));
        assert!(is_enabled(" t "));
        assert!(!is_enabled("off"));
        assert!(!is_enabled(""));
    }

    #[tokio::test(start_paused = true)]
    async fn short_result_renders_inline() {
        let (surface, kernel) = kernel(KernelConfig::default());
        assert!(!kernel.eval(&invocation(1), "1 + 2").await);

        let rendered = surface.last_message().expect("message");
        let embed = rendered.embed.as_ref().expect("embed");
        assert_eq!(embed.title.as_deref(), Some("Evaluation Complete"));
        assert_eq!(embed.description.as_deref(), Some("Output Type: int"));
        assert_eq!(embed.field_value("Input"), Some("```py\n1 + 2```"));
        assert_eq!(output_of(&rendered).as_deref(), Some("```py\n3```"));
        assert!(embed.footer.as_deref().is_some_and(|f| f.starts_with("Evaluated in ")));
        assert_eq!(kernel.last_result(), Value::Int(3));
    }

    #[tokio::test(start_paused = true)]
    async fn long_result_is_paginated() {
        let (surface, kernel) = kernel(KernelConfig::default().with_inline_threshold(10));
        kernel.eval(&invocation(1), "\"x\" * 3000").await;

        let sent = surface.sent_ids();
        assert_eq!(sent.len(), 2);
        let header = surface.message(sent[0]).and_then(|r| r.embed).expect("header");
        assert!(header.field_value("Output").is_none());
        let page = surface.message(sent[1]).expect("page");
        assert!(page.embed.and_then(|e| e.footer).is_some_and(|f| f == "Page 1/2"));
        assert!(surface.has_controls(sent[1]));
        assert_eq!(kernel.router().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn context_variables_are_injected() {
        let (surface, kernel) = kernel(KernelConfig::default());
        let inv = invocation(9).with_var("guild", Value::from("haku"));
        kernel.eval(&inv, "[me, channel, message.id, guild]").await;
        let output = surface.last_message().as_ref().and_then(output_of).expect("output");
        assert_eq!(output, "```py\n[\"alice\", \"general\", 9, \"haku\"]```");
    }

    #[tokio::test(start_paused = true)]
    async fn underscore_holds_last_result() {
        let (surface, kernel) = kernel(KernelConfig::default());
        kernel.eval(&invocation(1), "40").await;
        kernel.eval(&invocation(2), "_ + 2").await;
        let output = surface.last_message().as_ref().and_then(output_of).expect("output");
        assert_eq!(output, "```py\n42```");
    }

    #[tokio::test(start_paused = true)]
    async fn edited_invocation_edits_previous_output() {
        let (surface, kernel) = kernel(KernelConfig::default());
        kernel.eval(&invocation(5), "1").await;
        let first = surface.sent_ids();
        kernel.eval(&invocation(5).edited(), "2").await;

        assert_eq!(surface.sent_ids(), first);
        let output = surface.message(first[0]).as_ref().and_then(output_of).expect("output");
        assert_eq!(output, "```py\n2```");
    }

    #[tokio::test(start_paused = true)]
    async fn unedited_rerun_sends_new_output() {
        let (surface, kernel) = kernel(KernelConfig::default());
        kernel.eval(&invocation(5), "1").await;
        kernel.eval(&invocation(5), "2").await;
        assert_eq!(surface.sent_ids().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn inspect_renders_report() {
        let (surface, kernel) = kernel(KernelConfig::default());
        assert!(!kernel.inspect(&invocation(1), "[1, 2]").await);
        let output = surface.last_message().as_ref().and_then(output_of).expect("output");
        assert!(output.starts_with("```prolog\n=== [1, 2] ===\n"));
        assert!(output.contains("type             :: list"));
    }

    #[tokio::test(start_paused = true)]
    async fn retention_messages() {
        let (_surface, kernel) = kernel(KernelConfig::default());
        assert_eq!(
            kernel.set_retain(false).await,
            "Variable retention is already set to OFF."
        );
        assert!(kernel.set_retain(true).await.starts_with("Variable retention is ON."));
        assert_eq!(kernel.set_retain(true).await, "Variable retention is already set to ON.");
        assert!(kernel.retention());
        assert!(kernel.set_retain(false).await.starts_with("Variable retention is OFF."));
        assert!(!kernel.retention());
    }

    #[tokio::test(start_paused = true)]
    async fn retained_scope_lists_user_names() {
        let (_surface, kernel) = kernel(KernelConfig::retained());
        kernel.eval(&invocation(1), "answer = 42").await;
        assert_eq!(kernel.scope_names(), vec!["answer".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_task_listing() {
        let (surface, kernel) = kernel(KernelConfig::default());
        kernel.tasks(&invocation(1)).await.expect("send");
        assert_eq!(surface.last_message(), Some(Rendered::text("No currently running tasks.")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_with_nothing_running() {
        let (surface, kernel) = kernel(KernelConfig::default());
        assert_eq!(kernel.cancel(TaskSelector::Last).await, Err(TaskError::NoTasks));
        assert_eq!(surface.last_message(), Some(Rendered::text("No tasks to cancel.")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_briefly() {
        let (surface, kernel) =
            kernel(KernelConfig::default().with_execution_timeout(Duration::from_secs(2)));
        assert!(kernel.eval(&invocation(1), "sleep(10)\n1").await);
        let content = surface.last_message().and_then(|r| r.content).expect("traceback");
        assert!(content.contains("TimeoutError: execution exceeded 2.000s"));
        assert!(kernel.tasks_registry().is_empty());
    }
}
