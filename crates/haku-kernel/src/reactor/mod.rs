//! The lifecycle reactor.
//!
//! [`Reactor::wrap`] runs one invocation and reports how it went:
//!
//! ```text
//! start ──grace elapsed──▶ Pending indicator
//!   │
//!   ├── Ok  ──▶ Success indicator
//!   └── Err ──▶ Failure indicator, then by class:
//!                 UserCode  → compact inline render
//!                 Brief     → verbosity 0 traceback inline
//!                 Internal  → verbosity 8 traceback privately + inline note
//! ```
//!
//! A fast operation never shows the pending indicator. Errors are absorbed:
//! `wrap` reports whether one happened and never propagates it.

mod error;
mod redact;
mod traceback;

pub use error::{FailureClass, SessionError};
pub use redact::{Redactor, LEAK_ALERT, REDACTION_MARKER};
pub use traceback::{format_traceback, traceback_pages, SESSION_FILE};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use haku_types::{Embed, Indicator, InspectionReport, MessageId, Rendered};

use crate::inspect::inspect;
use crate::interpreter::Value;
use crate::paginator::escape_fences;
use crate::surface::{DisplaySurface, PrivateChannel};

/// Verbosity of inline tracebacks.
pub const BRIEF_VERBOSITY: usize = 0;

/// Verbosity of escalated tracebacks.
pub const DEEP_VERBOSITY: usize = 8;

/// Inline note for failures whose details went to the private channel.
pub const ESCALATED_NOTE: &str =
    "Something went wrong while running this command. The traceback was sent privately.";

/// Which command an invocation came from. Decides the inline render of
/// user-code errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Eval,
    Inspect,
    Other,
}

/// What the reactor needs to know about the invocation it wraps.
#[derive(Debug, Clone)]
pub struct ReactContext {
    /// The invoking message, which receives the indicators.
    pub target: MessageId,
    pub identity: String,
    pub command: CommandKind,
    /// The submitted source, echoed in error renders.
    pub input: Option<String>,
}

/// Wraps invocation lifecycles.
pub struct Reactor {
    surface: Arc<dyn DisplaySurface>,
    private: Arc<dyn PrivateChannel>,
    redactor: Arc<Redactor>,
    pending_grace: Duration,
}

impl Reactor {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        private: Arc<dyn PrivateChannel>,
        redactor: Arc<Redactor>,
        pending_grace: Duration,
    ) -> Self {
        Self {
            surface,
            private,
            redactor,
            pending_grace,
        }
    }

    /// Run `operation`, marking the invocation as it goes. Returns true if
    /// the operation failed and its error was absorbed.
    pub async fn wrap<F>(&self, ctx: &ReactContext, operation: F) -> bool
    where
        F: Future<Output = Result<(), SessionError>>,
    {
        let mut operation = std::pin::pin!(operation);
        let grace = tokio::time::sleep(self.pending_grace);
        tokio::pin!(grace);
        let mut pending_shown = false;

        let result = loop {
            tokio::select! {
                biased;
                result = &mut operation => break result,
                _ = &mut grace, if !pending_shown => {
                    pending_shown = true;
                    self.indicate(ctx.target, Indicator::Pending).await;
                }
            }
        };

        match result {
            Ok(()) => {
                self.indicate(ctx.target, Indicator::Success).await;
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, class = ?err.class(), "invocation failed");
                self.indicate(ctx.target, Indicator::Failure).await;
                self.report(ctx, &err).await;
                true
            }
        }
    }

    async fn indicate(&self, target: MessageId, indicator: Indicator) {
        if let Err(err) = self.surface.indicate(target, indicator).await {
            tracing::debug!(%target, ?indicator, error = %err, "failed to set indicator");
        }
    }

    async fn report(&self, ctx: &ReactContext, err: &SessionError) {
        match (err.class(), ctx.command) {
            (FailureClass::UserCode, CommandKind::Eval) => {
                let output = format!("```py\n{}```", escape_fences(&err.message()));
                self.send_inline(ctx, self.unsuccessful(ctx, err, output)).await;
            }
            (FailureClass::UserCode, CommandKind::Inspect) => {
                let output = format!("```prolog\n{}```", escape_fences(&error_report(err).to_string()));
                self.send_inline(ctx, self.unsuccessful(ctx, err, output)).await;
            }
            (FailureClass::UserCode, CommandKind::Other) => {
                self.send_private(ctx, err).await;
            }
            (FailureClass::Brief, _) => {
                for page in self.traceback(ctx, err, BRIEF_VERBOSITY).await {
                    self.send_raw(Rendered::text(page)).await;
                }
            }
            (FailureClass::Internal, _) => {
                self.send_private(ctx, err).await;
                self.send_raw(Rendered::text(ESCALATED_NOTE)).await;
            }
        }
    }

    fn unsuccessful(&self, ctx: &ReactContext, err: &SessionError, output: String) -> Rendered {
        let mut embed = Embed::new()
            .title("Evaluation Unsuccessful")
            .description(format!("Exception: {}", err.kind_name()));
        if let Some(input) = &ctx.input {
            embed = embed.field("Input", format!("```py\n{}```", escape_fences(input)), false);
        }
        Rendered::embed(embed.field("Output", output, false))
    }

    async fn send_inline(&self, ctx: &ReactContext, payload: Rendered) {
        let payload = self.redactor.screen_rendered(&ctx.identity, payload).await;
        self.send_raw(payload).await;
    }

    async fn send_raw(&self, payload: Rendered) {
        if let Err(err) = self.surface.send(payload).await {
            tracing::warn!(error = %err, "failed to render failure");
        }
    }

    /// Traceback pages, or the bare marker alone if the traceback leaks.
    async fn traceback(&self, ctx: &ReactContext, err: &SessionError, verbosity: usize) -> Vec<String> {
        let text = format_traceback(err, verbosity);
        if self.redactor.check(&ctx.identity, &text).await {
            vec![REDACTION_MARKER.to_string()]
        } else {
            traceback_pages(&text)
        }
    }

    async fn send_private(&self, ctx: &ReactContext, err: &SessionError) {
        for page in self.traceback(ctx, err, DEEP_VERBOSITY).await {
            if let Err(send_err) = self.private.send_private(page).await {
                tracing::warn!(error = %send_err, "failed to send traceback privately");
                break;
            }
        }
    }
}

/// Inspection report of an error: the error's own fields run through the
/// inspector, under the error text as header.
fn error_report(err: &SessionError) -> InspectionReport {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("kind".to_string(), Value::Str(err.kind_name().to_string()));
    fields.insert("message".to_string(), Value::Str(err.message()));
    if let SessionError::Eval(eval) = err {
        if let Some(line) = eval.line() {
            fields.insert("line".to_string(), Value::Int(line as i64));
        }
    }
    let mut report = InspectionReport::new(err.to_string());
    for row in inspect(&Value::Map(fields)).rows() {
        report.push(row.label.clone(), row.text.clone());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{ErrorKind, EvalError};
    use crate::surface::MemorySurface;

    fn reactor(surface: &Arc<MemorySurface>, secret: Option<&str>) -> Reactor {
        let redactor = Arc::new(Redactor::new(secret, surface.clone()));
        Reactor::new(surface.clone(), surface.clone(), redactor, Duration::from_secs(1))
    }

    fn ctx(command: CommandKind) -> ReactContext {
        ReactContext {
            target: MessageId(100),
            identity: "alice".into(),
            command,
            input: Some("1 / 0".into()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_success_has_no_pending_indicator() {
        let surface = Arc::new(MemorySurface::new());
        let absorbed = reactor(&surface, None).wrap(&ctx(CommandKind::Eval), async { Ok(()) }).await;
        assert!(!absorbed);
        assert_eq!(surface.indicators(MessageId(100)), vec![Indicator::Success]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_shows_pending() {
        let surface = Arc::new(MemorySurface::new());
        let absorbed = reactor(&surface, None)
            .wrap(&ctx(CommandKind::Eval), async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(())
            })
            .await;
        assert!(!absorbed);
        assert_eq!(
            surface.indicators(MessageId(100)),
            vec![Indicator::Pending, Indicator::Success]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn user_error_renders_compact_embed() {
        let surface = Arc::new(MemorySurface::new());
        let err = EvalError::new(ErrorKind::ZeroDivision, "division by zero");
        let absorbed = reactor(&surface, None)
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        assert!(absorbed);
        assert_eq!(surface.indicators(MessageId(100)), vec![Indicator::Failure]);

        let embed = surface.last_message().and_then(|r| r.embed).expect("embed");
        assert_eq!(embed.title.as_deref(), Some("Evaluation Unsuccessful"));
        assert_eq!(embed.description.as_deref(), Some("Exception: ZeroDivisionError"));
        assert_eq!(embed.field_value("Input"), Some("```py\n1 / 0```"));
        assert_eq!(embed.field_value("Output"), Some("```py\ndivision by zero```"));
        assert!(surface.private_messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn user_error_in_inspect_renders_report() {
        let surface = Arc::new(MemorySurface::new());
        let err = EvalError::new(ErrorKind::Name, "name 'y' is not defined");
        reactor(&surface, None)
            .wrap(&ctx(CommandKind::Inspect), async move { Err(err.into()) })
            .await;
        let embed = surface.last_message().and_then(|r| r.embed).expect("embed");
        let output = embed.field_value("Output").expect("output");
        assert!(output.starts_with("```prolog\n=== NameError: name 'y' is not defined ==="));
    }

    #[tokio::test(start_paused = true)]
    async fn compile_error_gets_short_inline_traceback() {
        let surface = Arc::new(MemorySurface::new());
        let err = crate::parser::parse("def (").expect_err("syntax");
        reactor(&surface, None)
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        let content = surface.last_message().and_then(|r| r.content).expect("content");
        assert!(content.starts_with("```py\n"));
        assert!(content.contains("SyntaxError: "));
        assert!(!content.contains("Traceback"));
    }

    #[tokio::test(start_paused = true)]
    async fn internal_error_escalates_privately() {
        let surface = Arc::new(MemorySurface::new());
        let mut err = EvalError::new(ErrorKind::Type, "bad operand");
        err.trace = vec![crate::interpreter::TraceFrame { function: "<module>".into(), line: 1 }];
        reactor(&surface, None)
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        let private = surface.private_messages();
        assert_eq!(private.len(), 1);
        assert!(private[0].contains("Traceback (most recent call last):"));
        assert!(private[0].contains("TypeError: bad operand"));
        let note = surface.last_message().and_then(|r| r.content).expect("note");
        assert_eq!(note, ESCALATED_NOTE);
    }

    #[tokio::test(start_paused = true)]
    async fn leaked_error_text_is_redacted_once() {
        let surface = Arc::new(MemorySurface::new());
        let err = EvalError::new(ErrorKind::Name, "name 'hunter2' is not defined");
        reactor(&surface, Some("hunter2"))
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        assert_eq!(surface.last_message(), Some(Rendered::text(REDACTION_MARKER)));
        assert_eq!(surface.alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn leaked_syntax_error_renders_bare_marker() {
        let surface = Arc::new(MemorySurface::new());
        let err = crate::parser::parse("1 hunter2").expect_err("syntax");
        reactor(&surface, Some("hunter2.tok3n"))
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        assert_eq!(surface.last_message(), Some(Rendered::text(REDACTION_MARKER)));
        assert_eq!(surface.alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn leaked_escalation_sends_bare_marker_privately() {
        let surface = Arc::new(MemorySurface::new());
        let err = EvalError::new(ErrorKind::Type, "cannot add 'hunter2' and int");
        reactor(&surface, Some("hunter2"))
            .wrap(&ctx(CommandKind::Eval), async move { Err(err.into()) })
            .await;
        assert_eq!(surface.private_messages(), vec![REDACTION_MARKER.to_string()]);
        assert_eq!(surface.alerts().len(), 1);
        assert_eq!(surface.last_message(), Some(Rendered::text(ESCALATED_NOTE)));
    }

    #[tokio::test(start_paused = true)]
    async fn display_failures_do_not_escape() {
        let surface = Arc::new(MemorySurface::new());
        surface.fail_requests(true);
        let absorbed = reactor(&surface, None)
            .wrap(&ctx(CommandKind::Other), async {
                Err(SessionError::from(anyhow::anyhow!("boom")))
            })
            .await;
        assert!(absorbed);
    }
}
