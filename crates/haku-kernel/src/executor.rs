//! The executor: turns a snippet into a lazy stream of result values.
//!
//! ```text
//! source ──parse──▶ ExecutionUnit ──into_stream──▶ ResultStream ──poll──▶ Value, Value, ...
//!                        │                              │
//!                 scope + injected               writes bindings back
//!                                               (on end, error, or drop)
//! ```
//!
//! The run is a single future driven only by polls of the stream. A `yield`
//! parks its value in a [`YieldSlot`] and suspends once; the stream hands the
//! value out and the next poll resumes the body. Nothing runs between pulls,
//! so side effects interleave with consumption in program order.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::ast::Program;
use crate::interpreter::{EvalError, EvalResult, Evaluator, Globals, ScopeHandle, Value};
use crate::parser::{self, CompileError};

/// Single-value handoff between a suspended run and its stream.
#[derive(Debug, Default)]
pub struct YieldSlot {
    value: Mutex<Option<Value>>,
}

impl YieldSlot {
    pub(crate) fn put(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn take(&self) -> Option<Value> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Returns `Pending` exactly once without registering a wakeup.
///
/// Only sound because the stream checks the slot whenever the run returns
/// `Pending`, and returns `Ready` itself when a value is waiting.
#[derive(Debug, Default)]
pub(crate) struct Suspend {
    polled: bool,
}

impl Suspend {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.polled {
            Poll::Ready(())
        } else {
            self.polled = true;
            Poll::Pending
        }
    }
}

/// One compiled snippet bound to one scope and one injection map.
pub struct ExecutionUnit {
    program: Arc<Program>,
    scope: ScopeHandle,
    injected: HashMap<String, Value>,
    cancel: CancellationToken,
}

impl ExecutionUnit {
    /// Compile `source` against `scope`. Nothing runs and the scope is not
    /// touched until [`ExecutionUnit::into_stream`].
    pub fn compile(
        scope: ScopeHandle,
        source: &str,
        injected: HashMap<String, Value>,
    ) -> Result<Self, CompileError> {
        let program = parser::parse(source)?;
        Ok(Self {
            program: Arc::new(program),
            scope,
            injected,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `cancel` as the run's cancel handle.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether the body contains an explicit `yield`.
    pub fn is_generator(&self) -> bool {
        self.program.is_generator
    }

    /// Seed the run from the scope and return its result stream.
    pub fn into_stream(self) -> ResultStream {
        let injected: HashSet<String> = self.injected.keys().cloned().collect();
        let seed = {
            let mut scope = self.scope.lock();
            scope.clean();
            scope.inject(self.injected);
            scope.snapshot()
        };

        let globals: Globals = Arc::new(Mutex::new(seed));
        let slot = Arc::new(YieldSlot::default());
        let program = self.program;
        let mut evaluator = Evaluator::new(Arc::clone(&globals), self.cancel.clone(), Arc::clone(&slot));
        let future: BoxFuture<'static, EvalResult<()>> =
            Box::pin(async move { evaluator.run(&program).await });

        ResultStream {
            future: Some(future),
            slot,
            globals,
            scope: self.scope,
            injected,
            cancel: self.cancel,
            written_back: false,
        }
    }
}

/// Compile and start a run in one step.
pub fn run(
    scope: &ScopeHandle,
    source: &str,
    injected: HashMap<String, Value>,
) -> Result<ResultStream, CompileError> {
    Ok(ExecutionUnit::compile(scope.clone(), source, injected)?.into_stream())
}

/// The lazy result sequence of one run.
///
/// Yields `Ok(value)` for every produced value in program order, then at
/// most one `Err` if the run fails. After exhaustion or an error it yields
/// nothing more. Dropping the stream abandons the run at its current
/// suspension point; bindings made so far are still written back.
pub struct ResultStream {
    future: Option<BoxFuture<'static, EvalResult<()>>>,
    slot: Arc<YieldSlot>,
    globals: Globals,
    scope: ScopeHandle,
    injected: HashSet<String>,
    cancel: CancellationToken,
    written_back: bool,
}

impl ResultStream {
    /// Whether the run has ended (normally or with an error).
    pub fn is_finished(&self) -> bool {
        self.future.is_none()
    }

    /// The run's cancel handle.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn write_back(&mut self) {
        if self.written_back {
            return;
        }
        self.written_back = true;

        let bindings: HashMap<String, Value> = {
            let mut globals = self.globals.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *globals)
                .into_iter()
                .filter(|(name, _)| !self.injected.contains(name))
                .collect()
        };
        let mut scope = self.scope.lock();
        scope.write_back(bindings);
        scope.clean();
        tracing::trace!(bindings = scope.len(), "run bindings written back");
    }
}

impl Stream for ResultStream {
    type Item = Result<Value, EvalError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(future) = this.future.as_mut() else {
            return Poll::Ready(None);
        };

        match future.as_mut().poll(cx) {
            Poll::Ready(result) => {
                this.future = None;
                this.write_back();
                match result {
                    Ok(()) => Poll::Ready(None),
                    Err(err) => Poll::Ready(Some(Err(err))),
                }
            }
            Poll::Pending => match this.slot.take() {
                Some(value) => Poll::Ready(Some(Ok(value))),
                None => Poll::Pending,
            },
        }
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        self.future = None;
        self.write_back();
    }
}
