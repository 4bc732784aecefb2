//! The tree-walking evaluator.
//!
//! The evaluator is async so a run can suspend in the middle of a statement:
//! at `sleep`, at every `yield`, and periodically inside long loops so that
//! cancellation is observed even by code that never waits. Recursive walks
//! go through boxed futures.
//!
//! Globals live behind a shared lock so the executor can write them back to
//! the session scope however the run ends. Function locals live on the
//! evaluator's own frame stack.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::ast::{AssignOp, BinaryOp, Expr, Literal, Program, Stmt, StmtKind, UnaryOp};
use crate::executor::{Suspend, YieldSlot};

use super::builtins;
use super::control_flow::ControlFlow;
use super::error::{type_error, value_error, ErrorKind, EvalError, EvalResult, TraceFrame};
use super::value::Value;

/// Deepest user function call stack before a `RecursionError`.
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Loop iterations between cooperative yields to the runtime.
const YIELD_EVERY: u64 = 1024;

/// Longest string or list a repetition may build.
const MAX_REPEAT_LEN: usize = 10_000_000;

/// Name of the implicit top-level function in tracebacks.
pub const MODULE_FRAME: &str = "<module>";

/// Globals shared between an evaluator and its executor.
pub type Globals = Arc<Mutex<HashMap<String, Value>>>;

struct Frame {
    function: String,
    line: usize,
    /// `None` for the top-level body, which binds into globals.
    locals: Option<HashMap<String, Value>>,
}

/// Walks a program, emitting yielded values through a [`YieldSlot`].
pub struct Evaluator {
    globals: Globals,
    frames: Vec<Frame>,
    cancel: CancellationToken,
    sink: Arc<YieldSlot>,
    steps: u64,
}

impl Evaluator {
    pub fn new(globals: Globals, cancel: CancellationToken, sink: Arc<YieldSlot>) -> Self {
        Self {
            globals,
            frames: vec![Frame {
                function: MODULE_FRAME.to_string(),
                line: 1,
                locals: None,
            }],
            cancel,
            sink,
            steps: 0,
        }
    }

    /// Run a program's top-level body to completion.
    ///
    /// A top-level `return expr` emits `expr` and ends the run.
    pub async fn run(&mut self, program: &Program) -> EvalResult<()> {
        if let ControlFlow::Return(value) = self.exec_block(&program.statements).await? {
            self.emit(value).await?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bindings
    // ═══════════════════════════════════════════════════════════════════

    fn global(&self, name: &str) -> Option<Value> {
        self.globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some(Some(locals)) = self.frames.last().map(|f| &f.locals) {
            if let Some(value) = locals.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.global(name) {
            return Ok(value);
        }
        builtins::lookup(name).map(Value::Builtin).ok_or_else(|| {
            EvalError::new(ErrorKind::Name, format!("name '{name}' is not defined"))
        })
    }

    fn assign(&mut self, name: &str, value: Value) {
        match self.frames.last_mut().and_then(|f| f.locals.as_mut()) {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.globals
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(name.to_string(), value);
            }
        }
    }

    fn trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .map(|f| TraceFrame {
                function: f.function.clone(),
                line: f.line,
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Suspension
    // ═══════════════════════════════════════════════════════════════════

    /// Hand a value to the consumer and suspend until it pulls again.
    async fn emit(&mut self, value: Value) -> EvalResult<()> {
        if value.is_none() {
            return Ok(());
        }
        self.sink.put(value);
        Suspend::new().await;
        self.check_cancelled()
    }

    fn check_cancelled(&self) -> EvalResult<()> {
        if self.cancel.is_cancelled() {
            Err(EvalError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Called once per loop iteration and function call.
    async fn tick(&mut self) -> EvalResult<()> {
        self.check_cancelled()?;
        self.steps += 1;
        if self.steps % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
            self.check_cancelled()?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn exec_block<'a>(&'a mut self, stmts: &'a [Stmt]) -> BoxFuture<'a, EvalResult<ControlFlow>> {
        Box::pin(async move {
            for stmt in stmts {
                let flow = self.exec_stmt(stmt).await?;
                if !flow.is_normal() {
                    return Ok(flow);
                }
            }
            Ok(ControlFlow::Normal)
        })
    }

    fn exec_stmt<'a>(&'a mut self, stmt: &'a Stmt) -> BoxFuture<'a, EvalResult<ControlFlow>> {
        Box::pin(async move {
            if let Some(frame) = self.frames.last_mut() {
                frame.line = stmt.line;
            }
            let result = self.exec_stmt_kind(&stmt.kind).await;
            result.map_err(|mut err| {
                // The innermost failing statement captures the stack.
                if err.trace.is_empty() {
                    err.trace = self.trace();
                }
                err
            })
        })
    }

    async fn exec_stmt_kind(&mut self, kind: &StmtKind) -> EvalResult<ControlFlow> {
        match kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr).await?;
            }
            StmtKind::Assign { target, op, value } => {
                let value = self.eval_expr(value).await?;
                let value = match op {
                    AssignOp::Set => value,
                    AssignOp::Add => binary_op(BinaryOp::Add, self.lookup(target)?, value)?,
                    AssignOp::Sub => binary_op(BinaryOp::Sub, self.lookup(target)?, value)?,
                };
                self.assign(target, value);
            }
            StmtKind::IndexAssign {
                target,
                index,
                value,
            } => {
                let index = self.eval_expr(index).await?;
                let value = self.eval_expr(value).await?;
                let mut container = self.lookup(target)?;
                set_index(&mut container, index, value)?;
                self.assign(target, container);
            }
            StmtKind::FunctionDef(def) => {
                self.assign(&def.name, Value::Function(Arc::clone(def)));
            }
            StmtKind::If(if_stmt) => {
                for (condition, body) in &if_stmt.branches {
                    if self.eval_expr(condition).await?.truthy() {
                        return self.exec_block(body).await;
                    }
                }
                if let Some(body) = &if_stmt.else_branch {
                    return self.exec_block(body).await;
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_expr(condition).await?.truthy() {
                    self.tick().await?;
                    match self.exec_block(body).await? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(v) => return Ok(ControlFlow::Return(v)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                let items = iterate(self.eval_expr(iterable).await?)?;
                for item in items {
                    self.tick().await?;
                    self.assign(variable, item);
                    match self.exec_block(body).await? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(v) => return Ok(ControlFlow::Return(v)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr).await?,
                    None => Value::None,
                };
                return Ok(ControlFlow::Return(value));
            }
            StmtKind::Yield(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr).await?,
                    None => Value::None,
                };
                self.emit(value).await?;
            }
            StmtKind::Raise(expr) => {
                let value = self.eval_expr(expr).await?;
                return Err(EvalError::new(ErrorKind::Raised, value.display()));
            }
            StmtKind::Break => return Ok(ControlFlow::Break),
            StmtKind::Continue => return Ok(ControlFlow::Continue),
            StmtKind::Pass => {}
        }
        Ok(ControlFlow::Normal)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn eval_expr<'a>(&'a mut self, expr: &'a Expr) -> BoxFuture<'a, EvalResult<Value>> {
        Box::pin(async move {
            match expr {
                Expr::Literal(lit) => Ok(match lit {
                    Literal::None => Value::None,
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::Int(n) => Value::Int(*n),
                    Literal::Float(n) => Value::Float(*n),
                    Literal::Str(s) => Value::Str(s.clone()),
                }),
                Expr::Name(name) => self.lookup(name),
                Expr::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.eval_expr(item).await?);
                    }
                    Ok(Value::List(out))
                }
                Expr::Map(entries) => {
                    let mut out = std::collections::BTreeMap::new();
                    for (key, value) in entries {
                        let key = match self.eval_expr(key).await? {
                            Value::Str(s) => s,
                            other => {
                                return Err(type_error(format!(
                                    "map keys must be str, not '{}'",
                                    other.type_name()
                                )))
                            }
                        };
                        out.insert(key, self.eval_expr(value).await?);
                    }
                    Ok(Value::Map(out))
                }
                Expr::Unary { op, operand } => {
                    let value = self.eval_expr(operand).await?;
                    match op {
                        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                        UnaryOp::Neg => match value {
                            Value::Int(n) => n
                                .checked_neg()
                                .map(Value::Int)
                                .ok_or_else(|| value_error("integer overflow")),
                            Value::Float(n) => Ok(Value::Float(-n)),
                            other => Err(type_error(format!(
                                "bad operand type for unary -: '{}'",
                                other.type_name()
                            ))),
                        },
                    }
                }
                Expr::Binary { op, left, right } => {
                    let left = self.eval_expr(left).await?;
                    let right = self.eval_expr(right).await?;
                    binary_op(*op, left, right)
                }
                Expr::And(left, right) => {
                    let left = self.eval_expr(left).await?;
                    if !left.truthy() {
                        return Ok(left);
                    }
                    self.eval_expr(right).await
                }
                Expr::Or(left, right) => {
                    let left = self.eval_expr(left).await?;
                    if left.truthy() {
                        return Ok(left);
                    }
                    self.eval_expr(right).await
                }
                Expr::Call { callee, args } => {
                    let callee = self.eval_expr(callee).await?;
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval_expr(arg).await?);
                    }
                    self.call(callee, values).await
                }
                Expr::Index { target, index } => {
                    let target = self.eval_expr(target).await?;
                    let index = self.eval_expr(index).await?;
                    get_index(&target, &index)
                }
                Expr::Attribute { target, name } => {
                    let target = self.eval_expr(target).await?;
                    get_attribute(&target, name)
                }
            }
        })
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> BoxFuture<'_, EvalResult<Value>> {
        Box::pin(async move {
            self.tick().await?;
            match callee {
                Value::Builtin(builtin) => builtins::call(builtin, args, &self.cancel).await,
                Value::Function(def) => {
                    if args.len() != def.params.len() {
                        return Err(type_error(format!(
                            "{}() takes {} positional argument(s) but {} were given",
                            def.name,
                            def.params.len(),
                            args.len()
                        )));
                    }
                    if self.frames.len() > MAX_RECURSION_DEPTH {
                        return Err(EvalError::new(
                            ErrorKind::Recursion,
                            "maximum recursion depth exceeded",
                        ));
                    }
                    let locals = def.params.iter().cloned().zip(args).collect();
                    self.frames.push(Frame {
                        function: def.name.clone(),
                        line: def.line,
                        locals: Some(locals),
                    });
                    let flow = self.exec_block(&def.body).await;
                    self.frames.pop();
                    match flow? {
                        ControlFlow::Return(value) => Ok(value),
                        _ => Ok(Value::None),
                    }
                }
                other => Err(type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ))),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════════

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> EvalError {
    value_error("integer overflow")
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> EvalResult<Vec<T>> {
    let times = usize::try_from(times.max(0)).map_err(|_| overflow())?;
    if items.len().saturating_mul(times) > MAX_REPEAT_LEN {
        return Err(value_error("repeated sequence too large"));
    }
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Apply a binary operator to two evaluated operands.
pub fn binary_op(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    use BinaryOp::*;
    match op {
        Eq => return Ok(Value::Bool(left.loose_eq(&right))),
        NotEq => return Ok(Value::Bool(!left.loose_eq(&right))),
        Lt | LtEq | Gt | GtEq => {
            let symbol = op.to_string();
            let ord = left.compare(&right, &symbol)?;
            return Ok(Value::Bool(match op {
                Lt => ord.is_lt(),
                LtEq => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }));
        }
        In | NotIn => {
            let found = match &right {
                Value::List(items) => items.iter().any(|item| item.loose_eq(&left)),
                Value::Map(map) => match &left {
                    Value::Str(key) => map.contains_key(key),
                    _ => false,
                },
                Value::Str(haystack) => match &left {
                    Value::Str(needle) => haystack.contains(needle.as_str()),
                    other => {
                        return Err(type_error(format!(
                            "'in <str>' requires str as left operand, not '{}'",
                            other.type_name()
                        )))
                    }
                },
                other => {
                    return Err(type_error(format!(
                        "argument of type '{}' is not iterable",
                        other.type_name()
                    )))
                }
            };
            return Ok(Value::Bool(found == (op == In)));
        }
        _ => {}
    }

    match (op, &left, &right) {
        (Add, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
        (Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
        (Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
        (Div, _, _) => match (as_float(&left), as_float(&right)) {
            (Some(_), Some(b)) if b == 0.0 => {
                Err(EvalError::new(ErrorKind::ZeroDivision, "division by zero"))
            }
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(unsupported(op, &left, &right)),
        },
        (FloorDiv | Mod, Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(EvalError::new(
                    ErrorKind::ZeroDivision,
                    "integer division or modulo by zero",
                ));
            }
            let (a, b) = (*a, *b);
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // Floor semantics: the remainder takes the sign of the divisor.
            let (q, r) = if r != 0 && ((r < 0) != (b < 0)) {
                (q - 1, r + b)
            } else {
                (q, r)
            };
            Ok(Value::Int(if op == FloorDiv { q } else { r }))
        }
        (FloorDiv | Mod, _, _) => match (as_float(&left), as_float(&right)) {
            (Some(_), Some(b)) if b == 0.0 => Err(EvalError::new(
                ErrorKind::ZeroDivision,
                "float division or modulo by zero",
            )),
            (Some(a), Some(b)) => {
                let q = (a / b).floor();
                Ok(Value::Float(if op == FloorDiv { q } else { a - q * b }))
            }
            _ => Err(unsupported(op, &left, &right)),
        },
        (Add | Sub | Mul, _, _) if as_float(&left).is_some() && as_float(&right).is_some() => {
            let (a, b) = (as_float(&left).unwrap_or(0.0), as_float(&right).unwrap_or(0.0));
            Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                _ => a * b,
            }))
        }
        (Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Mul, Value::Str(s), Value::Int(n)) | (Mul, Value::Int(n), Value::Str(s)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(repeat(&chars, *n)?.into_iter().collect()))
        }
        (Mul, Value::List(items), Value::Int(n)) | (Mul, Value::Int(n), Value::List(items)) => {
            Ok(Value::List(repeat(items, *n)?))
        }
        _ => Err(unsupported(op, &left, &right)),
    }
}

/// Resolve a possibly negative index against a length.
fn resolve_index(index: &Value, len: usize, what: &str) -> EvalResult<usize> {
    let Value::Int(i) = index else {
        return Err(type_error(format!(
            "{what} indices must be integers, not '{}'",
            index.type_name()
        )));
    };
    let len_i = len as i64;
    let resolved = if *i < 0 { len_i + i } else { *i };
    if resolved < 0 || resolved >= len_i {
        return Err(EvalError::new(
            ErrorKind::Index,
            format!("{what} index out of range"),
        ));
    }
    Ok(resolved as usize)
}

fn get_index(target: &Value, index: &Value) -> EvalResult<Value> {
    match target {
        Value::List(items) => Ok(items[resolve_index(index, items.len(), "list")?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(index, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Map(map) => match index {
            Value::Str(key) => map
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::new(ErrorKind::Key, format!("{key:?}"))),
            other => Err(EvalError::new(ErrorKind::Key, other.repr())),
        },
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_index(target: &mut Value, index: Value, value: Value) -> EvalResult<()> {
    match target {
        Value::List(items) => {
            let i = resolve_index(&index, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }
        Value::Map(map) => match index {
            Value::Str(key) => {
                map.insert(key, value);
                Ok(())
            }
            other => Err(type_error(format!(
                "map keys must be str, not '{}'",
                other.type_name()
            ))),
        },
        other => Err(type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn get_attribute(target: &Value, name: &str) -> EvalResult<Value> {
    let found = match (target, name) {
        (Value::Map(map), key) => map.get(key).cloned(),
        (Value::Function(def), "name") => Some(Value::Str(def.name.clone())),
        (Value::Function(def), "doc") => Some(def.doc.clone().map(Value::Str).unwrap_or(Value::None)),
        (Value::Function(def), "params") => Some(Value::List(
            def.params.iter().cloned().map(Value::Str).collect(),
        )),
        (Value::Builtin(b), "name") => Some(Value::from(b.name)),
        (Value::Builtin(b), "doc") => Some(Value::from(b.doc)),
        _ => None,
    };
    found.ok_or_else(|| {
        EvalError::new(
            ErrorKind::Attribute,
            format!("'{}' object has no attribute '{name}'", target.type_name()),
        )
    })
}

/// Items a `for` loop walks: list elements, string characters, or map keys.
fn iterate(value: Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
        other => Err(type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}
