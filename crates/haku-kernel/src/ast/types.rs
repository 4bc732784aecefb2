//! AST type definitions.

use std::fmt;
use std::sync::Arc;

/// A complete haku program: the body of the implicit top-level function.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    /// True if any top-level statement is a `yield`.
    pub is_generator: bool,
}

/// A statement with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// The different kinds of statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Function definition: `def name(a, b) { ... }`
    FunctionDef(Arc<FunctionDef>),
    /// Conditional with optional `elif` chain and `else`.
    If(IfStmt),
    /// `while cond { ... }`
    While { condition: Expr, body: Vec<Stmt> },
    /// `for name in iterable { ... }`
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    /// `return` or `return expr`
    Return(Option<Expr>),
    /// `yield` or `yield expr`. Only legal at top level.
    Yield(Option<Expr>),
    /// `raise expr`
    Raise(Expr),
    Break,
    Continue,
    Pass,
    /// `name = expr`, `name += expr`, `name -= expr`
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// `name[index] = expr`
    IndexAssign {
        target: String,
        index: Expr,
        value: Expr,
    },
    /// A bare expression evaluated for its side effects.
    Expr(Expr),
}

/// A user-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Leading string literal of the body, if any.
    pub doc: Option<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

impl FunctionDef {
    /// `name(a, b)` as shown in tracebacks and inspection.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }
}

/// `if` / `elif` / `else` chain.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// `(condition, body)` for the `if` and each `elif`.
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    pub else_branch: Option<Vec<Stmt>>,
}

/// Assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuit `and`; yields the deciding operand.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit `or`; yields the deciding operand.
    Or(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Attribute {
        target: Box<Expr>,
        name: String,
    },
}

/// Literal values as they appear in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        };
        f.write_str(s)
    }
}
