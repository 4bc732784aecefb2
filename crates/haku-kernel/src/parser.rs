//! Parser for haku script.
//!
//! Transforms the token stream from the lexer into a [`Program`]. This is a
//! hand-written recursive descent parser: one method per precedence level,
//! lowest first.
//!
//! Besides building the tree it performs the static checks the executor
//! relies on:
//!
//! - `yield` may only appear in the top-level body (not inside a `def`)
//! - `break` and `continue` may only appear inside a loop
//! - a trailing bare expression in the top-level body is rewritten into a
//!   `yield` of its value, which gives the REPL its auto-print behaviour

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{
    AssignOp, BinaryOp, Expr, FunctionDef, IfStmt, Literal, Program, Stmt, StmtKind, UnaryOp,
};
use crate::lexer::{self, Spanned, Token};

/// A single syntax error with its location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub line: usize,
    pub span: Range<usize>,
    pub message: String,
}

/// The snippet could not be compiled. Carries every error found.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub errors: Vec<ParseError>,
}

impl CompileError {
    /// Line of the first error, if any.
    pub fn line(&self) -> Option<usize> {
        self.errors.first().map(|e| e.line)
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.first() {
            Some(first) if self.errors.len() > 1 => {
                write!(f, "{first} (and {} more)", self.errors.len() - 1)
            }
            Some(first) => write!(f, "{first}"),
            None => write!(f, "invalid syntax"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        Self { errors: vec![err] }
    }
}

/// Parse haku source into a [`Program`].
pub fn parse(source: &str) -> Result<Program, CompileError> {
    let tokens = lexer::tokenize(source).map_err(|errs| CompileError {
        errors: errs
            .into_iter()
            .map(|e| ParseError {
                line: e.line,
                span: e.span,
                message: format!("lexer error: {}", e.token),
            })
            .collect(),
    })?;

    let last_line = source.lines().count().max(1);
    let mut parser = Parser::new(tokens, source.len(), last_line);
    let mut statements = parser.parse_program()?;

    let is_generator = statements
        .iter()
        .any(|s| matches!(s.kind, StmtKind::Yield(_)) || contains_yield(s));

    // Auto-print: the final bare expression becomes a yield of its value.
    if let Some(last) = statements.last_mut() {
        if let StmtKind::Expr(expr) = &last.kind {
            last.kind = StmtKind::Yield(Some(expr.clone()));
        }
    }

    Ok(Program {
        statements,
        is_generator,
    })
}

/// Whether a top-level statement holds a `yield` in one of its nested blocks.
fn contains_yield(stmt: &Stmt) -> bool {
    let any = |body: &[Stmt]| {
        body.iter()
            .any(|s| matches!(s.kind, StmtKind::Yield(_)) || contains_yield(s))
    };
    match &stmt.kind {
        StmtKind::If(if_stmt) => {
            if_stmt.branches.iter().any(|(_, body)| any(body))
                || if_stmt.else_branch.as_deref().is_some_and(any)
        }
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => any(body),
        _ => false,
    }
}

struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    /// Depth of open `(`, `[`, `{`-map inside an expression. Newlines are
    /// insignificant while this is non-zero.
    nesting: usize,
    loop_depth: usize,
    function_depth: usize,
    eof_offset: usize,
    eof_line: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned<Token>>, eof_offset: usize, eof_line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
            loop_depth: 0,
            function_depth: 0,
            eof_offset,
            eof_line,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token cursor
    // ═══════════════════════════════════════════════════════════════════

    fn skip_insignificant(&mut self) {
        if self.nesting > 0 {
            while matches!(self.tokens.get(self.pos), Some(t) if t.token == Token::Newline) {
                self.pos += 1;
            }
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.skip_insignificant();
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&mut self, offset: usize) -> Option<&Token> {
        self.skip_insignificant();
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Spanned<Token>> {
        self.skip_insignificant();
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&mut self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_line(&mut self) -> usize {
        self.skip_insignificant();
        self.tokens
            .get(self.pos)
            .map(|t| t.line)
            .unwrap_or(self.eof_line)
    }

    fn error(&mut self, message: impl Into<String>) -> ParseError {
        self.skip_insignificant();
        let (line, span) = match self.tokens.get(self.pos) {
            Some(t) => (t.line, t.span.clone()),
            None => (self.eof_line, self.eof_offset..self.eof_offset),
        };
        ParseError {
            line,
            span,
            message: message.into(),
        }
    }

    fn unexpected(&mut self, wanted: &str) -> ParseError {
        let found = match self.peek() {
            Some(tok) => format!("'{tok}'"),
            None => "end of input".to_string(),
        };
        self.error(format!("expected {wanted}, found {found}"))
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{expected}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.advance() {
                Some(Spanned {
                    token: Token::Ident(name),
                    ..
                }) => Ok(name),
                _ => Err(self.unexpected("identifier")),
            },
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semi)) {
            self.pos += 1;
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn parse_program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
            self.end_of_statement()?;
            self.skip_separators();
        }
        Ok(statements)
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None | Some(Token::Newline | Token::Semi | Token::RBrace) => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        self.skip_separators();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
            self.end_of_statement()?;
            self.skip_separators();
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.current_line();
        let kind = match self.peek() {
            Some(Token::Def) => self.parse_def()?,
            Some(Token::If) => self.parse_if()?,
            Some(Token::While) => {
                self.pos += 1;
                let condition = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                StmtKind::While { condition, body }
            }
            Some(Token::For) => {
                self.pos += 1;
                let variable = self.expect_ident()?;
                self.expect(Token::In)?;
                let iterable = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                StmtKind::For {
                    variable,
                    iterable,
                    body,
                }
            }
            Some(Token::Return) => {
                self.pos += 1;
                StmtKind::Return(self.parse_optional_expr()?)
            }
            Some(Token::Yield) => {
                if self.function_depth > 0 {
                    return Err(self.error("'yield' outside the top-level body"));
                }
                self.pos += 1;
                StmtKind::Yield(self.parse_optional_expr()?)
            }
            Some(Token::Raise) => {
                self.pos += 1;
                StmtKind::Raise(self.parse_expr()?)
            }
            Some(Token::Break) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.pos += 1;
                StmtKind::Break
            }
            Some(Token::Continue) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.pos += 1;
                StmtKind::Continue
            }
            Some(Token::Pass) => {
                self.pos += 1;
                StmtKind::Pass
            }
            _ => self.parse_expr_or_assignment()?,
        };
        Ok(Stmt::new(kind, line))
    }

    fn parse_optional_expr(&mut self) -> Result<Option<Expr>, ParseError> {
        match self.peek() {
            None | Some(Token::Newline | Token::Semi | Token::RBrace) => Ok(None),
            _ => self.parse_expr().map(Some),
        }
    }

    fn parse_def(&mut self) -> Result<StmtKind, ParseError> {
        let line = self.current_line();
        self.expect(Token::Def)?;
        let name = self.expect_ident()?;

        self.expect(Token::LParen)?;
        self.nesting += 1;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            let param = self.expect_ident()?;
            if params.contains(&param) {
                self.nesting -= 1;
                return Err(self.error(format!("duplicate argument '{param}' in function definition")));
            }
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.nesting -= 1;
        self.expect(Token::RParen)?;

        // Loops don't extend into the function body.
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        let body = body?;

        let doc = match body.first().map(|s| &s.kind) {
            Some(StmtKind::Expr(Expr::Literal(Literal::Str(doc)))) => Some(doc.clone()),
            _ => None,
        };

        Ok(StmtKind::FunctionDef(Arc::new(FunctionDef {
            name,
            params,
            doc,
            body,
            line,
        })))
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(Token::If)?;
        let mut branches = vec![(self.parse_expr()?, self.parse_block()?)];
        let mut else_branch = None;

        loop {
            // `elif`/`else` may follow the closing brace on the next line.
            let save = self.pos;
            self.skip_separators();
            if self.eat(&Token::Elif) {
                branches.push((self.parse_expr()?, self.parse_block()?));
            } else if self.eat(&Token::Else) {
                if self.check(&Token::If) {
                    let line = self.current_line();
                    let nested = self.parse_if()?;
                    else_branch = Some(vec![Stmt::new(nested, line)]);
                } else {
                    else_branch = Some(self.parse_block()?);
                }
                break;
            } else {
                self.pos = save;
                break;
            }
        }

        Ok(StmtKind::If(IfStmt {
            branches,
            else_branch,
        }))
    }

    fn parse_expr_or_assignment(&mut self) -> Result<StmtKind, ParseError> {
        let expr = self.parse_expr()?;
        let op = match self.peek() {
            Some(Token::Eq) => AssignOp::Set,
            Some(Token::PlusEq) => AssignOp::Add,
            Some(Token::MinusEq) => AssignOp::Sub,
            _ => return Ok(StmtKind::Expr(expr)),
        };

        match expr {
            Expr::Name(target) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                Ok(StmtKind::Assign { target, op, value })
            }
            Expr::Index { target, index } if op == AssignOp::Set => match *target {
                Expr::Name(target) => {
                    self.pos += 1;
                    let value = self.parse_expr()?;
                    Ok(StmtKind::IndexAssign {
                        target,
                        index: *index,
                        value,
                    })
                }
                _ => Err(self.error("cannot assign to nested subscript")),
            },
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions, lowest precedence first
    // ═══════════════════════════════════════════════════════════════════

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_sum()?;
        let next = self.peek().cloned();
        let op = match next {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::LtEq) => BinaryOp::LtEq,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::GtEq) => BinaryOp::GtEq,
            Some(Token::In) => BinaryOp::In,
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.pos += 1;
                BinaryOp::NotIn
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_sum()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.pos += 1;
                    self.nesting += 1;
                    let args = self.parse_comma_list(&Token::RParen);
                    self.nesting -= 1;
                    let args = args?;
                    self.expect(Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.nesting += 1;
                    let index = self.parse_expr();
                    self.nesting -= 1;
                    let index = index?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    expr = Expr::Attribute {
                        target: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parse `a, b, c` up to (not including) `close`, allowing a trailing comma.
    fn parse_comma_list(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expression"));
        };
        let expr = match tok {
            Token::Int(n) => Expr::Literal(Literal::Int(n)),
            Token::Float(n) => Expr::Literal(Literal::Float(n)),
            Token::Str(s) => Expr::Literal(Literal::Str(s)),
            Token::True => Expr::Literal(Literal::Bool(true)),
            Token::False => Expr::Literal(Literal::Bool(false)),
            Token::None => Expr::Literal(Literal::None),
            Token::Ident(name) => Expr::Name(name),
            Token::LParen => {
                self.pos += 1;
                self.nesting += 1;
                let inner = self.parse_expr();
                self.nesting -= 1;
                let inner = inner?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.pos += 1;
                self.nesting += 1;
                let items = self.parse_comma_list(&Token::RBracket);
                self.nesting -= 1;
                let items = items?;
                self.expect(Token::RBracket)?;
                return Ok(Expr::List(items));
            }
            Token::LBrace => {
                self.pos += 1;
                self.nesting += 1;
                let entries = self.parse_map_entries();
                self.nesting -= 1;
                let entries = entries?;
                self.expect(Token::RBrace)?;
                return Ok(Expr::Map(entries));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn parse_map_entries(&mut self) -> Result<Vec<(Expr, Expr)>, ParseError> {
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) {
            let key = self.parse_expr()?;
            self.expect(Token::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(entries)
    }
}
