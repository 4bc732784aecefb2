//! Lexer for haku script.
//!
//! Converts source text into a stream of tokens using the logos lexer generator.
//! Whitespace and `#` comments are skipped; newlines are significant because
//! they separate statements.
//!
//! # Token Categories
//!
//! - **Keywords**: `def`, `if`, `elif`, `else`, `while`, `for`, `in`, `return`,
//!   `yield`, `raise`, `break`, `continue`, `pass`, `and`, `or`, `not`
//! - **Literals**: strings, integers, floats, booleans, `none`
//! - **Operators**: arithmetic, comparison, and augmented assignment
//! - **Punctuation**: `(`, `)`, `[`, `]`, `{`, `}`, `,`, `:`, `;`, `.`

use logos::{Logos, Span};
use std::fmt;

/// A token with its span in the source text and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
    pub line: usize,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span, line: usize) -> Self {
        Self { token, span, line }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape(char),
    InvalidNumber,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::UnterminatedString => write!(f, "unterminated string"),
            LexerError::InvalidEscape(c) => write!(f, "invalid escape sequence: \\{c}"),
            LexerError::InvalidNumber => write!(f, "invalid number literal"),
        }
    }
}

/// Tokens produced by the haku lexer.
///
/// Keywords are declared with `#[token]` so logos prefers them over the
/// identifier regex when both match the same slice.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════
    #[token("def")]
    Def,

    #[token("if")]
    If,

    #[token("elif")]
    Elif,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("for")]
    For,

    #[token("in")]
    In,

    #[token("return")]
    Return,

    #[token("yield")]
    Yield,

    #[token("raise")]
    Raise,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("pass")]
    Pass,

    #[token("and")]
    And,

    #[token("or")]
    Or,

    #[token("not")]
    Not,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════
    #[token("true")]
    #[token("True")]
    True,

    #[token("false")]
    #[token("False")]
    False,

    #[token("none")]
    #[token("None")]
    None,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", lex_float)]
    Float(f64),

    #[regex(r"[0-9]+", lex_int)]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, lex_string)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, lex_string)]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // ═══════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════
    #[token("+=")]
    PlusEq,

    #[token("-=")]
    MinusEq,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LtEq,

    #[token(">=")]
    GtEq,

    #[token("//")]
    DoubleSlash,

    #[token("=")]
    Eq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(";")]
    Semi,

    #[token(".")]
    Dot,

    #[token("\n")]
    Newline,

    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    // An opening quote with no closing quote on the same line.
    #[regex(r#""([^"\\\n]|\\.)*"#, callback = unterminated)]
    #[regex(r#"'([^'\\\n]|\\.)*"#, callback = unterminated)]
    UnterminatedString,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Return => write!(f, "return"),
            Token::Yield => write!(f, "yield"),
            Token::Raise => write!(f, "raise"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Pass => write!(f, "pass"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::None => write!(f, "none"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::PlusEq => write!(f, "+="),
            Token::MinusEq => write!(f, "-="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::DoubleSlash => write!(f, "//"),
            Token::Eq => write!(f, "="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semi => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Newline => write!(f, "newline"),
            Token::Comment => write!(f, "comment"),
            Token::UnterminatedString => write!(f, "unterminated string"),
        }
    }
}

/// Lex a quoted string literal, stripping the quotes and processing escapes.
fn lex_string(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

/// Lex an integer literal.
fn lex_int(lex: &mut logos::Lexer<Token>) -> Result<i64, LexerError> {
    lex.slice().parse().map_err(|_| LexerError::InvalidNumber)
}

/// An opening quote that never closes on its line.
fn unterminated(_: &mut logos::Lexer<Token>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

/// Lex a float literal.
fn lex_float(lex: &mut logos::Lexer<Token>) -> Result<f64, LexerError> {
    lex.slice().parse().map_err(|_| LexerError::InvalidNumber)
}

/// Process backslash escapes in the body of a string literal.
fn unescape(body: &str) -> Result<String, LexerError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => return Err(LexerError::InvalidEscape(other)),
            None => return Err(LexerError::UnterminatedString),
        }
    }
    Ok(out)
}

/// Tokenize source code into a vector of spanned tokens.
///
/// Returns every lexer error with its position rather than stopping at the
/// first one, so compile errors can point at all bad spots at once.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Spanned<LexerError>>> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| match line_starts.binary_search(&offset) {
        Ok(i) => i + 1,
        Err(i) => i,
    };

    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in lexer.spanned() {
        let line = line_of(span.start);
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span, line)),
            Err(err) => errors.push(Spanned::new(err, span, line)),
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lexer should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(
            lex("def define"),
            vec![Token::Def, Token::Ident("define".into())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(lex("42 3.5"), vec![Token::Int(42), Token::Float(3.5)]);
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(lex(r#""a\nb""#), vec![Token::Str("a\nb".into())]);
        assert_eq!(lex(r"'it\'s'"), vec![Token::Str("it's".into())]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex("x # the answer\ny"),
            vec![
                Token::Ident("x".into()),
                Token::Newline,
                Token::Ident("y".into())
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            lex("a += 1 // 2 <= 3"),
            vec![
                Token::Ident("a".into()),
                Token::PlusEq,
                Token::Int(1),
                Token::DoubleSlash,
                Token::Int(2),
                Token::LtEq,
                Token::Int(3),
            ]
        );
    }

    #[test]
    fn lines_are_tracked() {
        let tokens = tokenize("a\n\nb").expect("lexer should succeed");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 3]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let errors = tokenize("x = \"oops").expect_err("should fail");
        assert_eq!(errors[0].token, LexerError::UnterminatedString);
    }

    #[test]
    fn stray_character_is_an_error() {
        let errors = tokenize("a $ b").expect_err("should fail");
        assert_eq!(errors[0].token, LexerError::UnexpectedCharacter);
    }
}
