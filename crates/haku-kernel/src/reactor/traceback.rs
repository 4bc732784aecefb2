//! Traceback text for failed invocations.

use super::error::SessionError;
use crate::paginator::{escape_fences, PageBuffer};

/// The file name tracebacks attribute snippet lines to.
pub const SESSION_FILE: &str = "<repl session>";

/// Largest traceback page, code fences included.
const TRACEBACK_PAGE_SIZE: usize = 1985;

/// Format a traceback showing at most `verbosity` of the innermost frames.
///
/// Verbosity 0 prints only the error line (and, for syntax errors, the line
/// it was found on).
pub fn format_traceback(error: &SessionError, verbosity: usize) -> String {
    let mut out = String::new();
    match error {
        SessionError::Eval(err) => {
            let frames = &err.trace[err.trace.len().saturating_sub(verbosity)..];
            if !frames.is_empty() {
                out.push_str("Traceback (most recent call last):\n");
                for frame in frames {
                    out.push_str(&format!(
                        "  File \"{SESSION_FILE}\", line {}, in {}\n",
                        frame.line, frame.function
                    ));
                }
            }
        }
        SessionError::Compile(err) => {
            if let Some(line) = err.line() {
                out.push_str(&format!("  File \"{SESSION_FILE}\", line {line}\n"));
            }
        }
        _ => {}
    }
    out.push_str(&format!("{}: {}", error.kind_name(), error.message()));
    out
}

/// Split traceback text into `py` code block messages.
pub fn traceback_pages(text: &str) -> Vec<String> {
    let budget = TRACEBACK_PAGE_SIZE - "```py\n\n```".len();
    PageBuffer::from_text(&escape_fences(text), budget)
        .pages()
        .iter()
        .map(|page| format!("```py\n{page}\n```"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{ErrorKind, EvalError, TraceFrame};

    fn nested() -> SessionError {
        let mut err = EvalError::new(ErrorKind::Type, "unsupported operand");
        err.trace = vec![
            TraceFrame { function: "<module>".into(), line: 7 },
            TraceFrame { function: "outer".into(), line: 5 },
            TraceFrame { function: "inner".into(), line: 2 },
        ];
        SessionError::from(err)
    }

    #[test]
    fn deep_traceback_lists_frames() {
        let text = format_traceback(&nested(), 8);
        assert_eq!(
            text,
            "Traceback (most recent call last):\n\
             \x20 File \"<repl session>\", line 7, in <module>\n\
             \x20 File \"<repl session>\", line 5, in outer\n\
             \x20 File \"<repl session>\", line 2, in inner\n\
             TypeError: unsupported operand"
        );
    }

    #[test]
    fn verbosity_keeps_innermost_frames() {
        let text = format_traceback(&nested(), 1);
        assert!(text.contains("in inner"));
        assert!(!text.contains("in outer"));
    }

    #[test]
    fn short_traceback_is_one_line() {
        assert_eq!(format_traceback(&nested(), 0), "TypeError: unsupported operand");
    }

    #[test]
    fn syntax_errors_name_their_line() {
        let err = crate::parser::parse("x = (1 +").expect_err("syntax error");
        let text = format_traceback(&SessionError::from(err), 0);
        assert!(text.starts_with("  File \"<repl session>\", line 1\nSyntaxError: "));
    }

    #[test]
    fn long_tracebacks_are_paged() {
        let pages = traceback_pages(&"x".repeat(5000));
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.starts_with("```py\n") && p.ends_with("```")));
        assert!(pages.iter().all(|p| p.chars().count() <= TRACEBACK_PAGE_SIZE));
    }
}
