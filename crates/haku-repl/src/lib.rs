//! haku REPL: interactive terminal front-end for the evaluation kernel.
//!
//! This REPL drives a [`Kernel`] through a [`TerminalSurface`]. It handles:
//! - Meta-commands: `/help`, `/quit`, `/inspect`, `/retain`, `/tasks`,
//!   `/cancel`, `/scope`, `/result`, and paginator navigation
//! - Evaluation via the Kernel, in the foreground or in the background
//!   with a trailing `&`
//! - Multi-line input while brackets are open
//! - Command history via rustyline

pub mod format;
pub mod surface;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Runtime;

use haku_kernel::lexer::{tokenize, Token};
use haku_kernel::{Invocation, Kernel, KernelConfig, NavOutcome, RouteOutcome};
use haku_types::{Navigation, TaskSelector};

use crate::format::Style;
pub use crate::surface::TerminalSurface;

/// Error message that signals the REPL should exit.
const EXIT_SIGNAL: &str = "__REPL_EXIT__";

/// Channel name injected into every invocation.
const CHANNEL: &str = "terminal";

/// Result from meta-command handling.
#[derive(Debug)]
enum MetaResult {
    /// Continue with optional output
    Continue(Option<String>),
    /// Exit the REPL (caller should save history and exit)
    Exit,
}

/// REPL configuration and state.
pub struct Repl {
    kernel: Arc<Kernel>,
    surface: Arc<TerminalSurface>,
    runtime: Runtime,
    identity: String,
    style: Style,
}

impl Repl {
    /// Create a REPL configured from `HAKU_*` environment variables.
    pub fn new() -> Result<Self> {
        let config = KernelConfig::from_env().context("Invalid HAKU_* configuration")?;
        Self::with_config(config)
    }

    /// Create a REPL with a custom kernel configuration.
    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        let surface = Arc::new(TerminalSurface::new());
        let kernel = Arc::new(Kernel::new(
            config,
            surface.clone(),
            surface.clone(),
            surface.clone(),
        ));
        let identity = std::env::var("USER")
            .ok()
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| "operator".to_string());

        Ok(Self {
            kernel,
            surface,
            runtime,
            identity,
            style: Style::detect(),
        })
    }

    /// Use `style` for rendered output.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Act as `identity` for ownership checks and alerts.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn surface(&self) -> &TerminalSurface {
        &self.surface
    }

    /// Process one complete input (possibly several lines).
    /// Returns Ok(None) when there is nothing to show, Ok(Some(output)) for
    /// output to display, or an error carrying the exit signal.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            return match self.handle_meta_command(trimmed) {
                MetaResult::Continue(output) => Ok(self.collect(output)),
                MetaResult::Exit => Err(anyhow::anyhow!(EXIT_SIGNAL)),
            };
        }

        if let Some(meta_result) = self.try_bare_command(trimmed) {
            return match meta_result {
                MetaResult::Continue(output) => Ok(self.collect(output)),
                MetaResult::Exit => Err(anyhow::anyhow!(EXIT_SIGNAL)),
            };
        }

        // Empty input still flushes output from background work.
        if trimmed.is_empty() {
            return Ok(self.collect(None));
        }

        if let Some(source) = trimmed.strip_suffix('&') {
            let note = self.spawn_eval(source.trim());
            return Ok(self.collect(Some(note)));
        }

        let invocation = self.invocation();
        self.runtime.block_on(self.kernel.eval(&invocation, trimmed));
        Ok(self.collect(None))
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(self.surface.record_input(), self.identity.clone(), CHANNEL)
    }

    /// Evaluate in the background. Its output shows up on a later line.
    fn spawn_eval(&self, source: &str) -> String {
        let invocation = self.invocation();
        let kernel = Arc::clone(&self.kernel);
        let source = source.to_string();
        self.runtime.spawn(async move {
            kernel.eval(&invocation, &source).await;
        });
        "[started in background; /tasks lists it]".to_string()
    }

    /// Join a status line with whatever the surface queued.
    fn collect(&self, status: Option<String>) -> Option<String> {
        let mut parts = self.surface.drain(self.style);
        parts.extend(status);
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Handle a meta-command (starts with /).
    fn handle_meta_command(&mut self, cmd: &str) -> MetaResult {
        let (command, rest) = match cmd.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (cmd, ""),
        };

        match command {
            "/quit" | "/q" | "/exit" => MetaResult::Exit,
            "/help" | "/h" | "/?" => MetaResult::Continue(Some(HELP_TEXT.to_string())),
            "/inspect" | "/i" => {
                if rest.is_empty() {
                    return MetaResult::Continue(Some("Usage: /inspect <code>".to_string()));
                }
                let invocation = self.invocation();
                self.runtime.block_on(self.kernel.inspect(&invocation, rest));
                MetaResult::Continue(None)
            }
            "/retain" => {
                let on = match rest {
                    "" => {
                        let state = if self.kernel.retention() { "ON" } else { "OFF" };
                        return MetaResult::Continue(Some(format!("Variable retention is {state}.")));
                    }
                    value if haku_kernel::kernel::is_enabled(value) => true,
                    "off" | "false" | "no" | "n" | "f" | "0" => false,
                    other => {
                        return MetaResult::Continue(Some(format!(
                            "Unknown retention setting: {other} (expected on or off)"
                        )))
                    }
                };
                self.runtime.block_on(self.kernel.set_retain(on));
                MetaResult::Continue(None)
            }
            "/tasks" | "/jobs" => {
                let invocation = self.invocation();
                if let Err(e) = self.runtime.block_on(self.kernel.tasks(&invocation)) {
                    return MetaResult::Continue(Some(format!("Failed to list tasks: {e}")));
                }
                MetaResult::Continue(None)
            }
            "/cancel" => {
                let arg = if rest.is_empty() { "last" } else { rest };
                match arg.parse::<TaskSelector>() {
                    Ok(selector) => {
                        let _ = self.runtime.block_on(self.kernel.cancel(selector));
                    }
                    Err(_) => {
                        self.runtime.block_on(self.kernel.cancel_command(arg));
                    }
                }
                MetaResult::Continue(None)
            }
            "/first" | "/prev" | "/previous" | "/next" | "/last" | "/close" => {
                let nav = command
                    .trim_start_matches('/')
                    .parse::<Navigation>()
                    .unwrap_or(Navigation::Close);
                MetaResult::Continue(self.navigate(nav))
            }
            "/scope" | "/vars" => {
                if !self.kernel.retention() {
                    return MetaResult::Continue(Some(
                        "(retention is off; use /retain on to keep variables)".to_string(),
                    ));
                }
                let names = self.kernel.scope_names();
                if names.is_empty() {
                    return MetaResult::Continue(Some("(no variables set)".to_string()));
                }
                let mut output = String::from("Variables:\n");
                {
                    let scope = self.kernel.scope();
                    let scope = scope.lock();
                    for name in names {
                        if let Some(value) = scope.get(&name) {
                            output.push_str(&format!("  {} = {}\n", name, value.repr()));
                        }
                    }
                }
                let output = output.trim_end().to_string();
                MetaResult::Continue(Some(self.screened(output)))
            }
            "/result" | "/_" => {
                let repr = self.kernel.last_result().repr();
                MetaResult::Continue(Some(self.screened(repr)))
            }
            _ => MetaResult::Continue(Some(format!(
                "Unknown command: {}\nType /help or help for available commands.",
                command
            ))),
        }
    }

    fn screened(&self, text: String) -> String {
        self.runtime.block_on(self.kernel.screen(&self.identity, text))
    }

    fn navigate(&self, nav: Navigation) -> Option<String> {
        let Some(session) = self.surface.active_controls() else {
            return Some("No paginated output to navigate.".to_string());
        };
        let outcome = self
            .runtime
            .block_on(self.kernel.navigate(session, &self.identity, nav));
        match outcome {
            RouteOutcome::Handled(NavOutcome::Moved { .. }) => None,
            RouteOutcome::Handled(NavOutcome::Unchanged) => Some("(already there)".to_string()),
            RouteOutcome::Handled(NavOutcome::Closed) => Some("(closed)".to_string()),
            RouteOutcome::Handled(NavOutcome::AlreadyClosed) | RouteOutcome::UnknownSession => {
                Some("That output is no longer navigable.".to_string())
            }
            RouteOutcome::NotOwner => Some("That output belongs to someone else.".to_string()),
        }
    }

    /// Try to handle a bare command (without leading /).
    /// Returns Some(result) if it was a recognized command, None otherwise.
    fn try_bare_command(&mut self, cmd: &str) -> Option<MetaResult> {
        match cmd {
            "quit" | "exit" => Some(self.handle_meta_command("/quit")),
            "help" => Some(self.handle_meta_command("/help")),
            _ => None,
        }
    }
}

/// Whether `source` has unclosed brackets and needs another line.
///
/// Input that does not lex is complete: the kernel reports the error.
pub fn needs_continuation(source: &str) -> bool {
    let Ok(tokens) = tokenize(source) else {
        return false;
    };
    let mut depth: i64 = 0;
    for spanned in &tokens {
        match spanned.token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

const HELP_TEXT: &str = r#"haku: evaluation REPL

Evaluate:
  <code>                Run a snippet; the last expression is shown
  <code> &              Run a snippet in the background
  /inspect <code>       Show an inspection report of each result

Session:
  /retain [on|off]      Keep variables between snippets (or show the setting)
  /scope                List retained variables
  /result               Show the last result (also `_` in snippets)

Tasks:
  /tasks                List running tasks
  /cancel [n|last|-1]   Cancel a task by index (default: most recent)
  /cancel <command>     Cancel every task running a command (eval, inspect)

Paged output:
  /first /prev /next /last /close

REPL:
  /help                 Show this help
  /quit                 Exit

Open brackets continue input on the next line.
Environment: HAKU_RETAIN, HAKU_MAX_PAGE_SIZE, HAKU_PAGINATOR_IDLE_TIMEOUT,
HAKU_INLINE_THRESHOLD, HAKU_EXECUTION_TIMEOUT, HAKU_SECRET, RUST_LOG, NO_COLOR"#;

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// Run the REPL.
pub fn run() -> Result<()> {
    println!("haku v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");

    let mut rl: Editor<(), DefaultHistory> =
        Editor::new().context("Failed to create editor")?;

    // Load history if it exists
    let history_path = directories::BaseDirs::new()
        .map(|b| b.data_dir().join("haku").join("history.txt"));
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            // Only log if it's not a "file not found" error (expected on first run)
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    let mut repl = Repl::new()?;
    println!();

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "haku> " } else { " ...> " };

        match rl.readline(prompt) {
            Ok(line) => {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);
                if needs_continuation(&buffer) {
                    continue;
                }
                let input = std::mem::take(&mut buffer);

                if let Err(e) = rl.add_history_entry(input.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(&input) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) if e.to_string() == EXIT_SIGNAL => {
                        // User requested exit - save history and break
                        save_history(&mut rl, &history_path);
                        return Ok(());
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);

    Ok(())
}

/// Evaluate one snippet and print its output, for `haku -c`.
///
/// Returns true if the evaluation failed.
pub fn run_once(source: &str) -> Result<bool> {
    let repl = Repl::new()?;
    let invocation = repl.invocation();
    let failed = repl
        .runtime
        .block_on(repl.kernel.eval(&invocation, source));
    if let Some(output) = repl.collect(None) {
        println!("{output}");
    }
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_brackets_continue() {
        assert!(needs_continuation("def f(x) {"));
        assert!(needs_continuation("[1,\n2,"));
        assert!(!needs_continuation("def f(x) {\n  return x\n}"));
        assert!(!needs_continuation("1 + 1"));
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        assert!(!needs_continuation("\"{\""));
    }

    #[test]
    fn unlexable_input_is_complete() {
        assert!(!needs_continuation("\"unterminated {"));
    }
}
