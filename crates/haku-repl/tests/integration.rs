//! Integration tests for the haku REPL.
//!
//! These tests drive a REPL line by line and check what a terminal user
//! would see.

use std::time::{Duration, Instant};

use haku_kernel::{KernelConfig, REDACTION_MARKER};
use haku_repl::format::Style;
use haku_repl::Repl;
use rstest::rstest;

fn repl(config: KernelConfig) -> Repl {
    Repl::with_config(config)
        .expect("Failed to create REPL")
        .with_style(Style::plain())
        .with_identity("tester")
}

/// Run lines through a REPL and collect every output.
fn run_lines(repl: &mut Repl, lines: &[&str]) -> Vec<String> {
    let mut outputs = Vec::new();
    for line in lines {
        match repl.process_line(line) {
            Ok(Some(output)) => outputs.push(output),
            Ok(None) => {}
            Err(e) => outputs.push(format!("ERROR: {}", e)),
        }
    }
    outputs
}

fn last_output(repl: &mut Repl, line: &str) -> String {
    repl.process_line(line)
        .expect("line failed")
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::arithmetic("1 + 2", "Output: 3")]
#[case::string_is_raw("\"hi\"", "Output: hi")]
#[case::list("[1, 2][1]", "Output: 2")]
#[case::builtin("sum(range(5))", "Output: 10")]
#[case::type_line("1.5", "Output Type: float")]
fn evaluates_snippets(#[case] line: &str, #[case] expected: &str) {
    let mut repl = repl(KernelConfig::transient());
    let output = last_output(&mut repl, line);
    assert!(output.starts_with("Evaluation Complete"), "got: {output}");
    assert!(output.contains(expected), "expected {expected:?} in: {output}");
}

#[test]
fn statements_alone_show_nothing() {
    let mut repl = repl(KernelConfig::transient());
    assert_eq!(repl.process_line("x = 1").expect("line failed"), None);
}

#[test]
fn multi_line_definitions() {
    let mut repl = repl(KernelConfig::transient());
    let output = last_output(&mut repl, "def double(x) {\n  return x * 2\n}\ndouble(21)");
    assert!(output.contains("Output: 42"), "got: {output}");
}

#[test]
fn user_errors_render_inline() {
    let mut repl = repl(KernelConfig::transient());
    let output = last_output(&mut repl, "1 / 0");
    assert!(output.contains("Evaluation Unsuccessful"), "got: {output}");
    assert!(output.contains("ZeroDivisionError"), "got: {output}");
}

#[test]
fn syntax_errors_show_a_brief_traceback() {
    let mut repl = repl(KernelConfig::transient());
    let output = last_output(&mut repl, "1 +");
    assert!(output.contains("SyntaxError"), "got: {output}");
}

#[test]
fn inspect_reports_rows() {
    let mut repl = repl(KernelConfig::transient());
    let output = last_output(&mut repl, "/inspect [1, 2]");
    assert!(output.contains("=== [1, 2] ==="), "got: {output}");
    let type_row = format!("{:16} :: list", "type");
    assert!(output.contains(&type_row), "got: {output}");
}

// ═══════════════════════════════════════════════════════════════════════════
// Retention
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn retention_keeps_variables() {
    let mut repl = repl(KernelConfig::transient());
    let outputs = run_lines(&mut repl, &["/retain on", "x = 5", "x * 2", "/scope"]);
    assert_eq!(
        outputs[0],
        "Variable retention is ON. Future REPL sessions will retain their scope."
    );
    assert!(outputs[1].contains("Output: 10"), "got: {}", outputs[1]);
    assert!(outputs[2].contains("x = 5"), "got: {}", outputs[2]);
}

#[test]
fn without_retention_variables_vanish() {
    let mut repl = repl(KernelConfig::transient());
    let outputs = run_lines(&mut repl, &["x = 5", "x"]);
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].contains("NameError"), "got: {}", outputs[0]);
}

#[rstest]
#[case::show("/retain", "Variable retention is OFF.")]
#[case::already_off("/retain off", "Variable retention is already set to OFF.")]
#[case::bad("/retain maybe", "Unknown retention setting: maybe (expected on or off)")]
fn retain_command(#[case] line: &str, #[case] expected: &str) {
    let mut repl = repl(KernelConfig::transient());
    assert_eq!(last_output(&mut repl, line), expected);
}

#[test]
fn last_result_is_underscore() {
    let mut repl = repl(KernelConfig::transient());
    let outputs = run_lines(&mut repl, &["40", "_ + 2", "/result"]);
    assert!(outputs[1].contains("Output: 42"), "got: {}", outputs[1]);
    assert_eq!(outputs[2], "42");
}

// ═══════════════════════════════════════════════════════════════════════════
// Paged output
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn long_output_is_paged_and_navigable() {
    let config = KernelConfig::transient()
        .with_inline_threshold(20)
        .with_max_page_size(80);
    let mut repl = repl(config);

    let first = last_output(&mut repl, "range(100)");
    assert!(first.contains("Page 1/"), "got: {first}");
    assert!(first.contains("[pages] /first /prev /next /last /close"), "got: {first}");

    let next = last_output(&mut repl, "/next");
    assert!(next.contains("Page 2/"), "got: {next}");

    let back = last_output(&mut repl, "/first");
    assert!(back.contains("Page 1/"), "got: {back}");
    assert_eq!(last_output(&mut repl, "/first"), "(already there)");

    assert_eq!(last_output(&mut repl, "/close"), "(closed)");
    assert_eq!(last_output(&mut repl, "/next"), "No paginated output to navigate.");
}

#[test]
fn navigation_without_pages() {
    let mut repl = repl(KernelConfig::transient());
    assert_eq!(last_output(&mut repl, "/prev"), "No paginated output to navigate.");
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

fn wait_for_tasks(repl: &Repl, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while repl.kernel().tasks_registry().len() != count {
        assert!(Instant::now() < deadline, "expected {count} running tasks");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn background_tasks_can_be_listed_and_cancelled() {
    let mut repl = repl(KernelConfig::transient());
    let started = last_output(&mut repl, "sleep(60) &");
    assert_eq!(started, "[started in background; /tasks lists it]");
    wait_for_tasks(&repl, 1);

    let listing = last_output(&mut repl, "/tasks");
    assert!(listing.contains("1: `eval`"), "got: {listing}");

    let cancelled = last_output(&mut repl, "/cancel last");
    assert!(cancelled.contains("Cancelled task 1: `eval`"), "got: {cancelled}");
    wait_for_tasks(&repl, 0);
}

#[rstest]
#[case::empty_registry_index("/cancel 7", "Unknown task id 7")]
#[case::by_command("/cancel inspect", "No tasks to cancel.")]
#[case::no_tasks("/tasks", "No currently running tasks.")]
fn task_commands_when_idle(#[case] line: &str, #[case] expected: &str) {
    let mut repl = repl(KernelConfig::transient());
    assert_eq!(last_output(&mut repl, line), expected);
}

// ═══════════════════════════════════════════════════════════════════════════
// Secrets
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn secret_output_is_hidden_and_alerted() {
    let mut repl = repl(KernelConfig::transient().with_secret("hunter2.tok3n"));
    let output = last_output(&mut repl, "\"hunter\" + \"2\"");
    assert!(output.contains(REDACTION_MARKER), "got: {output}");
    assert!(!output.contains("hunter2"), "got: {output}");
    assert!(output.contains("[alert] tester: Attempted secret leak"), "got: {output}");
}

#[rstest]
#[case::last_result("/result")]
#[case::scope_listing("/scope")]
fn secret_stays_hidden_from_meta_commands(#[case] line: &str) {
    let mut repl = repl(KernelConfig::transient().with_secret("NzA1Mj.Yx9k2Q"));
    run_lines(&mut repl, &["/retain on", "t = \"Yx9k2Q\"\nt"]);
    let output = last_output(&mut repl, line);
    assert!(output.contains(REDACTION_MARKER), "got: {output}");
    assert!(!output.contains("Yx9k2Q"), "got: {output}");
    assert!(output.contains("[alert] tester: Attempted secret leak"), "got: {output}");
}

// ═══════════════════════════════════════════════════════════════════════════
// Meta-commands
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case("/quit")]
#[case("/exit")]
#[case("quit")]
fn quit_signals_exit(#[case] line: &str) {
    let mut repl = repl(KernelConfig::transient());
    let err = repl.process_line(line).expect_err("should exit");
    assert_eq!(err.to_string(), "__REPL_EXIT__");
}

#[test]
fn help_lists_commands() {
    let mut repl = repl(KernelConfig::transient());
    let help = last_output(&mut repl, "help");
    for command in ["/inspect", "/retain", "/tasks", "/cancel", "/next", "/scope"] {
        assert!(help.contains(command), "help is missing {command}");
    }
}

#[test]
fn unknown_meta_command() {
    let mut repl = repl(KernelConfig::transient());
    assert!(last_output(&mut repl, "/frobnicate").starts_with("Unknown command: /frobnicate"));
}

#[test]
fn empty_line_shows_nothing() {
    let mut repl = repl(KernelConfig::transient());
    assert_eq!(repl.process_line("   ").expect("line failed"), None);
}
