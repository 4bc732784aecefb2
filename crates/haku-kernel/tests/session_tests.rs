//! End-to-end session behaviour through the public API.
//!
//! Covers:
//! - result sequencing (auto-print, yields, exhaustion)
//! - pagination arithmetic and the closed state
//! - task cancellation by index and by `last`
//! - secret redaction in values and errors
//! - scope retention on and off

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use haku_kernel::paginator::CloseReason;
use haku_kernel::{
    run, Invocation, Kernel, KernelConfig, Layout, MemorySurface, NavOutcome, PageBuffer,
    PaginatorConfig, PaginatorInterface, ScopeHandle, Value, REDACTION_MARKER,
};
use haku_types::{Indicator, MessageId, Navigation, Rendered, TaskId, TaskSelector};
use rstest::rstest;

// ============================================================================
// Test Helpers
// ============================================================================

fn make_kernel(config: KernelConfig) -> (Arc<MemorySurface>, Arc<Kernel>) {
    let surface = Arc::new(MemorySurface::new());
    let kernel = Kernel::new(config, surface.clone(), surface.clone(), surface.clone());
    (surface, Arc::new(kernel))
}

fn invocation(id: u64) -> Invocation {
    Invocation::new(MessageId(id), "alice", "general")
}

async fn values(source: &str) -> Vec<Value> {
    let scope = ScopeHandle::default();
    run(&scope, source, HashMap::new())
        .expect("should compile")
        .map(|item| item.expect("should not fail"))
        .collect()
        .await
}

fn inline_output(surface: &MemorySurface) -> Option<String> {
    let embed = surface.last_message()?.embed?;
    embed.field_value("Output").map(str::to_string)
}

// ============================================================================
// Result sequencing
// ============================================================================

#[tokio::test]
async fn bare_trailing_expression_is_the_single_result() {
    assert_eq!(values("a = 6\nb = 7\na * b").await, vec![Value::Int(42)]);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4)]
#[tokio::test]
async fn yields_precede_the_trailing_expression(#[case] n: i64) {
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!("yield {i}\n"));
    }
    source.push_str("\"end\"");

    let mut expected: Vec<Value> = (0..n).map(Value::Int).collect();
    expected.push(Value::from("end"));
    assert_eq!(values(&source).await, expected);
}

#[tokio::test]
async fn exhausted_and_failed_runs_produce_nothing_more() {
    let scope = ScopeHandle::default();
    let mut done = run(&scope, "1", HashMap::new()).expect("compiles");
    while done.next().await.is_some() {}
    assert!(done.next().await.is_none());

    let mut failed = run(&scope, "undefined_name", HashMap::new()).expect("compiles");
    assert!(matches!(failed.next().await, Some(Err(_))));
    assert!(failed.next().await.is_none());
    assert!(failed.next().await.is_none());
}

// ============================================================================
// Pagination
// ============================================================================

#[rstest]
#[case(1, 0)]
#[case(1, 7)]
#[case(10, 10)]
#[case(10, 11)]
#[case(1985, 5000)]
#[case(3, 100)]
fn pages_split_content_exactly(#[case] page_size: usize, #[case] length: usize) {
    let content: String = "abcdefghij".chars().cycle().take(length).collect();
    let buffer = PageBuffer::from_text(&content, page_size);
    assert_eq!(buffer.page_count(), length.div_ceil(page_size));
    assert_eq!(buffer.pages().concat(), content);
}

#[tokio::test]
async fn navigation_after_close_is_a_no_op() {
    let surface = Arc::new(MemorySurface::new());
    let paginator = PaginatorInterface::with_text(
        surface.clone(),
        PaginatorConfig::default().with_max_page_size(4),
        Layout::Text,
        "0123456789",
    );
    let id = paginator.send_to().await.expect("send");
    assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::Moved { page: 1 });
    assert_eq!(paginator.navigate(Navigation::Close).await, NavOutcome::Closed);

    let edits = surface.edit_count(id);
    for nav in Navigation::ALL {
        assert_eq!(paginator.navigate(nav).await, NavOutcome::AlreadyClosed);
    }
    assert_eq!(paginator.cursor(), 1);
    assert_eq!(surface.edit_count(id), edits);
    assert_eq!(paginator.close_reason(), Some(CloseReason::Navigation));
}

// ============================================================================
// Task cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancelling_tasks_by_index_and_last() {
    let (surface, kernel) = make_kernel(KernelConfig::default());

    let mut handles = Vec::new();
    for i in 1..=3u64 {
        let task_kernel = Arc::clone(&kernel);
        handles.push(tokio::spawn(async move {
            task_kernel.eval(&invocation(i), "sleep(60)\n\"done\"").await
        }));
        while kernel.tasks_registry().len() < i as usize {
            tokio::task::yield_now().await;
        }
    }

    let cancelled = kernel.cancel(TaskSelector::Index(TaskId(2))).await.expect("task 2");
    assert_eq!(cancelled.id, TaskId(2));
    let ids: Vec<TaskId> = kernel.tasks_registry().list().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TaskId(1), TaskId(3)]);

    let last = kernel.cancel(TaskSelector::Last).await.expect("last");
    assert_eq!(last.id, TaskId(3));

    let absorbed: Vec<bool> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("join"))
        .collect();
    assert_eq!(absorbed, vec![false, true, true]);

    assert_eq!(surface.indicators(MessageId(2)).last(), Some(&Indicator::Failure));
    assert_eq!(surface.indicators(MessageId(1)).last(), Some(&Indicator::Success));
    assert!(kernel.tasks_registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_task_index_is_reported() {
    let (surface, kernel) = make_kernel(KernelConfig::default());
    let kernel_for_task = Arc::clone(&kernel);
    let handle = tokio::spawn(async move { kernel_for_task.eval(&invocation(1), "sleep(5)").await });
    while kernel.tasks_registry().is_empty() {
        tokio::task::yield_now().await;
    }

    assert!(kernel.cancel(TaskSelector::Index(TaskId(99))).await.is_err());
    assert_eq!(surface.last_message(), Some(Rendered::text("Unknown task id 99")));
    assert_eq!(kernel.tasks_registry().len(), 1);
    assert!(!handle.await.expect("join"));
}

// ============================================================================
// Secret redaction
// ============================================================================

const SECRET: &str = "NzA1Mj.Yx9k2Q.hT7bW3pLmQ";

#[tokio::test(start_paused = true)]
async fn leaked_value_renders_only_the_marker() {
    let (surface, kernel) = make_kernel(KernelConfig::default().with_secret(SECRET));
    kernel.eval(&invocation(1), "\"prefix \" + \"Yx9k2Q\"").await;
    assert_eq!(surface.last_message(), Some(Rendered::text(REDACTION_MARKER)));
    assert_eq!(surface.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn leaked_error_renders_only_the_marker() {
    let (surface, kernel) = make_kernel(KernelConfig::default().with_secret(SECRET));
    assert!(kernel.eval(&invocation(1), "Yx9k2Q").await);
    assert_eq!(surface.last_message(), Some(Rendered::text(REDACTION_MARKER)));
    assert_eq!(surface.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn escalated_traceback_is_redacted_too() {
    let (surface, kernel) = make_kernel(KernelConfig::default().with_secret(SECRET));
    kernel.eval(&invocation(1), "raise \"hT7bW3pLmQ\"").await;
    let private = surface.private_messages();
    assert_eq!(private.len(), 1);
    assert!(private[0].contains(REDACTION_MARKER));
    assert!(!private[0].contains("hT7bW3pLmQ"));
    assert_eq!(surface.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clean_values_are_not_redacted() {
    let (surface, kernel) = make_kernel(KernelConfig::default().with_secret(SECRET));
    kernel.eval(&invocation(1), "\"harmless\"").await;
    assert_eq!(inline_output(&surface).as_deref(), Some("```py\nharmless```"));
    assert!(surface.alerts().is_empty());
}

// ============================================================================
// Retention
// ============================================================================

#[rstest]
#[case(false, None)]
#[case(true, Some("```py\n41```"))]
#[tokio::test(start_paused = true)]
async fn retention_controls_binding_carry_over(#[case] retain: bool, #[case] expected: Option<&str>) {
    let (surface, kernel) = make_kernel(KernelConfig::default().with_retain(retain));
    assert!(!kernel.eval(&invocation(1), "counter = 41").await);
    let failed = kernel.eval(&invocation(2), "counter").await;

    assert_eq!(failed, expected.is_none());
    match expected {
        Some(output) => assert_eq!(inline_output(&surface).as_deref(), Some(output)),
        None => {
            let embed = surface.last_message().and_then(|r| r.embed).expect("error embed");
            assert_eq!(embed.description.as_deref(), Some("Exception: NameError"));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn injected_variables_never_persist() {
    let (_surface, kernel) = make_kernel(KernelConfig::retained());
    kernel.eval(&invocation(1), "mine = me").await;
    let names = kernel.scope_names();
    assert!(names.contains(&"mine".to_string()));
    for injected in ["me", "channel", "message", "_"] {
        assert!(!names.contains(&injected.to_string()), "{injected} leaked into the scope");
    }
}

#[tokio::test(start_paused = true)]
async fn slow_evaluation_shows_pending_first() {
    let (surface, kernel) = make_kernel(KernelConfig::default());
    kernel.eval(&invocation(1), "sleep(2)\n1").await;
    assert_eq!(
        surface.indicators(MessageId(1)),
        vec![Indicator::Pending, Indicator::Success]
    );
}
