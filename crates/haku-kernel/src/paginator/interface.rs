//! The interactive paginator session.
//!
//! A [`PaginatorInterface`] owns a [`PageBuffer`], a cursor, and the id of
//! the message it is displayed on. All of that sits behind one lock which is
//! taken only to mutate or to render a snapshot; surface I/O always happens
//! after the lock is released. Message edits take turns on a separate async
//! gate and render only once it is their turn, so the last edit to land
//! always shows the newest cursor and content.
//!
//! Once displayed, a background loop owns two timers:
//!
//! - **updates**: `add_line` only flags the session dirty; the loop waits one
//!   update interval and then edits the message once for the whole batch
//! - **idle timeout**: with no navigation and no new content for the idle
//!   window, the session closes itself and detaches its controls
//!
//! ```text
//! Open(cursor) ──navigate──▶ Open(cursor')
//!      │
//!      └──close / idle timeout / oversized──▶ Closed   (terminal)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{Stream, StreamExt};
use haku_types::{Embed, MessageId, Navigation, Rendered};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::buffer::PageBuffer;
use crate::surface::{DisplayResult, DisplaySurface};

/// Paginator settings.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    /// Maximum characters per page.
    pub max_page_size: usize,
    /// Close after this long without navigation or new content.
    pub idle_timeout: Duration,
    /// Delay between a content change and the message edit showing it.
    pub update_interval: Duration,
    /// Content with more pages than this is sent as a file instead.
    pub max_pages: usize,
    /// Code block opener, e.g. "```py".
    pub prefix: String,
    /// Code block closer.
    pub suffix: String,
    /// Only this identity may navigate. `None` lets anyone.
    pub owner: Option<String>,
    /// Attachment name used for oversized content.
    pub filename: String,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            max_page_size: 1985,
            idle_timeout: Duration::from_secs(7200),
            update_interval: Duration::from_millis(500),
            max_pages: 100,
            prefix: "```".to_string(),
            suffix: "```".to_string(),
            owner: None,
            filename: "output.txt".to_string(),
        }
    }
}

impl PaginatorConfig {
    /// Use a code block with a language tag (`py`, `sh`, `prolog`, ...).
    pub fn with_language(mut self, language: &str) -> Self {
        self.prefix = format!("```{language}");
        self.suffix = "```".to_string();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

/// How pages are laid out in a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Code block plus a `Page x/y` line.
    Text,
    /// A fixed embed header with the code block as the body. The page
    /// counter goes in the embed footer.
    Embed(Embed),
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The cursor moved to this page index.
    Moved { page: usize },
    /// Already at the requested page.
    Unchanged,
    /// This request closed the session.
    Closed,
    /// The session was closed before; nothing happened.
    AlreadyClosed,
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Navigation,
    IdleTimeout,
    /// Too many pages; the content went out as a file.
    Oversized,
    /// Closed by its owner programmatically.
    Requested,
}

struct State {
    buffer: PageBuffer,
    cursor: usize,
    closed: Option<CloseReason>,
    last_activity: Instant,
    message: Option<MessageId>,
    controls_attached: bool,
    /// Bumped on every change to what the current page shows.
    revision: u64,
}

impl State {
    fn last_page(&self) -> usize {
        self.buffer.page_count().saturating_sub(1)
    }

    /// Whether controls should be attached now. Flips the flag if so.
    fn take_attach(&mut self) -> bool {
        if self.message.is_some() && !self.controls_attached && self.buffer.page_count() > 1 {
            self.controls_attached = true;
            true
        } else {
            false
        }
    }
}

/// Neutralise code fences so content can't break out of its block.
pub fn escape_fences(text: &str) -> String {
    text.replace("``", "`\u{200b}`")
}

/// An interactive, navigable, live-updating paginated display.
pub struct PaginatorInterface {
    surface: Arc<dyn DisplaySurface>,
    config: PaginatorConfig,
    layout: Layout,
    state: Mutex<State>,
    edits: tokio::sync::Mutex<()>,
    update: Notify,
    closed: CancellationToken,
}

impl PaginatorInterface {
    /// Create an empty session.
    pub fn new(surface: Arc<dyn DisplaySurface>, config: PaginatorConfig, layout: Layout) -> Arc<Self> {
        Self::with_text(surface, config, layout, "")
    }

    /// Create a session over flat text.
    pub fn with_text(
        surface: Arc<dyn DisplaySurface>,
        config: PaginatorConfig,
        layout: Layout,
        text: &str,
    ) -> Arc<Self> {
        let buffer = PageBuffer::from_text(text, config.max_page_size);
        Arc::new(Self {
            surface,
            config,
            layout,
            state: Mutex::new(State {
                buffer,
                cursor: 0,
                closed: None,
                last_activity: Instant::now(),
                message: None,
                controls_attached: false,
                revision: 0,
            }),
            edits: tokio::sync::Mutex::new(()),
            update: Notify::new(),
            closed: CancellationToken::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    pub fn page_count(&self) -> usize {
        self.state().buffer.page_count()
    }

    pub fn cursor(&self) -> usize {
        self.state().cursor
    }

    pub fn pages(&self) -> Vec<String> {
        self.state().buffer.pages().to_vec()
    }

    pub fn content(&self) -> String {
        self.state().buffer.content()
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.state().message
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed.is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.state().closed
    }

    /// Whether `identity` may navigate this session.
    pub fn accepts(&self, identity: &str) -> bool {
        self.config.owner.as_deref().map_or(true, |owner| owner == identity)
    }

    /// Wait until the session closes.
    pub async fn wait_closed(&self) {
        self.closed.cancelled().await
    }

    /// Render the page under the cursor.
    pub fn render(&self) -> Rendered {
        self.render_state(&self.state())
    }

    fn snapshot(&self) -> (Rendered, u64) {
        let state = self.state();
        (self.render_state(&state), state.revision)
    }

    fn render_state(&self, state: &State) -> Rendered {
        let total = state.buffer.page_count().max(1);
        let page = state.buffer.page(state.cursor).unwrap_or("");
        let mut body = escape_fences(page);
        if body.is_empty() {
            body.push('\u{200b}');
        }
        if !body.ends_with('\n') {
            body.push('\n');
        }
        let block = format!("{}\n{}{}", self.config.prefix, body, self.config.suffix);
        let counter = format!("Page {}/{}", state.cursor + 1, total);

        match &self.layout {
            Layout::Text => Rendered::text(format!("{block}\n{counter}")),
            Layout::Embed(header) => {
                let mut embed = header.clone();
                embed.footer = Some(match &header.footer {
                    Some(footer) => format!("{footer} | {counter}"),
                    None => counter,
                });
                Rendered {
                    content: Some(block),
                    embed: Some(embed),
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Content
    // ═══════════════════════════════════════════════════════════════════

    /// Append a line. A cursor on the last page follows the content to the
    /// new last page. A displayed session schedules one coalesced update.
    pub fn add_line(&self, line: &str) {
        let displayed = {
            let mut state = self.state();
            if state.closed.is_some() {
                return;
            }
            let following = state.cursor >= state.last_page();
            state.buffer.add_line(line);
            if following {
                state.cursor = state.last_page();
            }
            state.revision += 1;
            state.last_activity = Instant::now();
            state.message.is_some()
        };
        if displayed {
            self.update.notify_one();
        }
    }

    /// Append every line a stream produces.
    pub async fn pipe_lines<S>(&self, lines: S)
    where
        S: Stream<Item = String>,
    {
        futures::pin_mut!(lines);
        while let Some(line) = lines.next().await {
            self.add_line(&line);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Display
    // ═══════════════════════════════════════════════════════════════════

    /// Display the session as a new message.
    ///
    /// Content with more than `max_pages` pages is sent as a file attachment
    /// and the session closes at once.
    pub async fn send_to(self: &Arc<Self>) -> DisplayResult<MessageId> {
        if let Some(id) = self.send_oversized().await? {
            return Ok(id);
        }
        let (payload, revision) = self.snapshot();
        let id = self.surface.send(payload).await?;
        self.start(id, revision).await;
        Ok(id)
    }

    /// Display the session by taking over an existing message.
    pub async fn send_edit(self: &Arc<Self>, id: MessageId) -> DisplayResult<MessageId> {
        if let Some(file_id) = self.send_oversized().await? {
            return Ok(file_id);
        }
        let (payload, revision) = self.snapshot();
        self.surface.edit(id, payload).await?;
        self.start(id, revision).await;
        Ok(id)
    }

    async fn send_oversized(&self) -> DisplayResult<Option<MessageId>> {
        let content = {
            let state = self.state();
            if state.buffer.page_count() <= self.config.max_pages {
                return Ok(None);
            }
            state.buffer.content()
        };
        if let Layout::Embed(header) = &self.layout {
            self.surface.send(Rendered::embed(header.clone())).await?;
        }
        let id = self
            .surface
            .send_file(&self.config.filename, content.into_bytes())
            .await?;
        {
            let mut state = self.state();
            state.closed = Some(CloseReason::Oversized);
        }
        self.closed.cancel();
        tracing::debug!(%id, "paginator content sent as file");
        Ok(Some(id))
    }

    /// Begin live updates on message `id`, which shows the state at
    /// `revision`. Changes made while it was being sent are picked up by
    /// the first update.
    async fn start(self: &Arc<Self>, id: MessageId, revision: u64) {
        let (attach, stale) = {
            let mut state = self.state();
            state.message = Some(id);
            state.last_activity = Instant::now();
            (state.take_attach(), state.revision != revision)
        };
        if attach {
            self.attach_controls(id).await;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_loop().await });
        if stale {
            self.update.notify_one();
        }
    }

    async fn attach_controls(&self, id: MessageId) {
        if let Err(err) = self.surface.attach_controls(id, &Navigation::ALL).await {
            tracing::warn!(%id, error = %err, "failed to attach paginator controls");
        }
    }

    fn idle_deadline(&self) -> Instant {
        self.state().last_activity + self.config.idle_timeout
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let deadline = self.idle_deadline();
            tokio::select! {
                _ = self.closed.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {
                    if self.idle_deadline() <= Instant::now() {
                        self.close(CloseReason::IdleTimeout).await;
                        break;
                    }
                }
                _ = self.update.notified() => {
                    tokio::select! {
                        _ = self.closed.cancelled() => break,
                        _ = tokio::time::sleep(self.config.update_interval) => {}
                    }
                    self.refresh().await;
                }
            }
        }
    }

    /// Re-render the current page onto the displayed message.
    pub async fn refresh(&self) {
        let _turn = self.edits.lock().await;
        let (id, payload, attach) = {
            let mut state = self.state();
            let Some(id) = state.message else { return };
            if state.closed.is_some() {
                return;
            }
            let attach = state.take_attach();
            (id, self.render_state(&state), attach)
        };
        if let Err(err) = self.surface.edit(id, payload).await {
            tracing::debug!(%id, error = %err, "paginator refresh failed");
        }
        if attach {
            self.attach_controls(id).await;
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Navigation
    // ═══════════════════════════════════════════════════════════════════

    /// Apply a navigation command.
    pub async fn navigate(&self, nav: Navigation) -> NavOutcome {
        if nav == Navigation::Close {
            return if self.close(CloseReason::Navigation).await {
                NavOutcome::Closed
            } else {
                NavOutcome::AlreadyClosed
            };
        }

        let outcome = {
            let mut state = self.state();
            if state.closed.is_some() {
                return NavOutcome::AlreadyClosed;
            }
            state.last_activity = Instant::now();
            let last = state.last_page();
            let target = match nav {
                Navigation::First => 0,
                Navigation::Previous => state.cursor.saturating_sub(1),
                Navigation::Next => (state.cursor + 1).min(last),
                Navigation::Last | Navigation::Close => last,
            };
            if target == state.cursor {
                NavOutcome::Unchanged
            } else {
                state.cursor = target;
                state.revision += 1;
                NavOutcome::Moved { page: target }
            }
        };

        if matches!(outcome, NavOutcome::Moved { .. }) {
            self.refresh().await;
        }
        outcome
    }

    /// Close the session and detach its controls. Returns false if it was
    /// already closed.
    pub async fn close(&self, reason: CloseReason) -> bool {
        let id = {
            let mut state = self.state();
            if state.closed.is_some() {
                return false;
            }
            state.closed = Some(reason);
            state.message
        };
        self.closed.cancel();
        if let Some(id) = id {
            if let Err(err) = self.surface.detach_controls(id).await {
                tracing::debug!(%id, error = %err, "failed to detach paginator controls");
            }
        }
        tracing::debug!(?reason, "paginator closed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use async_trait::async_trait;
    use haku_types::Indicator;
    use std::collections::VecDeque;

    /// Delays sends, and each edit by the next queued delay.
    struct SlowSurface {
        inner: MemorySurface,
        send_delay: Duration,
        edit_delays: Mutex<VecDeque<Duration>>,
    }

    impl SlowSurface {
        fn new(send_delay: Duration, edit_delays: &[Duration]) -> Self {
            Self {
                inner: MemorySurface::new(),
                send_delay,
                edit_delays: Mutex::new(edit_delays.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl DisplaySurface for SlowSurface {
        async fn send(&self, payload: Rendered) -> DisplayResult<MessageId> {
            tokio::time::sleep(self.send_delay).await;
            self.inner.send(payload).await
        }

        async fn edit(&self, id: MessageId, payload: Rendered) -> DisplayResult<()> {
            let delay = self.edit_delays.lock().unwrap().pop_front().unwrap_or_default();
            tokio::time::sleep(delay).await;
            self.inner.edit(id, payload).await
        }

        async fn attach_controls(&self, id: MessageId, controls: &[Navigation]) -> DisplayResult<()> {
            self.inner.attach_controls(id, controls).await
        }

        async fn detach_controls(&self, id: MessageId) -> DisplayResult<()> {
            self.inner.detach_controls(id).await
        }

        async fn send_file(&self, filename: &str, content: Vec<u8>) -> DisplayResult<MessageId> {
            self.inner.send_file(filename, content).await
        }

        async fn indicate(&self, target: MessageId, indicator: Indicator) -> DisplayResult<()> {
            self.inner.indicate(target, indicator).await
        }
    }

    fn setup(text: &str, page_size: usize) -> (Arc<MemorySurface>, Arc<PaginatorInterface>) {
        let surface = Arc::new(MemorySurface::new());
        let config = PaginatorConfig::default().with_max_page_size(page_size);
        let paginator = PaginatorInterface::with_text(surface.clone(), config, Layout::Text, text);
        (surface, paginator)
    }

    #[tokio::test]
    async fn single_page_has_no_controls() {
        let (surface, paginator) = setup("hello", 100);
        let id = paginator.send_to().await.expect("send");
        assert!(!surface.has_controls(id));
        let content = surface.message(id).and_then(|r| r.content).expect("content");
        assert_eq!(content, "```\nhello\n```\nPage 1/1");
    }

    #[tokio::test]
    async fn navigation_moves_and_clamps() {
        let (surface, paginator) = setup(&"x".repeat(25), 10);
        let id = paginator.send_to().await.expect("send");
        assert!(surface.has_controls(id));

        assert_eq!(paginator.navigate(Navigation::Previous).await, NavOutcome::Unchanged);
        assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::Moved { page: 1 });
        assert_eq!(paginator.navigate(Navigation::Last).await, NavOutcome::Moved { page: 2 });
        assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::Unchanged);
        assert_eq!(paginator.navigate(Navigation::First).await, NavOutcome::Moved { page: 0 });

        let content = surface.message(id).and_then(|r| r.content).expect("content");
        assert!(content.ends_with("Page 1/3"));
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let (surface, paginator) = setup(&"x".repeat(25), 10);
        let id = paginator.send_to().await.expect("send");
        assert_eq!(paginator.navigate(Navigation::Close).await, NavOutcome::Closed);
        assert!(!surface.has_controls(id));
        assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::AlreadyClosed);
        assert_eq!(paginator.navigate(Navigation::Close).await, NavOutcome::AlreadyClosed);
        assert_eq!(paginator.cursor(), 0);
        assert_eq!(paginator.close_reason(), Some(CloseReason::Navigation));
    }

    #[tokio::test(start_paused = true)]
    async fn updates_are_coalesced() {
        let (surface, paginator) = setup("", 1985);
        let id = paginator.send_to().await.expect("send");
        for i in 0..10 {
            paginator.add_line(&format!("line {i}"));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(surface.edit_count(id), 1);
        let content = surface.message(id).and_then(|r| r.content).expect("content");
        assert!(content.contains("line 9"));
    }

    #[tokio::test(start_paused = true)]
    async fn lines_added_while_sending_are_shown() {
        let surface = Arc::new(SlowSurface::new(Duration::from_millis(100), &[]));
        let paginator = PaginatorInterface::with_text(
            surface.clone(),
            PaginatorConfig::default(),
            Layout::Text,
            "first",
        );
        let sending = tokio::spawn({
            let paginator = Arc::clone(&paginator);
            async move { paginator.send_to().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        paginator.add_line("second");

        let id = sending.await.expect("join").expect("send");
        let content = surface.inner.message(id).and_then(|r| r.content).expect("content");
        assert!(!content.contains("second"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let content = surface.inner.message(id).and_then(|r| r.content).expect("content");
        assert!(content.contains("second"), "got: {content}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_edits_never_land_out_of_order() {
        let surface = Arc::new(SlowSurface::new(
            Duration::ZERO,
            &[Duration::from_millis(300), Duration::from_millis(10)],
        ));
        let paginator = PaginatorInterface::with_text(
            surface.clone(),
            PaginatorConfig::default().with_max_page_size(10),
            Layout::Text,
            &"x".repeat(25),
        );
        let id = paginator.send_to().await.expect("send");

        let (a, b) = tokio::join!(
            paginator.navigate(Navigation::Next),
            paginator.navigate(Navigation::Next)
        );
        assert_eq!(a, NavOutcome::Moved { page: 1 });
        assert_eq!(b, NavOutcome::Moved { page: 2 });

        assert_eq!(paginator.cursor(), 2);
        let content = surface.inner.message(id).and_then(|r| r.content).expect("content");
        assert!(content.ends_with("Page 3/3"), "got: {content}");
    }

    #[tokio::test(start_paused = true)]
    async fn piped_lines_stream_into_the_display() {
        let (surface, paginator) = setup("", 10);
        let id = paginator.send_to().await.expect("send");
        let lines = futures::stream::iter((0..5).map(|i| format!("line {i}")));
        paginator.pipe_lines(lines).await;

        assert_eq!(paginator.content(), "line 0\nline 1\nline 2\nline 3\nline 4\n");
        assert!(paginator.page_count() > 1);
        assert_eq!(paginator.cursor(), paginator.page_count() - 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(surface.edit_count(id), 1);
        assert!(surface.has_controls(id));
        let content = surface.message(id).and_then(|r| r.content).expect("content");
        assert!(content.contains("line 4"), "got: {content}");
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_on_last_page_follows_new_content() {
        let (_surface, paginator) = setup("abcdefghij", 10);
        paginator.send_to().await.expect("send");
        paginator.add_line("more");
        assert_eq!(paginator.cursor(), 1);

        paginator.navigate(Navigation::First).await;
        paginator.add_line(&"y".repeat(20));
        assert_eq!(paginator.cursor(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn controls_appear_when_content_grows() {
        let (surface, paginator) = setup("", 10);
        let id = paginator.send_to().await.expect("send");
        assert!(!surface.has_controls(id));
        paginator.add_line(&"z".repeat(15));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(surface.has_controls(id));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_closes() {
        let surface = Arc::new(MemorySurface::new());
        let config = PaginatorConfig::default()
            .with_max_page_size(5)
            .with_idle_timeout(Duration::from_secs(60));
        let paginator = PaginatorInterface::with_text(surface.clone(), config, Layout::Text, "0123456789");
        let id = paginator.send_to().await.expect("send");

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::Moved { page: 1 });
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(!paginator.is_closed());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(paginator.is_closed());
        assert_eq!(paginator.close_reason(), Some(CloseReason::IdleTimeout));
        assert!(!surface.has_controls(id));
    }

    #[tokio::test]
    async fn oversized_content_goes_out_as_a_file() {
        let surface = Arc::new(MemorySurface::new());
        let config = PaginatorConfig::default().with_max_page_size(2).with_max_pages(3);
        let paginator = PaginatorInterface::with_text(surface.clone(), config, Layout::Text, "abcdefgh");
        paginator.send_to().await.expect("send");
        assert_eq!(surface.files(), vec![("output.txt".to_string(), b"abcdefgh".to_vec())]);
        assert_eq!(paginator.close_reason(), Some(CloseReason::Oversized));
    }

    #[tokio::test]
    async fn embed_layout_keeps_header() {
        let surface = Arc::new(MemorySurface::new());
        let header = Embed::new().title("Evaluation Complete").footer("Evaluated in 0.100s");
        let paginator = PaginatorInterface::with_text(
            surface.clone(),
            PaginatorConfig::default().with_language("py"),
            Layout::Embed(header),
            "value",
        );
        let id = paginator.send_to().await.expect("send");
        let rendered = surface.message(id).expect("message");
        let embed = rendered.embed.expect("embed");
        assert_eq!(embed.title.as_deref(), Some("Evaluation Complete"));
        assert_eq!(embed.footer.as_deref(), Some("Evaluated in 0.100s | Page 1/1"));
        assert_eq!(rendered.content.as_deref(), Some("```py\nvalue\n```"));
    }

    #[tokio::test]
    async fn fences_are_escaped() {
        let (surface, paginator) = setup("```rm -rf```", 100);
        let id = paginator.send_to().await.expect("send");
        let content = surface.message(id).and_then(|r| r.content).expect("content");
        assert!(content.contains("`\u{200b}``rm -rf`\u{200b}``"));
    }

    #[tokio::test]
    async fn send_edit_takes_over_a_message() {
        let surface = Arc::new(MemorySurface::new());
        let existing = surface.send(Rendered::text("old")).await.expect("send");
        let paginator = PaginatorInterface::with_text(
            surface.clone(),
            PaginatorConfig::default(),
            Layout::Text,
            "new",
        );
        let id = paginator.send_edit(existing).await.expect("edit");
        assert_eq!(id, existing);
        assert!(surface.message(existing).and_then(|r| r.content).expect("content").contains("new"));
    }

    #[tokio::test]
    async fn empty_session_renders_placeholder() {
        let (_surface, paginator) = setup("", 10);
        assert_eq!(paginator.page_count(), 0);
        let content = paginator.render().content.expect("content");
        assert_eq!(content, "```\n\u{200b}\n```\nPage 1/1");
        assert_eq!(paginator.navigate(Navigation::Next).await, NavOutcome::Unchanged);
    }
}
