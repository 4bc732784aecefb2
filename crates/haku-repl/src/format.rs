//! Terminal rendering of display payloads.
//!
//! The kernel renders for chat-style surfaces: code fences around output,
//! embed headers, and zero-width escapes that keep user text from closing a
//! fence early. A terminal wants none of that markup, so [`render`] strips
//! fence lines, undoes the escapes, and styles embed regions with
//! `owo-colors` when the output is a color-capable terminal.
//!
//! `NO_COLOR` (any value) disables styling, as does a non-terminal stdout.

use std::io::IsTerminal;

use haku_types::{Embed, Rendered};
use owo_colors::OwoColorize;

/// How payloads are styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
}

impl Style {
    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    pub fn detect() -> Self {
        let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self { color }
    }

    /// No escape sequences at all.
    pub fn plain() -> Self {
        Self { color: false }
    }

    fn heading(self, text: &str) -> String {
        if self.color {
            text.bold().cyan().to_string()
        } else {
            text.to_string()
        }
    }

    fn label(self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn faint(self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Render a payload for the terminal.
pub fn render(payload: &Rendered, style: Style) -> String {
    let mut out = Vec::new();
    if let Some(embed) = &payload.embed {
        render_embed(embed, style, &mut out);
    }
    if let Some(content) = &payload.content {
        let body = strip_markup(content);
        if !body.is_empty() {
            out.push(body);
        }
    }
    out.join("\n")
}

fn render_embed(embed: &Embed, style: Style, out: &mut Vec<String>) {
    if let Some(title) = &embed.title {
        out.push(style.heading(title));
    }
    if let Some(description) = &embed.description {
        out.push(strip_markup(description));
    }
    for field in &embed.fields {
        let value = strip_markup(&field.value);
        if field.inline || !value.contains('\n') {
            out.push(format!("{} {}", style.label(&format!("{}:", field.name)), value));
        } else {
            out.push(style.label(&format!("{}:", field.name)));
            out.push(indent(&value));
        }
    }
    if let Some(footer) = &embed.footer {
        out.push(style.faint(footer));
    }
}

/// Drop code-fence lines and undo fence escaping. An empty page renders as
/// nothing.
pub fn strip_markup(text: &str) -> String {
    let body: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(|line| line.strip_suffix("```").unwrap_or(line))
        .collect();
    body.join("\n")
        .replace("`\u{200b}`", "``")
        .replace('\u{200b}', "")
        .trim_end()
        .to_string()
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
