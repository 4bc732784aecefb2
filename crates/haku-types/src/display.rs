//! Display payloads: what the kernel sends to, and receives from, a host's
//! display surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a message on the host's display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle indicator attached to the message that invoked an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    /// The operation is still running after its grace delay.
    Pending,
    /// The operation finished without error.
    Success,
    /// The operation failed (whatever the failure class).
    Failure,
}

impl Indicator {
    /// The glyph a text surface shows for this indicator.
    pub fn symbol(self) -> &'static str {
        match self {
            Indicator::Pending => "\u{25B6}",
            Indicator::Success => "\u{2714}",
            Indicator::Failure => "\u{2718}",
        }
    }
}

/// A paginator navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Navigation {
    First,
    Previous,
    Next,
    Last,
    Close,
}

impl Navigation {
    /// All controls, in the order they are attached to a message.
    pub const ALL: [Navigation; 5] = [
        Navigation::First,
        Navigation::Previous,
        Navigation::Next,
        Navigation::Last,
        Navigation::Close,
    ];

    /// The glyph used for the control on reaction-style surfaces.
    pub fn symbol(self) -> &'static str {
        match self {
            Navigation::First => "\u{23EE}",
            Navigation::Previous => "\u{25C0}",
            Navigation::Next => "\u{25B6}",
            Navigation::Last => "\u{23ED}",
            Navigation::Close => "\u{23F9}",
        }
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Navigation::First => "first",
            Navigation::Previous => "previous",
            Navigation::Next => "next",
            Navigation::Last => "last",
            Navigation::Close => "close",
        };
        f.write_str(name)
    }
}

/// Error returned when a navigation command can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown navigation command: {0}")]
pub struct ParseNavigationError(pub String);

impl FromStr for Navigation {
    type Err = ParseNavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "|<" | "\u{23EE}" => Ok(Navigation::First),
            "prev" | "previous" | "<" | "\u{25C0}" => Ok(Navigation::Previous),
            "next" | ">" | "\u{25B6}" => Ok(Navigation::Next),
            "last" | ">|" | "\u{23ED}" => Ok(Navigation::Last),
            "close" | "stop" | "x" | "\u{23F9}" => Ok(Navigation::Close),
            other => Err(ParseNavigationError(other.to_string())),
        }
    }
}

/// One named field of an [`Embed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// An embed-style structured payload: a header region (title, description,
/// fields, footer) that hosts render however their platform allows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    /// Create an empty embed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Set the footer text.
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Look up a field's value by name.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Concatenate every text region, for scanning and size checks.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        for part in [&self.title, &self.description, &self.footer].into_iter().flatten() {
            out.push_str(part);
            out.push('\n');
        }
        for field in &self.fields {
            out.push_str(&field.name);
            out.push('\n');
            out.push_str(&field.value);
            out.push('\n');
        }
        out
    }
}

/// A complete payload for one message: plain content, an embed, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    pub content: Option<String>,
    pub embed: Option<Embed>,
}

impl Rendered {
    /// Plain text content only.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    /// Embed only.
    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embed: Some(embed),
        }
    }

    /// Every piece of text in the payload, joined by newlines.
    pub fn all_text(&self) -> String {
        let mut out = self.content.clone().unwrap_or_default();
        if let Some(embed) = &self.embed {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&embed.all_text());
        }
        out
    }
}
