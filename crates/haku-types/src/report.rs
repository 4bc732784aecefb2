//! Inspection reports: the ordered attribute listing produced by the
//! kernel's inspector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum characters of the header line before it is truncated.
pub const HEADER_LIMIT: usize = 485;

/// One (label, text) row of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRow {
    pub label: String,
    pub text: String,
}

/// An ordered sequence of inspection rows under a header.
///
/// Row order is significant: it follows the inspector's probe priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReport {
    header: String,
    rows: Vec<InspectionRow>,
}

impl InspectionReport {
    /// Create an empty report. Headers longer than [`HEADER_LIMIT`] are
    /// cut and end in `...`.
    pub fn new(header: impl Into<String>) -> Self {
        let header = header.into();
        let header = if header.chars().count() > HEADER_LIMIT {
            let mut cut: String = header.chars().take(HEADER_LIMIT - 3).collect();
            cut.push_str("...");
            cut
        } else {
            header
        };
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.rows.push(InspectionRow {
            label: label.into(),
            text: text.into(),
        });
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn rows(&self) -> &[InspectionRow] {
        &self.rows
    }

    /// Row labels in order.
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    /// Text of the first row with this label.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for InspectionReport {
    /// `=== header ===` followed by one `label :: text` line per row, labels
    /// padded and clipped to 16 columns.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.header)?;
        for row in &self.rows {
            let label: String = row.label.chars().take(16).collect();
            writeln!(f, "{label:16} :: {}", row.text)?;
        }
        Ok(())
    }
}
