//! Structured inspection of values.
//!
//! [`inspect`] runs a fixed, ordered list of probes over a value. Each probe
//! either contributes one row, declines (the row does not apply to this
//! value), or fails; a failing probe only loses its own row. Probes are
//! bounded: previews stop at [`PREVIEW_ITEMS`] elements and texts at
//! [`PREVIEW_CHARS`] characters.

use anyhow::{bail, Result};
use haku_types::InspectionReport;

use crate::interpreter::{format_float, Value};

/// Most elements or keys a preview shows.
pub const PREVIEW_ITEMS: usize = 5;

/// Most characters of text a probe emits.
pub const PREVIEW_CHARS: usize = 120;

type Probe = fn(&Value) -> Result<Option<String>>;

/// Probes in report order.
const PROBES: &[(&str, Probe)] = &[
    ("type", probe_type),
    ("kind", probe_kind),
    ("doc", probe_doc),
    ("length", probe_length),
    ("signature", probe_signature),
    ("keys", probe_keys),
    ("items", probe_items),
    ("truthy", probe_truthy),
    ("numeric", probe_numeric),
    ("json", probe_json),
];

/// Build the inspection report for `value`.
pub fn inspect(value: &Value) -> InspectionReport {
    let mut report = InspectionReport::new(value.repr());
    for (label, probe) in PROBES {
        match probe(value) {
            Ok(Some(text)) => report.push(*label, clip(&text)),
            Ok(None) => {}
            Err(err) => tracing::debug!(probe = label, error = %err, "inspection probe failed"),
        }
    }
    report
}

/// Labels of every probe, in report order.
pub fn probe_labels() -> impl Iterator<Item = &'static str> {
    PROBES.iter().map(|(label, _)| *label)
}

fn clip(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(PREVIEW_CHARS - 3).collect();
    out.push_str("...");
    out
}

fn preview<'a>(items: impl ExactSizeIterator<Item = String> + 'a) -> String {
    let total = items.len();
    let mut shown: Vec<String> = items.take(PREVIEW_ITEMS).collect();
    if total > PREVIEW_ITEMS {
        shown.push(format!("... ({total} total)"));
    }
    shown.join(", ")
}

fn probe_type(value: &Value) -> Result<Option<String>> {
    Ok(Some(value.type_name().to_string()))
}

fn probe_kind(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Builtin(_) => Some("builtin".to_string()),
        Value::Function(def) => Some(format!("user-defined (line {})", def.line)),
        _ => None,
    })
}

fn probe_doc(value: &Value) -> Result<Option<String>> {
    let doc = match value {
        Value::Builtin(b) => b.doc,
        Value::Function(def) => match &def.doc {
            Some(doc) => doc.as_str(),
            None => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(doc
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string))
}

fn probe_length(value: &Value) -> Result<Option<String>> {
    Ok(value.len().map(|n| n.to_string()))
}

fn probe_signature(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Builtin(b) => Some(b.signature()),
        Value::Function(def) => Some(def.signature()),
        _ => None,
    })
}

fn probe_keys(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Map(map) => Some(preview(map.keys().map(|k| format!("{k:?}")))),
        _ => None,
    })
}

fn probe_items(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::List(items) => Some(preview(items.iter().map(Value::repr))),
        Value::Map(map) => Some(preview(map.values().map(Value::repr))),
        _ => None,
    })
}

fn probe_truthy(value: &Value) -> Result<Option<String>> {
    Ok(Some(value.truthy().to_string()))
}

fn probe_numeric(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Int(n) => {
            let bits = 64 - n.unsigned_abs().leading_zeros();
            let hex = if *n < 0 {
                format!("-{:#x}", n.unsigned_abs())
            } else {
                format!("{n:#x}")
            };
            Some(format!("hex {hex}, bit length {bits}"))
        }
        Value::Float(n) => {
            let class = if n.is_nan() {
                "nan"
            } else if n.is_infinite() {
                "infinite"
            } else {
                "finite"
            };
            if n.is_finite() && n.fract() == 0.0 {
                Some(format!("{class}, integral ({})", format_float(*n)))
            } else {
                Some(class.to_string())
            }
        }
        _ => None,
    })
}

fn probe_json(value: &Value) -> Result<Option<String>> {
    match value.to_json() {
        Some(json) => Ok(Some(serde_json::to_string(&json)?)),
        None => bail!("'{}' is not JSON serializable", value.type_name()),
    }
}
