//! Secret redaction.
//!
//! Every value or error text is screened before it is rendered. If it
//! contains the configured secret, or any `.`-separated segment of it, the
//! whole render is replaced by [`REDACTION_MARKER`] and one alert fires.

use std::sync::Arc;

use haku_types::Rendered;

use crate::surface::AlertChannel;

/// What a leaking render is replaced with.
pub const REDACTION_MARKER: &str = "[result hidden for security reasons]";

/// Description sent with every leak alert.
pub const LEAK_ALERT: &str = "Attempted secret leak";

/// Screens rendered text for a secret.
pub struct Redactor {
    needles: Vec<String>,
    alerts: Arc<dyn AlertChannel>,
}

impl Redactor {
    /// Build a redactor. `None` or an empty secret disables screening.
    pub fn new(secret: Option<&str>, alerts: Arc<dyn AlertChannel>) -> Self {
        let mut needles = Vec::new();
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            needles.push(secret.to_string());
            needles.extend(
                secret
                    .split('.')
                    .filter(|segment| !segment.is_empty() && *segment != secret)
                    .map(str::to_string),
            );
        }
        Self { needles, alerts }
    }

    pub fn is_enabled(&self) -> bool {
        !self.needles.is_empty()
    }

    /// Whether `text` contains the secret or one of its segments.
    pub fn leaks(&self, text: &str) -> bool {
        self.needles.iter().any(|needle| text.contains(needle.as_str()))
    }

    /// Alert once if `text` leaks. Returns whether it did.
    pub async fn check(&self, identity: &str, text: &str) -> bool {
        let leaked = self.leaks(text);
        if leaked {
            self.report(identity).await;
        }
        leaked
    }

    /// Screen text. A leak returns the marker and alerts once.
    pub async fn screen(&self, identity: &str, text: String) -> String {
        if self.check(identity, &text).await {
            REDACTION_MARKER.to_string()
        } else {
            text
        }
    }

    /// Screen a whole payload. A leak anywhere in it replaces all of it.
    pub async fn screen_rendered(&self, identity: &str, payload: Rendered) -> Rendered {
        if self.leaks(&payload.all_text()) {
            self.report(identity).await;
            Rendered::text(REDACTION_MARKER)
        } else {
            payload
        }
    }

    async fn report(&self, identity: &str) {
        tracing::warn!(identity, "redacted a render containing the secret");
        self.alerts.alert(identity, LEAK_ALERT).await;
    }
}
