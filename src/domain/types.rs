use serde::Serialize;

pub const SHORT_FORM_REASON: &str = "short-form";

/// Heuristic signals read from an entry's title, plus the secondary text
/// fields captured alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSignals {
    pub has_warning_pattern: bool,
    pub is_review_pattern: bool,
    pub is_important_pattern: bool,
    pub has_episode_marker: bool,
    pub channel_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterAction {
    /// Restore the entry to its visible, unblurred baseline.
    Reset,
    Blur { intensity_px: u32 },
    Hide,
    /// Leave the node exactly as it is.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDecision {
    pub action: FilterAction,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

impl FilterDecision {
    pub fn reset(reason: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Reset,
            confidence: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Skip,
            confidence: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self.action, FilterAction::Blur { .. } | FilterAction::Hide)
    }

    /// Human-readable label attached to flagged entries.
    pub fn annotation(&self) -> Option<String> {
        if !self.is_flagged() {
            return None;
        }
        if self.reasons.first().map(String::as_str) == Some(SHORT_FORM_REASON) {
            return Some("Short-form video hidden".to_string());
        }
        let percent = (self.confidence * 100.0).floor() as u32;
        let mut label = format!("Possible spoiler ({percent}% confidence)");
        if !self.reasons.is_empty() {
            label.push_str(": ");
            label.push_str(&self.reasons.join(", "));
        }
        Some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_floors_confidence() {
        let decision = FilterDecision {
            action: FilterAction::Blur { intensity_px: 6 },
            confidence: 0.6,
            reasons: vec!["keyword:結末".into(), "warning".into()],
        };
        assert_eq!(
            decision.annotation().as_deref(),
            Some("Possible spoiler (60% confidence): keyword:結末, warning")
        );
        assert_eq!(FilterDecision::reset("no-match").annotation(), None);

        let short = FilterDecision {
            action: FilterAction::Hide,
            confidence: 1.0,
            reasons: vec![SHORT_FORM_REASON.into()],
        };
        assert_eq!(short.annotation().as_deref(), Some("Short-form video hidden"));
    }
}
