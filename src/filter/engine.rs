use crate::{
    domain::{types::SHORT_FORM_REASON, FilterAction, FilterConfiguration, FilterDecision},
    page::{NodeId, PageTree},
};

use super::{
    context::{analyze, Entry},
    strength::{StrengthBreakdown, StrengthCalculator},
};

pub const BLUR_CLASS: &str = "spoiler-blur";
pub const BLUR_VAR: &str = "--blur-amount";
pub const REASON_ATTR: &str = "data-spoiler-reason";

/// Strength strictly above this flags an entry.
pub const FLAG_THRESHOLD: f64 = 0.5;

/// Per-entry decision function. Holds no per-entry state: every call starts
/// from the entry's current content and the configuration passed in.
#[derive(Clone, Default)]
pub struct EntryFilterEngine {
    calculator: StrengthCalculator,
}

impl EntryFilterEngine {
    pub fn new(calculator: StrengthCalculator) -> Self {
        Self { calculator }
    }

    pub async fn evaluate(&self, entry: &Entry, config: &FilterConfiguration) -> FilterDecision {
        if config.hide_short_form && entry.short_form {
            return FilterDecision {
                action: FilterAction::Hide,
                confidence: 1.0,
                reasons: vec![SHORT_FORM_REASON.to_string()],
            };
        }
        if !config.enabled {
            return FilterDecision::reset("disabled");
        }
        if entry.title.is_none() {
            return FilterDecision::skip("no-title");
        }

        let breakdown = self.calculator.breakdown(entry, config).await;
        let decision = decide(entry, config, &breakdown);
        tracing::debug!(
            target: "filter",
            node = entry.node.index(),
            title = entry.title_text(),
            channel = %entry.channel,
            strength = breakdown.value,
            action = ?decision.action,
            "entry evaluated"
        );
        decision
    }

    /// Writes a decision to the tree. The entry is brought back to baseline
    /// first, so applying the same decision twice changes nothing.
    pub fn apply_decision(tree: &mut PageTree, entry: &Entry, decision: &FilterDecision) {
        if decision.action == FilterAction::Skip {
            return;
        }
        reset_visual_state(tree, entry);

        match decision.action {
            FilterAction::Reset | FilterAction::Skip => {}
            FilterAction::Blur { intensity_px } => {
                tree.set_style(entry.node, BLUR_VAR, &format!("{intensity_px}px"));
                for node in blur_targets(entry) {
                    tree.add_class(node, BLUR_CLASS);
                }
            }
            FilterAction::Hide => tree.set_style(entry.node, "display", "none"),
        }
        if let Some(annotation) = decision.annotation() {
            tree.set_attr(entry.node, REASON_ATTR, &annotation);
        }
    }
}

fn decide(entry: &Entry, config: &FilterConfiguration, breakdown: &StrengthBreakdown) -> FilterDecision {
    let strength = breakdown.value;
    if strength <= FLAG_THRESHOLD {
        return FilterDecision {
            action: FilterAction::Reset,
            confidence: strength,
            reasons: Vec::new(),
        };
    }

    let mut reasons = Vec::new();
    if let Some(keyword) = &breakdown.matched_keyword {
        reasons.push(format!("keyword:{keyword}"));
    }
    if let Some(score) = breakdown.classifier_score {
        reasons.push(format!("classifier:{}%", (score * 100.0).floor() as u32));
    }
    reasons.extend(analyze(entry).labels().into_iter().map(str::to_string));

    let action = if config.blur_enabled {
        FilterAction::Blur {
            intensity_px: (config.blur_amount_px as f64 * strength).floor() as u32,
        }
    } else {
        FilterAction::Hide
    };

    FilterDecision {
        action,
        confidence: strength,
        reasons,
    }
}

fn blur_targets(entry: &Entry) -> impl Iterator<Item = NodeId> + '_ {
    entry
        .title
        .as_ref()
        .map(|t| t.node)
        .into_iter()
        .chain(entry.thumbnail)
}

fn reset_visual_state(tree: &mut PageTree, entry: &Entry) {
    tree.remove_style(entry.node, "display");
    tree.remove_style(entry.node, BLUR_VAR);
    tree.remove_attr(entry.node, REASON_ATTR);
    for node in blur_targets(entry) {
        tree.remove_class(node, BLUR_CLASS);
    }
}
