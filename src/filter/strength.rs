use std::sync::Arc;

use crate::{ai::ClassifierClient, domain::FilterConfiguration};

use super::context::Entry;

/// Score contributed by a keyword hit on its own.
pub const KEYWORD_BASE_SCORE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct StrengthBreakdown {
    pub value: f64,
    pub matched_keyword: Option<String>,
    pub classifier_score: Option<f64>,
}

impl StrengthBreakdown {
    fn zero() -> Self {
        Self {
            value: 0.0,
            matched_keyword: None,
            classifier_score: None,
        }
    }
}

/// Blends keyword evidence with the optional classifier signal.
#[derive(Clone, Default)]
pub struct StrengthCalculator {
    classifier: Option<Arc<ClassifierClient>>,
}

impl StrengthCalculator {
    pub fn new(classifier: Arc<ClassifierClient>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    pub async fn breakdown(&self, entry: &Entry, config: &FilterConfiguration) -> StrengthBreakdown {
        if config.keywords.is_empty() {
            return StrengthBreakdown::zero();
        }
        let title = entry.title_text();
        let Some(keyword) = config.keywords.first_match(title) else {
            // Only keyword hits are worth spending classifier quota on.
            return StrengthBreakdown::zero();
        };
        let base = KEYWORD_BASE_SCORE;

        let classifier_score = match &self.classifier {
            Some(client) => client.score(title, config.classifier_access()).await,
            None => None,
        };
        let value = match classifier_score {
            Some(score) => (base + score) / 2.0,
            None => base,
        };

        StrengthBreakdown {
            value: value.clamp(0.0, 1.0),
            matched_keyword: Some(keyword.to_string()),
            classifier_score,
        }
    }
}
