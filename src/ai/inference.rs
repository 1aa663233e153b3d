use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier returned status {0}")]
    Status(StatusCode),
    #[error("classifier response malformed: {0}")]
    Malformed(String),
}

pub fn build_request<'a>(text: &'a str, spoiler_label: &'a str, general_label: &'a str) -> ZeroShotRequest<'a> {
    ZeroShotRequest {
        inputs: text,
        parameters: ZeroShotParameters {
            candidate_labels: [spoiler_label, general_label],
        },
    }
}

pub async fn parse_response(response: Response, spoiler_label: &str) -> Result<f64, ClassifierError> {
    let body = response.text().await?;
    let parsed: ZeroShotPayload =
        serde_json::from_str(&body).map_err(|err| ClassifierError::Malformed(err.to_string()))?;
    spoiler_score(parsed, spoiler_label)
}

/// Picks the spoiler label's score. Without a `labels` array the scores are
/// taken to be aligned with the candidate labels, spoiler first.
pub fn spoiler_score(payload: ZeroShotPayload, spoiler_label: &str) -> Result<f64, ClassifierError> {
    let result = match payload {
        ZeroShotPayload::Single(result) => result,
        ZeroShotPayload::Batch(results) => results
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::Malformed("empty result batch".into()))?,
    };

    let index = match &result.labels {
        Some(labels) => labels
            .iter()
            .position(|label| label == spoiler_label)
            .ok_or_else(|| {
                ClassifierError::Malformed(format!("label {spoiler_label:?} missing from response"))
            })?,
        None => 0,
    };

    let score = result
        .scores
        .get(index)
        .copied()
        .ok_or_else(|| ClassifierError::Malformed("score array too short".into()))?;
    if !score.is_finite() {
        return Err(ClassifierError::Malformed(format!("non-finite score {score}")));
    }
    Ok(score.clamp(0.0, 1.0))
}

#[derive(Debug, Serialize)]
pub struct ZeroShotRequest<'a> {
    pub inputs: &'a str,
    pub parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct ZeroShotParameters<'a> {
    pub candidate_labels: [&'a str; 2],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ZeroShotPayload {
    Single(ZeroShotResult),
    Batch(Vec<ZeroShotResult>),
}

#[derive(Debug, Deserialize)]
pub struct ZeroShotResult {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    pub scores: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: serde_json::Value) -> ZeroShotPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(build_request("最終回", "spoiler", "general")).unwrap();
        assert_eq!(
            body,
            json!({
                "inputs": "最終回",
                "parameters": { "candidate_labels": ["spoiler", "general"] }
            })
        );
    }

    #[test]
    fn uses_first_score_without_labels() {
        let score = spoiler_score(payload(json!({ "scores": [0.7, 0.3] })), "spoiler").unwrap();
        assert!((score - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn follows_label_order_when_present() {
        let score = spoiler_score(
            payload(json!({ "labels": ["general", "spoiler"], "scores": [0.9, 0.1] })),
            "spoiler",
        )
        .unwrap();
        assert!((score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn accepts_batched_payload() {
        let score = spoiler_score(
            payload(json!([{ "labels": ["spoiler", "general"], "scores": [0.55, 0.45] }])),
            "spoiler",
        )
        .unwrap();
        assert!((score - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_empty_scores() {
        let err = spoiler_score(payload(json!({ "scores": [] })), "spoiler").unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
        let err = spoiler_score(payload(json!([])), "spoiler").unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }
}
