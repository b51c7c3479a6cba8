//! Remote toxicity scorer client.
//!
//! Perspective-style API: one request per text, six requested attributes,
//! each answered with a 0..1 summary score. Any failure (network, quota,
//! missing key) degrades to all-zero scores so moderation never blocks on it.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::warn;

use crate::config::ToxicityConfig;

use super::ToxicityScores;

const REQUESTED_ATTRIBUTES: &[&str] = &[
    "TOXICITY",
    "INSULT",
    "THREAT",
    "SEXUALLY_EXPLICIT",
    "IDENTITY_ATTACK",
    "PROFANITY",
];

pub struct ToxicityClient {
    client: reqwest::Client,
    cfg: ToxicityConfig,
}

impl ToxicityClient {
    pub fn new(client: reqwest::Client, cfg: ToxicityConfig) -> Self {
        Self { client, cfg }
    }

    /// Score free text. Empty text or any upstream failure yields zeros.
    #[tracing::instrument(skip_all)]
    pub async fn score(&self, text: &str) -> ToxicityScores {
        if text.trim().is_empty() {
            return ToxicityScores::default();
        }
        match self.try_score(text).await {
            Ok(scores) => scores,
            Err(err) => {
                warn!("toxicity scorer unavailable, treating as no signal: {err:#}");
                ToxicityScores::default()
            }
        }
    }

    async fn try_score(&self, text: &str) -> anyhow::Result<ToxicityScores> {
        let key = self
            .cfg
            .api_key
            .as_deref()
            .context("no toxicity api key configured")?;

        let attributes: serde_json::Map<String, serde_json::Value> = REQUESTED_ATTRIBUTES
            .iter()
            .map(|a| ((*a).to_owned(), serde_json::json!({})))
            .collect();
        let body = serde_json::json!({
            "comment": { "text": text },
            "languages": ["es", "en"],
            "requestedAttributes": attributes,
        });

        let res = self
            .client
            .post(format!("{}?key={key}", self.cfg.endpoint))
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .json(&body)
            .send()
            .await
            .context("toxicity request failed")?
            .error_for_status()
            .context("toxicity scorer returned an error status")?;

        let response: AnalyzeResponse = res.json().await.context("invalid toxicity response")?;
        Ok(from_attribute_scores(&response.attribute_scores))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(default)]
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f32,
}

/// Absent attributes default to 0.
fn from_attribute_scores(scores: &HashMap<String, AttributeScore>) -> ToxicityScores {
    let value = |name: &str| scores.get(name).map_or(0.0, |s| s.summary_score.value);
    ToxicityScores {
        toxicity: value("TOXICITY"),
        insult: value("INSULT"),
        threat: value("THREAT"),
        sexually_explicit: value("SEXUALLY_EXPLICIT"),
        identity_attack: value("IDENTITY_ATTACK"),
        profanity: value("PROFANITY"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_scores() {
        let body = r#"{
            "attributeScores": {
                "TOXICITY": { "summaryScore": { "value": 0.82, "type": "PROBABILITY" } },
                "INSULT": { "summaryScore": { "value": 0.77 } },
                "THREAT": { "summaryScore": { "value": 0.12 } }
            },
            "languages": ["es"]
        }"#;
        let parsed: AnalyzeResponse = serde_json::from_str(body).unwrap();
        let scores = from_attribute_scores(&parsed.attribute_scores);
        assert!((scores.toxicity - 0.82).abs() < 1e-6);
        assert!((scores.insult - 0.77).abs() < 1e-6);
        assert!((scores.threat - 0.12).abs() < 1e-6);
        // Absent attributes default to zero.
        assert_eq!(scores.profanity, 0.0);
        assert_eq!(scores.identity_attack, 0.0);
    }

    #[test]
    fn empty_response_is_all_zeroes() {
        let parsed: AnalyzeResponse = serde_json::from_str("{}").unwrap();
        let scores = from_attribute_scores(&parsed.attribute_scores);
        assert_eq!(scores.max_attribute(), 0.0);
    }
}
