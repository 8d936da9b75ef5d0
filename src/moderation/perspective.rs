use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ModerationError, ToxicityScorer};

/// Client for the Perspective comment analyzer.
pub struct PerspectiveClient {
    client: Client,
    url: String,
    api_key: String,
}

impl PerspectiveClient {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, ModerationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, api_key })
    }
}

#[async_trait]
impl ToxicityScorer for PerspectiveClient {
    async fn score(&self, text: &str) -> Result<f64, ModerationError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(&analyze_request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(ModerationError::Api { status, body });
        }

        let body: Value = response.json().await?;
        toxicity_score(&body)
    }
}

fn analyze_request(text: &str) -> Value {
    json!({
        "comment": { "text": text },
        "requestedAttributes": { "TOXICITY": {} },
    })
}

/// Reads the first span score, falling back to the summary score.
fn toxicity_score(body: &Value) -> Result<f64, ModerationError> {
    let score = body
        .pointer("/attributeScores/TOXICITY/spanScores/0/score/value")
        .or_else(|| body.pointer("/attributeScores/TOXICITY/summaryScore/value"))
        .ok_or_else(|| ModerationError::MalformedResponse(format!("no TOXICITY score in {body}")))?
        .as_f64()
        .ok_or_else(|| ModerationError::MalformedResponse(format!("TOXICITY score in {body} is not a number")))?;

    if !(0.0..=1.0).contains(&score) {
        return Err(ModerationError::MalformedResponse(format!("TOXICITY score {score} out of range")));
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_toxicity_only() {
        assert_eq!(
            analyze_request("friendly greetings from rust"),
            json!({
                "comment": { "text": "friendly greetings from rust" },
                "requestedAttributes": { "TOXICITY": {} }
            })
        );
    }

    #[test]
    fn span_score_wins_over_summary() {
        let body = json!({
            "attributeScores": {
                "TOXICITY": {
                    "spanScores": [
                        { "begin": 0, "end": 21, "score": { "value": 0.87, "type": "PROBABILITY" } }
                    ],
                    "summaryScore": { "value": 0.8, "type": "PROBABILITY" }
                }
            },
            "languages": ["en"]
        });
        assert_eq!(toxicity_score(&body).unwrap(), 0.87);
    }

    #[test]
    fn summary_score_is_the_fallback() {
        let body = json!({
            "attributeScores": { "TOXICITY": { "summaryScore": { "value": 0.12 } } }
        });
        assert_eq!(toxicity_score(&body).unwrap(), 0.12);
    }

    #[test]
    fn missing_or_bogus_scores_are_malformed() {
        for body in [
            json!({}),
            json!({ "attributeScores": { "TOXICITY": { "summaryScore": { "value": "high" } } } }),
            json!({ "attributeScores": { "TOXICITY": { "summaryScore": { "value": 1.5 } } } }),
        ] {
            assert!(matches!(toxicity_score(&body), Err(ModerationError::MalformedResponse(_))));
        }
    }
}
