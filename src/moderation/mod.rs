//! Toxicity screening for message bodies.
//!
//! [`Moderation`] owns the policy: which score counts as toxic and what to
//! do when the scorer cannot answer. The scoring itself sits behind
//! [`ToxicityScorer`] so the HTTP client can be swapped out in tests.

mod perspective;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use perspective::PerspectiveClient;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("no moderation API key configured")]
    NotConfigured,

    #[error("moderation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("moderation API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("malformed moderation response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Returns a toxicity score in `[0, 1]` for `text`.
    async fn score(&self, text: &str) -> Result<f64, ModerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Allowed,
    Toxic(f64),
    /// The scorer failed and the policy is fail-closed.
    Unavailable,
}

#[derive(Clone)]
pub struct Moderation {
    scorer: Option<Arc<dyn ToxicityScorer>>,
    threshold: f64,
    fail_open: bool,
}

impl Moderation {
    pub fn new(scorer: Option<Arc<dyn ToxicityScorer>>, threshold: f64, fail_open: bool) -> Self {
        Self { scorer, threshold, fail_open }
    }

    /// Scores `text` and applies the threshold. Only a score strictly above
    /// the threshold is toxic.
    pub async fn screen(&self, text: &str) -> Verdict {
        let score = match &self.scorer {
            Some(scorer) => scorer.score(text).await,
            None => Err(ModerationError::NotConfigured),
        };

        match score {
            Ok(score) if score > self.threshold => Verdict::Toxic(score),
            Ok(_) => Verdict::Allowed,
            Err(e) if self.fail_open => {
                warn!("moderation unavailable, letting message through: {e}");
                Verdict::Allowed
            }
            Err(e) => {
                warn!("moderation unavailable, rejecting message: {e}");
                Verdict::Unavailable
            }
        }
    }
}
