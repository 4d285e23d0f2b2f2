//! Hosted text-classification endpoints as signal providers.
//!
//! The endpoint receives `{"inputs": text}` and answers with a list of
//! `{label, score}` candidates (optionally nested one level, as batch APIs
//! do). The top-scoring candidate is folded into a [`SentimentLabel`] via the
//! provider's [`LabelVocabulary`].

use std::time::Duration;

use crate::config::RemoteProviderConfig;

use super::{LabelVocabulary, SentimentVector, SignalError, SignalProvider, SignalResult};

/// A sync HTTP adapter for a label classifier.
pub struct RemoteLabelProvider {
    id: String,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    /// Shared by every request so connections are pooled.
    agent: ureq::Agent,
    vocabulary: LabelVocabulary,
}

impl RemoteLabelProvider {
    /// Build from config. Fails when the endpoint is blank or the token variable is unset.
    pub fn new(config: &RemoteProviderConfig) -> SignalResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(SignalError::Init {
                provider: config.id.clone(),
                message: "endpoint is empty".into(),
            });
        }

        let token = match &config.token_env {
            Some(var) => Some(std::env::var(var).map_err(|_| SignalError::MissingToken {
                provider: config.id.clone(),
                var: var.clone(),
            })?),
            None => None,
        };

        let vocabulary = config
            .labels
            .iter()
            .fold(LabelVocabulary::default(), |vocab, (raw, label)| {
                vocab.with(raw, *label)
            });

        let timeout = Duration::from_secs(config.timeout_secs);
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Ok(Self {
            id: config.id.clone(),
            endpoint: config.endpoint.clone(),
            token,
            timeout,
            agent,
            vocabulary,
        })
    }

    /// Per-request timeout the agent was built with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fold a response body into a vector.
    fn interpret(&self, body: &serde_json::Value) -> SignalResult<SentimentVector> {
        let candidates = label_scores(body).ok_or_else(|| SignalError::Response {
            provider: self.id.clone(),
            message: "expected a list of {label, score} objects".into(),
        })?;

        let (raw, score) = candidates
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| SignalError::Response {
                provider: self.id.clone(),
                message: "empty label list".into(),
            })?;

        let label = self
            .vocabulary
            .resolve(&raw)
            .ok_or_else(|| SignalError::UnknownLabel {
                provider: self.id.clone(),
                label: raw.clone(),
            })?;

        Ok(SentimentVector::from_label(label, score))
    }
}

impl SignalProvider for RemoteLabelProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn analyze(&self, text: &str) -> SignalResult<SentimentVector> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let resp = request
            .send_json(serde_json::json!({ "inputs": text }))
            .map_err(|e: ureq::Error| SignalError::Request {
                provider: self.id.clone(),
                message: e.to_string(),
            })?;

        let body: serde_json::Value = resp.into_json().map_err(|e| SignalError::Response {
            provider: self.id.clone(),
            message: e.to_string(),
        })?;

        self.interpret(&body)
    }
}

impl std::fmt::Debug for RemoteLabelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLabelProvider")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

/// Extract `(label, score)` pairs from `[{..}]` or `[[{..}]]`.
fn label_scores(body: &serde_json::Value) -> Option<Vec<(String, f64)>> {
    let mut list = body.as_array()?;
    if let Some(inner) = list.first().and_then(|v| v.as_array()) {
        list = inner;
    }
    list.iter()
        .map(|item| {
            let label = item.get("label")?.as_str()?.to_string();
            let score = item.get("score")?.as_f64()?;
            Some((label, score))
        })
        .collect()
}
