//! Capability interface over classifier back-ends.
//!
//! Realizes the "Polymorphism over classifier back-ends" redesign note as a
//! single `Classify` trait with adapters behind it — mirrors the teacher's
//! `BackendClient` enum-over-adapters pattern in `backends/mod.rs` (one call
//! surface, per-provider adapter struct), generalized here from "LLM
//! provider" to "signal source". Both `EXTERNAL_CLASSIFICATION_API_URL` and
//! the local-LLM second-opinion endpoint are "HTTP JSON, expect a
//! probability", so one `HttpClassifier` adapter serves both.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::error::ClassifyError;

/// Feature vector handed to a classifier — the request-shaped facts the
/// Scorer has already gathered, serialized as JSON for the HTTP adapters.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    pub ip: String,
    pub user_agent: String,
    pub path: String,
    pub requests_last_minute: u64,
    pub missing_accept_language: bool,
    pub missing_referrer: bool,
}

#[async_trait]
pub trait Classify: Send + Sync {
    /// Returns a probability in `[0, 1]` that the request is automated.
    async fn classify(&self, features: &FeatureVector) -> Result<f32, ClassifyError>;
}

/// Generic JSON-POST classifier adapter: `POST {url}` with the feature
/// vector as the body, expects `{"probability": <f32>}` back.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), url, timeout }
    }
}

#[derive(serde::Deserialize)]
struct ClassifyResponse {
    probability: f32,
}

#[async_trait]
impl Classify for HttpClassifier {
    async fn classify(&self, features: &FeatureVector) -> Result<f32, ClassifyError> {
        let call = self.client.post(&self.url).json(features).send();
        let response = tokio::time::timeout(self.timeout, call).await.map_err(|_| ClassifyError::Timeout)??;
        let body: ClassifyResponse = response.json().await.map_err(|_| ClassifyError::BadResponse)?;
        Ok(body.probability.clamp(0.0, 1.0))
    }
}

/// No-op adapter used when the corresponding URL is unset — contributes
/// nothing and never makes a network call.
pub struct NoopClassifier;

#[async_trait]
impl Classify for NoopClassifier {
    async fn classify(&self, _features: &FeatureVector) -> Result<f32, ClassifyError> {
        Ok(0.0)
    }
}

/// Builds a plain JSON payload for the LLM second-opinion endpoint, which
/// speaks a slightly different shape (`{"verdict": "bot"|"human"}`) than the
/// probability-returning classifier endpoint.
pub async fn llm_second_opinion(
    client: &reqwest::Client,
    url: &str,
    model: Option<&str>,
    timeout: Duration,
    features: &FeatureVector,
) -> Result<f32, ClassifyError> {
    #[derive(Serialize)]
    struct Request<'a> {
        model: Option<&'a str>,
        features: &'a FeatureVector,
    }
    #[derive(serde::Deserialize)]
    struct Response {
        verdict: String,
    }

    let call = client.post(url).json(&Request { model, features }).send();
    let response = tokio::time::timeout(timeout, call).await.map_err(|_| ClassifyError::Timeout)??;
    let body: Response = response.json().await.map_err(|_| ClassifyError::BadResponse)?;

    Ok(match body.verdict.as_str() {
        "bot" => 0.1,
        "human" => -0.1,
        _ => 0.0,
    })
}

/// Shape of the fire-and-forget IP reputation call, separated from
/// `Classify` since it answers a different question ("is this IP known
/// malicious") rather than "classify this request".
pub async fn ip_reputation(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    ip: &str,
) -> Result<f32, ClassifyError> {
    #[derive(serde::Deserialize)]
    struct Response {
        malicious_score: f32,
    }

    let call = client.get(url).query(&[("ip", ip)]).send();
    let response = tokio::time::timeout(timeout, call).await.map_err(|_| ClassifyError::Timeout)??;
    let body: Response = response.json().await.map_err(|_| ClassifyError::BadResponse)?;
    Ok(body.malicious_score.clamp(0.0, 1.0))
}

#[cfg(test)]
pub fn sample_features() -> FeatureVector {
    FeatureVector {
        ip: "203.0.113.5".into(),
        user_agent: "curl/8.0".into(),
        path: "/".into(),
        requests_last_minute: 1,
        missing_accept_language: true,
        missing_referrer: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_classifier_always_contributes_zero() {
        let classifier = NoopClassifier;
        let score = classifier.classify(&sample_features()).await.unwrap();
        assert_eq!(score, 0.0);
    }
}
