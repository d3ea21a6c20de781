//! Content assist via a Gemini-style generateContent REST API
//!
//! Thin stateless passthrough: prompts go out, JSON comes back. Nothing
//! here touches the database and no generated content is stored until the
//! caller saves it into a campaign.

use reqwest::Client;
use sentra_common::config::AiConfig;
use sentra_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// A generated email draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// AI-written narrative over a campaign's analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsReport {
    pub executive_summary: String,
    #[serde(default)]
    pub key_strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Raw generateContent response envelope
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the content assist endpoints
pub struct ContentClient {
    config: AiConfig,
    client: Client,
}

impl ContentClient {
    /// Build a client from configuration. Fails when the feature is
    /// enabled without an API key.
    pub fn new(config: AiConfig) -> Result<Self> {
        if config.enabled && config.api_key.is_none() {
            return Err(Error::Config(
                "AI assist is enabled but no API key is configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Whether the assist endpoints should be served at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.api_key.is_some()
    }

    /// Generate a full email draft from a brief
    pub async fn generate_email(
        &self,
        brief: &str,
        tone: Option<&str>,
        audience: Option<&str>,
    ) -> Result<GeneratedEmail> {
        let prompt = format!(
            "You are an assistant that writes marketing emails as HTML.\n\
             Write one email for the brief below.\n\
             Tone: {tone}\n\
             Audience: {audience}\n\
             Brief: {brief}\n\n\
             Return ONLY a JSON object with this exact shape, no markdown fences:\n\
             {{\"subject\": \"...\", \"html_body\": \"<full HTML string>\", \
             \"text_body\": \"<plain text fallback>\"}}\n\
             The HTML body should use <h2>, <p> and <ul> tags and close with a \
             polite sign-off.",
            tone = tone.unwrap_or("Professional"),
            audience = audience.unwrap_or("General subscribers"),
        );

        self.generate_json(&prompt).await
    }

    /// Generate candidate subject lines for a topic
    pub async fn subject_lines(&self, topic: &str, count: usize) -> Result<Vec<String>> {
        let count = count.clamp(1, 10);
        let prompt = format!(
            "Write {count} distinct subject lines for a marketing email about: \
             {topic}\n\n\
             Return ONLY a JSON array of {count} strings, no markdown fences.",
        );

        self.generate_json(&prompt).await
    }

    /// Narrate a campaign's analytics report
    pub async fn campaign_insights(
        &self,
        campaign_summary: &serde_json::Value,
        report: &serde_json::Value,
    ) -> Result<InsightsReport> {
        let prompt = format!(
            "You are an email marketing analyst. Review this campaign and its \
             analytics report and summarize how it performed.\n\n\
             Campaign: {campaign}\n\
             Report: {report}\n\n\
             Return ONLY a JSON object with this exact shape, no markdown fences:\n\
             {{\"executive_summary\": \"...\", \"key_strengths\": [\"...\"], \
             \"areas_for_improvement\": [\"...\"], \"recommendations\": [\"...\"]}}",
            campaign = campaign_summary,
            report = report,
        );

        self.generate_json(&prompt).await
    }

    /// One generateContent round trip, parsed as JSON of type T
    async fn generate_json<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let text = self.generate_text(prompt).await?;
        let cleaned = strip_code_fences(&text);

        serde_json::from_str(cleaned).map_err(|e| {
            warn!("Model returned unparseable JSON: {}", e);
            Error::Upstream("Model did not return valid JSON".to_string())
        })
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let api_key = match (&self.config.enabled, &self.config.api_key) {
            (true, Some(key)) => key,
            _ => {
                return Err(Error::Config(
                    "AI assist is not configured".to_string(),
                ))
            }
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            api_key
        );

        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.7 }
        });

        debug!(model = %self.config.model, "Requesting content generation");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!("Content generation request failed: {}", e);
                Error::Upstream(format!("AI provider unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("AI provider returned {}: {}", status, body);
            return Err(Error::Upstream(format!(
                "AI provider returned status {}",
                status
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse provider response: {}", e)))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Upstream("Provider response had no content".to_string()))?;

        Ok(text)
    }
}

/// Models wrap JSON in markdown fences despite instructions; tolerate it
fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> AiConfig {
        AiConfig {
            enabled: true,
            endpoint: endpoint.to_string(),
            api_key: Some("test-key".to_string()),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 5,
        }
    }

    fn provider_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1,2]\n```"), "[1,2]");
    }

    #[test]
    fn test_new_rejects_enabled_without_key() {
        let config = AiConfig {
            enabled: true,
            api_key: None,
            ..AiConfig::default()
        };
        assert!(ContentClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_generate_email_parses_model_json() {
        let server = MockServer::start().await;
        let draft = r#"```json
{"subject": "Spring sale", "html_body": "<p>Hi</p>", "text_body": "Hi"}
```"#;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_reply(draft)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ContentClient::new(config(&server.uri())).unwrap();
        let email = client
            .generate_email("announce the spring sale", Some("Friendly"), None)
            .await
            .unwrap();

        assert_eq!(email.subject, "Spring sale");
        assert_eq!(email.html_body, "<p>Hi</p>");
        assert_eq!(email.text_body.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_subject_lines_parses_array() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(provider_reply(r#"["One", "Two", "Three"]"#)),
            )
            .mount(&server)
            .await;

        let client = ContentClient::new(config(&server.uri())).unwrap();
        let lines = client.subject_lines("spring sale", 3).await.unwrap();
        assert_eq!(lines, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_provider_error_maps_to_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ContentClient::new(config(&server.uri())).unwrap();
        let err = client.subject_lines("topic", 3).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_unparseable_model_output_maps_to_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(provider_reply("not json at all")),
            )
            .mount(&server)
            .await;

        let client = ContentClient::new(config(&server.uri())).unwrap();
        let err = client
            .generate_email("brief", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_disabled_client_refuses_requests() {
        let client = ContentClient::new(AiConfig::default()).unwrap();
        assert!(!client.is_enabled());
        let err = client.subject_lines("topic", 3).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
