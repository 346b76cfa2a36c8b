use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docsearch_core::config::GenerationSettings;
use docsearch_core::traits::{GenerationRequest, Generator};
use docsearch_core::GenerationError;

use crate::join_url;

/// Generation through a local Ollama server (`/api/generate`, non-streaming).
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    connect_timeout: Duration,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> anyhow::Result<Self> {
        let connect_timeout = Duration::from_secs(settings.connect_timeout_secs.max(1));
        let client = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client, base_url: settings.base_url.clone(), model: settings.model.clone(), connect_timeout })
    }

    pub fn model(&self) -> &str { &self.model }

    fn transport_error(&self, e: &reqwest::Error, budget: Duration) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(budget)
        } else if e.is_connect() {
            GenerationError::Unavailable(format!("cannot reach {}: {e}", self.base_url))
        } else {
            GenerationError::Unavailable(e.to_string())
        }
    }
}

/// Maps a non-success status to a generation failure. Ollama answers 404 for unknown models.
fn classify_status(status: StatusCode, body: &str, model: &str) -> GenerationError {
    if status == StatusCode::NOT_FOUND && body.contains("not found") {
        return GenerationError::ModelMissing(model.to_string());
    }
    GenerationError::Unavailable(format!("HTTP error {status}: {}", body.trim()))
}

fn parse_generate_reply(body: &str) -> Result<String, GenerationError> {
    let reply: GenerateReply = serde_json::from_str(body).map_err(|e| GenerationError::MalformedResponse(format!("Invalid JSON response: {e}")))?;
    Ok(reply.response)
}

/// `llama3.2` matches `llama3.2` and `llama3.2:latest`.
fn model_listed(tags: &TagsReply, model: &str) -> bool {
    tags.models.iter().any(|m| m.name == model || m.name.strip_prefix(model).is_some_and(|rest| rest.starts_with(':')))
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn backend_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let body = GenerateBody { model: &self.model, prompt: request.render_prompt(), system: request.system_prompt, stream: false };
        tracing::debug!(model = %self.model, timeout_secs = request.timeout.as_secs(), prompt_chars = body.prompt.len(), "ollama generate");
        let response = self
            .client
            .post(join_url(&self.base_url, "/api/generate"))
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e, request.timeout))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(&e, request.timeout))?;
        if !status.is_success() {
            return Err(classify_status(status, &text, &self.model));
        }
        parse_generate_reply(&text)
    }

    async fn ping(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .get(join_url(&self.base_url, "/api/tags"))
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(&e, self.connect_timeout))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, &self.model));
        }
        let tags: TagsReply = response.json().await.map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        if model_listed(&tags, &self.model) { Ok(()) } else { Err(GenerationError::ModelMissing(self.model.clone())) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_model_maps_to_model_missing() {
        let err = classify_status(StatusCode::NOT_FOUND, r#"{"error":"model 'llama9' not found, try pulling it first"}"#, "llama9");
        assert!(matches!(err, GenerationError::ModelMissing(m) if m == "llama9"));
    }

    #[test]
    fn server_errors_map_to_unavailable() {
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom", "llama3.2");
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(parse_generate_reply(r#"{"model":"m","response":"42","done":true}"#).unwrap(), "42");
        assert!(matches!(parse_generate_reply("<html>"), Err(GenerationError::MalformedResponse(_))));
        assert!(matches!(parse_generate_reply(r#"{"done":true}"#), Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn tag_matching_accepts_default_tag() {
        let tags: TagsReply = serde_json::from_str(r#"{"models":[{"name":"llama3.2:latest"},{"name":"mistral:7b"}]}"#).unwrap();
        assert!(model_listed(&tags, "llama3.2"));
        assert!(model_listed(&tags, "mistral:7b"));
        assert!(!model_listed(&tags, "llama3"));
    }

    #[test]
    fn backend_id_names_model() {
        let g = OllamaGenerator::new(&GenerationSettings::default()).unwrap();
        assert_eq!(g.backend_id(), "ollama:llama3.2");
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let settings = GenerationSettings { base_url: "http://127.0.0.1:9".into(), connect_timeout_secs: 1, ..GenerationSettings::default() };
        let g = OllamaGenerator::new(&settings).unwrap();
        let req = GenerationRequest { system_prompt: "s", context: "c", question: "q", timeout: Duration::from_secs(2) };
        let err = g.generate(req).await.unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_) | GenerationError::Timeout(_)), "{err:?}");
    }
}
