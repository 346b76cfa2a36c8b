use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use docsearch_core::config::TranscriptionSettings;
use docsearch_core::traits::Transcriber;
use docsearch_core::types::Transcript;

use crate::join_url;

/// Client for an OpenAI-compatible `/v1/audio/transcriptions` endpoint
/// (faster-whisper-server, whisper.cpp server, LocalAI).
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl HttpTranscriber {
    pub fn new(settings: &TranscriptionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url: settings.base_url.clone(), model: settings.model.clone() })
    }
}

fn parse_transcription(body: &str) -> Result<Transcript> {
    let parsed: VerboseTranscription = serde_json::from_str(body).context("Invalid JSON response")?;
    let detected_language = parsed.language.map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty());
    Ok(Transcript { text: parsed.text.trim().to_string(), detected_language })
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str, language: Option<&str>) -> Result<Transcript> {
        let bytes = audio.len();
        let mut form = Form::new()
            .part("file", Part::bytes(audio).file_name(file_name.to_string()))
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }
        tracing::debug!(file_name, bytes, model = %self.model, "transcription request");
        let response = self
            .client
            .post(join_url(&self.base_url, "/v1/audio/transcriptions"))
            .multipart(form)
            .send()
            .await
            .context("HTTP request failed")?;
        let status = response.status();
        let body = response.text().await.context("reading transcription response")?;
        if !status.is_success() {
            bail!("HTTP error {status}: {}", body.trim());
        }
        parse_transcription(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_transcription;

    #[test]
    fn verbose_json_yields_text_and_language() {
        let t = parse_transcription(r#"{"text":"  hello there ","language":"English","duration":1.2}"#).unwrap();
        assert_eq!(t.text, "hello there");
        assert_eq!(t.detected_language.as_deref(), Some("english"));
    }

    #[test]
    fn plain_json_without_language() {
        let t = parse_transcription(r#"{"text":"hola"}"#).unwrap();
        assert_eq!(t.detected_language, None);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_transcription("not json").is_err());
    }
}
