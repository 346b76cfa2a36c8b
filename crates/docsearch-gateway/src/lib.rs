//! docsearch-gateway
//!
//! HTTP clients for the external model services: an Ollama generation
//! backend and an OpenAI-compatible transcription endpoint.

pub mod ollama;
pub mod transcribe;

pub use ollama::OllamaGenerator;
pub use transcribe::HttpTranscriber;

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::join_url;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://localhost:11434/", "/api/generate"), "http://localhost:11434/api/generate");
        assert_eq!(join_url("http://h", "api/tags"), "http://h/api/tags");
    }
}
