//! Translation provider backends.
//!
//! A provider is polymorphic over one capability: translate a batch of texts
//! for a language pair. Concrete backends differ only in wire protocol and
//! limits, so they can be substituted without touching the pipeline.

pub mod google;
pub mod mymemory;
pub mod pacer;
pub mod retry;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use pacer::RequestPacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Google,
    MyMemory,
}

impl ProviderId {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::Google => "Google",
            ProviderId::MyMemory => "MyMemory",
        }
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "google" => Ok(ProviderId::Google),
            "mymemory" => Ok(ProviderId::MyMemory),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Error classes a backend can report. The retry policy decides which are
/// transient.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http {
        status: StatusCode,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Upper bound on a single text's length in bytes; longer inputs are
    /// truncated by the caller before dispatch.
    fn max_text_len(&self) -> usize;

    /// Translates a batch of texts, one result per input, order-preserving.
    /// A failure aborts the whole call; partial results are never returned.
    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Builds the configured backend. The pacer is shared so every HTTP request
/// the backend makes respects the same rate ceiling.
pub fn build_provider(
    id: ProviderId,
    http: reqwest::Client,
    pacer: Arc<RequestPacer>,
) -> Box<dyn TranslationProvider> {
    match id {
        ProviderId::Google => Box::new(google::GoogleProvider::new(http, pacer)),
        ProviderId::MyMemory => Box::new(mymemory::MyMemoryProvider::new(http, pacer)),
    }
}

pub(crate) fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network(err.to_string())
}

/// Converts a non-success response into a [`ProviderError::Http`], reading
/// the `Retry-After` header when the server sent one.
pub(crate) async fn http_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| retry::parse_retry_after(value, std::time::SystemTime::now()));
    let message = match response.text().await {
        Ok(body) => truncate_body(&body),
        Err(_) => String::from("<unreadable body>"),
    };
    ProviderError::Http {
        status,
        message,
        retry_after,
    }
}

fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_parses_case_insensitively() {
        assert_eq!(ProviderId::try_from("Google"), Ok(ProviderId::Google));
        assert_eq!(ProviderId::try_from("mymemory"), Ok(ProviderId::MyMemory));
        assert!(ProviderId::try_from("deepl").is_err());
    }

    #[test]
    fn provider_id_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProviderId::MyMemory).unwrap(),
            "\"my_memory\""
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let truncated = truncate_body(&body);
        assert!(truncated.len() < 210);
        assert!(truncated.ends_with('…'));
    }
}
