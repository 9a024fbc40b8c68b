//! Google web-endpoint backend (`translate_a/single?client=gtx`).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::pacer::RequestPacer;
use super::{http_error, network_error, ProviderError, ProviderId, TranslationProvider};

pub const DEFAULT_BASE_URL: &str = "https://translate.googleapis.com";

pub struct GoogleProvider {
    http: reqwest::Client,
    pacer: Arc<RequestPacer>,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client, pacer: Arc<RequestPacer>) -> Self {
        Self {
            http,
            pacer,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the provider at a different host; used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn translate_one(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError> {
        self.pacer.acquire().await;

        let url = format!("{}/translate_a/single", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("dt", "t"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("q", text),
            ])
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parse_payload(&payload)
    }
}

// Response shape: [[["chunk", "source chunk", ...], ...], null, "en", ...]
fn parse_payload(payload: &Value) -> Result<String, ProviderError> {
    let chunks = payload
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Malformed("missing translation chunks".into()))?;

    let mut out = String::new();
    for chunk in chunks {
        if let Some(part) = chunk.get(0).and_then(Value::as_str) {
            out.push_str(part);
        }
    }

    if out.is_empty() {
        Err(ProviderError::Malformed("empty translation".into()))
    } else {
        Ok(out)
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn max_text_len(&self) -> usize {
        4500
    }

    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.translate_one(text, source_lang, target_lang).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoogleProvider {
        GoogleProvider::new(
            reqwest::Client::new(),
            Arc::new(RequestPacer::unlimited()),
        )
        .with_base_url(server.uri())
    }

    #[test]
    fn concatenates_sentence_chunks() {
        let payload = json!([
            [["Привет, мир. ", "Hello world. ", null], ["Пока.", "Bye.", null]],
            null,
            "en"
        ]);
        assert_eq!(parse_payload(&payload).unwrap(), "Привет, мир. Пока.");
    }

    #[test]
    fn rejects_unexpected_payloads() {
        assert!(parse_payload(&json!({"error": 1})).is_err());
        assert!(parse_payload(&json!([[]])).is_err());
    }

    #[tokio::test]
    async fn translates_a_batch_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("q", "Hello"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([[["Привет", "Hello"]], null])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("q", "Bye"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([[["Пока", "Bye"]], null])),
            )
            .mount(&server)
            .await;

        let texts = vec!["Hello".to_string(), "Bye".to_string()];
        let out = provider(&server).translate(&texts, "en", "ru").await.unwrap();
        assert_eq!(out, vec!["Привет", "Пока"]);
    }

    #[tokio::test]
    async fn surfaces_rate_limit_with_retry_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("Retry-After", "7"),
            )
            .mount(&server)
            .await;

        let texts = vec!["Hello".to_string()];
        let err = provider(&server)
            .translate(&texts, "en", "ru")
            .await
            .unwrap_err();
        match err {
            ProviderError::Http {
                status,
                retry_after,
                ..
            } => {
                assert_eq!(status, reqwest::StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }
}
