//! MyMemory backend (`api.mymemory.translated.net`).
//!
//! MyMemory reports most failures inside a 200 body via `responseStatus`,
//! so the body status is mapped back onto the normal error classes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::pacer::RequestPacer;
use super::{http_error, network_error, ProviderError, ProviderId, TranslationProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.mymemory.translated.net";

pub struct MyMemoryProvider {
    http: reqwest::Client,
    pacer: Arc<RequestPacer>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: Option<ResponseData>,
    #[serde(rename = "responseStatus")]
    response_status: Value,
    #[serde(rename = "responseDetails", default)]
    response_details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

impl MyMemoryProvider {
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

        let url = format!("{}/get", self.base_url);
        let langpair = format!("{source_lang}|{target_lang}");
        let response = self
            .http
            .get(&url)
            .query(&[("q", text), ("langpair", &langpair)])
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let payload: MyMemoryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parse_payload(payload)
    }
}

fn parse_payload(payload: MyMemoryResponse) -> Result<String, ProviderError> {
    let status = body_status(&payload.response_status);
    let details = payload.response_details.unwrap_or_default();

    match status {
        Some(200) => {}
        Some(429) => {
            return Err(ProviderError::Http {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: details,
                retry_after: None,
            });
        }
        Some(other) => {
            return Err(ProviderError::Malformed(format!(
                "responseStatus {other}: {details}"
            )));
        }
        None => {
            return Err(ProviderError::Malformed("missing responseStatus".into()));
        }
    }

    let translated = payload
        .response_data
        .and_then(|data| data.translated_text)
        .unwrap_or_default();
    if translated.trim().is_empty() {
        Err(ProviderError::Malformed("empty translation".into()))
    } else {
        Ok(translated)
    }
}

// responseStatus arrives as a number or a quoted number
fn body_status(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[async_trait]
impl TranslationProvider for MyMemoryProvider {
    fn id(&self) -> ProviderId {
        ProviderId::MyMemory
    }

    fn max_text_len(&self) -> usize {
        500
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
