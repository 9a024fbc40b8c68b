//! Provider-facing translation client.
//!
//! Wraps a provider behind a uniform batch contract: requests are validated
//! up front, grouped by language pair, chunked to size and byte limits, and
//! dispatched with bounded retry. Results come back one per request in
//! request order. Provider output that loses protected markup is rejected
//! and retried like any other transient failure.

use chrono::Utc;
use log::{debug, warn};
use std::collections::HashMap;
use thiserror::Error;

use crate::ai::retry::{self, RetryPolicy};
use crate::ai::{ProviderError, ProviderId, TranslationProvider};
use crate::cache::{TranslationKey, TranslationRecord};
use crate::protector;

#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    /// Malformed input; fails fast without consuming a retry.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider could not be made to answer within the retry budget.
    #[error("provider unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Every attempt dropped protected markup from the translation.
    #[error("translation lost protected tokens: {0:?}")]
    PlaceholderMismatch(Vec<String>),
}

/// Bounds on a single provider call.
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    pub max_items: usize,
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_items: 8,
            max_bytes: 16 * 1024,
        }
    }
}

pub struct TranslationClient {
    provider: Box<dyn TranslationProvider>,
    policy: RetryPolicy,
    limits: BatchLimits,
}

impl TranslationClient {
    pub fn new(
        provider: Box<dyn TranslationProvider>,
        policy: RetryPolicy,
        limits: BatchLimits,
    ) -> Self {
        Self {
            provider,
            policy,
            limits,
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    /// Translates a set of requests, returning one result per request in
    /// request order.
    pub async fn translate_batch(
        &self,
        keys: &[TranslationKey],
    ) -> Vec<Result<TranslationRecord, TranslationError>> {
        let mut results: Vec<Option<Result<TranslationRecord, TranslationError>>> =
            (0..keys.len()).map(|_| None).collect();

        // group valid requests by language pair, preserving order
        let mut groups: Vec<((String, String), Vec<usize>)> = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            if let Err(error) = validate(key) {
                results[index] = Some(Err(error));
                continue;
            }
            let pair = (key.source_lang.clone(), key.target_lang.clone());
            match groups.iter_mut().find(|(p, _)| *p == pair) {
                Some((_, members)) => members.push(index),
                None => groups.push((pair, vec![index])),
            }
        }

        for (_, members) in &groups {
            for batch in chunk_by_limits(members, keys, self.limits) {
                let outcomes = self.run_batch(&batch, keys).await;
                for (index, outcome) in outcomes {
                    results[index] = Some(outcome);
                }
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(TranslationError::Unavailable {
                        attempts: 0,
                        reason: "request was not dispatched".into(),
                    })
                })
            })
            .collect()
    }

    async fn run_batch(
        &self,
        indices: &[usize],
        keys: &[TranslationKey],
    ) -> HashMap<usize, Result<TranslationRecord, TranslationError>> {
        let mut outcomes = HashMap::new();
        let Some(&first) = indices.first() else {
            return outcomes;
        };
        let source_lang = keys[first].source_lang.clone();
        let target_lang = keys[first].target_lang.clone();

        let mut remaining: Vec<usize> = indices.to_vec();
        let mut attempts: u32 = 0;

        loop {
            let texts: Vec<String> = remaining
                .iter()
                .map(|&i| truncate_to(&keys[i].text, self.provider.max_text_len()).to_string())
                .collect();

            let response = match self
                .provider
                .translate(&texts, &source_lang, &target_lang)
                .await
            {
                Ok(translations) if translations.len() == texts.len() => Ok(translations),
                Ok(translations) => Err(ProviderError::Malformed(format!(
                    "expected {} translations, got {}",
                    texts.len(),
                    translations.len()
                ))),
                Err(error) => Err(error),
            };

            match response {
                Ok(translations) => {
                    let mut mismatched: Vec<(usize, Vec<String>)> = Vec::new();
                    for (&index, translated) in remaining.iter().zip(&translations) {
                        match protector::verify_protected(&keys[index].text, translated) {
                            Ok(()) => {
                                outcomes.insert(
                                    index,
                                    Ok(TranslationRecord {
                                        translated_text: translated.clone(),
                                        provider_id: self.provider.id(),
                                        timestamp: Utc::now(),
                                    }),
                                );
                            }
                            Err(missing) => mismatched.push((index, missing)),
                        }
                    }

                    if mismatched.is_empty() {
                        break;
                    }
                    if attempts >= self.policy.max_retries {
                        for (index, missing) in mismatched {
                            warn!(
                                "giving up on unit after {} attempt(s): lost tokens {:?}",
                                attempts + 1,
                                missing
                            );
                            outcomes
                                .insert(index, Err(TranslationError::PlaceholderMismatch(missing)));
                        }
                        break;
                    }

                    remaining = mismatched.into_iter().map(|(index, _)| index).collect();
                    let delay = retry::with_jitter(self.policy.delay_for(attempts));
                    attempts += 1;
                    debug!(
                        "retrying {} unit(s) that lost protected tokens (attempt {})",
                        remaining.len(),
                        attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    let decision = retry::evaluate_retry(&error, &self.policy, attempts);
                    if decision.should_retry {
                        attempts += 1;
                        warn!(
                            "provider call failed ({error}); retry {attempts}/{} in {:?}",
                            self.policy.max_retries, decision.delay
                        );
                        tokio::time::sleep(retry::with_jitter(decision.delay)).await;
                    } else {
                        let reason = error.to_string();
                        for &index in &remaining {
                            outcomes.insert(
                                index,
                                Err(TranslationError::Unavailable {
                                    attempts: attempts + 1,
                                    reason: reason.clone(),
                                }),
                            );
                        }
                        break;
                    }
                }
            }
        }

        outcomes
    }
}

fn validate(key: &TranslationKey) -> Result<(), TranslationError> {
    if key.text.trim().is_empty() {
        return Err(TranslationError::InvalidRequest("empty source text".into()));
    }
    if key.source_lang.trim().is_empty() || key.target_lang.trim().is_empty() {
        return Err(TranslationError::InvalidRequest(
            "missing language code".into(),
        ));
    }
    if key.source_lang == key.target_lang {
        return Err(TranslationError::InvalidRequest(format!(
            "language pair {}->{} has nothing to translate",
            key.source_lang, key.target_lang
        )));
    }
    Ok(())
}

fn chunk_by_limits(
    indices: &[usize],
    keys: &[TranslationKey],
    limits: BatchLimits,
) -> Vec<Vec<usize>> {
    let max_items = limits.max_items.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut bytes = 0usize;

    for &index in indices {
        let len = keys[index].text.len();
        if !current.is_empty() && (current.len() >= max_items || bytes + len > limits.max_bytes) {
            batches.push(std::mem::take(&mut current));
            bytes = 0;
        }
        current.push(index);
        bytes += len;
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn truncate_to(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
