//! Persistent translation memory.
//!
//! Maps (source text, source language, target language) to a previously
//! obtained translation so repeated phrases across files and mods are
//! translated once. The store is loaded explicitly at startup and flushed at
//! commit boundaries; between those points it serves concurrent lookups from
//! in-flight units behind a reader/writer lock.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::ai::ProviderId;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is corrupt: {0}")]
    Corrupt(String),
}

/// Deduplication identity of a translation request.
///
/// Two units with an identical key must resolve to the same cached
/// translation. The text is normalized by trimming surrounding whitespace.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationKey {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl TranslationKey {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }
}

/// A completed translation. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub translated_text: String,
    pub provider_id: ProviderId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    key: TranslationKey,
    #[serde(flatten)]
    record: TranslationRecord,
}

/// Cache hit/miss counters for reporting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

pub struct TranslationCache {
    entries: RwLock<HashMap<TranslationKey, TranslationRecord>>,
    path: Option<PathBuf>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TranslationCache {
    /// A cache with no backing file; `flush` is a no-op.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Loads the cache from a JSON file. A missing file yields an empty
    /// cache; a present-but-unreadable one is an error so a corrupt memory
    /// is never silently discarded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let mut entries = HashMap::new();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let stored: Vec<StoredEntry> = serde_json::from_str(&contents)
                    .map_err(|e| CacheError::Corrupt(e.to_string()))?;
                for entry in stored {
                    entries.insert(entry.key, entry.record);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    pub fn lookup(&self, key: &TranslationKey) -> Option<TranslationRecord> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a record. Storing the same translation twice is a no-op;
    /// storing a different translation for an existing key overwrites it as
    /// a correction.
    pub fn store(&self, key: TranslationKey, record: TranslationRecord) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            if existing.translated_text == record.translated_text {
                return;
            }
            debug!(
                "cache correction for {:?}->{:?}: {:?} replaces {:?}",
                key.source_lang, key.target_lang, record.provider_id, existing.provider_id
            );
        }
        entries.insert(key, record);
    }

    /// Writes the cache to its backing file via a temp-file rename.
    pub fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut stored: Vec<StoredEntry> = {
            let entries = self.entries.read();
            entries
                .iter()
                .map(|(key, record)| StoredEntry {
                    key: key.clone(),
                    record: record.clone(),
                })
                .collect()
        };
        stored.sort_by(|a, b| {
            (&a.key.source_lang, &a.key.target_lang, &a.key.text).cmp(&(
                &b.key.source_lang,
                &b.key.target_lang,
                &b.key.text,
            ))
        });

        let serialized = serde_json::to_vec_pretty(&stored)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serialized)?;
        if let Err(err) = fs::rename(&tmp, path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!("failed to remove temp cache file: {cleanup}");
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Removes every record produced by the given provider. Returns the
    /// number of purged entries.
    pub fn purge_provider(&self, provider_id: ProviderId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, record| record.provider_id != provider_id);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(text: &str, provider_id: ProviderId) -> TranslationRecord {
        TranslationRecord {
            translated_text: text.to_string(),
            provider_id,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn lookup_after_store() {
        let cache = TranslationCache::in_memory();
        let key = TranslationKey::new("Hello", "en", "ru");
        assert!(cache.lookup(&key).is_none());

        cache.store(key.clone(), record("Привет", ProviderId::Google));
        let found = cache.lookup(&key).unwrap();
        assert_eq!(found.translated_text, "Привет");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn key_normalizes_surrounding_whitespace() {
        let a = TranslationKey::new("  Hello ", "en", "ru");
        let b = TranslationKey::new("Hello", "en", "ru");
        assert_eq!(a, b);
    }

    #[test]
    fn storing_identical_value_is_a_no_op() {
        let cache = TranslationCache::in_memory();
        let key = TranslationKey::new("Hello", "en", "ru");
        let first = record("Привет", ProviderId::Google);
        cache.store(key.clone(), first.clone());
        cache.store(key.clone(), record("Привет", ProviderId::MyMemory));

        // same text: first record wins, provider untouched
        let found = cache.lookup(&key).unwrap();
        assert_eq!(found.provider_id, ProviderId::Google);
    }

    #[test]
    fn storing_different_value_overwrites() {
        let cache = TranslationCache::in_memory();
        let key = TranslationKey::new("Hello", "en", "ru");
        cache.store(key.clone(), record("Привет", ProviderId::Google));
        cache.store(key.clone(), record("Здравствуйте", ProviderId::MyMemory));

        let found = cache.lookup(&key).unwrap();
        assert_eq!(found.translated_text, "Здравствуйте");
        assert_eq!(found.provider_id, ProviderId::MyMemory);
    }

    #[test]
    fn purge_removes_only_matching_provider() {
        let cache = TranslationCache::in_memory();
        cache.store(
            TranslationKey::new("a", "en", "ru"),
            record("x", ProviderId::Google),
        );
        cache.store(
            TranslationKey::new("b", "en", "ru"),
            record("y", ProviderId::MyMemory),
        );

        assert_eq!(cache.purge_provider(ProviderId::Google), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache
            .lookup(&TranslationKey::new("b", "en", "ru"))
            .is_some());
    }

    #[test]
    fn flush_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("translation_memory.json");

        let cache = TranslationCache::load(&path).unwrap();
        assert!(cache.is_empty());
        cache.store(
            TranslationKey::new("Hello", "en", "ru"),
            record("Привет", ProviderId::Google),
        );
        cache.flush().unwrap();

        let reloaded = TranslationCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let found = reloaded
            .lookup(&TranslationKey::new("Hello", "en", "ru"))
            .unwrap();
        assert_eq!(found.translated_text, "Привет");
        assert_eq!(found.provider_id, ProviderId::Google);
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("translation_memory.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            TranslationCache::load(&path),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn in_memory_flush_is_a_no_op() {
        let cache = TranslationCache::in_memory();
        cache.store(
            TranslationKey::new("a", "en", "ru"),
            record("x", ProviderId::Google),
        );
        cache.flush().unwrap();
    }
}
