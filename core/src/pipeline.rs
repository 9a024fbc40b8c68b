//! Pipeline coordinator.
//!
//! Drives Extractor → Cache lookup → Client → Merge across a set of mod
//! files. Each file runs an independent state machine
//! (`Extracting → LookupPending → Translating → Merging → Done`, with
//! `Failed` reachable from extraction, merging, and cancellation); unit
//! failures degrade a file, they never fail it, and file failures never
//! abort the batch. Across the whole batch at most one provider request is
//! issued per distinct translation key.

use chrono::Utc;
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::cache::{TranslationCache, TranslationKey};
use crate::client::TranslationClient;
use crate::formats::{self, Document};
use crate::library;
use crate::report::{FileReport, FileState, JobReport, UnitOutcome, UnitStatus};

/// How many deduplicated keys go into one dispatched client call.
const DISPATCH_CHUNK: usize = 16;

/// A batch translation job over files beneath one root.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Root of the extracted mod tree.
    pub root: PathBuf,
    /// Files to translate, relative to `root`.
    pub files: Vec<PathBuf>,
    /// Where merged files are written; `None` writes in place under `root`.
    pub output_root: Option<PathBuf>,
    /// Route locale-addressed files (`.lang`, translation tables) to the
    /// target locale's path instead of overwriting the source locale.
    pub locale_mapped: bool,
    pub source_lang: String,
    pub target_lang: String,
}

/// Cooperative cancellation handle. In-flight provider batches finish; no
/// new batches are dispatched after `cancel`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct FileSlot {
    rel: PathBuf,
    state: FileState,
    error: Option<String>,
    document: Option<Document>,
    finals: Vec<Option<String>>,
    outcomes: Vec<Option<UnitOutcome>>,
}

impl FileSlot {
    fn new(rel: PathBuf) -> Self {
        Self {
            rel,
            state: FileState::Extracting,
            error: None,
            document: None,
            finals: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.state = FileState::Failed;
        self.error = Some(message.into());
    }
}

pub struct PipelineCoordinator {
    client: Arc<TranslationClient>,
    cache: Arc<TranslationCache>,
    workers: usize,
}

impl PipelineCoordinator {
    pub fn new(client: Arc<TranslationClient>, cache: Arc<TranslationCache>, workers: usize) -> Self {
        Self {
            client,
            cache,
            workers: workers.max(1),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Runs the whole pipeline for one job and returns its report.
    pub async fn run(&self, request: &JobRequest, cancel: &CancelToken) -> JobReport {
        let started_at = Utc::now();
        let mut warnings: Vec<String> = Vec::new();

        let mut files: Vec<FileSlot> = request
            .files
            .iter()
            .map(|rel| FileSlot::new(rel.clone()))
            .collect();

        self.extract_phase(request, cancel, &mut files, &mut warnings)
            .await;

        let (misses, subscribers) = self.lookup_phase(request, &mut files);

        let key_results = self
            .translate_phase(&misses, cancel, &mut warnings)
            .await;

        let mut cache_degraded = false;
        for (key, result) in misses.iter().zip(&key_results) {
            if let Some(Ok(record)) = result {
                self.cache.store(key.clone(), record.clone());
            }
        }
        if let Err(error) = self.cache.flush() {
            warn!("translation memory flush failed: {error}");
            warnings.push(format!("translation memory not persisted: {error}"));
            cache_degraded = true;
        }

        assign_outcomes(&mut files, &subscribers, &key_results);

        // cancellation is not re-checked during merge: a file only reaches
        // it with every unit resolved, so writing its output loses nothing
        self.merge_phase(request, &mut files, &mut warnings).await;

        let file_reports: Vec<FileReport> = files
            .into_iter()
            .map(|slot| {
                let units = slot
                    .outcomes
                    .into_iter()
                    .flatten()
                    .collect();
                FileReport {
                    path: display_path(&slot.rel),
                    state: slot.state,
                    error: slot.error,
                    units,
                }
            })
            .collect();

        let counts = JobReport::tally(&file_reports);
        JobReport {
            job_id: Uuid::new_v4().to_string(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            started_at,
            finished_at: Utc::now(),
            files: file_reports,
            counts,
            cancelled: cancel.is_cancelled(),
            cache_degraded,
            warnings,
        }
    }

    async fn extract_phase(
        &self,
        request: &JobRequest,
        cancel: &CancelToken,
        files: &mut [FileSlot],
        warnings: &mut Vec<String>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<(usize, Result<Document, String>)> = JoinSet::new();

        for (index, slot) in files.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                slot.fail("cancelled before extraction");
                continue;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                slot.fail("worker pool unavailable");
                continue;
            };
            let root = request.root.clone();
            let rel = slot.rel.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                (index, extract_one(&root, &rel))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(document))) => {
                    let slot = &mut files[index];
                    slot.finals = vec![None; document.units.len()];
                    slot.outcomes = vec![None; document.units.len()];
                    slot.document = Some(document);
                    slot.state = FileState::LookupPending;
                }
                Ok((index, Err(message))) => files[index].fail(message),
                Err(join_error) => {
                    warnings.push(format!("extraction task failed: {join_error}"));
                }
            }
        }

        // anything still `Extracting` had its task die
        for slot in files.iter_mut() {
            if slot.state == FileState::Extracting {
                slot.fail("extraction did not complete");
            }
        }
    }

    /// Probes the cache for every translatable unit and collects the
    /// deduplicated misses together with the (file, unit) pairs waiting on
    /// each key.
    fn lookup_phase(
        &self,
        request: &JobRequest,
        files: &mut [FileSlot],
    ) -> (Vec<TranslationKey>, Vec<Vec<(usize, usize)>>) {
        let mut misses: Vec<TranslationKey> = Vec::new();
        let mut miss_index: HashMap<TranslationKey, usize> = HashMap::new();
        let mut subscribers: Vec<Vec<(usize, usize)>> = Vec::new();

        for (file_index, slot) in files.iter_mut().enumerate() {
            let Some(document) = &slot.document else {
                continue;
            };

            for (unit_index, unit) in document.units.iter().enumerate() {
                if let Some(reason) = unit.skip {
                    slot.outcomes[unit_index] = Some(UnitOutcome {
                        unit_id: unit.unit_id.clone(),
                        key: unit.key.clone(),
                        status: UnitStatus::Skipped,
                        error: Some(reason.describe().to_string()),
                    });
                    continue;
                }

                let key = TranslationKey::new(
                    &unit.source_text,
                    &request.source_lang,
                    &request.target_lang,
                );
                if let Some(record) = self.cache.lookup(&key) {
                    slot.finals[unit_index] = Some(record.translated_text);
                    slot.outcomes[unit_index] = Some(UnitOutcome {
                        unit_id: unit.unit_id.clone(),
                        key: unit.key.clone(),
                        status: UnitStatus::Cached,
                        error: None,
                    });
                    continue;
                }

                let miss_slot = match miss_index.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        misses.push(key.clone());
                        subscribers.push(Vec::new());
                        miss_index.insert(key, misses.len() - 1);
                        misses.len() - 1
                    }
                };
                subscribers[miss_slot].push((file_index, unit_index));
            }
            slot.state = FileState::Translating;
        }

        (misses, subscribers)
    }

    /// Dispatches deduplicated keys to the client in bounded, concurrent
    /// chunks. Chunks not yet dispatched when cancellation is observed stay
    /// unresolved.
    async fn translate_phase(
        &self,
        misses: &[TranslationKey],
        cancel: &CancelToken,
        warnings: &mut Vec<String>,
    ) -> Vec<Option<Result<crate::cache::TranslationRecord, crate::client::TranslationError>>> {
        let mut key_results = Vec::new();
        key_results.resize_with(misses.len(), || None);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (chunk_index, chunk) in misses.chunks(DISPATCH_CHUNK).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let client = self.client.clone();
            let chunk_keys: Vec<TranslationKey> = chunk.to_vec();
            let base = chunk_index * DISPATCH_CHUNK;
            tasks.spawn(async move {
                let _permit = permit;
                let results = client.translate_batch(&chunk_keys).await;
                (base, results)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((base, results)) => {
                    for (offset, result) in results.into_iter().enumerate() {
                        key_results[base + offset] = Some(result);
                    }
                }
                Err(join_error) => {
                    warnings.push(format!("translation task failed: {join_error}"));
                }
            }
        }

        key_results
    }

    async fn merge_phase(
        &self,
        request: &JobRequest,
        files: &mut [FileSlot],
        warnings: &mut Vec<String>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<(usize, Result<(), String>)> = JoinSet::new();

        for (index, slot) in files.iter_mut().enumerate() {
            if slot.state == FileState::Failed {
                continue;
            }
            let Some(document) = &slot.document else {
                continue;
            };

            // a unit without an outcome was never dispatched; only
            // cancellation leaves files in that state
            if slot.outcomes.iter().any(Option::is_none) {
                slot.state = FileState::Failed;
                slot.error = Some("cancelled before translation completed".to_string());
                for (unit_index, outcome) in slot.outcomes.iter_mut().enumerate() {
                    if outcome.is_none() {
                        let unit = &document.units[unit_index];
                        *outcome = Some(UnitOutcome {
                            unit_id: unit.unit_id.clone(),
                            key: unit.key.clone(),
                            status: UnitStatus::Failed,
                            error: Some("cancelled".to_string()),
                        });
                    }
                }
                continue;
            }

            slot.state = FileState::Merging;
            let document = document.clone();
            let finals = slot.finals.clone();
            let destination = output_path(request, &slot.rel);
            tasks.spawn_blocking(move || (index, merge_one(&document, &finals, &destination)));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(()))) => files[index].state = FileState::Done,
                Ok((index, Err(message))) => files[index].fail(message),
                Err(join_error) => {
                    warnings.push(format!("merge task failed: {join_error}"));
                }
            }
        }

        for slot in files.iter_mut() {
            if slot.state == FileState::Merging {
                slot.fail("merge did not complete");
            }
        }
    }
}

fn extract_one(root: &Path, rel: &Path) -> Result<Document, String> {
    let absolute = root.join(rel);
    let bytes = std::fs::read(&absolute)
        .map_err(|e| format!("read failed for {}: {e}", absolute.display()))?;
    let content = formats::decode_bytes(&bytes).map_err(|e| e.to_string())?;
    formats::extract_file(&content, rel).map_err(|e| e.to_string())
}

fn merge_one(
    document: &Document,
    finals: &[Option<String>],
    destination: &Path,
) -> Result<(), String> {
    let output = document.merge(finals).map_err(|e| e.to_string())?;
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("write failed for {}: {e}", destination.display()))?;
    }
    std::fs::write(destination, output)
        .map_err(|e| format!("write failed for {}: {e}", destination.display()))
}

fn assign_outcomes(
    files: &mut [FileSlot],
    subscribers: &[Vec<(usize, usize)>],
    key_results: &[Option<
        Result<crate::cache::TranslationRecord, crate::client::TranslationError>,
    >],
) {
    for (miss_slot, waiting) in subscribers.iter().enumerate() {
        for &(file_index, unit_index) in waiting {
            let slot = &mut files[file_index];
            let Some(document) = &slot.document else {
                continue;
            };
            let unit = &document.units[unit_index];
            match &key_results[miss_slot] {
                Some(Ok(record)) => {
                    slot.finals[unit_index] = Some(record.translated_text.clone());
                    slot.outcomes[unit_index] = Some(UnitOutcome {
                        unit_id: unit.unit_id.clone(),
                        key: unit.key.clone(),
                        status: UnitStatus::Translated,
                        error: None,
                    });
                }
                Some(Err(error)) => {
                    slot.outcomes[unit_index] = Some(UnitOutcome {
                        unit_id: unit.unit_id.clone(),
                        key: unit.key.clone(),
                        status: UnitStatus::Failed,
                        error: Some(error.to_string()),
                    });
                }
                None => {}
            }
        }
    }
}

fn output_path(request: &JobRequest, rel: &Path) -> PathBuf {
    let base = request
        .output_root
        .as_ref()
        .unwrap_or(&request.root)
        .clone();
    let rel = if request.locale_mapped {
        library::locale_target_path(rel, &request.target_lang)
    } else {
        rel.to_path_buf()
    };
    base.join(rel)
}

fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
