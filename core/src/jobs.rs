//! End-to-end mod translation jobs.
//!
//! Ties the layers together: unpack a mod archive, run the pipeline over
//! its translatable files, repack the result as a `_<lang>` sibling of the
//! original. The original archive is never touched.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::pacer::RequestPacer;
use crate::ai::build_provider;
use crate::archive;
use crate::cache::TranslationCache;
use crate::client::TranslationClient;
use crate::config::TranslatorConfig;
use crate::library;
use crate::pipeline::{CancelToken, JobRequest, PipelineCoordinator};
use crate::report::JobReport;

#[derive(Debug, Clone)]
pub struct ModJobOptions {
    pub source_lang: String,
    pub target_lang: String,
    /// Back up an existing output archive before overwriting it.
    pub backup_existing: bool,
    /// Remove the extracted working tree after a successful pack.
    pub cleanup_extracted: bool,
}

impl Default for ModJobOptions {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            backup_existing: true,
            cleanup_extracted: false,
        }
    }
}

impl ModJobOptions {
    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self {
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ModJobOutcome {
    pub report: JobReport,
    pub output_archive: PathBuf,
    pub extracted_path: PathBuf,
}

/// Result of a whole-folder batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<(String, Result<ModJobOutcome, String>)>,
}

/// Assembles a coordinator from configuration. Startup problems that the
/// job can survive (an unreadable translation memory) come back as
/// warnings for the caller to attach to its report.
pub fn build_coordinator(config: &TranslatorConfig) -> Result<(PipelineCoordinator, Vec<String>)> {
    let mut warnings = Vec::new();

    let http = reqwest::Client::builder()
        .timeout(config.client.http_timeout())
        .build()
        .context("building HTTP client")?;
    let pacer = Arc::new(RequestPacer::new(config.client.request_interval()));
    let provider = build_provider(config.client.provider, http, pacer);
    let client = TranslationClient::new(
        provider,
        config.retry.policy(),
        config.client.batch_limits(),
    );

    let cache_path = config.cache_file();
    let cache = match TranslationCache::load(&cache_path) {
        Ok(cache) => cache,
        Err(error) => {
            warn!(
                "translation memory {} unavailable, continuing in memory: {error}",
                cache_path.display()
            );
            warnings.push(format!(
                "translation memory {} unavailable: {error}",
                cache_path.display()
            ));
            TranslationCache::in_memory()
        }
    };

    Ok((
        PipelineCoordinator::new(Arc::new(client), Arc::new(cache), config.workers),
        warnings,
    ))
}

/// Translates one mod archive end to end.
pub async fn translate_mod(
    archive_path: &Path,
    mods_dir: &Path,
    coordinator: &PipelineCoordinator,
    options: &ModJobOptions,
    cancel: &CancelToken,
) -> Result<ModJobOutcome> {
    if !archive::is_mod_archive(archive_path) {
        bail!("not a mod archive: {}", archive_path.display());
    }

    let manifest = archive::read_manifest(archive_path)
        .with_context(|| format!("reading {}", archive_path.display()))?;
    let display_name = manifest
        .as_ref()
        .and_then(|m| m.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            archive_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "mod".to_string())
        });

    let extracted = library::extracted_root(mods_dir).join(library::safe_mod_name(&display_name));
    archive::extract_archive(archive_path, &extracted)
        .with_context(|| format!("unpacking {}", archive_path.display()))?;

    let files = library::collect_translatable_files(&extracted)
        .with_context(|| format!("scanning {}", extracted.display()))?;
    info!(
        "translating {display_name}: {} file(s) from {}",
        files.len(),
        archive_path.display()
    );

    let request = JobRequest {
        root: extracted.clone(),
        files,
        output_root: None,
        locale_mapped: true,
        source_lang: options.source_lang.clone(),
        target_lang: options.target_lang.clone(),
    };
    let report = coordinator.run(&request, cancel).await;

    let output_archive = archive::translated_archive_path(archive_path, &options.target_lang);
    archive::pack_archive(&extracted, &output_archive, options.backup_existing)
        .with_context(|| format!("packing {}", output_archive.display()))?;

    if options.cleanup_extracted {
        if let Err(error) = std::fs::remove_dir_all(&extracted) {
            warn!(
                "failed to clean extracted tree {}: {error}",
                extracted.display()
            );
        }
    }

    info!(
        "packed {}: {} translated, {} cached, {} failed, {} skipped",
        output_archive.display(),
        report.counts.translated,
        report.counts.cached,
        report.counts.failed,
        report.counts.skipped
    );

    Ok(ModJobOutcome {
        report,
        output_archive,
        extracted_path: extracted,
    })
}

/// Translates every mod archive in the folder, one after another. A mod
/// that fails is recorded and the batch moves on; cancellation stops the
/// batch before the next mod starts.
pub async fn translate_all_mods(
    mods_dir: &Path,
    coordinator: &PipelineCoordinator,
    options: &ModJobOptions,
    cancel: &CancelToken,
) -> Result<BatchSummary> {
    let entries = library::scan_mods(mods_dir).context("scanning mods folder")?;
    let mut summary = BatchSummary::default();

    for entry in entries {
        if cancel.is_cancelled() {
            break;
        }
        match translate_mod(&entry.path, mods_dir, coordinator, options, cancel).await {
            Ok(outcome) => {
                summary.succeeded += 1;
                summary.outcomes.push((entry.name, Ok(outcome)));
            }
            Err(error) => {
                warn!("mod {} failed: {error:#}", entry.name);
                summary.failed += 1;
                summary.outcomes.push((entry.name, Err(format!("{error:#}"))));
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ProviderError, ProviderId, TranslationProvider};
    use crate::ai::retry::RetryPolicy;
    use crate::client::BatchLimits;
    use async_trait::async_trait;
    use std::fs::File;
    use std::io::{Read, Write};
    use std::time::Duration;
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};
    use zip::{CompressionMethod, ZipArchive};

    struct UpperProvider;

    #[async_trait]
    impl TranslationProvider for UpperProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Google
        }
        fn max_text_len(&self) -> usize {
            4500
        }
        async fn translate(
            &self,
            texts: &[String],
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<Vec<String>, ProviderError> {
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    fn test_coordinator() -> PipelineCoordinator {
        let client = TranslationClient::new(
            Box::new(UpperProvider),
            RetryPolicy::new(Duration::ZERO, Duration::ZERO, 0),
            BatchLimits::default(),
        );
        PipelineCoordinator::new(
            Arc::new(client),
            Arc::new(TranslationCache::in_memory()),
            2,
        )
    }

    fn build_mod_archive(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

        writer.start_file("manifest.json", options.clone()).unwrap();
        writer
            .write_all(br#"{"Name": "Void Mod", "Description": "Adds the void."}"#)
            .unwrap();
        writer
            .start_file("Server/Languages/en-US/items.lang", options.clone())
            .unwrap();
        writer
            .write_all(b"items.Void.name=Void Shard\nitems.Void.key=items.Void.name\n")
            .unwrap();
        writer
            .start_file("textures/void.png", options.clone())
            .unwrap();
        writer.write_all(&[0x89, 0x50, 0x4E, 0x47]).unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn translates_an_archive_end_to_end() {
        let mods = TempDir::new().unwrap();
        let archive_path = mods.path().join("voidmod.jar");
        build_mod_archive(&archive_path);

        let coordinator = test_coordinator();
        let outcome = translate_mod(
            &archive_path,
            mods.path(),
            &coordinator,
            &ModJobOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.output_archive, mods.path().join("voidmod_ru.jar"));
        assert!(outcome.report.counts.translated >= 1);

        let file = File::open(&outcome.output_archive).unwrap();
        let mut packed = ZipArchive::new(file).unwrap();

        // source locale untouched, target locale added
        let mut source = String::new();
        packed
            .by_name("Server/Languages/en-US/items.lang")
            .unwrap()
            .read_to_string(&mut source)
            .unwrap();
        assert!(source.contains("items.Void.name=Void Shard"));

        let mut target = String::new();
        packed
            .by_name("Server/Languages/ru-RU/items.lang")
            .unwrap()
            .read_to_string(&mut target)
            .unwrap();
        assert!(target.contains("items.Void.name=VOID SHARD"));
        // the key-like value was screened, not translated
        assert!(target.contains("items.Void.key=items.Void.name"));

        // binary assets carried over untouched
        assert!(packed.by_name("textures/void.png").is_ok());
    }

    #[tokio::test]
    async fn original_archive_is_never_modified() {
        let mods = TempDir::new().unwrap();
        let archive_path = mods.path().join("voidmod.jar");
        build_mod_archive(&archive_path);
        let original_bytes = std::fs::read(&archive_path).unwrap();

        let coordinator = test_coordinator();
        translate_mod(
            &archive_path,
            mods.path(),
            &coordinator,
            &ModJobOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&archive_path).unwrap(), original_bytes);
    }

    #[tokio::test]
    async fn batch_run_covers_every_mod() {
        let mods = TempDir::new().unwrap();
        build_mod_archive(&mods.path().join("one.jar"));
        build_mod_archive(&mods.path().join("two.zip"));
        std::fs::write(mods.path().join("broken.jar"), b"not a zip").unwrap();

        let coordinator = test_coordinator();
        let summary = translate_all_mods(
            mods.path(),
            &coordinator,
            &ModJobOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(mods.path().join("one_ru.jar").exists());
        assert!(mods.path().join("two_ru.zip").exists());
    }

    #[tokio::test]
    async fn rejects_non_archive_paths() {
        let mods = TempDir::new().unwrap();
        let plain = mods.path().join("notes.txt");
        std::fs::write(&plain, "x").unwrap();

        let coordinator = test_coordinator();
        let result = translate_mod(
            &plain,
            mods.path(),
            &coordinator,
            &ModJobOptions::default(),
            &CancelToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
