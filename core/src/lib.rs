pub mod ai;
pub mod archive;
pub mod cache;
pub mod client;
pub mod config;
pub mod formats;
pub mod jobs;
pub mod library;
pub mod pipeline;
pub mod protector;
pub mod report;

pub use ai::{ProviderError, ProviderId, TranslationProvider};
pub use archive::{
    detect_archive_type, is_mod_archive, pack_archive, read_manifest, translated_archive_path,
    ArchiveError, ArchiveType, ModManifest,
};
pub use cache::{CacheError, CacheStats, TranslationCache, TranslationKey, TranslationRecord};
pub use client::{BatchLimits, TranslationClient, TranslationError};
pub use config::TranslatorConfig;
pub use formats::{
    extract_file, get_handler, Document, FileFormat, FormatError, FormatHandler, MergeError,
    Skeleton, TranslationUnit,
};
pub use jobs::{
    build_coordinator, translate_all_mods, translate_mod, BatchSummary, ModJobOptions,
    ModJobOutcome,
};
pub use library::{
    collect_translatable_files, extracted_mods, locale_target_path, scan_mods, ExtractedMod,
    ModEntry,
};
pub use pipeline::{CancelToken, JobRequest, PipelineCoordinator};
pub use protector::SkipReason;
pub use report::{FileReport, FileState, JobCounts, JobReport, UnitOutcome, UnitStatus};
