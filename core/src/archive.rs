//! JAR/ZIP mod archive handling.
//!
//! Hytale mods ship as `.jar`/`.zip` archives. This module reads a mod's
//! manifest without unpacking, extracts an archive into the working tree,
//! and repacks a translated tree into a new archive next to the original.
//! The original archive is never modified.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use zip::read::ZipArchive;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive not found: {0}")]
    NotFound(String),

    #[error("invalid archive format: {0}")]
    InvalidFormat(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Jar,
    Zip,
}

impl ArchiveType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jar" => Some(Self::Jar),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jar => "jar",
            Self::Zip => "zip",
        }
    }
}

/// A mod's `manifest.json`, as far as translation cares about it.
/// Field casing in the wild varies between `Name` and `name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModManifest {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

pub fn is_mod_archive(path: &Path) -> bool {
    detect_archive_type(path).is_some()
}

pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ArchiveType::from_extension)
}

/// Reads the first `manifest.json` found inside the archive, if any.
pub fn read_manifest(archive_path: &Path) -> ArchiveResult<Option<ModManifest>> {
    if !archive_path.exists() {
        return Err(ArchiveError::NotFound(archive_path.display().to_string()));
    }

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let manifest_entry = (0..archive.len()).find_map(|i| {
        archive
            .by_index(i)
            .ok()
            .filter(|entry| entry.name().ends_with("manifest.json"))
            .map(|entry| entry.name().to_string())
    });

    let Some(entry_name) = manifest_entry else {
        return Ok(None);
    };

    let mut entry = archive.by_name(&entry_name)?;
    let mut contents = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut contents)?;

    let text = strip_bom(&contents);
    match serde_json::from_slice::<ModManifest>(text) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(error) => {
            warn!(
                "unreadable manifest in {}: {error}",
                archive_path.display()
            );
            Ok(None)
        }
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

/// Unpacks the archive into `destination`, creating it as needed.
pub fn extract_archive(archive_path: &Path, destination: &Path) -> ArchiveResult<()> {
    if !archive_path.exists() {
        return Err(ArchiveError::NotFound(archive_path.display().to_string()));
    }
    detect_archive_type(archive_path)
        .ok_or_else(|| ArchiveError::InvalidFormat(archive_path.display().to_string()))?;

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(destination)?;
    archive.extract(destination)?;
    Ok(())
}

/// Packs a directory tree into a new archive at `output_path`.
///
/// The archive is assembled in a `.tmp` sibling and renamed into place, so
/// a failed pack never leaves a truncated archive behind. With `backup`
/// set, an existing output is first copied into a `backups/` directory.
pub fn pack_archive(source_dir: &Path, output_path: &Path, backup: bool) -> ArchiveResult<()> {
    if output_path.exists() && backup {
        let backup_dir = output_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        fs::create_dir_all(&backup_dir)?;
        let backup_name = output_path
            .file_name()
            .map(|name| format!("{}.bak", name.to_string_lossy()))
            .unwrap_or_else(|| "archive.bak".to_string());
        fs::copy(output_path, backup_dir.join(backup_name))?;
    }

    let tmp_path = tmp_sibling(output_path);
    let result = write_archive(source_dir, &tmp_path);
    match result {
        Ok(()) => {
            fs::rename(&tmp_path, output_path)?;
            Ok(())
        }
        Err(error) => {
            if tmp_path.exists() {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    warn!("failed to remove {}: {cleanup}", tmp_path.display());
                }
            }
            Err(error)
        }
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| format!("{}.tmp", name.to_string_lossy()))
        .unwrap_or_else(|| "archive.tmp".to_string());
    path.with_file_name(name)
}

fn write_archive(source_dir: &Path, output_path: &Path) -> ArchiveResult<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let output_file = File::create(output_path)?;
    let mut writer = ZipWriter::new(output_file);

    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut files = Vec::new();
    collect_files(source_dir, &mut files)?;
    files.sort();

    for absolute in files {
        let relative = absolute
            .strip_prefix(source_dir)
            .map_err(|_| ArchiveError::InvalidFormat(absolute.display().to_string()))?;
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mut contents = Vec::new();
        File::open(&absolute)?.read_to_end(&mut contents)?;
        writer.start_file(&entry_name, options.clone())?;
        writer.write_all(&contents)?;
    }

    writer.finish()?;
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Output path for the translated archive: `mymod.jar` → `mymod_ru.jar`.
pub fn translated_archive_path(archive_path: &Path, target_lang: &str) -> PathBuf {
    let lang: String = target_lang
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let lang = if lang.is_empty() {
        "translated".to_string()
    } else {
        lang
    };

    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mod".to_string());
    let name = match archive_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{lang}.{ext}"),
        None => format!("{stem}_{lang}"),
    };
    archive_path.with_file_name(name)
}
