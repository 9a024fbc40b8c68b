//! Mods-folder scanning.
//!
//! The mods folder holds `.jar`/`.zip` archives plus a `.extracted/`
//! working directory for unpacked trees. Entries whose names start with a
//! dot or underscore are ignored, matching how disabled mods are parked.

use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;

use crate::archive::{self, ArchiveType, ModManifest};
use crate::formats::FileFormat;

pub const EXTRACTED_DIR_NAME: &str = ".extracted";

/// A mod archive found in the mods folder.
#[derive(Debug, Clone, Serialize)]
pub struct ModEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: ArchiveType,
    pub manifest: Option<ModManifest>,
}

/// An already-unpacked mod under `.extracted/`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedMod {
    pub path: PathBuf,
    pub name: String,
}

/// Filesystem-safe folder name for a mod.
pub fn safe_mod_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn extracted_root(mods_dir: &Path) -> PathBuf {
    mods_dir.join(EXTRACTED_DIR_NAME)
}

/// Scans the mods folder for archives. A missing folder yields an empty
/// list; unreadable manifests are logged and skipped, not fatal.
pub fn scan_mods(mods_dir: &Path) -> io::Result<Vec<ModEntry>> {
    let mut entries = Vec::new();
    if !mods_dir.is_dir() {
        return Ok(entries);
    }

    for dir_entry in std::fs::read_dir(mods_dir)? {
        let path = dir_entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') || file_name.starts_with('_') {
            continue;
        }
        let Some(kind) = archive::detect_archive_type(&path) else {
            continue;
        };

        let manifest = match archive::read_manifest(&path) {
            Ok(manifest) => manifest,
            Err(error) => {
                warn!("skipping manifest of {}: {error}", path.display());
                None
            }
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());
        let name = manifest
            .as_ref()
            .and_then(|m| m.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(stem);

        entries.push(ModEntry {
            path,
            name,
            kind,
            manifest,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Lists already-extracted mods.
pub fn extracted_mods(mods_dir: &Path) -> io::Result<Vec<ExtractedMod>> {
    let root = extracted_root(mods_dir);
    let mut mods = Vec::new();
    if !root.is_dir() {
        return Ok(mods);
    }

    for dir_entry in std::fs::read_dir(&root)? {
        let path = dir_entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        mods.push(ExtractedMod { path, name });
    }

    mods.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(mods)
}

/// Walks an extracted mod tree and returns every translatable file as a
/// path relative to `root`, sorted for deterministic job order.
pub fn collect_translatable_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for dir_entry in std::fs::read_dir(dir)? {
        let path = dir_entry?.path();
        if path.is_dir() {
            walk(root, &path, out)?;
            continue;
        }
        if FileFormat::from_path(&path).is_some() {
            if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_path_buf());
            }
        }
    }
    Ok(())
}

/// Region-style locale tag for directory names: `ru` → `ru-RU`.
pub fn locale_dir_tag(lang: &str) -> String {
    let lang = lang.trim();
    if lang.contains('-') || lang.contains('_') {
        return lang.replace('_', "-");
    }
    format!("{}-{}", lang.to_lowercase(), lang.to_uppercase())
}

/// Underscore variant for translation-table file names: `ru` → `ru_RU`.
pub fn locale_file_tag(lang: &str) -> String {
    locale_dir_tag(lang).replace('-', "_")
}

/// Maps a source file path to where its translated counterpart belongs.
///
/// Locale-addressed files move to the target locale: the directory after a
/// `Languages` component is swapped (`Server/Languages/en-US/items.lang` →
/// `Server/Languages/ru-RU/items.lang`), and a table under `Translations`
/// is renamed (`Common/Translations/en_US.json` →
/// `Common/Translations/ru_RU.json`). Everything else keeps its path and is
/// translated in place.
pub fn locale_target_path(rel: &Path, target_lang: &str) -> PathBuf {
    let components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    let mut mapped = components.clone();
    for i in 0..components.len() {
        if components[i].eq_ignore_ascii_case("Languages") && i + 1 < components.len() - 1 {
            mapped[i + 1] = locale_dir_tag(target_lang);
            return mapped.iter().collect();
        }
    }

    if components.len() >= 2 {
        let parent = &components[components.len() - 2];
        let file = &components[components.len() - 1];
        if parent.eq_ignore_ascii_case("Translations") && file.to_lowercase().ends_with(".json") {
            let last = mapped.len() - 1;
            mapped[last] = format!("{}.json", locale_file_tag(target_lang));
            return mapped.iter().collect();
        }
    }

    rel.to_path_buf()
}
