//! Format handlers for Hytale mod files.
//!
//! Each handler extracts translatable units from raw file content together
//! with a [`Skeleton`], the non-text remainder of the file. Rendering the
//! skeleton with the original unit texts reproduces the input byte for byte;
//! rendering it with translated texts substitutes only the unit spans and
//! leaves every other byte untouched.

pub mod json;
pub mod lang;
pub mod ui;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

use crate::protector::{self, SkipReason};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("unsupported format: {0}")]
    Unsupported(String),
}

/// Raised only when a skeleton and its unit texts disagree. That is a
/// programming invariant violation, never an expected runtime condition.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("skeleton expects {expected} unit texts, got {got}")]
    Misaligned { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// `key=value` locale files under `Server/Languages/<locale>/`.
    Lang,
    /// UI layout files with `Text: "..."` and `@Text = "..."` strings.
    Ui,
    /// `manifest.json` and generic data JSON; only text-keyed values count.
    Json,
    /// `Common/Translations/*.json` tables; every string value counts.
    LocaleJson,
}

impl FileFormat {
    /// Detect format from a path inside an extracted mod tree.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "lang" => Some(Self::Lang),
            "ui" => Some(Self::Ui),
            "json" => {
                let in_translations = path
                    .components()
                    .any(|c| c.as_os_str().eq_ignore_ascii_case("Translations"));
                if in_translations {
                    Some(Self::LocaleJson)
                } else {
                    Some(Self::Json)
                }
            }
            _ => None,
        }
    }
}

/// A single piece of translatable text extracted from a mod file.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationUnit {
    /// Stable digest of (file path, structural key, source text).
    pub unit_id: String,
    /// Structural key: lang key, JSON path, or UI byte offset.
    pub key: String,
    pub source_text: String,
    /// Markup tokens that must survive translation verbatim.
    pub protected: Vec<String>,
    /// Index of this unit's slot in the skeleton.
    pub slot: usize,
    /// Set when the unit must not be sent to a provider.
    pub skip: Option<SkipReason>,
}

/// How a replacement text is written back into its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEncoding {
    /// Bare value on a `key=value` line; embedded line breaks would corrupt
    /// the format and are flattened to spaces.
    LangValue,
    /// Double-quoted UI string; quotes and line breaks are flattened.
    UiQuoted,
    /// JSON string content; standard JSON escaping.
    JsonString,
}

impl SlotEncoding {
    fn encode(&self, text: &str) -> String {
        match self {
            SlotEncoding::LangValue => text.replace(['\n', '\r'], " "),
            SlotEncoding::UiQuoted => text.replace('"', "'").replace(['\n', '\r'], " "),
            SlotEncoding::JsonString => escape_json(text),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Slot(usize),
}

#[derive(Debug, Clone)]
struct SlotSpec {
    /// The exact original bytes of the span.
    raw: String,
    /// The decoded source text the span represents.
    source_text: String,
    encoding: SlotEncoding,
}

/// The non-text remainder of a file, able to reproduce the original bytes
/// when combined with a parallel sequence of unit texts.
#[derive(Debug, Clone)]
pub struct Skeleton {
    segments: Vec<Segment>,
    slots: Vec<SlotSpec>,
}

impl Skeleton {
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Merges final texts back into the file, one per slot in slot order.
    ///
    /// A final text equal to the slot's source text renders the original raw
    /// bytes, so an untranslated file reproduces its input exactly.
    pub fn render(&self, finals: &[String]) -> Result<String, MergeError> {
        if finals.len() != self.slots.len() {
            return Err(MergeError::Misaligned {
                expected: self.slots.len(),
                got: finals.len(),
            });
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(index) => {
                    let spec = &self.slots[*index];
                    let text = &finals[*index];
                    if *text == spec.source_text {
                        out.push_str(&spec.raw);
                    } else {
                        out.push_str(&spec.encoding.encode(text));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// An extracted mod file: ordered units plus the skeleton to rebuild it.
#[derive(Debug, Clone)]
pub struct Document {
    pub format: FileFormat,
    pub units: Vec<TranslationUnit>,
    pub skeleton: Skeleton,
}

impl Document {
    /// Convenience for the common merge call: unit texts in slot order,
    /// falling back to the source text where no translation is supplied.
    pub fn merge(&self, finals: &[Option<String>]) -> Result<String, MergeError> {
        if finals.len() != self.units.len() {
            return Err(MergeError::Misaligned {
                expected: self.units.len(),
                got: finals.len(),
            });
        }
        let resolved: Vec<String> = self
            .units
            .iter()
            .zip(finals)
            .map(|(unit, text)| {
                text.clone().unwrap_or_else(|| unit.source_text.clone())
            })
            .collect();
        self.skeleton.render(&resolved)
    }
}

/// Trait for format-specific handlers.
pub trait FormatHandler: Send + Sync {
    /// Extract translatable units and the skeleton from file content.
    ///
    /// All-or-nothing: a structural parse failure returns [`FormatError`]
    /// before any translation work can begin.
    fn extract(&self, content: &str, rel_path: &str) -> Result<Document, FormatError>;

    /// The format this handler supports.
    fn format(&self) -> FileFormat;
}

/// Get the handler for a detected format.
pub fn get_handler(format: FileFormat) -> Box<dyn FormatHandler> {
    match format {
        FileFormat::Lang => Box::new(lang::LangHandler::new()),
        FileFormat::Ui => Box::new(ui::UiHandler::new()),
        FileFormat::Json => Box::new(json::JsonHandler::data()),
        FileFormat::LocaleJson => Box::new(json::JsonHandler::locale_table()),
    }
}

/// Extract a file that already passed [`FileFormat::from_path`] detection.
pub fn extract_file(
    content: &str,
    rel_path: &Path,
) -> Result<Document, FormatError> {
    let format = FileFormat::from_path(rel_path).ok_or_else(|| {
        FormatError::Unsupported(rel_path.display().to_string())
    })?;
    get_handler(format).extract(content, &rel_path.to_string_lossy())
}

/// Decodes raw file bytes as UTF-8. The BOM, if present, stays in the text
/// so the skeleton reproduces it.
pub fn decode_bytes(bytes: &[u8]) -> Result<String, FormatError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| FormatError::Encoding(format!("not valid UTF-8: {e}")))
}

/// A translatable span found by a handler, in file byte offsets.
pub(crate) struct RawUnit {
    pub start: usize,
    pub end: usize,
    pub key: String,
    pub source_text: String,
    pub encoding: SlotEncoding,
}

/// Assembles a [`Document`] from non-overlapping spans in ascending order.
pub(crate) fn build_document(
    content: &str,
    rel_path: &str,
    format: FileFormat,
    spans: Vec<RawUnit>,
) -> Document {
    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut slots = Vec::with_capacity(spans.len());
    let mut units = Vec::with_capacity(spans.len());
    let mut cursor = 0usize;

    for (slot, span) in spans.into_iter().enumerate() {
        if span.start > cursor {
            segments.push(Segment::Literal(content[cursor..span.start].to_string()));
        }
        segments.push(Segment::Slot(slot));
        slots.push(SlotSpec {
            raw: content[span.start..span.end].to_string(),
            source_text: span.source_text.clone(),
            encoding: span.encoding,
        });
        units.push(TranslationUnit {
            unit_id: unit_id(rel_path, &span.key, &span.source_text),
            key: span.key,
            protected: protector::protected_tokens(&span.source_text),
            skip: protector::skip_reason(&span.source_text),
            source_text: span.source_text,
            slot,
        });
        cursor = span.end;
    }

    if cursor < content.len() {
        segments.push(Segment::Literal(content[cursor..].to_string()));
    }

    Document {
        format,
        units,
        skeleton: Skeleton { segments, slots },
    }
}

fn unit_id(rel_path: &str, key: &str, source_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rel_path.as_bytes());
    hasher.update([0]);
    hasher.update(key.as_bytes());
    hasher.update([0]);
    hasher.update(source_text.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

fn escape_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
