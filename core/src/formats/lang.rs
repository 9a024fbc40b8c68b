//! `.lang` format handler (`Server/Languages/<locale>/*.lang`).
//!
//! Line-oriented `key=value` files. Comments (`#`) and blank lines are
//! skeleton; only the trimmed value of each entry is a translation unit.

use super::{build_document, Document, FileFormat, FormatError, FormatHandler, RawUnit, SlotEncoding};

pub struct LangHandler;

impl LangHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LangHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for LangHandler {
    fn extract(&self, content: &str, rel_path: &str) -> Result<Document, FormatError> {
        let mut spans = Vec::new();
        let mut offset = 0usize;

        for line in content.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some(eq) = line.find('=') else {
                continue;
            };

            let key = line[..eq].trim();
            if key.is_empty() {
                continue;
            }

            let raw_value = &line[eq + 1..];
            let value = raw_value.trim();
            if value.is_empty() {
                continue;
            }
            let leading = raw_value.len() - raw_value.trim_start().len();
            let start = line_start + eq + 1 + leading;

            spans.push(RawUnit {
                start,
                end: start + value.len(),
                key: key.to_string(),
                source_text: value.to_string(),
                encoding: SlotEncoding::LangValue,
            });
        }

        Ok(build_document(content, rel_path, FileFormat::Lang, spans))
    }

    fn format(&self) -> FileFormat {
        FileFormat::Lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Items\nitems.Sword.name=Iron Sword\nitems.Sword.description = A sharp blade \n\nbroken line without separator\nempty.value=\n";

    #[test]
    fn extracts_values_with_keys() {
        let doc = LangHandler::new().extract(SAMPLE, "en-US/items.lang").unwrap();
        assert_eq!(doc.units.len(), 2);
        assert_eq!(doc.units[0].key, "items.Sword.name");
        assert_eq!(doc.units[0].source_text, "Iron Sword");
        assert_eq!(doc.units[1].key, "items.Sword.description");
        assert_eq!(doc.units[1].source_text, "A sharp blade");
    }

    #[test]
    fn comments_and_malformed_lines_stay_in_skeleton() {
        let doc = LangHandler::new().extract(SAMPLE, "en-US/items.lang").unwrap();
        let finals: Vec<String> = doc.units.iter().map(|u| u.source_text.clone()).collect();
        assert_eq!(doc.skeleton.render(&finals).unwrap(), SAMPLE);
    }

    #[test]
    fn merge_replaces_only_values() {
        let doc = LangHandler::new().extract(SAMPLE, "en-US/items.lang").unwrap();
        let merged = doc
            .merge(&[Some("Железный меч".to_string()), None])
            .unwrap();
        assert!(merged.contains("items.Sword.name=Железный меч\n"));
        assert!(merged.contains("items.Sword.description = A sharp blade \n"));
        assert!(merged.contains("# Items\n"));
    }

    #[test]
    fn preserves_spacing_around_separator() {
        let content = "key = value";
        let doc = LangHandler::new().extract(content, "x.lang").unwrap();
        assert_eq!(doc.units[0].source_text, "value");
        let merged = doc.merge(&[Some("wert".to_string())]).unwrap();
        assert_eq!(merged, "key = wert");
    }

    #[test]
    fn file_without_trailing_newline_round_trips() {
        let content = "a=b";
        let doc = LangHandler::new().extract(content, "x.lang").unwrap();
        assert_eq!(doc.merge(&[None]).unwrap(), content);
    }

    #[test]
    fn handles_crlf_lines() {
        let content = "a=one\r\nb=two\r\n";
        let doc = LangHandler::new().extract(content, "x.lang").unwrap();
        assert_eq!(doc.units.len(), 2);
        assert_eq!(doc.units[0].source_text, "one");
        let merged = doc.merge(&[Some("uno".to_string()), None]).unwrap();
        assert_eq!(merged, "a=uno\r\nb=two\r\n");
    }
}
