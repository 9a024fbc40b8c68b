//! `.ui` format handler.
//!
//! Hytale UI layout files carry display text as `Text: "..."` properties and
//! `@Text = "..."` bindings. Only the quoted value is a translation unit;
//! the layout around it is skeleton.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{build_document, Document, FileFormat, FormatError, FormatHandler, RawUnit, SlotEncoding};

static UI_TEXT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:Text:\s*"([^"]*)"|@Text\s*=\s*"([^"]*)")"#).expect("valid ui text regex")
});

pub struct UiHandler;

impl UiHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UiHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for UiHandler {
    fn extract(&self, content: &str, rel_path: &str) -> Result<Document, FormatError> {
        let mut spans = Vec::new();

        for caps in UI_TEXT_REGEX.captures_iter(content) {
            let Some(group) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if group.as_str().is_empty() {
                continue;
            }
            spans.push(RawUnit {
                start: group.start(),
                end: group.end(),
                key: format!("text@{}", group.start()),
                source_text: group.as_str().to_string(),
                encoding: SlotEncoding::UiQuoted,
            });
        }

        Ok(build_document(content, rel_path, FileFormat::Ui, spans))
    }

    fn format(&self) -> FileFormat {
        FileFormat::Ui
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "Panel {\n",
        "  Label {\n",
        "    Text: \"Inventory\"\n",
        "    FontSize: 14\n",
        "  }\n",
        "  Button {\n",
        "    @Text = \"Close\"\n",
        "  }\n",
        "  Hidden { Text: \"\" }\n",
        "}\n"
    );

    #[test]
    fn extracts_quoted_text_values() {
        let doc = UiHandler::new().extract(SAMPLE, "UI/inventory.ui").unwrap();
        assert_eq!(doc.units.len(), 2);
        assert_eq!(doc.units[0].source_text, "Inventory");
        assert_eq!(doc.units[1].source_text, "Close");
    }

    #[test]
    fn layout_round_trips_unchanged() {
        let doc = UiHandler::new().extract(SAMPLE, "UI/inventory.ui").unwrap();
        assert_eq!(doc.merge(&[None, None]).unwrap(), SAMPLE);
    }

    #[test]
    fn merge_replaces_quoted_values_only() {
        let doc = UiHandler::new().extract(SAMPLE, "UI/inventory.ui").unwrap();
        let merged = doc
            .merge(&[Some("Инвентарь".to_string()), Some("Закрыть".to_string())])
            .unwrap();
        assert!(merged.contains("Text: \"Инвентарь\""));
        assert!(merged.contains("@Text = \"Закрыть\""));
        assert!(merged.contains("FontSize: 14"));
    }

    #[test]
    fn repeated_strings_get_distinct_units() {
        let content = "Text: \"OK\"\nText: \"OK\"\n";
        let doc = UiHandler::new().extract(content, "UI/x.ui").unwrap();
        assert_eq!(doc.units.len(), 2);
        assert_ne!(doc.units[0].unit_id, doc.units[1].unit_id);
        assert_eq!(doc.units[0].source_text, doc.units[1].source_text);
    }

    #[test]
    fn translation_with_quotes_cannot_break_the_layout() {
        let content = "Text: \"Hello\"\n";
        let doc = UiHandler::new().extract(content, "UI/x.ui").unwrap();
        let merged = doc.merge(&[Some("say \"hi\"".to_string())]).unwrap();
        assert_eq!(merged, "Text: \"say 'hi'\"\n");
    }
}
