//! JSON format handlers.
//!
//! Extraction is span-based on the raw text: a scanner walks the document,
//! tracks the structural path, and records the byte span of every candidate
//! string value. Merging substitutes only those spans, so the output stays
//! byte-identical to the input everywhere else: whitespace, key order,
//! number formatting and existing escapes included.
//!
//! Two modes share the scanner: data files (`manifest.json` and generic
//! asset JSON) translate only values under display-text keys; locale tables
//! (`Common/Translations/*.json`) translate every string value.

use super::{build_document, Document, FileFormat, FormatError, FormatHandler, RawUnit, SlotEncoding};

/// Object keys whose string values are display text (compared lowercase).
const TEXT_KEYS: &[&str] = &[
    "name",
    "description",
    "title",
    "text",
    "displayname",
    "message",
    "lore",
    "display_name",
    "desc",
    "label",
    "hint",
    "placeholder",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonMode {
    TextKeys,
    AllValues,
}

pub struct JsonHandler {
    mode: JsonMode,
}

impl JsonHandler {
    /// Handler for manifest and generic data JSON.
    pub fn data() -> Self {
        Self {
            mode: JsonMode::TextKeys,
        }
    }

    /// Handler for locale tables where every string value is translatable.
    pub fn locale_table() -> Self {
        Self {
            mode: JsonMode::AllValues,
        }
    }
}

impl FormatHandler for JsonHandler {
    fn extract(&self, content: &str, rel_path: &str) -> Result<Document, FormatError> {
        let mut scanner = Scanner::new(content);
        let mut spans = Vec::new();

        scanner.skip_bom();
        scanner.skip_ws();
        scanner.parse_value("", None, self.mode, &mut spans)?;
        scanner.skip_ws();
        if !scanner.at_end() {
            return Err(scanner.error("trailing data after document"));
        }

        Ok(build_document(content, rel_path, self.format(), spans))
    }

    fn format(&self) -> FileFormat {
        match self.mode {
            JsonMode::TextKeys => FileFormat::Json,
            JsonMode::AllValues => FileFormat::LocaleJson,
        }
    }
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: &str) -> FormatError {
        FormatError::Parse(format!("{message} at byte {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_bom(&mut self) {
        if self.src.starts_with('\u{feff}') {
            self.pos += '\u{feff}'.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), FormatError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(
        &mut self,
        path: &str,
        key: Option<&str>,
        mode: JsonMode,
        out: &mut Vec<RawUnit>,
    ) -> Result<(), FormatError> {
        match self.peek() {
            Some(b'{') => self.parse_object(path, mode, out),
            Some(b'[') => self.parse_array(path, mode, out),
            Some(b'"') => {
                let (start, end, decoded) = self.parse_string()?;
                let wanted = match mode {
                    JsonMode::AllValues => true,
                    JsonMode::TextKeys => key
                        .map(|k| TEXT_KEYS.contains(&k.to_lowercase().as_str()))
                        .unwrap_or(false),
                };
                if wanted && !decoded.trim().is_empty() {
                    out.push(RawUnit {
                        start,
                        end,
                        key: path.to_string(),
                        source_text: decoded,
                        encoding: SlotEncoding::JsonString,
                    });
                }
                Ok(())
            }
            Some(b't') => self.parse_literal("true"),
            Some(b'f') => self.parse_literal("false"),
            Some(b'n') => self.parse_literal("null"),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_object(
        &mut self,
        path: &str,
        mode: JsonMode,
        out: &mut Vec<RawUnit>,
    ) -> Result<(), FormatError> {
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }

        loop {
            self.skip_ws();
            let (_, _, member_key) = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();

            let child_path = if path.is_empty() {
                member_key.clone()
            } else {
                format!("{path}.{member_key}")
            };
            self.parse_value(&child_path, Some(&member_key), mode, out)?;

            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(
        &mut self,
        path: &str,
        mode: JsonMode,
        out: &mut Vec<RawUnit>,
    ) -> Result<(), FormatError> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }

        let mut index = 0usize;
        loop {
            self.skip_ws();
            let child_path = format!("{path}[{index}]");
            // Array elements carry no member key; in text-key mode a bare
            // string element is never a unit, only keyed strings below it.
            self.parse_value(&child_path, None, mode, out)?;
            index += 1;

            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_literal(&mut self, literal: &str) -> Result<(), FormatError> {
        if self.src[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(self.error("invalid literal"))
        }
    }

    fn parse_number(&mut self) -> Result<(), FormatError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            Err(self.error("invalid number"))
        } else {
            Ok(())
        }
    }

    /// Parses a string literal, returning the byte span of its content
    /// (between the quotes) and the decoded value.
    fn parse_string(&mut self) -> Result<(usize, usize, String), FormatError> {
        self.expect(b'"')?;
        let start = self.pos;
        let mut decoded = String::new();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => {
                    let end = self.pos;
                    self.pos += 1;
                    return Ok((start, end, decoded));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    decoded.push(self.parse_escape()?);
                }
                Some(c) if c < 0x20 => {
                    return Err(self.error("control character in string"));
                }
                Some(_) => {
                    if let Some(ch) = self.src[self.pos..].chars().next() {
                        decoded.push(ch);
                        self.pos += ch.len_utf8();
                    } else {
                        return Err(self.error("unterminated string"));
                    }
                }
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char, FormatError> {
        let c = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
        self.pos += 1;
        match c {
            b'"' => Ok('"'),
            b'\\' => Ok('\\'),
            b'/' => Ok('/'),
            b'b' => Ok('\u{0008}'),
            b'f' => Ok('\u{000c}'),
            b'n' => Ok('\n'),
            b'r' => Ok('\r'),
            b't' => Ok('\t'),
            b'u' => self.parse_unicode_escape(),
            _ => Err(self.error("invalid escape")),
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, FormatError> {
        let high = self.parse_hex4()?;
        if (0xD800..=0xDBFF).contains(&high) {
            if !self.src[self.pos..].starts_with("\\u") {
                return Err(self.error("unpaired surrogate"));
            }
            self.pos += 2;
            let low = self.parse_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(self.error("invalid low surrogate"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            char::from_u32(code).ok_or_else(|| self.error("invalid surrogate pair"))
        } else if (0xDC00..=0xDFFF).contains(&high) {
            Err(self.error("unpaired surrogate"))
        } else {
            char::from_u32(high).ok_or_else(|| self.error("invalid unicode escape"))
        }
    }

    fn parse_hex4(&mut self) -> Result<u32, FormatError> {
        let end = self.pos + 4;
        let Some(digits) = self.src.get(self.pos..end) else {
            return Err(self.error("truncated unicode escape"));
        };
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error("invalid unicode escape"))?;
        self.pos = end;
        Ok(value)
    }
}
