use super::TextExtractor;
use crate::error::ExtractionError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> &'static str {
        "text"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        Ok(Some(decode_text(bytes)))
    }
}

type Decoder = fn(&[u8]) -> Option<String>;

// Tried in order; the first strict decode wins.
const DECODERS: [Decoder; 3] = [decode_utf8, decode_utf16_with_bom, decode_windows_1252];

pub fn decode_text(bytes: &[u8]) -> String {
    DECODERS
        .iter()
        .find_map(|decode| decode(bytes))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).replace('\u{FFFD}', ""))
}

fn strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    strict(UTF_8, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes))
}

fn decode_utf16_with_bom(bytes: &[u8]) -> Option<String> {
    let (encoding, bom_length) = Encoding::for_bom(bytes)?;
    if encoding != UTF_16LE && encoding != UTF_16BE {
        return None;
    }
    strict(encoding, &bytes[bom_length..])
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    strict(WINDOWS_1252, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_with_and_without_bom() {
        assert_eq!(decode_text("Hull – inspection".as_bytes()), "Hull – inspection");
        assert_eq!(decode_text(b"\xEF\xBB\xBFmanifest"), "manifest");
    }

    #[test]
    fn utf16_requires_a_byte_order_mark() {
        let mut little_endian = vec![0xFF, 0xFE];
        for unit in "Crew list".encode_utf16() {
            little_endian.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&little_endian), "Crew list");

        let mut big_endian = vec![0xFE, 0xFF];
        for unit in "Deck".encode_utf16() {
            big_endian.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&big_endian), "Deck");
    }

    #[test]
    fn legacy_single_byte_text_falls_back_to_windows_1252() {
        let bytes = b"\x93Caf\xe9\x94";
        assert_eq!(decode_text(bytes), "\u{201C}Caf\u{e9}\u{201D}");
    }

    #[test]
    fn extractor_reports_whole_file_as_one_page() {
        let extraction = PlainTextExtractor
            .extract_text_with_pages(b"line one\nline two")
            .expect("plain text never fails");
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.text.as_deref(), Some("line one\nline two"));
    }
}
