mod image;
mod ooxml;
mod pdf;
mod presentation;
mod spreadsheet;
mod text;
mod word;

pub use image::TesseractExtractor;
pub use pdf::PdfExtractor;
pub use presentation::PresentationExtractor;
pub use spreadsheet::SpreadsheetExtractor;
pub use text::{decode_text, PlainTextExtractor};
pub use word::WordExtractor;

use crate::config::OcrOptions;
use crate::error::ExtractionError;
use crate::models::PageText;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub const TRUNCATION_MARKER: &str = "... [truncated]";

pub const COLUMN_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: Option<String>,
    pub pages: Vec<PageText>,
}

impl Extraction {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single_page(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.trim().is_empty() => Self {
                pages: vec![PageText {
                    number: 1,
                    text: text.clone(),
                }],
                text: Some(text),
            },
            _ => Self::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text
            .as_deref()
            .map_or(true, |text| text.trim().is_empty())
    }
}

pub trait TextExtractor: Send + Sync {
    fn format(&self) -> &'static str;

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError>;

    fn extract_text_with_pages(&self, bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        Ok(Extraction::single_page(self.extract_text(bytes)?))
    }
}

pub struct ExtractorDispatch {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
    max_text_length: usize,
}

impl ExtractorDispatch {
    pub fn new(max_text_length: usize, ocr: OcrOptions) -> Self {
        let image: Arc<dyn TextExtractor> = Arc::new(TesseractExtractor::new(ocr));
        let word: Arc<dyn TextExtractor> = Arc::new(WordExtractor);
        let spreadsheet: Arc<dyn TextExtractor> = Arc::new(SpreadsheetExtractor);
        let presentation: Arc<dyn TextExtractor> = Arc::new(PresentationExtractor);

        Self::empty(max_text_length)
            .with_extractor(&["pdf"], Arc::new(PdfExtractor))
            .with_extractor(&["doc", "docx"], word)
            .with_extractor(&["txt"], Arc::new(PlainTextExtractor))
            .with_extractor(&["xls", "xlsx"], spreadsheet)
            .with_extractor(&["ppt", "pptx"], presentation)
            .with_extractor(
                &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"],
                image,
            )
    }

    pub fn empty(max_text_length: usize) -> Self {
        Self {
            extractors: HashMap::new(),
            max_text_length,
        }
    }

    pub fn with_extractor(mut self, extensions: &[&str], extractor: Arc<dyn TextExtractor>) -> Self {
        for extension in extensions {
            self.extractors
                .insert(extension.to_ascii_lowercase(), Arc::clone(&extractor));
        }
        self
    }

    pub fn supports(&self, filename: &str) -> bool {
        self.extractor_for(filename).is_some()
    }

    fn extractor_for(&self, filename: &str) -> Option<&Arc<dyn TextExtractor>> {
        let extension = file_extension(filename)?;
        self.extractors.get(&extension)
    }

    // Never fails: errors and panics inside an extractor yield an empty result.
    pub fn extract(&self, bytes: &[u8], filename: &str) -> Extraction {
        let Some(extractor) = self.extractor_for(filename) else {
            debug!(file = filename, "no extractor registered for file type");
            return Extraction::empty();
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| extractor.extract_text_with_pages(bytes)));
        let extraction = match outcome {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(error)) => {
                warn!(file = filename, format = extractor.format(), %error, "extraction failed");
                return Extraction::empty();
            }
            Err(panic) => {
                let error = ExtractionError::Panicked(panic_message(panic.as_ref()));
                warn!(file = filename, format = extractor.format(), %error, "extraction failed");
                return Extraction::empty();
            }
        };

        self.normalize(extraction)
    }

    fn normalize(&self, extraction: Extraction) -> Extraction {
        let Some(text) = extraction
            .text
            .map(|text| clean_text(&text))
            .filter(|text| !text.is_empty())
        else {
            return Extraction::empty();
        };

        let pages = extraction
            .pages
            .into_iter()
            .filter_map(|page| {
                let text = clean_text(&page.text);
                (!text.is_empty()).then_some(PageText {
                    number: page.number,
                    text,
                })
            })
            .collect();

        Extraction {
            text: Some(truncate_text(&text, self.max_text_length)),
            pages,
        }
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.trim().rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn clean_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingExtractor;

    impl TextExtractor for PanickingExtractor {
        fn format(&self) -> &'static str {
            "boom"
        }

        fn extract_text(&self, _bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
            panic!("corrupt stream");
        }
    }

    struct FixedExtractor(&'static str);

    impl TextExtractor for FixedExtractor {
        fn format(&self) -> &'static str {
            "fixed"
        }

        fn extract_text(&self, _bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[test]
    fn long_text_is_cut_and_marked() {
        let body = "a".repeat(60_000);
        let truncated = truncate_text(&body, 50_000);

        assert_eq!(truncated.chars().count(), 50_000 + TRUNCATION_MARKER.chars().count());
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncate_text("short", 50_000), "short");
        assert_eq!(truncate_text("exact", 5), "exact");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let truncated = truncate_text("ééééé", 2);
        assert_eq!(truncated, format!("éé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn cleaning_removes_nul_bytes_and_blank_lines() {
        let cleaned = clean_text("  first\0 line  \r\n\n   \n\tsecond\n");
        assert_eq!(cleaned, "first line\nsecond");
    }

    #[test]
    fn dispatch_uses_extension_case_insensitively() {
        let dispatch = ExtractorDispatch::new(50_000, OcrOptions::default());
        let extraction = dispatch.extract(b"Engine room\n\n  log entry  ", "NOTES.TXT");

        assert_eq!(extraction.text.as_deref(), Some("Engine room\nlog entry"));
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.pages[0].number, 1);
        assert!(dispatch.supports("scan.JPEG"));
        assert!(!dispatch.supports("archive.zip"));
        assert!(!dispatch.supports("no-extension"));
    }

    #[test]
    fn unknown_extension_yields_empty_extraction() {
        let dispatch = ExtractorDispatch::new(50_000, OcrOptions::default());
        assert_eq!(dispatch.extract(b"data", "payload.bin"), Extraction::empty());
    }

    #[test]
    fn panicking_extractor_is_contained() {
        let dispatch = ExtractorDispatch::empty(100)
            .with_extractor(&["bad"], Arc::new(PanickingExtractor))
            .with_extractor(&["ok"], Arc::new(FixedExtractor("fine")));

        assert!(dispatch.extract(b"", "file.bad").is_empty());
        assert_eq!(dispatch.extract(b"", "file.ok").text.as_deref(), Some("fine"));
    }

    #[test]
    fn broken_pdf_is_reported_as_empty() {
        let dispatch = ExtractorDispatch::new(50_000, OcrOptions::default());
        let extraction = dispatch.extract(b"%PDF-1.4\n%broken", "manual.pdf");
        assert!(extraction.is_empty());
        assert!(extraction.pages.is_empty());
    }

    #[test]
    fn whitespace_only_text_counts_as_empty() {
        let dispatch = ExtractorDispatch::empty(100)
            .with_extractor(&["ws"], Arc::new(FixedExtractor(" \n\0 \n")));
        assert_eq!(dispatch.extract(b"", "blank.ws"), Extraction::empty());
    }

    #[test]
    fn pages_are_cleaned_but_not_truncated() {
        let dispatch = ExtractorDispatch::empty(4)
            .with_extractor(&["fx"], Arc::new(FixedExtractor("  abcdefgh  ")));
        let extraction = dispatch.extract(b"", "x.fx");

        assert_eq!(extraction.text, Some(format!("abcd{TRUNCATION_MARKER}")));
        assert_eq!(extraction.pages[0].text, "abcdefgh");
    }
}
