use super::{clean_text, Extraction, TextExtractor};
use crate::error::ExtractionError;
use crate::models::PageText;
use lopdf::Document;
use tracing::debug;

#[derive(Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn format(&self) -> &'static str {
        "pdf"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        Ok(self.extract_text_with_pages(bytes)?.text)
    }

    fn extract_text_with_pages(&self, bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

        let mut sections = Vec::new();
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => clean_text(&text),
                Err(error) => {
                    debug!(page = page_no, %error, "skipping unreadable pdf page");
                    continue;
                }
            };

            if text.is_empty() {
                continue;
            }

            sections.push(format!("[Page {page_no}]\n{text}"));
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if sections.is_empty() {
            return Ok(Extraction::empty());
        }

        Ok(Extraction {
            text: Some(sections.join("\n\n")),
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_pdf_is_a_parse_error() {
        let result = PdfExtractor.extract_text_with_pages(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(ExtractionError::PdfParse(_))));
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        assert!(PdfExtractor.extract_text(b"plain words").is_err());
    }
}
