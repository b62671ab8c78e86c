use super::ooxml::{open_package, read_part};
use super::{TextExtractor, COLUMN_SEPARATOR};
use crate::error::ExtractionError;
use quick_xml::events::Event;
use quick_xml::Reader;

const DOCUMENT_PART: &str = "word/document.xml";

pub struct WordExtractor;

impl TextExtractor for WordExtractor {
    fn format(&self) -> &'static str {
        "word"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        let mut package = open_package(bytes)?;
        let xml = read_part(&mut package, DOCUMENT_PART)?;
        parse_document(&xml)
    }
}

fn parse_document(xml: &[u8]) -> Result<Option<String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut rows = Vec::new();
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut table_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row_cells.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(element) => {
                let target = if table_depth > 0 { &mut cell } else { &mut paragraph };
                match element.local_name().as_ref() {
                    b"tab" => target.push('\t'),
                    b"br" | b"cr" => target.push('\n'),
                    _ => {}
                }
            }
            Event::Text(content) if in_text => {
                let content = content.unescape()?;
                if table_depth > 0 {
                    cell.push_str(&content);
                } else {
                    paragraph.push_str(&content);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if table_depth > 0 => cell.push('\n'),
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(paragraph.clone());
                    }
                    paragraph.clear();
                }
                b"tc" if table_depth == 1 => {
                    let value = cell.trim();
                    if !value.is_empty() {
                        row_cells.push(value.to_string());
                    }
                    cell.clear();
                }
                b"tr" if table_depth == 1 => {
                    if !row_cells.is_empty() {
                        rows.push(row_cells.join(COLUMN_SEPARATOR));
                    }
                    row_cells.clear();
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    paragraphs.extend(rows);
    if paragraphs.is_empty() {
        return Ok(None);
    }
    Ok(Some(paragraphs.join("\n\n")))
}
