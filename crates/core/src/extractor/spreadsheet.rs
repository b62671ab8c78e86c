use super::{TextExtractor, COLUMN_SEPARATOR};
use crate::error::ExtractionError;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use tracing::debug;

pub struct SpreadsheetExtractor;

impl TextExtractor for SpreadsheetExtractor {
    fn format(&self) -> &'static str {
        "spreadsheet"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let mut sections = Vec::new();
        for name in workbook.sheet_names() {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(error) => {
                    debug!(sheet = %name, %error, "skipping unreadable sheet");
                    continue;
                }
            };
            if let Some(section) = sheet_section(&name, &range) {
                sections.push(section);
            }
        }

        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(sections.join("\n\n")))
    }
}

fn sheet_section(name: &str, range: &Range<Data>) -> Option<String> {
    let rows: Vec<String> = range
        .rows()
        .filter_map(|row| {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(|cell| cell.to_string().trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect();
            (!cells.is_empty()).then(|| cells.join(COLUMN_SEPARATOR))
        })
        .collect();

    if rows.is_empty() {
        return None;
    }
    Some(format!("[Sheet: {name}]\n{}", rows.join("\n")))
}
