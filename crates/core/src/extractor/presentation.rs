use super::ooxml::{open_package, read_part, Package};
use super::{TextExtractor, COLUMN_SEPARATOR};
use crate::error::ExtractionError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const SLIDE_SUFFIX: &str = ".xml";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

pub struct PresentationExtractor;

impl TextExtractor for PresentationExtractor {
    fn format(&self) -> &'static str {
        "presentation"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        let mut package = open_package(bytes)?;

        let mut sections = Vec::new();
        for (position, part) in slide_parts(&mut package)?.into_iter().enumerate() {
            let xml = read_part(&mut package, &part)?;
            let items = parse_slide(&xml)?;
            if items.is_empty() {
                continue;
            }
            sections.push(format!("[Slide {}]\n{}", position + 1, items.join("\n")));
        }

        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(sections.join("\n\n")))
    }
}

// Slide part names in numeric order (`slide2.xml` before `slide10.xml`).
fn numbered_slides(package: &Package<'_>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = package
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix(SLIDE_PREFIX)?
                .strip_suffix(SLIDE_SUFFIX)?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

// Deck order comes from `sldIdLst` in presentation.xml, resolved through its
// relationships. Packages without them fall back to part-name order.
fn slide_parts(package: &mut Package<'_>) -> Result<Vec<String>, ExtractionError> {
    let numbered = numbered_slides(package);
    if !has_part(package, PRESENTATION_PART) || !has_part(package, PRESENTATION_RELS) {
        return Ok(numbered);
    }

    let slide_ids = slide_relationship_ids(&read_part(package, PRESENTATION_PART)?)?;
    let targets = relationship_targets(&read_part(package, PRESENTATION_RELS)?)?;
    let ordered: Vec<String> = slide_ids
        .iter()
        .filter_map(|id| targets.get(id))
        .filter(|part| numbered.contains(*part))
        .cloned()
        .collect();

    if ordered.is_empty() {
        return Ok(numbered);
    }
    Ok(ordered)
}

fn has_part(package: &Package<'_>, part: &str) -> bool {
    package.file_names().any(|name| name == part)
}

fn slide_relationship_ids(xml: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"sldId" =>
            {
                if let Some(id) = attribute(&element, true, b"id") {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

fn relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (
                    attribute(&element, false, b"Id"),
                    attribute(&element, false, b"Target"),
                ) {
                    targets.insert(id, resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

// Targets are relative to `ppt/` unless rooted at the package.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(rooted) => rooted.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

fn attribute(element: &BytesStart<'_>, prefixed: bool, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name && attr.key.prefix().is_some() == prefixed)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn parse_slide(xml: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut items = Vec::new();
    let mut shape = String::new();
    let mut cell = String::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut shape_depth = 0usize;
    let mut table_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"sp" => {
                    if shape_depth == 0 {
                        shape.clear();
                    }
                    shape_depth += 1;
                }
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row_cells.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(element) if element.local_name().as_ref() == b"br" => {
                if table_depth > 0 {
                    cell.push('\n');
                } else if shape_depth > 0 {
                    shape.push('\n');
                }
            }
            Event::Text(content) if in_text => {
                let content = content.unescape()?;
                if table_depth > 0 {
                    cell.push_str(&content);
                } else if shape_depth > 0 {
                    shape.push_str(&content);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if table_depth > 0 => cell.push(' '),
                b"p" if shape_depth > 0 => shape.push('\n'),
                b"sp" => {
                    shape_depth = shape_depth.saturating_sub(1);
                    if shape_depth == 0 {
                        let text = shape.trim();
                        if !text.is_empty() {
                            items.push(text.to_string());
                        }
                        shape.clear();
                    }
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
                        items.push(row_cells.join(COLUMN_SEPARATOR));
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

    Ok(items)
}
