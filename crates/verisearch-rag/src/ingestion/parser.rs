//! Multi-format document parser
//!
//! Each [`DocumentKind`] maps to exactly one parsing strategy. Every strategy
//! turns raw upload bytes into ordered [`Segment`]s carrying provenance
//! (page, row or slide) for later citation.

use calamine::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{DocumentKind, KindDetection, Locator, Segment, SourceMetadata};

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Classify an upload by filename, rejecting unrecognized suffixes
    pub fn detect(filename: &str) -> Result<DocumentKind> {
        match DocumentKind::detect(filename) {
            KindDetection::Known(kind) => Ok(kind),
            KindDetection::Unsupported(ext) => Err(Error::UnsupportedFormat(ext)),
        }
    }

    /// Parse raw bytes of a known kind into segments tagged with `doc_id`
    pub fn parse(
        data: &[u8],
        filename: &str,
        kind: DocumentKind,
        doc_id: Uuid,
    ) -> Result<Vec<Segment>> {
        let segments = match kind {
            DocumentKind::Pdf => Self::parse_pdf(data, filename, doc_id)?,
            DocumentKind::Tabular => Self::parse_tabular(data, filename, doc_id)?,
            DocumentKind::Slides => Self::parse_pptx(data, filename, doc_id)?,
            DocumentKind::Text => Self::parse_text(data, filename, doc_id)?,
        };

        tracing::info!(
            filename,
            kind = %kind,
            segments = segments.len(),
            "Parsed document"
        );

        Ok(segments)
    }

    /// Parse PDF document, one segment per page with text
    fn parse_pdf(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        let document = lopdf::Document::load_mem(data)
            .map_err(|e| Error::parse_failure(filename, format!("Invalid PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys().copied() {
            match document.extract_text(&[page_number]) {
                Ok(text) => pages.push((page_number, text)),
                Err(e) => {
                    tracing::warn!(filename, page_number, "Skipping unreadable PDF page: {}", e);
                }
            }
        }

        Ok(pdf_pages_to_segments(pages, filename, doc_id))
    }

    /// Parse a spreadsheet, falling back to delimited text
    fn parse_tabular(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        match Self::parse_spreadsheet(data, filename, doc_id) {
            Ok(segments) => Ok(segments),
            Err(spreadsheet_err) => {
                tracing::debug!(
                    filename,
                    "Not a readable spreadsheet ({}), trying delimited text",
                    spreadsheet_err
                );
                Self::parse_delimited(data, filename, doc_id)
            }
        }
    }

    /// Parse every sheet of an Excel workbook
    fn parse_spreadsheet(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data))
            .map_err(|e| Error::parse_failure(filename, e.to_string()))?;

        let mut segments = Vec::new();
        let sheet_names = workbook.sheet_names().to_vec();

        for sheet_name in &sheet_names {
            let range = workbook
                .worksheet_range(sheet_name)
                .map_err(|e| Error::parse_failure(filename, e.to_string()))?;

            // Ranges start at the first used cell, not necessarily A1
            let first_row = range.start().map(|(row, _)| row).unwrap_or(0);
            let mut rows = range.rows();

            let Some(header_cells) = rows.next() else {
                continue;
            };
            let headers: Vec<String> = header_cells
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    cell_to_string(cell).unwrap_or_else(|| format!("Unnamed: {}", col))
                })
                .collect();

            for (offset, row) in rows.enumerate() {
                let values: Vec<Option<String>> = row.iter().map(cell_to_string).collect();
                // +1 for the header row, +1 for 1-based numbering
                let row_number = first_row + offset as u32 + 2;
                let locator = Locator::Row {
                    sheet: Some(sheet_name.clone()),
                    number: row_number,
                };
                let preamble = format!("Sheet: {}, Row {}", sheet_name, row_number);

                if let Some(segment) =
                    row_to_segment(&headers, &values, &preamble, locator, filename, doc_id)
                {
                    segments.push(segment);
                }
            }
        }

        tracing::debug!(
            filename,
            rows = segments.len(),
            sheets = sheet_names.len(),
            "Parsed spreadsheet"
        );

        Ok(segments)
    }

    /// Parse comma-delimited text with a header row
    fn parse_delimited(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::parse_failure(filename, format!("Invalid CSV: {}", e)))?
            .iter()
            .enumerate()
            .map(|(col, h)| {
                let h = h.trim();
                if h.is_empty() {
                    format!("Unnamed: {}", col)
                } else {
                    h.to_string()
                }
            })
            .collect();

        let mut segments = Vec::new();

        for (index, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| Error::parse_failure(filename, format!("Invalid CSV: {}", e)))?;
            let values: Vec<Option<String>> = record
                .iter()
                .map(|v| {
                    let v = v.trim();
                    (!v.is_empty()).then(|| v.to_string())
                })
                .collect();

            let row_number = index as u32 + 2;
            let locator = Locator::Row {
                sheet: None,
                number: row_number,
            };
            let preamble = format!("Row {}", row_number);

            if let Some(segment) =
                row_to_segment(&headers, &values, &preamble, locator, filename, doc_id)
            {
                segments.push(segment);
            }
        }

        Ok(segments)
    }

    /// Parse PowerPoint presentation (.pptx), one segment per slide
    fn parse_pptx(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::parse_failure(filename, format!("Invalid PPTX archive: {}", e)))?;

        let slides = match deck_order(&mut archive) {
            Some(slides) => slides,
            None => numbered_slides(&archive),
        };

        if slides.is_empty() {
            return Err(Error::parse_failure(filename, "Presentation contains no slides"));
        }

        let mut segments = Vec::new();

        for (position, slide_name) in slides.iter().enumerate() {
            let mut xml = String::new();
            archive
                .by_name(slide_name)
                .map_err(|e| Error::parse_failure(filename, e.to_string()))?
                .read_to_string(&mut xml)
                .map_err(|e| Error::parse_failure(filename, e.to_string()))?;

            let text = extract_text_from_slide_xml(&xml)
                .map_err(|e| Error::parse_failure(filename, e))?;
            if text.trim().is_empty() {
                continue;
            }

            let source = SourceMetadata::new(
                filename,
                DocumentKind::Slides,
                Locator::Slide {
                    number: position as u32 + 1,
                },
            );
            segments.push(Segment::new(text, source, doc_id));
        }

        Ok(segments)
    }

    /// Parse plain UTF-8 text as a single segment
    fn parse_text(data: &[u8], filename: &str, doc_id: Uuid) -> Result<Vec<Segment>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::parse_failure(filename, format!("Text is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let source = SourceMetadata::new(filename, DocumentKind::Text, Locator::Whole);
        Ok(vec![Segment::new(text, source, doc_id)])
    }
}

/// Turn extracted (page number, text) pairs into page segments, dropping blank pages
fn pdf_pages_to_segments(pages: Vec<(u32, String)>, filename: &str, doc_id: Uuid) -> Vec<Segment> {
    pages
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(number, text)| {
            let source =
                SourceMetadata::new(filename, DocumentKind::Pdf, Locator::Page { number });
            Segment::new(text, source, doc_id)
        })
        .collect()
}

/// Serialize one data row as "<column>: <value>" lines, omitting empty cells
fn row_to_segment(
    headers: &[String],
    values: &[Option<String>],
    preamble: &str,
    locator: Locator,
    filename: &str,
    doc_id: Uuid,
) -> Option<Segment> {
    let lines: Vec<String> = values
        .iter()
        .enumerate()
        .filter_map(|(col, value)| {
            let value = value.as_ref()?;
            let column = headers
                .get(col)
                .cloned()
                .unwrap_or_else(|| format!("Unnamed: {}", col));
            Some(format!("{}: {}", column, value))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let text = format!("{}\n{}", preamble, lines.join("\n"));
    let source = SourceMetadata::new(filename, DocumentKind::Tabular, locator);
    Some(Segment::new(text, source, doc_id))
}

/// Render a spreadsheet cell, `None` for empty or error cells
fn cell_to_string(cell: &calamine::Data) -> Option<String> {
    let rendered = match cell {
        calamine::Data::Empty | calamine::Data::Error(_) => return None,
        calamine::Data::String(s) => s.trim().to_string(),
        calamine::Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    };

    (!rendered.is_empty()).then_some(rendered)
}

/// Slide parts sorted by file number: slide1.xml, slide2.xml, ...
fn numbered_slides<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            name.strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()
                .map(|n| (n, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(n, _)| *n);
    slides.into_iter().map(|(_, name)| name).collect()
}

/// Slide parts in presentation order, from `p:sldIdLst` and its relationships
///
/// `None` when the deck parts are missing, malformed or name no slide.
fn deck_order<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Option<Vec<String>> {
    let presentation = read_part(archive, "ppt/presentation.xml")?;
    let relationships = read_part(archive, "ppt/_rels/presentation.xml.rels")?;

    let ids = match slide_relationship_ids(&presentation) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!("Ignoring slide list: {}", e);
            return None;
        }
    };
    let targets = match relationship_targets(&relationships) {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!("Ignoring slide relationships: {}", e);
            return None;
        }
    };

    let slides: Vec<String> = ids
        .iter()
        .filter_map(|id| targets.get(id))
        .map(|target| match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("ppt/{}", target),
        })
        .filter(|name| archive.index_for_name(name).is_some())
        .collect();

    if slides.len() != ids.len() {
        tracing::debug!(listed = ids.len(), found = slides.len(), "Slide list has dangling entries");
    }

    (!slides.is_empty()).then_some(slides)
}

fn read_part<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut xml = String::new();
    archive.by_name(name).ok()?.read_to_string(&mut xml).ok()?;
    Some(xml)
}

/// Relationship ids (`r:id`) of each `p:sldId`, in document order
fn slide_relationship_ids(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                for attr in e.attributes().flatten() {
                    if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        let value = attr.unescape_value().map_err(|e| e.to_string())?;
                        ids.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Malformed presentation XML: {}", e)),
            _ => {}
        }
    }

    Ok(ids)
}

/// `Id -> Target` for every relationship in a `.rels` part
fn relationship_targets(xml: &str) -> std::result::Result<HashMap<String, String>, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(|e| e.to_string())?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value.into_owned()),
                        b"Target" => target = Some(value.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Malformed relationships XML: {}", e)),
            _ => {}
        }
    }

    Ok(targets)
}

/// Extract paragraph text from a slide's DrawingML
///
/// Runs (`<a:t>`) inside one `<a:p>` are concatenated verbatim; paragraphs are
/// joined with newlines.
fn extract_text_from_slide_xml(xml: &str) -> std::result::Result<String, String> {
    let mut reader = quick_xml::Reader::from_str(xml);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Malformed slide XML: {}", e)),
            _ => {}
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }

    Ok(paragraphs.join("\n"))
}
