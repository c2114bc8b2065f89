//! Document kinds and segments with provenance for citations

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Recognized document kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// PDF document, one segment per non-empty page
    Pdf,
    /// Spreadsheet (.xlsx, .xls) or delimited text (.csv), one segment per row
    Tabular,
    /// PowerPoint presentation (.pptx), one segment per slide
    Slides,
    /// Plain UTF-8 text, one segment for the whole file
    Text,
}

/// Outcome of classifying an upload by its filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindDetection {
    /// A recognized kind
    Known(DocumentKind),
    /// Suffix matched nothing; carries the offending extension
    Unsupported(String),
}

impl DocumentKind {
    /// Classify a filename by its (case-insensitive) suffix
    pub fn detect(filename: &str) -> KindDetection {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => KindDetection::Known(Self::Pdf),
            "xlsx" | "xls" | "csv" => KindDetection::Known(Self::Tabular),
            "pptx" => KindDetection::Known(Self::Slides),
            "txt" => KindDetection::Known(Self::Text),
            _ => KindDetection::Unsupported(if extension.is_empty() {
                filename.to_string()
            } else {
                format!(".{}", extension)
            }),
        }
    }

    /// Short tag used in logs and metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Tabular => "tabular",
            Self::Slides => "pptx",
            Self::Text => "txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where inside the source file a segment came from
///
/// Must stay externally tagged: bincode cannot decode internally tagged enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// 1-based PDF page
    Page { number: u32 },
    /// 1-based, header-inclusive row; `sheet` is set for spreadsheets
    Row { sheet: Option<String>, number: u32 },
    /// 1-based slide
    Slide { number: u32 },
    /// The file as a whole
    Whole,
}

impl Locator {
    /// Numeric locator, if any
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Page { number } | Self::Row { number, .. } | Self::Slide { number } => {
                Some(*number)
            }
            Self::Whole => None,
        }
    }
}

/// Provenance attached to every segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Original upload filename
    pub filename: String,
    /// Page, row or slide
    pub locator: Locator,
    /// Kind of the source file
    pub kind: DocumentKind,
    /// Human-readable citation label, e.g. "file.pdf - Page 3"
    pub label: String,
}

impl SourceMetadata {
    /// Build metadata and derive its label from filename and locator
    pub fn new(filename: impl Into<String>, kind: DocumentKind, locator: Locator) -> Self {
        let filename = filename.into();
        let label = match &locator {
            Locator::Page { number } => format!("{} - Page {}", filename, number),
            Locator::Row {
                sheet: Some(sheet),
                number,
            } => format!("{} - {} Row {}", filename, sheet, number),
            Locator::Row { sheet: None, number } => format!("{} - Row {}", filename, number),
            Locator::Slide { number } => format!("{} - Slide {}", filename, number),
            Locator::Whole => filename.clone(),
        };

        Self {
            filename,
            locator,
            kind,
            label,
        }
    }
}

/// Atomic indexed unit: text plus provenance
///
/// Fields are read-only after construction; the chunker produces new segments
/// rather than editing existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    text: String,
    source: SourceMetadata,
    doc_id: Uuid,
}

impl Segment {
    /// Create a segment
    pub fn new(text: impl Into<String>, source: SourceMetadata, doc_id: Uuid) -> Self {
        Self {
            text: text.into(),
            source,
            doc_id,
        }
    }

    /// Segment text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Provenance metadata
    pub fn source(&self) -> &SourceMetadata {
        &self.source
    }

    /// Citation label
    pub fn label(&self) -> &str {
        &self.source.label
    }

    /// Ingestion batch this segment belongs to
    pub fn doc_id(&self) -> Uuid {
        self.doc_id
    }

    /// A sibling segment with new text and the same provenance
    pub fn derive(&self, text: impl Into<String>) -> Self {
        Self::new(text, self.source.clone(), self.doc_id)
    }
}
