//! Document bytes to markdown-ish text.
//!
//! Extraction runs page by page. Each page is rendered as structured markdown
//! when possible and as plain text otherwise. A document that cannot be read
//! at all yields a fixed placeholder instead of an error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

/// Returned when nothing could be extracted.
pub const EXTRACTION_FAILED_PLACEHOLDER: &str = "# PDF Extract Summary\n\n\
Text extraction failed for this document. Check that the file is a valid, text-based PDF.";

/// Between pages in the merged output.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Share of undecodable characters above which a page is not worth formatting.
const MAX_GARBLED_RATIO: f32 = 0.3;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("cannot open document: {0}")]
    Open(String),

    #[error("page {page}: {message}")]
    Page { page: usize, message: String },

    #[error("extractor panicked")]
    Panicked,
}

/// Outcome for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    Structured(String),
    Plain(String),
    Failed,
}

impl PageText {
    fn text(&self) -> Option<&str> {
        match self {
            PageText::Structured(text) | PageText::Plain(text) => Some(text.trim()),
            PageText::Failed => None,
        }
    }
}

/// An opened document.
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn structured(&self, page: usize) -> Result<String, ExtractionError>;
    fn plain(&self, page: usize) -> Result<String, ExtractionError>;
}

pub trait TextExtractor: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError>;
}

#[derive(Clone)]
pub struct DocumentIngestor {
    extractor: Arc<dyn TextExtractor>,
}

impl DocumentIngestor {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    pub fn pdf() -> Self {
        Self::new(Arc::new(PdfExtractor))
    }

    /// Never fails and never returns an empty string.
    pub fn extract_text(&self, bytes: &[u8]) -> String {
        let source = match guarded(|| self.extractor.open(bytes)) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Document extraction unavailable: {}", e);
                return EXTRACTION_FAILED_PLACEHOLDER.to_string();
            }
        };

        let pages: Vec<PageText> = (0..source.page_count())
            .map(|page| extract_page(source.as_ref(), page))
            .collect();

        let fallbacks = pages.iter().filter(|p| matches!(p, PageText::Plain(_))).count();
        let failures = pages.iter().filter(|p| matches!(p, PageText::Failed)).count();
        if fallbacks + failures > 0 {
            tracing::debug!(pages = pages.len(), fallbacks, failures, "Degraded page extraction");
        }

        let merged = pages
            .iter()
            .filter_map(PageText::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);

        if merged.trim().is_empty() {
            EXTRACTION_FAILED_PLACEHOLDER.to_string()
        } else {
            merged
        }
    }
}

fn extract_page(source: &dyn PageSource, page: usize) -> PageText {
    match guarded(|| source.structured(page)) {
        Ok(text) => PageText::Structured(text),
        Err(primary) => match guarded(|| source.plain(page)) {
            Ok(text) => {
                tracing::debug!(page, "Structured extraction failed, using plain text: {}", primary);
                PageText::Plain(text)
            }
            Err(fallback) => {
                tracing::warn!(page, "Page extraction failed: {}", fallback);
                PageText::Failed
            }
        },
    }
}

/// Third-party parsers may panic on malformed input.
fn guarded<T>(
    f: impl FnOnce() -> Result<T, ExtractionError>,
) -> Result<T, ExtractionError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(Err(ExtractionError::Panicked))
}

/// PDF extraction backed by `pdf-extract`.
pub struct PdfExtractor;

struct PdfPages {
    pages: Vec<String>,
}

impl TextExtractor for PdfExtractor {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractionError::Open(e.to_string()))?;
        Ok(Box::new(PdfPages { pages }))
    }
}

impl PdfPages {
    fn raw(&self, page: usize) -> Result<&str, ExtractionError> {
        self.pages
            .get(page)
            .map(String::as_str)
            .ok_or_else(|| ExtractionError::Page {
                page,
                message: "out of range".to_string(),
            })
    }
}

impl PageSource for PdfPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn structured(&self, page: usize) -> Result<String, ExtractionError> {
        let raw = self.raw(page)?;
        if garbled_ratio(raw) > MAX_GARBLED_RATIO {
            return Err(ExtractionError::Page {
                page,
                message: "text layer is mostly undecodable".to_string(),
            });
        }
        Ok(to_markdown(raw))
    }

    fn plain(&self, page: usize) -> Result<String, ExtractionError> {
        let raw = self.raw(page)?;
        Ok(raw
            .chars()
            .filter(|c| !is_garbage(*c))
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "))
    }
}

fn is_garbage(c: char) -> bool {
    c == '\u{FFFD}' || (c.is_control() && !c.is_whitespace())
}

fn garbled_ratio(text: &str) -> f32 {
    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.is_empty() {
        return 0.0;
    }
    let garbage = visible.iter().filter(|c| is_garbage(**c)).count();
    garbage as f32 / visible.len() as f32
}

/// Bullets become list items, soft hyphenation is rejoined and blank runs
/// collapse to one empty line.
fn to_markdown(raw: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for line in raw.lines().map(str::trim_end) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push(String::new());
            }
            continue;
        }
        blank_run = 0;

        let item = match trimmed.chars().next() {
            Some('•' | '◦' | '▪' | '●' | '‣' | '·') => {
                format!("- {}", trimmed.chars().skip(1).collect::<String>().trim_start())
            }
            _ => trimmed.to_string(),
        };

        let joins_previous = out
            .last()
            .map_or(false, |prev| prev.ends_with('-') && item.starts_with(char::is_lowercase));
        match out.last_mut() {
            Some(prev) if joins_previous => {
                prev.pop();
                prev.push_str(&item);
            }
            _ => out.push(item),
        }
    }

    while out.last().map_or(false, String::is_empty) {
        out.pop();
    }
    out.join("\n")
}
