//! Content extraction
//!
//! One ordered chain of strategies per format category. The first strategy
//! that returns a preview wins; each strategy runs at most once per file.
//!
//! ```text
//! PDF    -> [render page 1]
//! Word   -> [docx text layer] -> [soffice -> PDF -> render page 1]
//! Excel  -> [calamine first sheet] -> [soffice -> PDF -> render page 1]
//! Image  -> [decode + normalize]
//! Text   -> [decode (+ CSV table) + truncate]
//! ```

mod excel;
mod image_file;
mod office;
mod pdf;
mod registry;
mod text;
mod word;

pub use self::excel::SheetStrategy;
pub use self::image_file::{encode_preview, ImageStrategy};
pub use self::office::{LibreOfficeConverter, PdfConversionStrategy, PdfConverter};
pub use self::pdf::{default_rasterizer, PdfRenderStrategy, PdfRasterizer, PdftoppmRasterizer};
#[cfg(feature = "pdfium")]
pub use self::pdf::PdfiumRasterizer;
pub use self::registry::{ExtractorRegistry, UnsupportedExtractor};
pub use self::text::{bound_lines, read_bounded_lines, TextStrategy};
pub use self::word::DocxTextStrategy;

use crate::format::FormatCategory;
use crate::walker::FileEntry;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Embedded image preview (PNG encoded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreview {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Leading lines of a text-like file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPreview {
    /// At most `max_text_lines` lines, each at most `max_line_chars` chars
    pub lines: Vec<String>,
    /// True when the source had more lines than were kept
    pub truncated: bool,
    /// Number of lines in the source
    pub total_lines: usize,
    /// Detected character encoding, when the source was decoded from bytes
    pub encoding: Option<String>,
}

/// Leading rows and columns of a sheet or CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExcerpt {
    /// At most `max_rows` rows of at most `max_columns` cells
    pub rows: Vec<Vec<String>>,
    /// True when the source had more rows than were kept
    pub truncated: bool,
    pub total_rows: usize,
    pub total_columns: usize,
    /// Short note shown under the table (source, encoding)
    pub note: Option<String>,
}

/// Representative content of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Image(ImagePreview),
    Text(TextPreview),
    Table(TableExcerpt),
    /// Nothing to show (unsupported format)
    NoPreview,
}

impl Preview {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Text(_) => "text",
            Self::Table(_) => "table",
            Self::NoPreview => "none",
        }
    }

    /// Check if content was truncated
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Text(t) => t.truncated,
            Self::Table(t) => t.truncated,
            _ => false,
        }
    }
}

/// Extraction of one file failed on every strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub entry: FileEntry,
    pub category: FormatCategory,
    /// Human readable reason, naming every strategy that was tried
    pub reason: String,
    /// Whether a fallback strategy was tried after the primary one
    pub attempted_fallback: bool,
}

/// Exactly one per file
pub type ExtractionResult = Result<Preview, ExtractionFailure>;

/// A single way of producing a preview
///
/// Implementations return a human readable reason on failure. Panics are
/// caught by the owning `StrategyChain`.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in failure reasons ("docx text layer", "PDF conversion")
    fn name(&self) -> &'static str;

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String>;
}

/// Produces the extraction result for a file of one category
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, entry: &FileEntry) -> ExtractionResult;
}

/// Ordered list of strategies tried until one succeeds
pub struct StrategyChain {
    category: FormatCategory,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategyChain {
    pub fn new(category: FormatCategory) -> Self {
        Self {
            category,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; earlier strategies are tried first
    pub fn then<S: ExtractionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl ContentExtractor for StrategyChain {
    fn extract(&self, entry: &FileEntry) -> ExtractionResult {
        let mut reasons = Vec::with_capacity(self.strategies.len());

        for (attempt, strategy) in self.strategies.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.extract(entry)));

            match outcome {
                Ok(Ok(preview)) => {
                    if attempt > 0 {
                        tracing::info!(
                            "[Extractor] {} succeeded via fallback '{}'",
                            entry.label(),
                            strategy.name()
                        );
                    }
                    return Ok(preview);
                }
                Ok(Err(reason)) => {
                    tracing::debug!(
                        "[Extractor] '{}' failed for {}: {}",
                        strategy.name(),
                        entry.label(),
                        reason
                    );
                    reasons.push(format!("{} failed: {}", strategy.name(), reason));
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(
                        "[Extractor] '{}' PANICKED for {}: {}",
                        strategy.name(),
                        entry.label(),
                        message
                    );
                    reasons.push(format!("{} panicked: {}", strategy.name(), message));
                }
            }
        }

        if reasons.is_empty() {
            reasons.push("no extraction strategy available".to_string());
        }

        Err(ExtractionFailure {
            entry: entry.clone(),
            category: self.category,
            attempted_fallback: reasons.len() > 1,
            reason: reasons.join("; "),
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::path::Path;

    fn text(line: &str) -> Preview {
        Preview::Text(TextPreview {
            lines: vec![line.to_string()],
            truncated: false,
            total_lines: 1,
            encoding: None,
        })
    }

    #[test]
    fn test_first_success_wins() {
        let chain = StrategyChain::new(FormatCategory::Word)
            .then(Fixed("primary", Ok(text("a"))))
            .then(Fixed("fallback", Ok(text("b"))));

        let result = chain.extract(&entry_for(Path::new("x.docx")));
        assert_eq!(result.unwrap(), text("a"));
    }

    #[test]
    fn test_fallback_used_after_failure() {
        let chain = StrategyChain::new(FormatCategory::Word)
            .then(Fixed("primary", Err("empty text layer".to_string())))
            .then(Fixed("fallback", Ok(text("b"))));

        let result = chain.extract(&entry_for(Path::new("x.docx")));
        assert_eq!(result.unwrap(), text("b"));
    }

    #[test]
    fn test_all_failures_are_combined() {
        let chain = StrategyChain::new(FormatCategory::Excel)
            .then(Fixed("native sheet", Err("bad zip".to_string())))
            .then(Fixed("PDF conversion", Err("soffice missing".to_string())));

        let failure = chain.extract(&entry_for(Path::new("broken.xlsx"))).unwrap_err();
        assert!(failure.attempted_fallback);
        assert_eq!(failure.category, FormatCategory::Excel);
        assert!(failure.reason.contains("native sheet failed: bad zip"));
        assert!(failure.reason.contains("PDF conversion failed: soffice missing"));
    }

    #[test]
    fn test_panic_becomes_failure() {
        let chain = StrategyChain::new(FormatCategory::Pdf).then(Panicking);

        let failure = chain.extract(&entry_for(Path::new("bad.pdf"))).unwrap_err();
        assert!(!failure.attempted_fallback);
        assert!(failure.reason.contains("malformed font table"));
    }

    #[test]
    fn test_empty_chain_fails_cleanly() {
        let chain = StrategyChain::new(FormatCategory::Pdf);
        let failure = chain.extract(&entry_for(Path::new("a.pdf"))).unwrap_err();
        assert!(failure.reason.contains("no extraction strategy"));
    }
}
