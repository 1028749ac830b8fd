//! Extractor registry for dispatching files to their category's extractor.

use super::{
    ContentExtractor, DocxTextStrategy, ExtractionResult, ImageStrategy, LibreOfficeConverter,
    PdfConversionStrategy, PdfConverter, PdfRasterizer, PdfRenderStrategy, Preview,
    SheetStrategy, StrategyChain, TextStrategy,
};
use crate::config::ReportConfig;
use crate::encoding::EncodingDetector;
use crate::format::FormatCategory;
use crate::walker::FileEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Registry of content extractors, one per format category.
pub struct ExtractorRegistry {
    extractors: HashMap<FormatCategory, Box<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor, replacing any previous one for `category`.
    pub fn register<E: ContentExtractor + 'static>(&mut self, category: FormatCategory, extractor: E) {
        self.extractors.insert(category, Box::new(extractor));
    }

    /// Standard chains with the system rasterizer and LibreOffice.
    pub fn from_config(config: &ReportConfig) -> Self {
        let rasterizer = super::default_rasterizer(config);
        let converter: Option<Arc<dyn PdfConverter>> = if config.office_fallback {
            Some(Arc::new(LibreOfficeConverter::new(
                config.soffice_program.clone(),
                Duration::from_secs(config.office_timeout_secs),
            )))
        } else {
            None
        };
        Self::with_collaborators(config, rasterizer, converter)
    }

    /// Standard chains with explicit collaborators.
    ///
    /// Without a converter, Word and Excel have only their native strategy.
    pub fn with_collaborators(
        config: &ReportConfig,
        rasterizer: Arc<dyn PdfRasterizer>,
        converter: Option<Arc<dyn PdfConverter>>,
    ) -> Self {
        let dpi = config.pdf_dpi;
        let max_dim = config.max_image_dimension;
        let fallback = |chain: StrategyChain| match &converter {
            Some(converter) => chain.then(PdfConversionStrategy::new(
                converter.clone(),
                rasterizer.clone(),
                dpi,
                max_dim,
            )),
            None => chain,
        };

        let mut registry = Self::new();

        registry.register(
            FormatCategory::Pdf,
            StrategyChain::new(FormatCategory::Pdf)
                .then(PdfRenderStrategy::new(rasterizer.clone(), dpi, max_dim)),
        );
        registry.register(
            FormatCategory::Word,
            fallback(
                StrategyChain::new(FormatCategory::Word)
                    .then(DocxTextStrategy::new(config.max_text_lines, config.max_line_chars)),
            ),
        );
        registry.register(
            FormatCategory::Excel,
            fallback(StrategyChain::new(FormatCategory::Excel).then(SheetStrategy::new(
                config.max_rows,
                config.max_columns,
                config.max_line_chars,
            ))),
        );
        registry.register(
            FormatCategory::Image,
            StrategyChain::new(FormatCategory::Image).then(ImageStrategy::new(max_dim)),
        );
        registry.register(
            FormatCategory::Text,
            StrategyChain::new(FormatCategory::Text).then(TextStrategy::new(
                EncodingDetector::new(&config.fallback_encodings),
                config.max_text_lines,
                config.max_line_chars,
                config.max_rows,
                config.max_columns,
            )),
        );
        registry.register(FormatCategory::Unsupported, UnsupportedExtractor);

        registry
    }

    /// Whether `category` has an extractor.
    #[must_use]
    pub fn supports(&self, category: FormatCategory) -> bool {
        self.extractors.contains_key(&category)
    }

    /// Extract a preview for a file; categories without an extractor get none.
    pub fn extract(&self, entry: &FileEntry) -> ExtractionResult {
        match self.extractors.get(&entry.category()) {
            Some(extractor) => extractor.extract(entry),
            None => Ok(Preview::NoPreview),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists the file without reading it
pub struct UnsupportedExtractor;

impl ContentExtractor for UnsupportedExtractor {
    fn extract(&self, _entry: &FileEntry) -> ExtractionResult {
        Ok(Preview::NoPreview)
    }
}
