//! PDF Rendering
//!
//! Rasterizes the first page of a PDF. Two backends:
//! - pdfium (feature `pdfium`, needs the pdfium library at runtime)
//! - poppler's `pdftoppm` program, writing a PNG to stdout
//!
//! On macOS: brew install pdfium / brew install poppler
//! On Linux: apt install libpdfium-dev / apt install poppler-utils

use super::image_file::encode_preview;
use super::{ExtractionStrategy, Preview};
use crate::config::ReportConfig;
use crate::error::CollaboratorError;
use crate::walker::FileEntry;
use image::imageops::FilterType;
use image::DynamicImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renders the first page of a PDF file
pub trait PdfRasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render page 1 at `dpi`, with neither side larger than `max_dimension`
    fn render_first_page(
        &self,
        pdf: &Path,
        dpi: u32,
        max_dimension: u32,
    ) -> Result<DynamicImage, CollaboratorError>;
}

/// Pick the best available rasterizer
pub fn default_rasterizer(config: &ReportConfig) -> Arc<dyn PdfRasterizer> {
    #[cfg(feature = "pdfium")]
    {
        if PdfiumRasterizer::is_available() {
            tracing::info!("[PdfRenderer] Using pdfium backend");
            return Arc::new(PdfiumRasterizer);
        }
        tracing::warn!("[PdfRenderer] pdfium not available, using pdftoppm");
    }

    Arc::new(PdftoppmRasterizer::new(config.pdftoppm_program.clone()))
}

/// Rasterizer backed by poppler's `pdftoppm`
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Page 1 as PNG on stdout at `dpi`
    ///
    /// `-scale-to` is left out: poppler lets it override `-r`.
    fn args(pdf: &Path, dpi: u32) -> Vec<OsString> {
        vec![
            "-png".into(),
            "-f".into(),
            "1".into(),
            "-l".into(),
            "1".into(),
            "-singlefile".into(),
            "-r".into(),
            dpi.to_string().into(),
            pdf.as_os_str().to_os_string(),
        ]
    }

    /// Map pdftoppm's stderr to a failure kind
    fn classify_failure(stderr: &str) -> CollaboratorError {
        let lower = stderr.to_lowercase();
        if lower.contains("password") {
            CollaboratorError::PasswordProtected
        } else if lower.contains("wrong page range") || lower.contains("last page (0)") {
            CollaboratorError::ZeroPages
        } else {
            let detail = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("unreadable file");
            CollaboratorError::CorruptPdf(detail.trim().to_string())
        }
    }
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn render_first_page(
        &self,
        pdf: &Path,
        dpi: u32,
        max_dimension: u32,
    ) -> Result<DynamicImage, CollaboratorError> {
        let args = Self::args(pdf, dpi);

        let output = duct::cmd(&self.program, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| CollaboratorError::ToolUnavailable {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(&stderr));
        }

        if output.stdout.is_empty() {
            return Err(CollaboratorError::ZeroPages);
        }

        let img = image::load_from_memory(&output.stdout)
            .map_err(|e| CollaboratorError::Other(format!("pdftoppm produced an unreadable image: {}", e)))?;

        if img.width().max(img.height()) > max_dimension {
            return Ok(img.resize(max_dimension, max_dimension, FilterType::Lanczos3));
        }
        Ok(img)
    }
}

/// Rasterizer backed by pdfium-render
#[cfg(feature = "pdfium")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

#[cfg(feature = "pdfium")]
impl PdfiumRasterizer {
    fn bind() -> Result<pdfium_render::prelude::Pdfium, CollaboratorError> {
        use pdfium_render::prelude::*;

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| CollaboratorError::ToolUnavailable {
                program: "pdfium".to_string(),
                reason: e.to_string(),
            })
    }

    /// Check if pdfium library is available
    pub fn is_available() -> bool {
        Self::bind().is_ok()
    }
}

#[cfg(feature = "pdfium")]
impl PdfRasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn render_first_page(
        &self,
        pdf: &Path,
        dpi: u32,
        max_dimension: u32,
    ) -> Result<DynamicImage, CollaboratorError> {
        use pdfium_render::prelude::*;

        let pdfium = Self::bind()?;

        let document = pdfium.load_pdf_from_file(pdf, None).map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                CollaboratorError::PasswordProtected
            }
            other => CollaboratorError::CorruptPdf(other.to_string()),
        })?;

        if document.pages().len() == 0 {
            return Err(CollaboratorError::ZeroPages);
        }

        let page = document
            .pages()
            .first()
            .map_err(|e| CollaboratorError::CorruptPdf(format!("Failed to get page 1: {}", e)))?;

        // Calculate render size
        let page_width = page.width().value;
        let page_height = page.height().value;
        let scale = (max_dimension as f32 / page_width.max(page_height)).min(dpi as f32 / 72.0);
        let render_width = (page_width * scale).max(1.0) as i32;
        let render_height = (page_height * scale).max(1.0) as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(render_width)
            .set_target_height(render_height)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| CollaboratorError::Other(format!("Failed to render page: {}", e)))?;

        Ok(bitmap.as_image())
    }
}

/// Renders page 1 of a PDF file
pub struct PdfRenderStrategy {
    rasterizer: Arc<dyn PdfRasterizer>,
    dpi: u32,
    max_dimension: u32,
}

impl PdfRenderStrategy {
    pub fn new(rasterizer: Arc<dyn PdfRasterizer>, dpi: u32, max_dimension: u32) -> Self {
        Self {
            rasterizer,
            dpi,
            max_dimension,
        }
    }
}

impl ExtractionStrategy for PdfRenderStrategy {
    fn name(&self) -> &'static str {
        "PDF render"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        tracing::debug!(
            "[PdfRenderer] Rendering first page of {} with {}",
            entry.label(),
            self.rasterizer.name()
        );

        let img = self
            .rasterizer
            .render_first_page(&entry.path, self.dpi, self.max_dimension)?;

        encode_preview(img, self.max_dimension).map(Preview::Image)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::testing::entry_for;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rasterizer returning a fixed page or a fixed error
    pub struct StubRasterizer {
        pub fail_with: Option<fn() -> CollaboratorError>,
        pub calls: AtomicUsize,
    }

    impl StubRasterizer {
        pub fn ok() -> Self {
            Self {
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(f: fn() -> CollaboratorError) -> Self {
            Self {
                fail_with: Some(f),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PdfRasterizer for StubRasterizer {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn render_first_page(
            &self,
            _pdf: &Path,
            _dpi: u32,
            _max_dimension: u32,
        ) -> Result<DynamicImage, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                    850,
                    1100,
                    Rgb([255, 255, 255]),
                ))),
            }
        }
    }

    #[test]
    fn test_render_strategy_bounds_page_image() {
        let strategy = PdfRenderStrategy::new(Arc::new(StubRasterizer::ok()), 144, 500);
        let preview = strategy.extract(&entry_for(Path::new("report.pdf"))).unwrap();

        let Preview::Image(img) = preview else {
            panic!("Expected image preview");
        };
        assert!(img.width <= 500 && img.height <= 500);
        assert_eq!(img.height, 500);
    }

    #[test]
    fn test_render_failure_reason() {
        let strategy = PdfRenderStrategy::new(
            Arc::new(StubRasterizer::failing(|| CollaboratorError::PasswordProtected)),
            144,
            500,
        );
        let err = strategy.extract(&entry_for(Path::new("secret.pdf"))).unwrap_err();
        assert_eq!(err, "password-protected PDF");
    }

    #[test]
    fn test_pdftoppm_failure_classification() {
        assert!(matches!(
            PdftoppmRasterizer::classify_failure("Command Line Error: Incorrect password"),
            CollaboratorError::PasswordProtected
        ));
        assert!(matches!(
            PdftoppmRasterizer::classify_failure(
                "Wrong page range given: the first page (1) can not be after the last page (0)."
            ),
            CollaboratorError::ZeroPages
        ));
        assert!(matches!(
            PdftoppmRasterizer::classify_failure("Syntax Error: Couldn't find trailer dictionary"),
            CollaboratorError::CorruptPdf(_)
        ));
    }

    #[test]
    fn test_missing_pdftoppm_is_unavailable() {
        let rasterizer = PdftoppmRasterizer::new(PathBuf::from("docreport-no-such-program"));
        let err = rasterizer
            .render_first_page(Path::new("whatever.pdf"), 144, 800)
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::ToolUnavailable { .. }));
    }

    #[test]
    fn test_pdftoppm_args_keep_requested_dpi() {
        let args = PdftoppmRasterizer::args(Path::new("page.pdf"), 72);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        let joined = args.join(" ");

        assert!(joined.contains("-r 72"));
        assert!(!args.iter().any(|a| a == "-scale-to"));
        assert_eq!(args.last().map(String::as_str), Some("page.pdf"));
    }

    #[cfg(unix)]
    #[test]
    fn test_pdftoppm_invocation_uses_dpi_only() {
        use std::os::unix::fs::PermissionsExt;

        // Fake pdftoppm that reports its arguments on stderr and fails
        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("pdftoppm");
        std::fs::write(&script, "#!/bin/sh\necho \"$@\" 1>&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let rasterizer = PdftoppmRasterizer::new(script);
        let err = rasterizer
            .render_first_page(Path::new("x.pdf"), 72, 1600)
            .unwrap_err();

        let CollaboratorError::CorruptPdf(argv) = err else {
            panic!("Expected the fake program's stderr, got {:?}", err);
        };
        assert!(argv.contains("-r 72"), "argv was {}", argv);
        assert!(!argv.contains("-scale-to"), "argv was {}", argv);
        assert!(argv.ends_with("x.pdf"));
    }
}
