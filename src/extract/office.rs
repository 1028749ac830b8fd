//! Office to PDF fallback
//!
//! When the native Word or Excel reader fails, the document is converted to
//! PDF with LibreOffice in a scratch directory and its first page rendered.
//! Conversion plus render is a single fallback attempt.

use super::image_file::encode_preview;
use super::pdf::PdfRasterizer;
use super::{ExtractionStrategy, Preview};
use crate::error::CollaboratorError;
use crate::walker::FileEntry;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Converts an office document to PDF
pub trait PdfConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Convert `input` and return the path of the PDF written into `out_dir`
    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, CollaboratorError>;
}

/// Headless LibreOffice (`soffice --headless --convert-to pdf`)
///
/// A conversion still running after `timeout` is killed and reported as a
/// failure.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    program: PathBuf,
    timeout: Duration,
}

impl LibreOfficeConverter {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }
}

impl PdfConverter for LibreOfficeConverter {
    fn name(&self) -> &'static str {
        "soffice"
    }

    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, CollaboratorError> {
        let program = self.program.display().to_string();
        let args: Vec<OsString> = vec![
            "--headless".into(),
            "--norestore".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ];

        // stderr goes to a file: soffice's own children can hold a pipe open
        // after it is killed
        let log = out_dir.join("soffice-stderr.log");
        let handle = duct::cmd(&self.program, args)
            .stdout_null()
            .stderr_path(&log)
            .unchecked()
            .start()
            .map_err(|e| CollaboratorError::ToolUnavailable {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match handle.try_wait() {
                Ok(Some(output)) => break output.status,
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!(
                        "[OfficeConverter] {} still running after {:?}, killing it",
                        input.display(),
                        self.timeout
                    );
                    if let Err(e) = handle.kill() {
                        tracing::warn!("[OfficeConverter] Failed to kill {}: {}", program, e);
                    }
                    return Err(CollaboratorError::ToolFailed {
                        program,
                        reason: format!("timed out after {}s", self.timeout.as_secs()),
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(CollaboratorError::ToolFailed {
                        program,
                        reason: e.to_string(),
                    })
                }
            }
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&log).unwrap_or_default();
            return Err(CollaboratorError::ToolFailed {
                program,
                reason: stderr.trim().to_string(),
            });
        }

        // soffice names the output after the input stem
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let pdf = out_dir.join(format!("{}.pdf", stem));

        if !pdf.is_file() {
            return Err(CollaboratorError::ToolFailed {
                program,
                reason: "conversion produced no PDF".to_string(),
            });
        }

        Ok(pdf)
    }
}

/// Convert to PDF, then render page 1
pub struct PdfConversionStrategy {
    converter: Arc<dyn PdfConverter>,
    rasterizer: Arc<dyn PdfRasterizer>,
    dpi: u32,
    max_dimension: u32,
}

impl PdfConversionStrategy {
    pub fn new(
        converter: Arc<dyn PdfConverter>,
        rasterizer: Arc<dyn PdfRasterizer>,
        dpi: u32,
        max_dimension: u32,
    ) -> Self {
        Self {
            converter,
            rasterizer,
            dpi,
            max_dimension,
        }
    }
}

impl ExtractionStrategy for PdfConversionStrategy {
    fn name(&self) -> &'static str {
        "PDF conversion"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        // Removed when dropped, on success and on every error path
        let scratch = TempDir::with_prefix("docreport-convert-")
            .map_err(|e| format!("Failed to create scratch directory: {}", e))?;

        tracing::info!(
            "[OfficeConverter] Converting {} to PDF with {}",
            entry.label(),
            self.converter.name()
        );

        let pdf = self.converter.convert_to_pdf(&entry.path, scratch.path())?;
        let img = self
            .rasterizer
            .render_first_page(&pdf, self.dpi, self.max_dimension)?;

        encode_preview(img, self.max_dimension).map(Preview::Image)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::pdf::tests::StubRasterizer;
    use crate::extract::testing::entry_for;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Converter that writes an empty PDF, or fails without touching disk
    pub struct StubConverter {
        pub succeed: bool,
        pub calls: AtomicUsize,
    }

    impl StubConverter {
        pub fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PdfConverter for StubConverter {
        fn name(&self) -> &'static str {
            "stub converter"
        }

        fn convert_to_pdf(
            &self,
            input: &Path,
            out_dir: &Path,
        ) -> Result<PathBuf, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(CollaboratorError::ToolUnavailable {
                    program: "soffice".to_string(),
                    reason: "not installed".to_string(),
                });
            }
            let pdf = out_dir.join(format!(
                "{}.pdf",
                input.file_stem().unwrap_or_default().to_string_lossy()
            ));
            std::fs::write(&pdf, b"%PDF-1.4")?;
            Ok(pdf)
        }
    }

    #[test]
    fn test_conversion_then_render() {
        let converter = Arc::new(StubConverter::new(true));
        let rasterizer = Arc::new(StubRasterizer::ok());
        let strategy =
            PdfConversionStrategy::new(converter.clone(), rasterizer.clone(), 144, 400);

        let preview = strategy.extract(&entry_for(Path::new("old.doc"))).unwrap();
        assert_eq!(preview.kind(), "image");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_conversion_skips_render() {
        let rasterizer = Arc::new(StubRasterizer::ok());
        let strategy = PdfConversionStrategy::new(
            Arc::new(StubConverter::new(false)),
            rasterizer.clone(),
            144,
            400,
        );

        let err = strategy.extract(&entry_for(Path::new("old.doc"))).unwrap_err();
        assert!(err.contains("soffice is not available"));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_soffice_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let converter = LibreOfficeConverter::new(
            PathBuf::from("docreport-no-such-soffice"),
            Duration::from_secs(5),
        );

        let err = converter
            .convert_to_pdf(Path::new("memo.docx"), temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    fn fake_soffice(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("soffice");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_soffice_is_killed() {
        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let converter = LibreOfficeConverter::new(
            fake_soffice(bin_dir.path(), "exec sleep 30"),
            Duration::from_secs(1),
        );

        let started = Instant::now();
        let err = converter
            .convert_to_pdf(Path::new("memo.docx"), out_dir.path())
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(20));
        match err {
            CollaboratorError::ToolFailed { reason, .. } => assert_eq!(reason, "timed out after 1s"),
            other => panic!("Expected a timeout, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_soffice_stderr_becomes_reason() {
        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let converter = LibreOfficeConverter::new(
            fake_soffice(bin_dir.path(), "echo 'Error: source file could not be loaded' 1>&2\nexit 1"),
            Duration::from_secs(10),
        );

        let err = converter
            .convert_to_pdf(Path::new("memo.docx"), out_dir.path())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "{} failed: Error: source file could not be loaded",
                bin_dir.path().join("soffice").display()
            )
        );
    }
}
