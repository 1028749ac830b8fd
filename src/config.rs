//! Run configuration
//!
//! Defaults, then `DOCREPORT_*` environment variables (a `.env` file is
//! loaded by the binary first), then command line flags.

use std::path::PathBuf;
use std::str::FromStr;

/// Tunable bounds and collaborator settings for one report run
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Maximum number of lines in a text preview
    pub max_text_lines: usize,

    /// Maximum number of characters kept per text line
    pub max_line_chars: usize,

    /// Maximum number of rows in a table excerpt (header included)
    pub max_rows: usize,

    /// Maximum number of columns in a table excerpt
    pub max_columns: usize,

    /// Largest width or height of an embedded image, in pixels
    pub max_image_dimension: u32,

    /// Resolution used to rasterize the first PDF page
    pub pdf_dpi: u32,

    /// Directory levels shown next to the file name in section headings
    pub path_context_levels: usize,

    /// Encodings tried after UTF-8, as WHATWG labels
    pub fallback_encodings: Vec<String>,

    /// Whether Word/Excel files may be converted to PDF as a fallback
    pub office_fallback: bool,

    /// LibreOffice executable used for PDF conversion
    pub soffice_program: PathBuf,

    /// Seconds a single LibreOffice conversion may run before it is killed
    pub office_timeout_secs: u64,

    /// Poppler rasterizer used when pdfium is not compiled in
    pub pdftoppm_program: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_text_lines: 10,
            max_line_chars: 200,
            max_rows: 11, // header + 10 data rows
            max_columns: 10,
            max_image_dimension: 1600,
            pdf_dpi: 144,
            path_context_levels: 3,
            fallback_encodings: vec![
                "gbk".to_string(),
                "gb18030".to_string(),
                "big5".to_string(),
                "utf-16le".to_string(),
            ],
            office_fallback: true,
            soffice_program: PathBuf::from("soffice"),
            office_timeout_secs: 120,
            pdftoppm_program: PathBuf::from("pdftoppm"),
        }
    }
}

impl ReportConfig {
    /// Defaults overridden by `DOCREPORT_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (environment or test map)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "DOCREPORT_MAX_TEXT_LINES", &mut self.max_text_lines);
        override_parsed(&lookup, "DOCREPORT_MAX_LINE_CHARS", &mut self.max_line_chars);
        override_parsed(&lookup, "DOCREPORT_MAX_ROWS", &mut self.max_rows);
        override_parsed(&lookup, "DOCREPORT_MAX_COLUMNS", &mut self.max_columns);
        override_parsed(&lookup, "DOCREPORT_MAX_IMAGE_DIMENSION", &mut self.max_image_dimension);
        override_parsed(&lookup, "DOCREPORT_PDF_DPI", &mut self.pdf_dpi);
        override_parsed(&lookup, "DOCREPORT_PATH_CONTEXT_LEVELS", &mut self.path_context_levels);
        override_parsed(&lookup, "DOCREPORT_OFFICE_FALLBACK", &mut self.office_fallback);
        override_parsed(&lookup, "DOCREPORT_OFFICE_TIMEOUT", &mut self.office_timeout_secs);

        if let Some(labels) = lookup("DOCREPORT_FALLBACK_ENCODINGS") {
            self.fallback_encodings = labels
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(program) = lookup("DOCREPORT_SOFFICE") {
            self.soffice_program = PathBuf::from(program);
        }
        if let Some(program) = lookup("DOCREPORT_PDFTOPPM") {
            self.pdftoppm_program = PathBuf::from(program);
        }

        self.clamp()
    }

    /// Keep bounds in a usable range (a zero bound would truncate every preview)
    pub fn clamp(mut self) -> Self {
        self.max_text_lines = self.max_text_lines.max(1);
        self.max_line_chars = self.max_line_chars.max(1);
        self.max_rows = self.max_rows.max(1);
        self.max_columns = self.max_columns.max(1);
        self.max_image_dimension = self.max_image_dimension.max(16);
        self.pdf_dpi = self.pdf_dpi.clamp(36, 600);
        self.office_timeout_secs = self.office_timeout_secs.max(1);
        self
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("[Config] Ignoring invalid value for {}: '{}'", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReportConfig::default();
        assert_eq!(config.max_text_lines, 10);
        assert_eq!(config.max_rows, 11);
        assert_eq!(config.max_columns, 10);
        assert!(config.office_fallback);
        assert_eq!(config.office_timeout_secs, 120);
    }

    #[test]
    fn test_overrides_apply() {
        let config = ReportConfig::default().with_overrides(lookup_from(&[
            ("DOCREPORT_MAX_TEXT_LINES", "25"),
            ("DOCREPORT_FALLBACK_ENCODINGS", "shift_jis, big5"),
            ("DOCREPORT_OFFICE_FALLBACK", "false"),
            ("DOCREPORT_OFFICE_TIMEOUT", "30"),
        ]));
        assert_eq!(config.max_text_lines, 25);
        assert_eq!(config.fallback_encodings, vec!["shift_jis", "big5"]);
        assert!(!config.office_fallback);
        assert_eq!(config.office_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        let config = ReportConfig::default()
            .with_overrides(lookup_from(&[("DOCREPORT_MAX_ROWS", "lots")]));
        assert_eq!(config.max_rows, 11);
    }

    #[test]
    fn test_zero_bounds_are_clamped() {
        let config = ReportConfig::default()
            .with_overrides(lookup_from(&[("DOCREPORT_MAX_TEXT_LINES", "0")]));
        assert_eq!(config.max_text_lines, 1);
    }
}
