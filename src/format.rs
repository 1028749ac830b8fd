//! Format classification by file extension

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Coarse format category a file is previewed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Pdf,
    Word,
    Excel,
    Image,
    Text,
    Unsupported,
}

/// Extension table, checked in order
const EXTENSION_TABLE: &[(FormatCategory, &[&str])] = &[
    (FormatCategory::Pdf, &["pdf"]),
    (FormatCategory::Word, &["doc", "docx"]),
    (FormatCategory::Excel, &["xls", "xlsx"]),
    (FormatCategory::Image, &["png", "jpg", "jpeg", "gif", "bmp"]),
    (FormatCategory::Text, &["txt", "log", "md", "csv"]),
];

impl FormatCategory {
    /// All categories in report order
    pub const ALL: [FormatCategory; 6] = [
        Self::Pdf,
        Self::Word,
        Self::Excel,
        Self::Image,
        Self::Text,
        Self::Unsupported,
    ];

    /// Classify an extension (without the leading dot), ignoring case
    pub fn classify(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(category, _)| *category)
            .unwrap_or(Self::Unsupported)
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::classify)
            .unwrap_or(Self::Unsupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Word => "Word",
            Self::Excel => "Excel",
            Self::Image => "Image",
            Self::Text => "Text",
            Self::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
