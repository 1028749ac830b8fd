//! Report document model
//!
//! `Report` is append-only while files are processed. `seal` freezes it
//! into a `SealedReport` that writers can only read.

use super::failures::FailureSummary;
use crate::extract::{ExtractionResult, Preview};
use crate::format::FormatCategory;
use crate::walker::FileEntry;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "Document Screenshot Report";

/// Word limits bookmark names to 40 characters
const MAX_ANCHOR_LEN: usize = 40;

/// One line of the table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Relative path with '/' separators
    pub label: String,

    /// Bookmark name of the file's section
    pub anchor: String,
}

/// What a section shows below its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    /// Extracted preview (`Preview::NoPreview` for unsupported formats)
    Preview(Preview),

    /// Every strategy failed
    Failed {
        reason: String,
        attempted_fallback: bool,
    },
}

/// One file's entry in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub entry: FileEntry,
    pub category: FormatCategory,
    pub anchor: String,
    /// File name plus directory context
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    pub fn is_failed(&self) -> bool {
        matches!(self.body, SectionBody::Failed { .. })
    }
}

/// Document-level facts shown in the summary block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Local>,
    pub input_root: PathBuf,
    pub total_files: usize,
    pub failure_count: usize,
    pub counts_by_category: BTreeMap<FormatCategory, usize>,
}

/// Report under construction
#[derive(Debug, Default)]
pub struct Report {
    toc: Vec<TocEntry>,
    sections: Vec<Section>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section for `entry` and return its TOC entry
    pub fn append_section(
        &mut self,
        entry: FileEntry,
        result: ExtractionResult,
        path_context_levels: usize,
    ) -> &TocEntry {
        let anchor = anchor_for(self.sections.len() + 1, &entry.path);
        let category = entry.category();
        let heading = heading_for(&entry, path_context_levels);

        let body = match result {
            Ok(preview) => SectionBody::Preview(preview),
            Err(failure) => SectionBody::Failed {
                reason: failure.reason,
                attempted_fallback: failure.attempted_fallback,
            },
        };

        self.toc.push(TocEntry {
            label: entry.label(),
            anchor: anchor.clone(),
        });
        self.sections.push(Section {
            entry,
            category,
            anchor,
            heading,
            body,
        });

        &self.toc[self.toc.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Freeze the report; the TOC is placed before the sections
    pub fn seal(self, metadata: ReportMetadata, issues: FailureSummary) -> SealedReport {
        SealedReport {
            title: REPORT_TITLE.to_string(),
            metadata,
            toc: self.toc,
            sections: self.sections,
            issues,
        }
    }
}

/// Finished report, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedReport {
    title: String,
    metadata: ReportMetadata,
    toc: Vec<TocEntry>,
    sections: Vec<Section>,
    issues: FailureSummary,
}

impl SealedReport {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn issues(&self) -> &FailureSummary {
        &self.issues
    }
}

/// Stable bookmark name: sequence number plus sanitized file stem
fn anchor_for(seq: usize, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut anchor = format!("bm_{:04}_{}", seq, sanitized);
    anchor.truncate(MAX_ANCHOR_LEN);
    anchor
}

fn heading_for(entry: &FileEntry, levels: usize) -> String {
    let context = entry.path_context(levels);
    if context.is_empty() {
        entry.file_name()
    } else {
        format!("{} [{}]", entry.file_name(), context)
    }
}
