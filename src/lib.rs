//! docreport
//!
//! Walks a directory tree, extracts a preview of every file (first PDF page,
//! leading Word text, first sheet rows, images, decoded text) and writes one
//! Word document with a linked file index.
//!
//! ```no_run
//! use docreport::{generate_report, ReportConfig};
//! use std::path::Path;
//!
//! let summary = generate_report(Path::new("inbox"), Path::new("inbox.docx"), ReportConfig::default())?;
//! println!("{} files, {} issues", summary.total_files, summary.failure_count);
//! # Ok::<(), docreport::ReportError>(())
//! ```

pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod format;
pub mod report;
pub mod walker;

pub use config::ReportConfig;
pub use error::{CollaboratorError, ReportError};
pub use format::FormatCategory;
pub use report::{ReportAssembler, RunSummary};
pub use walker::{FileEntry, FileWalker};

use std::path::Path;

/// Build a report for `input` at `output` with the standard extractors
pub fn generate_report(
    input: &Path,
    output: &Path,
    config: ReportConfig,
) -> Result<RunSummary, ReportError> {
    ReportAssembler::new(config).run(input, output)
}
