//! Report Assembler
//!
//! Drives one run through its phases:
//!
//! ```text
//! Init -> Walking -> (Extracting per file)* -> Finalizing -> Done
//!   \________________________________________________/
//!                         Failed
//! ```
//!
//! Init validates the input directory and the destination. Per-file problems
//! are recorded and the run continues; only setup and persistence errors
//! end in `Failed`.

use super::docx_writer::{DocxReportWriter, ReportWriter};
use super::failures::{FailureRecord, FailureTracker};
use super::model::{Report, ReportMetadata};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::extract::ExtractorRegistry;
use crate::format::FormatCategory;
use crate::walker::FileWalker;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Phase of a report run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Walking,
    Extracting,
    Finalizing,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Mutable state of one run, owned by the assembler
#[derive(Debug)]
pub struct RunContext {
    phase: RunPhase,
    input_root: PathBuf,
    output: PathBuf,
    started_at: DateTime<Local>,
    report: Report,
    failures: FailureTracker,
    counts: BTreeMap<FormatCategory, usize>,
}

impl RunContext {
    fn new(input_root: PathBuf, output: PathBuf) -> Self {
        Self {
            phase: RunPhase::Init,
            input_root,
            output,
            started_at: Local::now(),
            report: Report::new(),
            failures: FailureTracker::new(),
            counts: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, next: RunPhase) {
        if self.phase != next {
            tracing::debug!("[Assembler] {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    fn metadata(&self) -> ReportMetadata {
        ReportMetadata {
            generated_at: self.started_at,
            input_root: self.input_root.clone(),
            total_files: self.report.len(),
            failure_count: self.failures.len(),
            counts_by_category: self.counts.clone(),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    pub generated_at: DateTime<Local>,
    pub total_files: usize,
    pub failure_count: usize,
    pub counts_by_category: BTreeMap<FormatCategory, usize>,
    /// TOC labels in report order
    pub entries: Vec<String>,
    pub issues: Vec<FailureRecord>,
}

/// Builds one report from one input tree
pub struct ReportAssembler {
    config: ReportConfig,
    registry: ExtractorRegistry,
    writer: Box<dyn ReportWriter>,
}

impl ReportAssembler {
    /// Standard extractors and the .docx writer
    pub fn new(config: ReportConfig) -> Self {
        let registry = ExtractorRegistry::from_config(&config);
        Self {
            config,
            registry,
            writer: Box::new(DocxReportWriter::new()),
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_writer<W: ReportWriter + 'static>(mut self, writer: W) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Walk `input`, extract every file and write the report to `output`
    ///
    /// An existing file at `output` is replaced.
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary, ReportError> {
        let walker = FileWalker::new(input)?;
        let output = validate_output(output)?;
        let mut ctx = RunContext::new(walker.root().to_path_buf(), output);

        match self.execute(&walker, &mut ctx) {
            Ok(summary) => {
                ctx.advance(RunPhase::Done);
                Ok(summary)
            }
            Err(e) => {
                ctx.advance(RunPhase::Failed);
                tracing::error!("[Assembler] Run failed: {}", e);
                Err(e)
            }
        }
    }

    fn execute(&self, walker: &FileWalker, ctx: &mut RunContext) -> Result<RunSummary, ReportError> {
        tracing::info!("[Assembler] Processing files in {}", ctx.input_root.display());
        ctx.advance(RunPhase::Walking);

        for item in walker.walk()? {
            let entry = match item {
                Ok(entry) => entry,
                Err(failure) => {
                    ctx.failures.record_walk(&failure);
                    continue;
                }
            };

            // The report itself may be written inside the input tree
            if entry.path == ctx.output {
                tracing::debug!("[Assembler] Skipping output file {}", entry.label());
                continue;
            }

            ctx.advance(RunPhase::Extracting);
            let category = entry.category();
            tracing::info!("[Assembler] {} ({})", entry.label(), category);

            let result = self.registry.extract(&entry);
            if let Err(failure) = &result {
                ctx.failures.record_extraction(failure);
            }

            *ctx.counts.entry(category).or_insert(0) += 1;
            ctx.report
                .append_section(entry, result, self.config.path_context_levels);
        }

        ctx.advance(RunPhase::Finalizing);
        let metadata = ctx.metadata();
        let issues = ctx.failures.summary();
        let report = std::mem::take(&mut ctx.report);
        let sealed = report.seal(metadata, issues);

        self.writer.write(&sealed, &ctx.output)?;

        tracing::info!(
            "[Assembler] Report complete: {} files, {} issues",
            sealed.metadata().total_files,
            sealed.metadata().failure_count
        );

        Ok(RunSummary {
            output: ctx.output.clone(),
            generated_at: sealed.metadata().generated_at,
            total_files: sealed.metadata().total_files,
            failure_count: sealed.metadata().failure_count,
            counts_by_category: sealed.metadata().counts_by_category.clone(),
            entries: sealed.toc().iter().map(|t| t.label.clone()).collect(),
            issues: sealed.issues().items.clone(),
        })
    }
}

/// Check the destination before any file is processed
///
/// Returns the destination with a canonical parent directory.
fn validate_output(output: &Path) -> Result<PathBuf, ReportError> {
    let invalid = |reason: &str| ReportError::InvalidOutput {
        path: output.to_path_buf(),
        reason: reason.to_string(),
    };

    if output.is_dir() {
        return Err(invalid("is a directory"));
    }
    let file_name = output.file_name().ok_or_else(|| invalid("missing file name"))?;

    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        return Err(invalid("parent directory does not exist"));
    }
    if !parent.is_dir() {
        return Err(invalid("parent is not a directory"));
    }
    let parent = parent
        .canonicalize()
        .map_err(|e| invalid(&e.to_string()))?;

    // Probe writability with the same kind of temp file the writer uses
    NamedTempFile::new_in(&parent)
        .map_err(|e| invalid(&format!("directory is not writable: {}", e)))?;

    Ok(parent.join(file_name))
}
