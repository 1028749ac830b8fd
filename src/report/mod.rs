//! Report assembly and output

pub mod assembler;
pub mod docx_writer;
pub mod failures;
pub mod model;

pub use assembler::{ReportAssembler, RunContext, RunPhase, RunSummary};
pub use docx_writer::{DocxReportWriter, ReportWriter};
pub use failures::{FailureRecord, FailureStage, FailureSummary, FailureTracker};
pub use model::{Report, ReportMetadata, Section, SectionBody, SealedReport, TocEntry, REPORT_TITLE};
