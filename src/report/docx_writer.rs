//! Word (.docx) output
//!
//! Layout:
//! - title and summary block
//! - "File Index": one internal hyperlink per file, pointing at a bookmark
//! - one section per file (heading with bookmark, metadata, preview)
//! - "Processing issues"
//!
//! The document is packed into a temp file next to the destination, synced,
//! then renamed over it, so a failed run never leaves a partial report.

use super::failures::FailureStage;
use super::model::{Section, SectionBody, SealedReport};
use crate::error::ReportError;
use crate::extract::{ImagePreview, Preview, TableExcerpt, TextPreview};
use crate::walker::FileEntry;
use byte_unit::{Byte, UnitType};
use docx_rs::{
    BreakType, Docx, Hyperlink, HyperlinkType, Paragraph, Pic, Run, Style, StyleType, Table,
    TableCell, TableRow,
};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// EMU per pixel at 96 DPI
const EMU_PER_PIXEL: u64 = 9525;

/// Widest embedded image: 6 inches
const MAX_IMAGE_WIDTH_EMU: u64 = 6 * 914_400;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persists a sealed report
pub trait ReportWriter {
    fn write(&self, report: &SealedReport, destination: &Path) -> Result<(), ReportError>;
}

/// Writes the report as a Word document
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxReportWriter;

impl DocxReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Build the in-memory document
    pub fn build_document(&self, report: &SealedReport) -> Docx {
        let mut docx = Docx::new()
            .add_style(
                Style::new("Title", StyleType::Paragraph)
                    .name("Title")
                    .size(40)
                    .bold(),
            )
            .add_style(
                Style::new("Heading1", StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold(),
            )
            .add_style(
                Style::new("Heading2", StyleType::Paragraph)
                    .name("Heading 2")
                    .size(26)
                    .bold(),
            );

        docx = docx.add_paragraph(
            Paragraph::new()
                .style("Title")
                .add_run(Run::new().add_text(report.title())),
        );
        for line in summary_lines(report) {
            docx = docx.add_paragraph(text_paragraph(&line));
        }

        // File index
        docx = docx.add_paragraph(heading("Heading1", "File Index"));
        if report.toc().is_empty() {
            docx = docx.add_paragraph(note_paragraph("No files found."));
        }
        for entry in report.toc() {
            docx = docx.add_paragraph(
                Paragraph::new().add_hyperlink(
                    Hyperlink::new(entry.anchor.as_str(), HyperlinkType::Anchor).add_run(
                        Run::new()
                            .add_text(entry.label.as_str())
                            .color("0563C1")
                            .underline("single"),
                    ),
                ),
            );
        }
        docx = docx.add_paragraph(page_break());

        // One section per file, bookmark ids follow section order
        for (id, section) in report.sections().iter().enumerate() {
            docx = add_section(docx, id + 1, section);
        }

        docx.add_paragraph(heading("Heading1", "Processing issues"))
            .add_paragraph(issues_intro(report))
            .add_table_opt(issues_table(report))
    }
}

impl ReportWriter for DocxReportWriter {
    fn write(&self, report: &SealedReport, destination: &Path) -> Result<(), ReportError> {
        let docx = self.build_document(report);
        atomic_write(docx, destination)?;

        tracing::info!(
            "[DocxWriter] Wrote {} sections to {}",
            report.sections().len(),
            destination.display()
        );
        Ok(())
    }
}

/// Pack into a sibling temp file, sync, then rename into place
fn atomic_write(docx: Docx, destination: &Path) -> Result<(), ReportError> {
    let persist_err = |reason: String| ReportError::Persist {
        path: destination.to_path_buf(),
        reason,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| persist_err(format!("Failed to create temp file: {}", e)))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        docx.build()
            .pack(&mut writer)
            .map_err(|e| persist_err(format!("Failed to pack document: {}", e)))?;
        writer
            .flush()
            .map_err(|e| persist_err(format!("Failed to flush: {}", e)))?;
    }

    // Sync to disk
    temp.as_file()
        .sync_all()
        .map_err(|e| persist_err(format!("Failed to sync: {}", e)))?;

    // Atomic rename
    temp.persist(destination)
        .map_err(|e| persist_err(format!("Failed to rename: {}", e.error)))?;

    Ok(())
}

fn summary_lines(report: &SealedReport) -> Vec<String> {
    let meta = report.metadata();
    let mut lines = vec![
        format!("Generated: {}", meta.generated_at.format(TIMESTAMP_FORMAT)),
        format!("Input directory: {}", meta.input_root.display()),
        format!("Total files: {}", meta.total_files),
        format!("Processing issues: {}", meta.failure_count),
    ];
    lines.extend(
        meta.counts_by_category
            .iter()
            .map(|(category, count)| format!("{}: {}", category, count)),
    );
    lines
}

fn add_section(docx: Docx, bookmark_id: usize, section: &Section) -> Docx {
    let heading = Paragraph::new()
        .style("Heading2")
        .add_bookmark_start(bookmark_id, section.anchor.as_str())
        .add_run(Run::new().add_text(section.heading.as_str()))
        .add_bookmark_end(bookmark_id);

    let mut docx = docx.add_paragraph(heading);
    for line in metadata_lines(&section.entry) {
        docx = docx.add_paragraph(text_paragraph(&line));
    }

    match &section.body {
        SectionBody::Preview(Preview::Image(img)) => docx.add_paragraph(image_paragraph(img)),
        SectionBody::Preview(Preview::Text(text)) => add_text_preview(docx, text),
        SectionBody::Preview(Preview::Table(table)) => add_table_preview(docx, table),
        SectionBody::Preview(Preview::NoPreview) => {
            docx.add_paragraph(note_paragraph("Format not processed: no preview available."))
        }
        SectionBody::Failed {
            reason,
            attempted_fallback,
        } => {
            let mut text = format!("Preview unavailable: {}", reason);
            if *attempted_fallback {
                text.push_str(" (fallback attempted)");
            }
            docx.add_paragraph(note_paragraph(&text))
        }
    }
}

fn metadata_lines(entry: &FileEntry) -> Vec<String> {
    let size = Byte::from_u64(entry.size)
        .get_appropriate_unit(UnitType::Binary)
        .to_string();
    let modified = entry
        .modified
        .map(|m| m.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string());

    vec![
        format!("Location: {}", entry.location().display()),
        format!("Size: {}", size),
        format!("Modified: {}", modified),
    ]
}

fn image_paragraph(img: &ImagePreview) -> Paragraph {
    let (width, height) = display_size(img.width, img.height);
    Paragraph::new().add_run(Run::new().add_image(Pic::new(&img.png).size(width, height)))
}

/// Natural size at 96 DPI, shrunk to the page width
fn display_size(width_px: u32, height_px: u32) -> (u32, u32) {
    let width = u64::from(width_px.max(1)) * EMU_PER_PIXEL;
    let height = u64::from(height_px.max(1)) * EMU_PER_PIXEL;
    if width <= MAX_IMAGE_WIDTH_EMU {
        return (width as u32, height as u32);
    }
    let scaled_height = height * MAX_IMAGE_WIDTH_EMU / width;
    (MAX_IMAGE_WIDTH_EMU as u32, scaled_height.max(1) as u32)
}

fn add_text_preview(mut docx: Docx, text: &TextPreview) -> Docx {
    if let Some(encoding) = &text.encoding {
        docx = docx.add_paragraph(note_paragraph(&format!("Detected encoding: {}", encoding)));
    }
    if text.lines.is_empty() {
        return docx.add_paragraph(note_paragraph("(empty file)"));
    }
    for line in &text.lines {
        docx = docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(line.as_str()).size(18)),
        );
    }
    if text.truncated {
        docx = docx.add_paragraph(note_paragraph(&format!(
            "... showing first {} of {} lines",
            text.lines.len(),
            text.total_lines
        )));
    }
    docx
}

fn add_table_preview(mut docx: Docx, table: &TableExcerpt) -> Docx {
    if let Some(note) = &table.note {
        docx = docx.add_paragraph(note_paragraph(note));
    }
    if table.rows.is_empty() {
        return docx.add_paragraph(note_paragraph("(no data)"));
    }

    let width = table.rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let cells = (0..width)
                .map(|i| {
                    let value = row.get(i).map(String::as_str).unwrap_or("");
                    TableCell::new().add_paragraph(
                        Paragraph::new().add_run(Run::new().add_text(value).size(18)),
                    )
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();
    docx = docx.add_table(Table::new(rows));

    if table.truncated {
        docx = docx.add_paragraph(note_paragraph(&format!(
            "... showing first {} of {} rows",
            table.rows.len(),
            table.total_rows
        )));
    }
    docx
}

fn issues_intro(report: &SealedReport) -> Paragraph {
    let issues = report.issues();
    if issues.items.is_empty() {
        text_paragraph("No processing issues.")
    } else {
        text_paragraph(&format!(
            "{} file(s) could not be previewed or read.",
            issues.total()
        ))
    }
}

fn issues_table(report: &SealedReport) -> Option<Table> {
    let issues = report.issues();
    if issues.items.is_empty() {
        return None;
    }

    let header = TableRow::new(vec![cell("File", true), cell("Stage", true), cell("Reason", true)]);
    let rows = std::iter::once(header)
        .chain(issues.items.iter().map(|record| {
            let stage = match record.stage {
                FailureStage::Walk => "unreadable",
                FailureStage::Extraction => "extraction",
            };
            TableRow::new(vec![
                cell(&record.label, false),
                cell(stage, false),
                cell(&record.reason, false),
            ])
        }))
        .collect();

    Some(Table::new(rows))
}

fn cell(text: &str, bold: bool) -> TableCell {
    let mut run = Run::new().add_text(text).size(18);
    if bold {
        run = run.bold();
    }
    TableCell::new().add_paragraph(Paragraph::new().add_run(run))
}

fn heading(style: &str, text: &str) -> Paragraph {
    Paragraph::new().style(style).add_run(Run::new().add_text(text))
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn note_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).italic().color("666666"))
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

/// `Docx::add_table` for an optional table
trait AddTableOpt {
    fn add_table_opt(self, table: Option<Table>) -> Self;
}

impl AddTableOpt for Docx {
    fn add_table_opt(self, table: Option<Table>) -> Self {
        match table {
            Some(table) => self.add_table(table),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionFailure;
    use crate::format::FormatCategory;
    use crate::report::failures::FailureTracker;
    use crate::report::model::{Report, ReportMetadata};
    use chrono::Local;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            path: PathBuf::from("/in").join(name),
            relative_path: PathBuf::from(name),
            extension: Path::new(name)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            size: 2048,
            modified: Some(Local::now()),
        }
    }

    fn sample_report() -> SealedReport {
        let mut report = Report::new();
        let mut tracker = FailureTracker::new();

        let png = crate::extract::encode_preview(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(1200, 300, Rgb([200, 10, 10]))),
            1600,
        )
        .unwrap();
        report.append_section(entry("scan.png"), Ok(Preview::Image(png)), 3);
        report.append_section(
            entry("notes.txt"),
            Ok(Preview::Text(TextPreview {
                lines: vec!["hello".to_string(), "world".to_string()],
                truncated: true,
                total_lines: 40,
                encoding: Some("UTF-8".to_string()),
            })),
            3,
        );
        report.append_section(
            entry("data.csv"),
            Ok(Preview::Table(TableExcerpt {
                rows: vec![vec!["a".into(), "b".into()], vec!["1".into()]],
                truncated: false,
                total_rows: 2,
                total_columns: 2,
                note: None,
            })),
            3,
        );
        report.append_section(entry("data.unknownext"), Ok(Preview::NoPreview), 3);

        let failure = ExtractionFailure {
            entry: entry("broken.xlsx"),
            category: FormatCategory::Excel,
            reason: "native sheet read failed: bad zip".to_string(),
            attempted_fallback: false,
        };
        tracker.record_extraction(&failure);
        report.append_section(entry("broken.xlsx"), Err(failure), 3);

        report.seal(
            ReportMetadata {
                generated_at: Local::now(),
                input_root: PathBuf::from("/in"),
                total_files: 5,
                failure_count: tracker.len(),
                counts_by_category: BTreeMap::from([(FormatCategory::Text, 2)]),
            },
            tracker.summary(),
        )
    }

    #[test]
    fn test_display_size_fits_page_width() {
        assert_eq!(display_size(100, 50), (952_500, 476_250));

        let (w, h) = display_size(1600, 800);
        assert_eq!(u64::from(w), MAX_IMAGE_WIDTH_EMU);
        assert_eq!(u64::from(h), MAX_IMAGE_WIDTH_EMU / 2);
    }

    #[test]
    fn test_write_produces_docx_package() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("report.docx");

        DocxReportWriter::new()
            .write(&sample_report(), &destination)
            .unwrap();

        let bytes = fs::read(&destination).unwrap();
        assert!(bytes.starts_with(b"PK"));

        // Only the report remains, no temp files
        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("report.docx")]);
    }

    #[test]
    fn test_existing_destination_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("report.docx");
        fs::write(&destination, b"old contents").unwrap();

        DocxReportWriter::new()
            .write(&sample_report(), &destination)
            .unwrap();

        assert!(fs::read(&destination).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_missing_directory_is_persist_error() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("gone").join("report.docx");

        let err = DocxReportWriter::new()
            .write(&sample_report(), &destination)
            .unwrap_err();
        assert!(matches!(err, ReportError::Persist { .. }));
        assert!(!destination.exists());
    }

    #[test]
    fn test_summary_lines() {
        let lines = summary_lines(&sample_report());
        assert!(lines.contains(&"Total files: 5".to_string()));
        assert!(lines.contains(&"Processing issues: 1".to_string()));
        assert!(lines.contains(&"Text: 2".to_string()));
    }
}
