//! Word text layer
//!
//! Reads paragraphs and table rows from a .docx body with docx-rs. A .docx
//! carries no pagination, so the leading lines stand in for the first page.
//! Legacy .doc files have no native reader and go straight to the fallback.

use super::text::bound_lines;
use super::{ExtractionStrategy, Preview};
use crate::walker::FileEntry;

/// Leading lines of a .docx body
pub struct DocxTextStrategy {
    max_lines: usize,
    max_chars: usize,
}

impl DocxTextStrategy {
    pub fn new(max_lines: usize, max_chars: usize) -> Self {
        Self {
            max_lines,
            max_chars,
        }
    }

    /// Collect the text of every paragraph and table row, in document order
    fn collect_lines(doc: &docx_rs::Docx) -> Vec<String> {
        let mut lines = Vec::new();
        for child in &doc.document.children {
            Self::collect_child(child, &mut lines);
        }
        lines
    }

    fn collect_child(element: &docx_rs::DocumentChild, lines: &mut Vec<String>) {
        match element {
            docx_rs::DocumentChild::Paragraph(para) => {
                lines.push(Self::paragraph_text(para));
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(tr) = row;
                    let cells: Vec<String> = tr
                        .cells
                        .iter()
                        .map(|cell| {
                            let docx_rs::TableRowChild::TableCell(tc) = cell;
                            tc.children
                                .iter()
                                .filter_map(|content| match content {
                                    docx_rs::TableCellContent::Paragraph(p) => {
                                        Some(Self::paragraph_text(p))
                                    }
                                    _ => None,
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect();
                    lines.push(cells.join(" | "));
                }
            }
            _ => {}
        }
    }

    fn paragraph_text(para: &docx_rs::Paragraph) -> String {
        let mut output = String::new();
        for child in &para.children {
            match child {
                docx_rs::ParagraphChild::Run(run) => Self::push_run(run, &mut output),
                docx_rs::ParagraphChild::Hyperlink(link) => {
                    for inner in &link.children {
                        if let docx_rs::ParagraphChild::Run(run) = inner {
                            Self::push_run(run, &mut output);
                        }
                    }
                }
                _ => {}
            }
        }
        output
    }

    fn push_run(run: &docx_rs::Run, output: &mut String) {
        for run_child in &run.children {
            match run_child {
                docx_rs::RunChild::Text(text) => output.push_str(&text.text),
                docx_rs::RunChild::Tab(_) => output.push('\t'),
                _ => {}
            }
        }
    }
}

impl ExtractionStrategy for DocxTextStrategy {
    fn name(&self) -> &'static str {
        "docx text layer"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        if entry.extension != "docx" {
            return Err(format!(".{} has no native text reader", entry.extension));
        }

        let bytes =
            std::fs::read(&entry.path).map_err(|e| format!("Failed to read DOCX file: {}", e))?;
        let doc = docx_rs::read_docx(&bytes).map_err(|e| format!("Failed to parse DOCX: {}", e))?;

        // Leading and trailing blank paragraphs carry nothing worth showing
        let lines = Self::collect_lines(&doc);
        let start = lines.iter().position(|l| !l.trim().is_empty());
        let end = lines.iter().rposition(|l| !l.trim().is_empty());
        let (Some(start), Some(end)) = (start, end) else {
            return Err("empty text layer".to_string());
        };

        let preview = bound_lines(
            lines[start..=end].iter().map(|l| l.trim_end()),
            self.max_lines,
            self.max_chars,
        );

        tracing::debug!(
            "[DocxText] {}: {} of {} lines",
            entry.label(),
            preview.lines.len(),
            preview.total_lines
        );

        Ok(Preview::Text(preview))
    }
}
