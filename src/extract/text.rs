//! Text and CSV previews

use super::{ExtractionStrategy, Preview, TableExcerpt, TextPreview};
use crate::encoding::{DecodingReader, EncodingDetector};
use crate::walker::FileEntry;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

/// Keep the first `max_lines` lines, each clipped to `max_chars` characters
///
/// Consumes the whole iterator to count the source lines; `truncated` is set
/// only when lines were dropped, so a truncated preview always holds exactly
/// `max_lines` lines.
pub fn bound_lines<'a, I>(lines: I, max_lines: usize, max_chars: usize) -> TextPreview
where
    I: IntoIterator<Item = &'a str>,
{
    let mut kept = Vec::new();
    let mut total_lines = 0usize;

    for line in lines {
        if kept.len() < max_lines {
            kept.push(clip_chars(line, max_chars));
        }
        total_lines += 1;
    }

    TextPreview {
        lines: kept,
        truncated: total_lines > max_lines,
        total_lines,
        encoding: None,
    }
}

/// Streaming form of `bound_lines` over UTF-8 input
///
/// Memory stays bounded however long the input or its lines are: at most
/// `max_chars * 4` bytes are buffered per kept line and dropped lines are
/// only counted.
pub fn read_bounded_lines<R: BufRead>(
    mut reader: R,
    max_lines: usize,
    max_chars: usize,
) -> io::Result<TextPreview> {
    let cap = max_chars.saturating_mul(4);
    let mut kept = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut open_line = false;
    let mut total_lines = 0usize;

    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();

        let mut rest = buf;
        while !rest.is_empty() {
            let (segment, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => (&rest[..i], true),
                None => (rest, false),
            };
            if kept.len() < max_lines && current.len() < cap {
                let room = cap - current.len();
                current.extend_from_slice(&segment[..segment.len().min(room)]);
            }

            if terminated {
                if kept.len() < max_lines {
                    if current.last() == Some(&b'\r') {
                        current.pop();
                    }
                    kept.push(utf8_line(&current, max_chars));
                }
                current.clear();
                open_line = false;
                total_lines += 1;
                rest = &rest[segment.len() + 1..];
            } else {
                open_line = true;
                break;
            }
        }
        reader.consume(len);
    }

    if open_line {
        if kept.len() < max_lines {
            kept.push(utf8_line(&current, max_chars));
        }
        total_lines += 1;
    }

    Ok(TextPreview {
        lines: kept,
        truncated: total_lines > max_lines,
        total_lines,
        encoding: None,
    })
}

/// Decode a kept line whose tail may have been cut mid-character
fn utf8_line(bytes: &[u8], max_chars: usize) -> String {
    let valid = match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) => e.valid_up_to(),
    };
    clip_chars(&String::from_utf8_lossy(&bytes[..valid]), max_chars)
}

/// Clip to `max_chars` characters (not bytes)
fn clip_chars(line: &str, max_chars: usize) -> String {
    match line.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => line[..byte_idx].to_string(),
        None => line.to_string(),
    }
}

/// Decoded text preview; CSV files become a table excerpt
pub struct TextStrategy {
    detector: EncodingDetector,
    max_lines: usize,
    max_chars: usize,
    max_rows: usize,
    max_columns: usize,
}

impl TextStrategy {
    pub fn new(
        detector: EncodingDetector,
        max_lines: usize,
        max_chars: usize,
        max_rows: usize,
        max_columns: usize,
    ) -> Self {
        Self {
            detector,
            max_lines,
            max_chars,
            max_rows,
            max_columns,
        }
    }

    fn open(&self, entry: &FileEntry) -> Result<DecodingReader<File>, String> {
        File::open(&entry.path)
            .and_then(|file| self.detector.reader(file))
            .map_err(|e| format!("Failed to read text file: {}", e))
    }

    /// Table excerpt of a CSV stream; `None` when it holds no records
    fn csv_excerpt<R: Read>(
        &self,
        decoded: DecodingReader<R>,
    ) -> Result<Option<TableExcerpt>, csv::Error> {
        let encoding = decoded.encoding();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded);

        let mut rows = Vec::new();
        let mut total_rows = 0usize;
        let mut total_columns = 0usize;

        for record in reader.records() {
            let record = record?;
            total_columns = total_columns.max(record.len());
            if rows.len() < self.max_rows {
                rows.push(
                    record
                        .iter()
                        .take(self.max_columns)
                        .map(|cell| clip_chars(cell, self.max_chars))
                        .collect(),
                );
            }
            total_rows += 1;
        }

        if total_rows == 0 {
            return Ok(None);
        }
        if reader.get_ref().is_lossy() {
            tracing::warn!("[TextStrategy] CSV decoded lossily, some characters were replaced");
        }

        Ok(Some(TableExcerpt {
            rows,
            truncated: total_rows > self.max_rows,
            total_rows,
            total_columns,
            note: Some(format!("CSV data presented as table. Detected encoding: {}", encoding)),
        }))
    }
}

impl ExtractionStrategy for TextStrategy {
    fn name(&self) -> &'static str {
        "text decode"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        if entry.extension == "csv" {
            match self.csv_excerpt(self.open(entry)?) {
                Ok(Some(table)) => return Ok(Preview::Table(table)),
                Ok(None) => {}
                Err(e) => tracing::debug!(
                    "[TextStrategy] {} is not parseable as CSV ({}), showing as text",
                    entry.label(),
                    e
                ),
            }
        }

        let mut reader = BufReader::new(self.open(entry)?);
        let mut preview = read_bounded_lines(&mut reader, self.max_lines, self.max_chars)
            .map_err(|e| format!("Failed to read text file: {}", e))?;

        let decoded = reader.get_ref();
        if decoded.is_lossy() {
            tracing::warn!(
                "[TextStrategy] {} decoded lossily, some characters were replaced",
                entry.label()
            );
        }
        preview.encoding = Some(decoded.encoding().to_string());

        tracing::debug!(
            "[TextStrategy] {}: {} of {} lines ({})",
            entry.label(),
            preview.lines.len(),
            preview.total_lines,
            decoded.encoding()
        );

        Ok(Preview::Text(preview))
    }
}
