//! Spreadsheet excerpts via calamine
//!
//! Only the first sheet is read. `open_workbook_auto` picks the reader from
//! the extension (.xlsx, .xls, .xlsb, .ods).

use super::{ExtractionStrategy, Preview, TableExcerpt};
use crate::walker::FileEntry;
use calamine::{open_workbook_auto, Data, Range, Reader};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Leading rows and columns of the first worksheet
pub struct SheetStrategy {
    max_rows: usize,
    max_columns: usize,
    max_chars: usize,
}

impl SheetStrategy {
    pub fn new(max_rows: usize, max_columns: usize, max_chars: usize) -> Self {
        Self {
            max_rows,
            max_columns,
            max_chars,
        }
    }

    /// Cut a sheet range down to the configured bounds
    fn excerpt(&self, sheet_name: &str, range: &Range<Data>) -> TableExcerpt {
        let (total_rows, total_columns) = range.get_size();

        let rows: Vec<Vec<String>> = range
            .rows()
            .take(self.max_rows)
            .map(|row| {
                row.iter()
                    .take(self.max_columns)
                    .map(|cell| cell_text(cell).chars().take(self.max_chars).collect())
                    .collect()
            })
            .collect();

        let note = if total_rows == 0 {
            format!("Sheet '{}' is empty", sheet_name)
        } else {
            format!(
                "Excel data extracted directly from sheet '{}' ({} rows x {} columns)",
                sheet_name, total_rows, total_columns
            )
        };

        TableExcerpt {
            rows,
            truncated: total_rows > self.max_rows,
            total_rows,
            total_columns,
            note: Some(note),
        }
    }
}

/// Display text of a cell; date cells are shown as dates, not serial numbers
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
            Some(d) => {
                let secs = d.num_seconds();
                format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
            }
            None => cell.to_string(),
        },
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

impl ExtractionStrategy for SheetStrategy {
    fn name(&self) -> &'static str {
        "native sheet read"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        let mut workbook = open_workbook_auto(&entry.path)
            .map_err(|e| format!("Failed to open workbook: {}", e))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| "workbook has no sheets".to_string())?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| "workbook has no sheets".to_string())?
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let table = self.excerpt(&sheet_name, &range);

        tracing::debug!(
            "[SheetReader] {}: {} of {} rows from '{}'",
            entry.label(),
            table.rows.len(),
            table.total_rows,
            sheet_name
        );

        Ok(Preview::Table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::entry_for;
    use tempfile::TempDir;

    fn sheet(rows: u32, cols: u32) -> Range<Data> {
        let mut range = Range::new((0, 0), (rows - 1, cols - 1));
        for r in 0..rows {
            for c in 0..cols {
                let value = if r == 0 {
                    Data::String(format!("col{}", c))
                } else {
                    Data::Float((r * 10 + c) as f64)
                };
                range.set_value((r, c), value);
            }
        }
        range
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let strategy = SheetStrategy::new(11, 10, 200);
        let table = strategy.excerpt("Sheet1", &sheet(40, 15));

        assert!(table.truncated);
        assert_eq!(table.rows.len(), 11);
        assert!(table.rows.iter().all(|r| r.len() == 10));
        assert_eq!(table.total_rows, 40);
        assert_eq!(table.total_columns, 15);
        assert_eq!(table.rows[0][0], "col0");
        assert_eq!(table.rows[1][2], "12");
    }

    #[test]
    fn test_small_sheet_is_complete() {
        let strategy = SheetStrategy::new(11, 10, 200);
        let table = strategy.excerpt("Data", &sheet(3, 2));

        assert!(!table.truncated);
        assert_eq!(table.rows.len(), 3);
        assert!(table.note.unwrap().contains("'Data'"));
    }

    #[test]
    fn test_long_cells_are_clipped() {
        let mut range = Range::new((0, 0), (0, 0));
        range.set_value((0, 0), Data::String("x".repeat(50)));

        let table = SheetStrategy::new(11, 10, 8).excerpt("S", &range);
        assert_eq!(table.rows[0][0], "xxxxxxxx");
    }

    #[test]
    fn test_date_cells_are_formatted() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        let mut range = Range::new((0, 0), (0, 3));
        range.set_value(
            (0, 0),
            Data::DateTime(ExcelDateTime::new(45000.5, ExcelDateTimeType::DateTime, false)),
        );
        range.set_value(
            (0, 1),
            Data::DateTime(ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false)),
        );
        range.set_value((0, 2), Data::DateTimeIso("2024-02-29T08:30:00".to_string()));
        range.set_value((0, 3), Data::Float(45000.5));

        let table = SheetStrategy::new(11, 10, 200).excerpt("Dates", &range);
        assert_eq!(
            table.rows[0],
            vec!["2023-03-15 12:00:00", "36:00:00", "2024-02-29T08:30:00", "45000.5"]
        );
    }

    #[test]
    fn test_corrupt_workbook_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xlsx");
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();

        let err = SheetStrategy::new(11, 10, 200)
            .extract(&entry_for(&path))
            .unwrap_err();
        assert!(err.contains("Failed to open workbook"));
    }
}
