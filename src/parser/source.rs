//! Tabular source reading: delimited text and spreadsheets.
//!
//! Both variants normalize into a [`SourceTable`]: a header row plus string
//! rows. Quoted fields with embedded delimiters and line breaks are handled
//! by the csv reader; spreadsheet cells are rendered to the spelling the
//! column grammar expects (integers without a decimal point).

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;

use crate::errors::ParseError;

/// A parsed tabular source: header plus data rows, all strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    /// 1-based source row number of data row `idx` (the header is row 1)
    pub fn row_number(idx: usize) -> usize {
        idx + 2
    }
}

/// Read a delimited text source. The first line is the header; quoted
/// fields may embed the delimiter and line breaks.
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<SourceTable, ParseError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| source_error(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| source_error(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::EmptyHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| source_error(path, e))?;
        let row: Vec<String> = record.iter().map(|cell| cell.to_string()).collect();
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(SourceTable { headers, rows })
}

/// Read one named sheet of an xlsx workbook; row 1 is the header
pub fn read_sheet(path: &Path, sheet: &str) -> Result<SourceTable, ParseError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| source_error(path, e))?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|_| ParseError::UnknownSheet(sheet.to_string()))?;

    if range.height() == 0 {
        return Err(ParseError::EmptyHeader);
    }

    let width = range.width();
    let mut headers = Vec::with_capacity(width);
    for col in 0..width {
        headers.push(cell_to_string(range.get((0, col))));
    }
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ParseError::EmptyHeader);
    }

    let mut rows = Vec::new();
    for row_idx in 1..range.height() {
        let mut row = Vec::with_capacity(width);
        for col in 0..width {
            row.push(cell_to_string(range.get((row_idx, col))));
        }
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(SourceTable { headers, rows })
}

/// Render a spreadsheet cell the way the grammar spells values: counters
/// and flags come back as plain integers even though the sheet stores
/// floats.
fn cell_to_string(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.clone(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Some(Data::Bool(b)) => {
            if *b {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        Some(Data::DateTime(dt)) => dt.as_f64().to_string(),
        Some(Data::DateTimeIso(s)) => s.clone(),
        Some(Data::DurationIso(s)) => s.clone(),
        Some(Data::Error(_)) | Some(Data::Empty) | None => String::new(),
    }
}

fn source_error(path: &Path, err: impl std::fmt::Display) -> ParseError {
    ParseError::Source {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_delimited_respects_quoting() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "Task counter,Task name,Tags").unwrap();
        writeln!(file, "1,\"Load, then publish\",\"ops / nightly\"").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "2,\"Multi\nline name\",").unwrap();

        let table = read_delimited(file.path(), b',').expect("csv parses");
        assert_eq!(table.headers, vec!["Task counter", "Task name", "Tags"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "Load, then publish");
        assert_eq!(table.rows[1][1], "Multi\nline name");
    }

    #[test]
    fn test_row_number_accounts_for_header() {
        assert_eq!(SourceTable::row_number(0), 2);
        assert_eq!(SourceTable::row_number(4), 6);
    }

    #[test]
    fn test_cell_to_string_renders_counters_without_decimals() {
        assert_eq!(cell_to_string(Some(&Data::Float(3.0))), "3");
        assert_eq!(cell_to_string(Some(&Data::Float(2.5))), "2.5");
        assert_eq!(cell_to_string(Some(&Data::Int(7))), "7");
        assert_eq!(cell_to_string(Some(&Data::Bool(true))), "1");
        assert_eq!(cell_to_string(None), "");
    }

    #[test]
    fn test_missing_sheet_is_reported_by_name() {
        // A csv file is not a workbook, but a missing file path gives the
        // source error; sheet resolution is covered through the workbook
        // error path in integration tests.
        let err = read_sheet(Path::new("/nonexistent/book.xlsx"), "Tasks").unwrap_err();
        assert!(matches!(err, ParseError::Source { .. }));
    }
}
