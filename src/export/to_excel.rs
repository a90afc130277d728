//! Xlsx rendering of a tabular projection

use rust_xlsxwriter::Workbook;

use crate::errors::ParseError;
use crate::parser::source::SourceTable;

/// Render a table as an xlsx workbook with one named sheet
pub fn render(table: &SourceTable, sheet_name: &str) -> Result<Vec<u8>, ParseError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .map_err(|e| write_error(&e))?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, header)
            .map_err(|e| write_error(&e))?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32 + 1, col as u16, cell)
                .map_err(|e| write_error(&e))?;
        }
    }

    workbook.save_to_buffer().map_err(|e| write_error(&e))
}

fn write_error(err: &dyn std::fmt::Display) -> ParseError {
    ParseError::Source {
        path: std::path::PathBuf::from("<xlsx output>"),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_workbook_bytes() {
        let table = SourceTable {
            headers: vec!["Task counter".to_string(), "Task name".to_string()],
            rows: vec![vec!["1".to_string(), "T1".to_string()]],
        };
        let bytes = render(&table, "Tasks").expect("render");
        // Xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }
}
