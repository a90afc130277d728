//! CSV rendering of a tabular projection

use csv::Writer;

use crate::errors::ParseError;
use crate::parser::source::SourceTable;

/// Render a table as CSV text, header first
pub fn render(table: &SourceTable) -> Result<String, ParseError> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(&table.headers)
        .map_err(|e| write_error(&e))?;
    for row in &table.rows {
        wtr.write_record(row).map_err(|e| write_error(&e))?;
    }
    let data = wtr.into_inner().map_err(|e| write_error(&e))?;
    String::from_utf8(data).map_err(|e| write_error(&e))
}

fn write_error(err: &dyn std::fmt::Display) -> ParseError {
    ParseError::Source {
        path: std::path::PathBuf::from("<csv output>"),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_embedded_delimiters() {
        let table = SourceTable {
            headers: vec!["Task name".to_string(), "Tags".to_string()],
            rows: vec![vec!["Load, then publish".to_string(), "a / b".to_string()]],
        };
        let csv = render(&table).expect("render");
        assert!(csv.starts_with("Task name,Tags\n"));
        assert!(csv.contains("\"Load, then publish\""));
    }
}
