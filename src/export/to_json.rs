//! JSON rendering of a tabular projection

use serde_json::{json, Map, Value};

use crate::parser::source::SourceTable;

/// Render a table as an array of objects keyed by header
pub fn render(table: &SourceTable) -> Value {
    let rows: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (idx, header) in table.headers.iter().enumerate() {
                let cell = row.get(idx).cloned().unwrap_or_default();
                object.insert(header.clone(), json!(cell));
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keys_rows_by_header() {
        let table = SourceTable {
            headers: vec!["Task counter".to_string(), "Task name".to_string()],
            rows: vec![vec!["1".to_string(), "T1".to_string()]],
        };
        let value = render(&table);
        assert_eq!(value[0]["Task counter"], "1");
        assert_eq!(value[0]["Task name"], "T1");
    }
}
