//! Customer record loading from JSON and CSV files

use crate::error::SegmentError;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Field that identifies a record
pub const ID_FIELD: &str = "id";

/// One customer: field name to scalar value, in input field order.
pub type Record = Map<String, Value>;

/// Historical request body: `{"customerData": [...]}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest {
    customer_data: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordsDocument {
    Bare(Vec<Record>),
    Wrapped(AnalysisRequest),
}

/// Load a record batch, picking the format from the file extension
///
/// # Arguments
/// * `file_path` - Path to a `.csv` file or a JSON document
///
/// # Returns
/// * Records in file order
pub fn load_records(file_path: impl AsRef<Path>) -> crate::Result<Vec<Record>> {
    let path = file_path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let contents = fs::read_to_string(path)?;
    let records = if is_csv {
        parse_csv_records(&contents)?
    } else {
        parse_json_records(&contents)?
    };

    tracing::debug!(path = %path.display(), records = records.len(), "loaded records");
    Ok(records)
}

/// Parse either a bare JSON array of records or a `customerData` wrapper.
pub fn parse_json_records(json: &str) -> crate::Result<Vec<Record>> {
    let document: RecordsDocument = serde_json::from_str(json)?;
    Ok(match document {
        RecordsDocument::Bare(records) => records,
        RecordsDocument::Wrapped(request) => request.customer_data,
    })
}

/// Parse CSV text into records.
///
/// Cells that parse as finite numbers become JSON numbers. Empty cells and
/// non-finite numbers (`NaN`, `inf`) become null, everything else is kept as
/// text. Rows get `id = row index + 1` unless the file has its own `id` column.
pub fn parse_csv_records(csv_text: &str) -> crate::Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), Value::from(index as u64 + 1));
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), parse_cell(cell));
        }
        records.push(record);
    }

    Ok(records)
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell.parse::<f64>() {
        Ok(number) => Number::from_f64(number).map_or(Value::Null, Value::Number),
        Err(_) => Value::String(cell.to_string()),
    }
}

/// Check that every record carries a unique, non-null id.
pub fn validate_ids(records: &[Record]) -> crate::Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let id = match record.get(ID_FIELD) {
            Some(Value::Null) | None => {
                return Err(SegmentError::validation(format!(
                    "record at position {index} has no `{ID_FIELD}`"
                )))
            }
            Some(id) => id_key(id),
        };
        if !seen.insert(id.clone()) {
            return Err(SegmentError::validation(format!("duplicate record id {id}")));
        }
    }
    Ok(())
}

/// Comparison key for an id; numerically equal ids (`1`, `1.0`) share a key.
fn id_key(id: &Value) -> String {
    match id {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < 9.0e15 => {
                        (float as i64).to_string()
                    }
                    _ => number.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "age,income,purchases,region").unwrap();
        writeln!(file, "25,40000,20,West").unwrap();
        writeln!(file, "52,95000,4,East").unwrap();
        writeln!(file, ",38000,22,West").unwrap();
        writeln!(file).unwrap();
        file
    }

    #[test]
    fn test_load_csv_records() {
        let test_file = create_test_csv();
        let records = load_records(test_file.path()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["id"], json!(1));
        assert_eq!(records[1]["age"], json!(52.0));
        assert_eq!(records[1]["region"], json!("East"));
        assert_eq!(records[2]["age"], Value::Null);
        assert_eq!(records[2]["id"], json!(3));
    }

    #[test]
    fn test_csv_id_column_wins() {
        let records = parse_csv_records("id,age\n17850,31\n13047,44\n").unwrap();
        assert_eq!(records[0]["id"], json!(17850.0));
        assert_eq!(records[1]["id"], json!(13047.0));
    }

    #[test]
    fn test_load_json_records() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"customerData": [{{"id": 1, "age": 30}}, {{"id": 2, "age": 40}}]}}"#
        )
        .unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["age"], json!(40));

        let bare = parse_json_records(r#"[{"id": 7, "region": "North"}]"#).unwrap();
        assert_eq!(bare[0]["region"], json!("North"));
    }

    #[test]
    fn test_malformed_json_is_client_error() {
        let err = parse_json_records("{\"rows\": 3}").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_validate_ids() {
        let ok = parse_json_records(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert!(validate_ids(&ok).is_ok());

        let missing = parse_json_records(r#"[{"id": 1}, {"age": 2}]"#).unwrap();
        assert!(matches!(
            validate_ids(&missing),
            Err(SegmentError::Validation(_))
        ));

        let duplicate = parse_json_records(r#"[{"id": 1}, {"id": 1}]"#).unwrap();
        assert!(validate_ids(&duplicate).is_err());
    }

    #[test]
    fn test_numerically_equal_ids_are_duplicates() {
        let mixed = parse_json_records(r#"[{"id": 1}, {"id": 1.0}]"#).unwrap();
        assert!(matches!(
            validate_ids(&mixed),
            Err(SegmentError::Validation(_))
        ));

        let text_and_number = parse_json_records(r#"[{"id": 1}, {"id": "1"}]"#).unwrap();
        assert!(validate_ids(&text_and_number).is_ok());

        let fractional = parse_json_records(r#"[{"id": 1.5}, {"id": 1}]"#).unwrap();
        assert!(validate_ids(&fractional).is_ok());
    }

    #[test]
    fn test_non_finite_csv_cells_become_null() {
        let records = parse_csv_records("age,income\n31,NaN\n44,inf\n50,-infinity\n").unwrap();

        assert_eq!(records[0]["income"], Value::Null);
        assert_eq!(records[1]["income"], Value::Null);
        assert_eq!(records[2]["income"], Value::Null);
        assert_eq!(records[1]["age"], json!(44.0));

        let features = crate::features::extract_features(&records).unwrap();
        assert_eq!(features.numeric_fields, vec!["age", "income"]);
    }
}
