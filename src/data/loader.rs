use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{DataTable, Meta, MetadataValue, Row};

/// File extensions understood by [`load_file`], in lookup preference order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["parquet", "pq", "json", "csv"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one object's data table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one column per field, table metadata in the key/value metadata
/// * `.json`    – `{ "meta": {...}, "columns": [...], "data": [{...}, ...] }`
/// * `.csv`     – header row; leading `# key: value` lines become metadata
pub fn load_file(path: &Path) -> Result<DataTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema:
///
/// ```json
/// {
///   "meta": { "obj_id": "2004dt", "z": 0.0197 },
///   "columns": ["time", "band", "mag", "mag_err"],
///   "data": [
///     { "time": 53238.1, "band": "B", "mag": 16.2, "mag_err": 0.01 },
///     ...
///   ]
/// }
/// ```
///
/// `columns` is optional; without it columns are every key in `data`, sorted.
fn load_json(path: &Path) -> Result<DataTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let obj = root
        .as_object()
        .context("Expected top-level JSON object")?;

    let records = obj
        .get("data")
        .and_then(|d| d.as_array())
        .context("Expected a 'data' array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let fields = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let row: Row = fields
            .iter()
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();
        rows.push(row);
    }

    let mut meta = Meta::new();
    if let Some(meta_obj) = obj.get("meta") {
        let meta_obj = meta_obj.as_object().context("'meta' is not a JSON object")?;
        for (key, val) in meta_obj {
            meta.insert(key.clone(), json_to_metadata(val));
        }
    }

    let table = match obj.get("columns") {
        Some(cols) => {
            let cols = cols.as_array().context("'columns' is not an array")?;
            let names = cols
                .iter()
                .enumerate()
                .map(|(j, c)| {
                    c.as_str()
                        .map(str::to_string)
                        .with_context(|| format!("columns[{j}] is not a string"))
                })
                .collect::<Result<Vec<_>>>()?;
            DataTable::new(names, rows)
        }
        None => DataTable::from_rows(rows),
    };

    Ok(table.with_meta(meta))
}

pub(crate) fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        JsonValue::Array(items) => MetadataValue::List(items.iter().map(json_to_metadata).collect()),
        JsonValue::Object(map) => MetadataValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_metadata(v)))
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:
///
/// ```text
/// # obj_id: 2004dt
/// # z: 0.0197
/// time,band,mag,mag_err
/// 53238.1,B,16.2,0.01
/// ```
///
/// Leading comment lines of the form `# key: value` are table metadata.
fn load_csv(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    let mut reader = BufReader::new(file);

    let mut meta = Meta::new();
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line).context("reading CSV")? == 0 {
            break;
        }
        let Some(comment) = header_line.trim_start().strip_prefix('#') else {
            break;
        };
        if let Some((key, value)) = comment.split_once(':') {
            meta.insert(key.trim().to_string(), guess_metadata_type(value.trim()));
        }
    }

    // `header_line` holds the first non-comment line; stitch it back in front
    // of the rest of the stream.
    let body = header_line.as_bytes().chain(reader);
    let mut csv_reader = csv::Reader::from_reader(body);
    let headers: Vec<String> = csv_reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let row: Row = record
            .iter()
            .enumerate()
            .filter_map(|(col_idx, value)| {
                headers
                    .get(col_idx)
                    .map(|name| (name.clone(), guess_metadata_type(value.trim())))
            })
            .collect();
        rows.push(row);
    }

    Ok(DataTable::new(headers, rows).with_meta(meta))
}

pub(crate) fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file holding one object's data.
///
/// Every column must be a scalar type (strings, ints, floats, bools).
/// Entries of the file's key/value metadata become table metadata.
fn load_parquet(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    let column_names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let meta: Meta = schema
        .metadata()
        .iter()
        .map(|(k, v)| (k.clone(), guess_metadata_type(v)))
        .collect();

    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let n_rows = batch.num_rows();

        for row_no in 0..n_rows {
            let mut row = Row::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let value = extract_value(batch.column(col_idx), row_no)
                    .with_context(|| format!("Row {row_no}: failed to read '{col_name}'"))?;
                row.insert(col_name.clone(), value);
            }
            rows.push(row);
        }
    }

    Ok(DataTable::new(column_names, rows).with_meta(meta))
}

// -- Parquet / Arrow helpers --

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<MetadataValue> {
    if col.is_null(row) {
        return Ok(MetadataValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            MetadataValue::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => {
            let arr = col
                .as_string_opt::<i64>()
                .context("expected LargeStringArray")?;
            MetadataValue::String(arr.value(row).to_string())
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            MetadataValue::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            MetadataValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            MetadataValue::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            MetadataValue::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            MetadataValue::Bool(arr.value(row))
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}
