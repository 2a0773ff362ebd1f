use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::table::{Table, Value};

pub(super) fn load_json(bytes: &[u8]) -> Result<(Table, String)> {
    let data: JsonValue =
        serde_json::from_slice(bytes).map_err(|e| Error::Parse(format!("invalid JSON: {e}")))?;

    let table = match data {
        JsonValue::Array(items) if items.is_empty() => {
            return Err(Error::Parse("JSON array is empty".to_string()));
        }
        JsonValue::Array(items) if items.iter().all(JsonValue::is_object) => records(items)?,
        JsonValue::Array(items) => {
            let rows = items.iter().map(|v| vec![json_to_value(v)]).collect();
            Table::new(vec!["value".to_string()], rows)?
        }
        JsonValue::Object(map) => {
            let mut flat = Vec::new();
            flatten("", &map, &mut flat);
            if flat.is_empty() {
                return Err(Error::Parse("JSON object is empty".to_string()));
            }
            let (headers, row): (Vec<String>, Vec<Value>) = flat.into_iter().unzip();
            Table::new(headers, vec![row])?
        }
        _ => return Err(Error::Parse("JSON format not supported".to_string())),
    };

    Ok((table, "Successfully loaded JSON file".to_string()))
}

fn records(items: Vec<JsonValue>) -> Result<Table> {
    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        if let JsonValue::Object(map) = item {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    let rows = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|h| item.get(h).map(json_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Table::new(headers, rows)
}

/// Nested objects become dotted column names.
fn flatten(prefix: &str, map: &Map<String, JsonValue>, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            JsonValue::Object(inner) => flatten(&name, inner, out),
            other => out.push((name, json_to_value(other))),
        }
    }
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
