//! Commodity price feed: `{"data": [{"date": ..., "value": ...}, ...]}`.

use crate::core::store::{Document, document_key};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct PricePayload {
    data: Vec<PriceRecord>,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    #[serde(default)]
    date: Value,
    #[serde(default)]
    value: Value,
}

/// A price row ready to be stored, keyed by its `(date, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDocument {
    pub key: String,
    pub doc: Document,
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Parses a price payload. Records with an empty date or value are skipped;
/// everything else is kept exactly as delivered for later coercion.
pub fn parse_price_payload(text: &str) -> Result<Vec<PriceDocument>> {
    let payload: PricePayload =
        serde_json::from_str(text).context("Failed to parse price payload")?;

    Ok(payload
        .data
        .into_iter()
        .filter(|r| is_present(&r.date) && is_present(&r.value))
        .map(|r| {
            let key = document_key(&[&r.date, &r.value]);
            let mut doc = Document::new();
            doc.insert("date".to_string(), r.date);
            doc.insert("value".to_string(), r.value);
            PriceDocument { key, doc }
        })
        .collect())
}
