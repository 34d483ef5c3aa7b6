//! Exchange rate feed.
//!
//! A payload maps an arbitrary pair label to a realtime quote object:
//!
//! ```json
//! {"USD_EUR": {"Realtime Currency Exchange Rate": {
//!     "1. From_Currency Code": "USD",
//!     "3. To_Currency Code": "EUR",
//!     "5. Exchange Rate": "0.9243",
//!     "6. Last Refreshed": "2024-11-20 14:05:01"
//! }}}
//! ```

use crate::core::correlation::Quote;
use crate::core::observation::{parse_timestamp, parse_value};
use crate::core::store::{Document, document_key};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ForexEntry {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    realtime: RealtimeRate,
}

#[derive(Debug, Deserialize)]
struct RealtimeRate {
    #[serde(rename = "3. To_Currency Code")]
    to_currency: String,
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: Value,
    #[serde(rename = "6. Last Refreshed")]
    last_refreshed: String,
}

/// The stored shape of one exchange rate quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    /// Currency code the rate converts to.
    pub device: String,
    pub exchange_rate: Value,
    pub last_refreshed: String,
}

impl ExchangeQuote {
    /// One document per device per refresh day. Ingestion keeps the quote
    /// with the latest [`refreshed_at`](Self::refreshed_at) under each key.
    pub fn key(&self) -> String {
        let day = parse_timestamp(&self.last_refreshed)
            .map(|ts| ts.date().to_string())
            .unwrap_or_else(|| self.last_refreshed.clone());
        document_key(&[&Value::String(self.device.clone()), &Value::String(day)])
    }

    /// The refresh time, or `None` when it cannot be parsed.
    pub fn refreshed_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.last_refreshed)
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(anyhow!("Exchange quote did not serialize to an object")),
        }
    }

    pub fn from_document(doc: &Document) -> Option<Self> {
        serde_json::from_value(Value::Object(doc.clone())).ok()
    }

    pub fn rate(&self) -> Option<f64> {
        parse_value(&self.exchange_rate)
    }

    /// Converts to a correlation quote; `None` when the refresh time is unusable.
    pub fn to_quote(&self) -> Option<Quote> {
        Some(Quote {
            group: self.device.clone(),
            timestamp: self.refreshed_at()?,
            value: self.rate(),
        })
    }
}

/// Parses a forex payload. Entries missing any of the expected fields are
/// skipped; a payload that is not a JSON object is an error.
pub fn parse_forex_payload(text: &str) -> Result<Vec<ExchangeQuote>> {
    let entries: BTreeMap<String, Value> =
        serde_json::from_str(text).context("Failed to parse forex payload")?;

    let mut quotes = Vec::new();
    for (pair, entry) in entries {
        match serde_json::from_value::<ForexEntry>(entry) {
            Ok(entry) => quotes.push(ExchangeQuote {
                device: entry.realtime.to_currency,
                exchange_rate: entry.realtime.exchange_rate,
                last_refreshed: entry.realtime.last_refreshed,
            }),
            Err(e) => debug!("Skipping forex entry {pair}: {e}"),
        }
    }
    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PAYLOAD: &str = r#"{
        "USD_EUR": {"Realtime Currency Exchange Rate": {
            "1. From_Currency Code": "USD",
            "3. To_Currency Code": "EUR",
            "5. Exchange Rate": "0.92430000",
            "6. Last Refreshed": "2024-11-20 14:05:01",
            "7. Time Zone": "UTC"
        }},
        "USD_CAD": {"Realtime Currency Exchange Rate": {
            "3. To_Currency Code": "CAD",
            "5. Exchange Rate": "1.39",
            "6. Last Refreshed": "2024-11-20 14:05:02"
        }},
        "USD_JPY": {"Error Message": "rate limited"}
    }"#;

    #[test]
    fn test_parse_forex_payload() {
        let quotes = parse_forex_payload(PAYLOAD).unwrap();
        assert_eq!(quotes.len(), 2);
        // Entries come back ordered by pair label
        assert_eq!(quotes[0].device, "CAD");
        assert_eq!(quotes[1].device, "EUR");
        assert_eq!(quotes[1].rate(), Some(0.9243));
        assert_eq!(quotes[1].last_refreshed, "2024-11-20 14:05:01");
    }

    #[test]
    fn test_parse_forex_payload_rejects_non_objects() {
        assert!(parse_forex_payload("[1, 2]").is_err());
        assert!(parse_forex_payload("").is_err());
    }

    #[test]
    fn test_quote_key_is_per_device_and_day() {
        let quote = |refreshed: &str| ExchangeQuote {
            device: "EUR".to_string(),
            exchange_rate: Value::String("0.92".to_string()),
            last_refreshed: refreshed.to_string(),
        };
        assert_eq!(
            quote("2024-11-20 08:00:00").key(),
            quote("2024-11-20 17:30:00").key()
        );
        assert_ne!(
            quote("2024-11-20 08:00:00").key(),
            quote("2024-11-21 08:00:00").key()
        );
    }

    #[test]
    fn test_quote_document_round_trip() {
        let quotes = parse_forex_payload(PAYLOAD).unwrap();
        let doc = quotes[1].to_document().unwrap();
        assert_eq!(doc["device"], "EUR");
        assert_eq!(ExchangeQuote::from_document(&doc).as_ref(), Some(&quotes[1]));

        let quote = quotes[1].to_quote().unwrap();
        assert_eq!(quote.group, "EUR");
        assert_eq!(
            quote.timestamp.date(),
            NaiveDate::from_ymd_opt(2024, 11, 20).unwrap()
        );
    }
}
