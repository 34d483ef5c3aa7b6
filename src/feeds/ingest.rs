//! Batch ingestion of a directory of feed files.
//!
//! Every `*.json` file in the directory is processed in name order. A file
//! that cannot be read, parsed or written is logged and counted as failed;
//! the rest of the batch still runs. A file that fails part way through
//! keeps the counts of what it wrote before the error.

use super::FeedKind;
use super::forex::{ExchangeQuote, parse_forex_payload};
use super::price::parse_price_payload;
use super::weather::{DailyWeather, HourlyReading, parse_weather_payload, summarize_daily};
use crate::core::config::Collections;
use crate::core::store::DocumentStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome for a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Documents newly written.
    pub inserted: usize,
    /// Documents not written because the store already held them or a newer version.
    pub skipped: usize,
    pub error: Option<String>,
}

impl FileReport {
    fn succeeded(path: &Path, inserted: usize, skipped: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            inserted,
            skipped,
            error: None,
        }
    }

    fn failed(path: &Path, error: &anyhow::Error) -> Self {
        Self::interrupted(path, 0, 0, error)
    }

    fn interrupted(path: &Path, inserted: usize, skipped: usize, error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{error:#}")),
            ..Self::succeeded(path, inserted, skipped)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
    /// Daily rows written for weather runs, which aggregate across files.
    pub daily_rows: usize,
}

impl IngestReport {
    pub fn files_ok(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.files.len() - self.files_ok()
    }

    pub fn inserted(&self) -> usize {
        self.files.iter().map(|f| f.inserted).sum::<usize>() + self.daily_rows
    }

    pub fn skipped(&self) -> usize {
        self.files.iter().map(|f| f.skipped).sum()
    }
}

/// Lists the `*.json` files of a directory in name order.
pub fn list_feed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read feed directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Ingests every feed file in `dir` into the collection for `kind`.
///
/// `today` stamps weather aggregates with the day they were computed.
/// `on_file` is called once per file after it has been handled.
pub async fn ingest_dir<F>(
    store: &dyn DocumentStore,
    collections: &Collections,
    kind: FeedKind,
    dir: &Path,
    remove_processed: bool,
    today: NaiveDate,
    on_file: F,
) -> Result<IngestReport>
where
    F: Fn(&FileReport),
{
    let files = list_feed_files(dir)?;
    let collection = kind.collection(collections);
    info!(%kind, collection, files = files.len(), "Starting ingestion");

    let mut report = IngestReport::default();
    let mut readings: Vec<HourlyReading> = Vec::new();
    let mut processed: Vec<PathBuf> = Vec::new();

    for path in &files {
        let outcome = match kind {
            FeedKind::Price => ingest_price_file(store, collection, path).await,
            FeedKind::Forex => ingest_forex_file(store, collection, path).await,
            FeedKind::Weather => read_weather_file(path).map(|mut file_readings| {
                debug!(file = %path.display(), readings = file_readings.len(), "Read weather file");
                readings.append(&mut file_readings);
                FileReport::succeeded(path, 0, 0)
            }),
        };

        let file_report = outcome.unwrap_or_else(|e| FileReport::failed(path, &e));
        match &file_report.error {
            None => processed.push(path.clone()),
            Some(error) => warn!(
                file = %path.display(),
                inserted = file_report.inserted,
                "Failed to ingest feed file: {error}"
            ),
        }
        on_file(&file_report);
        report.files.push(file_report);
    }

    if kind == FeedKind::Weather && !readings.is_empty() {
        report.daily_rows = write_daily_weather(store, collection, &readings, today)
            .await
            .with_context(|| format!("Failed to write daily weather to '{collection}'"))?;
    }

    store.flush().await?;

    if remove_processed {
        for path in &processed {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(file = %path.display(), "Removed processed feed file"),
                Err(e) => warn!(file = %path.display(), "Failed to remove feed file: {e}"),
            }
        }
    }

    info!(
        %kind,
        ok = report.files_ok(),
        failed = report.files_failed(),
        inserted = report.inserted(),
        skipped = report.skipped(),
        "Ingestion finished"
    );
    Ok(report)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed file: {}", path.display()))
}

/// Inserts the rows of one price file. Read and parse errors fail the file
/// outright; a store error keeps the counts of the rows written before it.
async fn ingest_price_file(
    store: &dyn DocumentStore,
    collection: &str,
    path: &Path,
) -> Result<FileReport> {
    let docs = parse_price_payload(&read_file(path)?)?;

    let mut inserted = 0;
    let mut skipped = 0;
    for row in docs {
        match store.insert_if_absent(collection, &row.key, row.doc).await {
            Ok(true) => inserted += 1,
            Ok(false) => skipped += 1,
            Err(e) => {
                let e = e.context(format!("Failed to write price row {}", inserted + skipped + 1));
                return Ok(FileReport::interrupted(path, inserted, skipped, &e));
            }
        }
    }
    debug!(file = %path.display(), inserted, skipped, "Ingested price file");

    Ok(FileReport::succeeded(path, inserted, skipped))
}

/// Upserts the quotes of one forex file. A quote older than the one already
/// stored for its device and day is skipped, so file order does not matter.
async fn ingest_forex_file(
    store: &dyn DocumentStore,
    collection: &str,
    path: &Path,
) -> Result<FileReport> {
    let quotes = parse_forex_payload(&read_file(path)?)?;

    let mut written = 0;
    let mut skipped = 0;
    for quote in &quotes {
        match upsert_if_newer(store, collection, quote).await {
            Ok(true) => written += 1,
            Ok(false) => skipped += 1,
            Err(e) => return Ok(FileReport::interrupted(path, written, skipped, &e)),
        }
    }
    debug!(file = %path.display(), written, skipped, "Ingested forex file");

    Ok(FileReport::succeeded(path, written, skipped))
}

async fn upsert_if_newer(
    store: &dyn DocumentStore,
    collection: &str,
    quote: &ExchangeQuote,
) -> Result<bool> {
    let key = quote.key();
    let stored = store
        .get(collection, &key)
        .await?
        .as_ref()
        .and_then(ExchangeQuote::from_document);
    if let Some(stored) = stored
        && stored.refreshed_at() > quote.refreshed_at()
    {
        debug!(
            device = %quote.device,
            stored = %stored.last_refreshed,
            incoming = %quote.last_refreshed,
            "Keeping newer stored quote"
        );
        return Ok(false);
    }
    store.upsert(collection, &key, quote.to_document()?).await?;
    Ok(true)
}

/// Summarizes the batch and merges each day with the row already stored for
/// its region, so later batches extend earlier aggregates.
async fn write_daily_weather(
    store: &dyn DocumentStore,
    collection: &str,
    readings: &[HourlyReading],
    today: NaiveDate,
) -> Result<usize> {
    let daily = summarize_daily(readings);
    let mut docs = Vec::with_capacity(daily.len());
    let mut merged = 0;
    for row in daily {
        let key = row.key();
        let stored = store
            .get(collection, &key)
            .await?
            .as_ref()
            .and_then(DailyWeather::from_document);
        let row = match stored {
            Some(stored) => {
                merged += 1;
                row.merge(&stored)
            }
            None => row,
        };
        docs.push((key, row.to_document(today)?));
    }
    debug!(collection, rows = docs.len(), merged, "Writing daily weather");
    store.insert_many(collection, docs).await
}

fn read_weather_file(path: &Path) -> Result<Vec<HourlyReading>> {
    parse_weather_payload(&read_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Document;
    use crate::store::memory::MemoryStore;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Memory store that refuses inserts once `writes_left` runs out.
    struct FlakyStore {
        inner: MemoryStore,
        writes_left: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
            self.inner.find_all(collection).await
        }

        async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
            self.inner.get(collection, key).await
        }

        async fn insert_many(
            &self,
            collection: &str,
            docs: Vec<(String, Document)>,
        ) -> Result<usize> {
            self.inner.insert_many(collection, docs).await
        }

        async fn insert_if_absent(
            &self,
            collection: &str,
            key: &str,
            doc: Document,
        ) -> Result<bool> {
            if self.writes_left.load(Ordering::SeqCst) == 0 {
                bail!("disk full");
            }
            self.writes_left.fetch_sub(1, Ordering::SeqCst);
            self.inner.insert_if_absent(collection, key, doc).await
        }

        async fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()> {
            self.inner.upsert(collection, key, doc).await
        }
    }

    fn forex_payload(rate: &str, refreshed: &str) -> String {
        format!(
            r#"{{"USD_EUR": {{"Realtime Currency Exchange Rate": {{
                "3. To_Currency Code": "EUR",
                "5. Exchange Rate": "{rate}",
                "6. Last Refreshed": "{refreshed}"}}}}}}"#
        )
    }

    fn weather_payload(latitude: f64, longitude: f64, hours: &[(&str, f64, f64)]) -> String {
        let times: Vec<String> = hours.iter().map(|(t, _, _)| format!("\"{t}\"")).collect();
        let temps: Vec<String> = hours.iter().map(|(_, t, _)| t.to_string()).collect();
        let winds: Vec<String> = hours.iter().map(|(_, _, w)| w.to_string()).collect();
        format!(
            r#"{{"latitude": {latitude}, "longitude": {longitude}, "hourly": {{
                "time": [{}], "temperature_2m": [{}], "wind_speed_10m": [{}]}}}}"#,
            times.join(", "),
            temps.join(", "),
            winds.join(", ")
        )
    }

    fn collections() -> Collections {
        Collections {
            prices: "prices".to_string(),
            forex: "forex".to_string(),
            weather: "weather".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    #[test]
    fn test_list_feed_files_sorted_json_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = list_feed_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_list_feed_files_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(list_feed_files(&dir.path().join("absent")).is_err());
    }

    #[tokio::test]
    async fn test_ingest_prices_skips_existing_and_continues_after_bad_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("01.json"),
            r#"{"data": [{"date": "2024-07-01", "value": "80.1"}, {"date": "2024-07-02", "value": "80.5"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("02.json"), "{broken").unwrap();
        std::fs::write(
            dir.path().join("03.json"),
            r#"{"data": [{"date": "2024-07-02", "value": "80.5"}, {"date": "2024-07-03", "value": "81.0"}]}"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        let seen = Cell::new(0);
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Price,
            dir.path(),
            false,
            today(),
            |_| seen.set(seen.get() + 1),
        )
        .await
        .unwrap();

        assert_eq!(seen.get(), 3);
        assert_eq!(report.files_ok(), 2);
        assert_eq!(report.files_failed(), 1);
        assert_eq!(report.inserted(), 3);
        assert_eq!(report.skipped(), 1);
        assert!(report.files[1].error.is_some());
        assert_eq!(store.find_all("prices").await.unwrap().len(), 3);
        // Nothing is removed unless asked
        assert_eq!(list_feed_files(dir.path()).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_prices_reports_rows_written_before_store_error() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("01.json"),
            r#"{"data": [
                {"date": "2024-07-01", "value": "80.1"},
                {"date": "2024-07-02", "value": "80.5"},
                {"date": "2024-07-03", "value": "81.0"}
            ]}"#,
        )
        .unwrap();

        let store = FlakyStore {
            inner: MemoryStore::new(),
            writes_left: AtomicUsize::new(2),
        };
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Price,
            dir.path(),
            true,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(report.files_failed(), 1);
        let file = &report.files[0];
        assert_eq!(file.inserted, 2);
        assert_eq!(file.skipped, 0);
        assert!(file.error.as_deref().unwrap().contains("disk full"));
        assert_eq!(report.inserted(), 2);
        assert_eq!(store.find_all("prices").await.unwrap().len(), 2);
        // A file that did not finish is kept for the next run
        assert_eq!(list_feed_files(dir.path()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_forex_keeps_one_quote_per_device_and_day() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            forex_payload("0.91", "2024-07-01 08:00:00"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            forex_payload("0.92", "2024-07-01 16:00:00"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("c.json"),
            forex_payload("0.93", "2024-07-02 08:00:00"),
        )
        .unwrap();

        let store = MemoryStore::new();
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Forex,
            dir.path(),
            true,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(report.files_ok(), 3);
        let docs = store.find_all("forex").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d["exchange_rate"] == "0.92"));
        assert!(list_feed_files(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_weather_aggregates_across_files() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("chicago.json"),
            r#"{"latitude": 41.8, "longitude": -87.6, "hourly": {
                "time": ["2024-07-01T00:00", "2024-07-01T12:00"],
                "temperature_2m": [20.0, 30.0],
                "wind_speed_10m": [4.0, 12.0]}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("detroit.json"),
            r#"{"latitude": 42.3, "longitude": -83.0, "hourly": {
                "time": ["2024-07-01T06:00"],
                "temperature_2m": [10.0],
                "wind_speed_10m": [20.0]}}"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Weather,
            dir.path(),
            false,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(report.files_ok(), 2);
        assert_eq!(report.daily_rows, 1);
        let docs = store.find_all("weather").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["region"], "Midwest");
        assert_eq!(docs[0]["temperature"], 20.0);
        assert_eq!(docs[0]["wind_speed"], 20.0);
        assert_eq!(docs[0]["summary_date"], "2024-07-10");
    }

    #[tokio::test]
    async fn test_ingest_forex_keeps_latest_quote_regardless_of_file_order() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            forex_payload("0.99", "2024-07-01 17:00:00"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            forex_payload("0.91", "2024-07-01 08:00:00"),
        )
        .unwrap();

        let store = MemoryStore::new();
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Forex,
            dir.path(),
            false,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(report.files_ok(), 2);
        assert_eq!(report.inserted(), 1);
        assert_eq!(report.skipped(), 1);
        let docs = store.find_all("forex").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["exchange_rate"], "0.99");
        assert_eq!(docs[0]["last_refreshed"], "2024-07-01 17:00:00");

        // A later refresh on the same day still replaces it
        std::fs::write(
            dir.path().join("c.json"),
            forex_payload("0.95", "2024-07-01 18:30:00"),
        )
        .unwrap();
        ingest_dir(
            &store,
            &collections(),
            FeedKind::Forex,
            dir.path(),
            false,
            today(),
            |_| {},
        )
        .await
        .unwrap();
        let docs = store.find_all("forex").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["exchange_rate"], "0.95");
    }

    #[tokio::test]
    async fn test_ingest_weather_merges_with_earlier_batch() {
        let store = MemoryStore::new();

        let first = tempdir().unwrap();
        std::fs::write(
            first.path().join("chicago.json"),
            weather_payload(
                41.8,
                -87.6,
                &[("2024-07-01T00:00", 20.0, 4.0), ("2024-07-01T12:00", 30.0, 30.0)],
            ),
        )
        .unwrap();
        ingest_dir(
            &store,
            &collections(),
            FeedKind::Weather,
            first.path(),
            false,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        let docs = store.find_all("weather").await.unwrap();
        assert_eq!(docs[0]["temperature"], 25.0);
        assert_eq!(docs[0]["wind_speed"], 30.0);

        let second = tempdir().unwrap();
        std::fs::write(
            second.path().join("detroit.json"),
            weather_payload(42.3, -83.0, &[("2024-07-01T06:00", 10.0, 5.0)]),
        )
        .unwrap();
        let report = ingest_dir(
            &store,
            &collections(),
            FeedKind::Weather,
            second.path(),
            false,
            today(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(report.daily_rows, 1);
        let docs = store.find_all("weather").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["region"], "Midwest");
        assert_eq!(docs[0]["temperature"], 20.0);
        assert_eq!(docs[0]["temperature_count"], 3);
        assert_eq!(docs[0]["wind_speed"], 30.0);
    }
}
