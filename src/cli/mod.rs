pub mod correlate;
pub mod ingest;
pub mod rates;
pub mod series;
pub mod ui;
