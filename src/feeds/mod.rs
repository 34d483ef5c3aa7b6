//! External feed payloads and their ingestion into the store.

pub mod forex;
pub mod ingest;
pub mod price;
pub mod weather;

use crate::core::config::Collections;
use clap::ValueEnum;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedKind {
    /// Daily commodity prices
    Price,
    /// Realtime exchange rate snapshots
    Forex,
    /// Hourly weather observations
    Weather,
}

impl FeedKind {
    /// The collection this feed is written to.
    pub fn collection<'a>(&self, collections: &'a Collections) -> &'a str {
        match self {
            FeedKind::Price => &collections.prices,
            FeedKind::Forex => &collections.forex,
            FeedKind::Weather => &collections.weather,
        }
    }
}

impl Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeedKind::Price => "price",
            FeedKind::Forex => "forex",
            FeedKind::Weather => "weather",
        };
        f.write_str(name)
    }
}
