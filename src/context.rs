//! Snapshot of every collection, read once and shared by all views.

use crate::core::config::Collections;
use crate::core::correlation::{
    CorrelationMatrix, CorrelationResult, GroupedObservation, Quote, correlate,
    correlate_by_group, correlation_matrix, group_series, latest_per_group_day,
};
use crate::core::observation::RawObservation;
use crate::core::series::{NormalizeOptions, Series, SeriesError, normalize};
use crate::core::store::DocumentStore;
use crate::feeds::forex::ExchangeQuote;
use crate::feeds::weather::{DailyWeather, Region, WeatherVariable};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::debug;

pub struct DashboardContext {
    today: NaiveDate,
    prices: Vec<RawObservation>,
    quotes: Vec<Quote>,
    latest_rates: Vec<ExchangeQuote>,
    weather: Vec<DailyWeather>,
}

impl DashboardContext {
    /// Reads all three collections. Documents that do not have the expected
    /// shape are skipped.
    pub async fn load(
        store: &dyn DocumentStore,
        collections: &Collections,
        today: NaiveDate,
    ) -> Result<Self> {
        let prices: Vec<RawObservation> = store
            .find_all(&collections.prices)
            .await
            .with_context(|| format!("Failed to read '{}'", collections.prices))?
            .iter()
            .map(RawObservation::from_document)
            .collect();

        let forex_docs = store
            .find_all(&collections.forex)
            .await
            .with_context(|| format!("Failed to read '{}'", collections.forex))?;
        let quotes: Vec<Quote> = forex_docs
            .iter()
            .filter_map(ExchangeQuote::from_document)
            .filter_map(|q| q.to_quote())
            .collect();

        let latest_rates = store
            .latest_per_group(&collections.forex, "device", "last_refreshed")
            .await
            .with_context(|| format!("Failed to read latest rates from '{}'", collections.forex))?
            .iter()
            .filter_map(ExchangeQuote::from_document)
            .collect();

        let weather: Vec<DailyWeather> = store
            .find_all(&collections.weather)
            .await
            .with_context(|| format!("Failed to read '{}'", collections.weather))?
            .iter()
            .filter_map(DailyWeather::from_document)
            .collect();

        debug!(
            prices = prices.len(),
            quotes = quotes.len(),
            weather = weather.len(),
            %today,
            "Loaded dashboard snapshot"
        );

        Ok(Self {
            today,
            prices,
            quotes,
            latest_rates,
            weather,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// The price feed as a daily-continuous series ending today.
    pub fn price_series(&self, options: &NormalizeOptions) -> Result<Series, SeriesError> {
        normalize(&self.prices, self.today, options)
    }

    /// Most recent quote per currency, ordered by currency code.
    pub fn latest_rates(&self) -> &[ExchangeQuote] {
        &self.latest_rates
    }

    /// Regions with at least one daily weather row, in declaration order.
    pub fn regions(&self) -> Vec<Region> {
        Region::ALL
            .into_iter()
            .filter(|r| self.weather.iter().any(|w| w.region == *r))
            .collect()
    }

    pub fn weather_observations(&self, variable: WeatherVariable) -> Vec<GroupedObservation> {
        self.weather.iter().map(|w| w.to_grouped(variable)).collect()
    }

    pub fn weather_series(&self, region: Region, variable: WeatherVariable) -> Series {
        group_series(&self.weather_observations(variable), region.name())
    }

    /// One observation per currency per day, taken from the latest quote.
    pub fn forex_observations(&self) -> Vec<GroupedObservation> {
        latest_per_group_day(&self.quotes)
    }

    /// Price against a weather variable, for one region or per region.
    pub fn price_vs_weather(
        &self,
        variable: WeatherVariable,
        region: Option<Region>,
        options: &NormalizeOptions,
    ) -> Result<CorrelationResult, SeriesError> {
        let prices = self.price_series(options)?;
        Ok(match region {
            Some(region) => {
                CorrelationResult::Single(correlate(&prices, &self.weather_series(region, variable)))
            }
            None => CorrelationResult::Grouped(correlate_by_group(
                &prices,
                &self.weather_observations(variable),
            )),
        })
    }

    /// Price against each currency's exchange rate.
    pub fn price_vs_forex(
        &self,
        options: &NormalizeOptions,
    ) -> Result<CorrelationResult, SeriesError> {
        let prices = self.price_series(options)?;
        Ok(CorrelationResult::Grouped(correlate_by_group(
            &prices,
            &self.forex_observations(),
        )))
    }

    /// Pairwise coefficients between price and both weather variables of a
    /// region.
    pub fn weather_matrix(
        &self,
        region: Region,
        options: &NormalizeOptions,
    ) -> Result<CorrelationMatrix, SeriesError> {
        let columns = vec![
            ("price".to_string(), self.price_series(options)?),
            (
                WeatherVariable::Temperature.to_string(),
                self.weather_series(region, WeatherVariable::Temperature),
            ),
            (
                WeatherVariable::WindSpeed.to_string(),
                self.weather_series(region, WeatherVariable::WindSpeed),
            ),
        ];
        Ok(correlation_matrix(&columns))
    }
}
