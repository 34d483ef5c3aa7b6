//! Hourly weather feed, classified into regions and reduced to daily rows.

use crate::core::correlation::GroupedObservation;
use crate::core::observation::{parse_date_str, parse_timestamp};
use crate::core::store::{Document, document_key};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::debug;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum Region {
    Northeast,
    Southwest,
    West,
    Southeast,
    Midwest,
    Other,
}

const NORTH: (f64, f64) = (37.0, 49.0);
const SOUTH: (f64, f64) = (24.0, 37.0);
const EAST: (f64, f64) = (-80.0, -67.0);
const WEST: (f64, f64) = (-125.0, -102.0);
const CENTRAL: (f64, f64) = (-102.0, -80.0);

fn within(value: f64, (low, high): (f64, f64)) -> bool {
    (low..=high).contains(&value)
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Northeast,
        Region::Southwest,
        Region::West,
        Region::Southeast,
        Region::Midwest,
        Region::Other,
    ];

    /// Classifies a coordinate. Boxes share their edges, so the first match
    /// in declaration order wins.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Region {
        let boxes = [
            (Region::Northeast, NORTH, EAST),
            (Region::Southwest, SOUTH, WEST),
            (Region::West, NORTH, WEST),
            (Region::Southeast, SOUTH, CENTRAL),
            (Region::Midwest, NORTH, CENTRAL),
        ];
        boxes
            .into_iter()
            .find(|(_, lat, lon)| within(latitude, *lat) && within(longitude, *lon))
            .map(|(region, _, _)| region)
            .unwrap_or(Region::Other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Region::Northeast => "Northeast",
            Region::Southwest => "Southwest",
            Region::West => "West",
            Region::Southeast => "Southeast",
            Region::Midwest => "Midwest",
            Region::Other => "Other",
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The weather measure a view works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeatherVariable {
    Temperature,
    WindSpeed,
}

impl WeatherVariable {
    pub fn field(&self) -> &'static str {
        match self {
            WeatherVariable::Temperature => "temperature",
            WeatherVariable::WindSpeed => "wind_speed",
        }
    }
}

impl Display for WeatherVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Deserialize)]
struct WeatherPayload {
    latitude: f64,
    longitude: f64,
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
}

/// One hourly reading attributed to a region.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyReading {
    pub region: Region,
    pub day: NaiveDate,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Parses a weather payload into hourly readings.
///
/// Readings whose time cannot be parsed are skipped. Measurement arrays
/// shorter than `time` leave the missing hours as `None`.
pub fn parse_weather_payload(text: &str) -> Result<Vec<HourlyReading>> {
    let payload: WeatherPayload =
        serde_json::from_str(text).context("Failed to parse weather payload")?;
    let region = Region::from_coordinates(payload.latitude, payload.longitude);
    let hourly = payload.hourly;

    let mut readings = Vec::with_capacity(hourly.time.len());
    for (idx, time) in hourly.time.iter().enumerate() {
        let Some(timestamp) = parse_timestamp(time) else {
            debug!("Skipping weather reading with unparseable time '{time}'");
            continue;
        };
        readings.push(HourlyReading {
            region,
            day: timestamp.date(),
            temperature: hourly.temperature_2m.get(idx).copied().flatten(),
            wind_speed: hourly.wind_speed_10m.get(idx).copied().flatten(),
        });
    }
    Ok(readings)
}

/// Daily aggregate for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeather {
    pub region: Region,
    pub day: NaiveDate,
    /// Mean of the hourly temperatures.
    pub temperature: Option<f64>,
    /// Number of hourly temperatures behind `temperature`.
    pub temperature_count: usize,
    /// Highest hourly wind speed.
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WeatherDocument {
    region: Region,
    day: String,
    temperature: Option<f64>,
    #[serde(default)]
    temperature_count: usize,
    wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary_date: Option<String>,
}

impl DailyWeather {
    pub fn key(&self) -> String {
        document_key(&[
            &Value::String(self.region.name().to_string()),
            &Value::String(self.day.to_string()),
        ])
    }

    /// Stores the row along with the day the aggregate was computed.
    pub fn to_document(&self, summary_date: NaiveDate) -> Result<Document> {
        let doc = WeatherDocument {
            region: self.region,
            day: self.day.to_string(),
            temperature: self.temperature,
            temperature_count: self.temperature_count,
            wind_speed: self.wind_speed,
            summary_date: Some(summary_date.to_string()),
        };
        match serde_json::to_value(doc)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(anyhow!("Weather row did not serialize to an object")),
        }
    }

    pub fn from_document(doc: &Document) -> Option<Self> {
        let doc: WeatherDocument = serde_json::from_value(Value::Object(doc.clone())).ok()?;
        // Rows written without a count still weigh as one reading
        let temperature_count = match doc.temperature {
            Some(_) => doc.temperature_count.max(1),
            None => 0,
        };
        Some(Self {
            region: doc.region,
            day: parse_date_str(&doc.day)?,
            temperature: doc.temperature,
            temperature_count,
            wind_speed: doc.wind_speed,
        })
    }

    /// Folds a previously stored aggregate for the same region and day into
    /// this one. Temperatures are averaged over both sets of readings and the
    /// wind speed keeps the higher maximum.
    pub fn merge(&self, stored: &DailyWeather) -> DailyWeather {
        let mut acc = DayAccumulator::default();
        for row in [self, stored] {
            if let Some(t) = row.temperature.filter(|t| t.is_finite()) {
                acc.temperature_sum += t * row.temperature_count as f64;
                acc.temperature_count += row.temperature_count;
            }
            acc.add_wind(row.wind_speed);
        }
        acc.finish(self.region, self.day)
    }

    pub fn get(&self, variable: WeatherVariable) -> Option<f64> {
        match variable {
            WeatherVariable::Temperature => self.temperature,
            WeatherVariable::WindSpeed => self.wind_speed,
        }
    }

    pub fn to_grouped(&self, variable: WeatherVariable) -> GroupedObservation {
        GroupedObservation {
            group: self.region.name().to_string(),
            date: self.day,
            value: self.get(variable),
        }
    }
}

#[derive(Default)]
struct DayAccumulator {
    temperature_sum: f64,
    temperature_count: usize,
    wind_max: Option<f64>,
}

impl DayAccumulator {
    fn add_wind(&mut self, wind: Option<f64>) {
        if let Some(w) = wind.filter(|w| w.is_finite()) {
            self.wind_max = Some(self.wind_max.map_or(w, |m| m.max(w)));
        }
    }

    fn finish(self, region: Region, day: NaiveDate) -> DailyWeather {
        DailyWeather {
            region,
            day,
            temperature: (self.temperature_count > 0)
                .then(|| self.temperature_sum / self.temperature_count as f64),
            temperature_count: self.temperature_count,
            wind_speed: self.wind_max,
        }
    }
}

/// Reduces hourly readings to one row per `(region, day)`, ordered by
/// region then day. Null readings do not count towards either aggregate.
pub fn summarize_daily(readings: &[HourlyReading]) -> Vec<DailyWeather> {
    let mut days: BTreeMap<(Region, NaiveDate), DayAccumulator> = BTreeMap::new();
    for reading in readings {
        let acc = days.entry((reading.region, reading.day)).or_default();
        if let Some(t) = reading.temperature.filter(|t| t.is_finite()) {
            acc.temperature_sum += t;
            acc.temperature_count += 1;
        }
        acc.add_wind(reading.wind_speed);
    }

    days.into_iter()
        .map(|((region, day), acc)| acc.finish(region, day))
        .collect()
}
