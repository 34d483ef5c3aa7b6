use anyhow::{Result, bail};
use tracing::debug;

pub const STORE_URI_VAR: &str = "FEEDBOARD_STORE_URI";
pub const DB_NAME_VAR: &str = "FEEDBOARD_DB_NAME";
pub const PRICES_COLLECTION_VAR: &str = "FEEDBOARD_PRICES_COLLECTION";
pub const FOREX_COLLECTION_VAR: &str = "FEEDBOARD_FOREX_COLLECTION";
pub const WEATHER_COLLECTION_VAR: &str = "FEEDBOARD_WEATHER_COLLECTION";

/// Collection names for each feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub prices: String,
    pub forex: String,
    pub weather: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `memory:` or a filesystem path, optionally prefixed with `fjall://` or `file://`.
    pub store_uri: String,
    pub db_name: String,
    pub collections: Collections,
}

impl AppConfig {
    /// Reads configuration from the environment, honouring a `.env` file.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup.
    ///
    /// Every required variable must be present and non-blank; all missing
    /// names are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| -> String {
            match lookup(name).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let config = AppConfig {
            store_uri: required(STORE_URI_VAR),
            db_name: required(DB_NAME_VAR),
            collections: Collections {
                prices: required(PRICES_COLLECTION_VAR),
                forex: required(FOREX_COLLECTION_VAR),
                weather: required(WEATHER_COLLECTION_VAR),
            },
        };

        if !missing.is_empty() {
            bail!(
                "Missing required environment variable(s): {}",
                missing.join(", ")
            );
        }

        for (var, name) in [
            (DB_NAME_VAR, &config.db_name),
            (PRICES_COLLECTION_VAR, &config.collections.prices),
            (FOREX_COLLECTION_VAR, &config.collections.forex),
            (WEATHER_COLLECTION_VAR, &config.collections.weather),
        ] {
            if !is_valid_name(name) {
                bail!("{var} must only contain letters, digits, '_' or '-', got '{name}'");
            }
        }

        debug!("Successfully loaded config");
        Ok(config)
    }
}

fn is_valid_name(name: &str) -> bool {
    name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full() -> HashMap<String, String> {
        vars(&[
            (STORE_URI_VAR, "fjall:///var/lib/feedboard"),
            (DB_NAME_VAR, "dashboard_app_db"),
            (PRICES_COLLECTION_VAR, "crude_oil_prices"),
            (FOREX_COLLECTION_VAR, "forex_rates"),
            (WEATHER_COLLECTION_VAR, "weather"),
        ])
    }

    #[test]
    fn test_config_from_lookup() {
        let env = full();
        let config = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.store_uri, "fjall:///var/lib/feedboard");
        assert_eq!(config.db_name, "dashboard_app_db");
        assert_eq!(config.collections.prices, "crude_oil_prices");
        assert_eq!(config.collections.forex, "forex_rates");
        assert_eq!(config.collections.weather, "weather");
    }

    #[test]
    fn test_config_reports_all_missing_variables() {
        let mut env = full();
        env.remove(DB_NAME_VAR);
        env.insert(WEATHER_COLLECTION_VAR.to_string(), "   ".to_string());

        let err = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(DB_NAME_VAR));
        assert!(message.contains(WEATHER_COLLECTION_VAR));
        assert!(!message.contains(PRICES_COLLECTION_VAR));
    }

    #[test]
    fn test_config_rejects_invalid_collection_names() {
        let mut env = full();
        env.insert(FOREX_COLLECTION_VAR.to_string(), "forex/rates".to_string());

        let err = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(FOREX_COLLECTION_VAR));
    }
}
