use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const WEATHER_API_KEY_ENV: &str = "SALECAST_WEATHER_API_KEY";
pub const MARKET_API_KEY_ENV: &str = "SALECAST_MARKET_API_KEY";

pub const MIN_HORIZON_DAYS: u32 = 1;
pub const MAX_HORIZON_DAYS: u32 = 365;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WeatherProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_units")]
    pub units: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MarketProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub weather: Option<WeatherProviderConfig>,
    pub market: Option<MarketProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            weather: Some(WeatherProviderConfig {
                base_url: "https://api.openweathermap.org".to_string(),
                api_key: None,
                units: default_units(),
            }),
            market: Some(MarketProviderConfig {
                base_url: "https://www.alphavantage.co".to_string(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Coverage of the uncertainty interval, in (0, 1)
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,
    /// Used when delimiter sniffing finds no consistent separator
    #[serde(default = "default_delimiter")]
    pub default_delimiter: char,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            horizon_days: default_horizon_days(),
            interval_width: default_interval_width(),
            default_delimiter: default_delimiter(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct EnrichmentConfig {
    /// City name for weather enrichment
    pub location: Option<String>,
    /// Currency pair for exchange rate enrichment, e.g. `EUR/USD`
    pub currency_pair: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_horizon_days() -> u32 {
    30
}

fn default_interval_width() -> f64 {
    0.80
}

fn default_delimiter() -> char {
    ','
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            let mut config = Self::default();
            config.apply_env_overrides();
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "salecast", "salecast")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        config.apply_env_overrides();
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let horizon = self.forecast.horizon_days;
        if !(MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&horizon) {
            bail!(
                "forecast.horizon_days must be within [{MIN_HORIZON_DAYS}, {MAX_HORIZON_DAYS}], got {horizon}"
            );
        }
        let width = self.forecast.interval_width;
        if !(width > 0.0 && width < 1.0) {
            bail!("forecast.interval_width must be within (0, 1), got {width}");
        }
        if !self.forecast.default_delimiter.is_ascii() {
            bail!(
                "forecast.default_delimiter must be a single ASCII character, got {:?}",
                self.forecast.default_delimiter
            );
        }
        Ok(())
    }

    /// API keys from the environment take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(WEATHER_API_KEY_ENV).ok(),
            std::env::var(MARKET_API_KEY_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, weather_key: Option<String>, market_key: Option<String>) {
        if let (Some(key), Some(weather)) = (weather_key, self.providers.weather.as_mut()) {
            weather.api_key = Some(key);
        }
        if let (Some(key), Some(market)) = (market_key, self.providers.market.as_mut()) {
            market.api_key = Some(key);
        }
    }
}
