//! # POS Configuration
//!
//! Injected settings: tax rate, currency display, attention thresholds and
//! the database location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BISTRO_TAX_RATE=16          (percent)                              │
//! │     BISTRO_CURRENCY_SYMBOL=RD$                                         │
//! │     BISTRO_DB_PATH=/var/lib/bistro/bistro.db                           │
//! │     BISTRO_FOLLOW_UP_MINUTES=20                                        │
//! │     BISTRO_CLEANING_HOURS=6                                            │
//! │                                                                         │
//! │  2. TOML Config File (./bistro.toml or an explicit path)               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     18% VAT, "$", 30 min follow-up, 4 h cleaning                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [tax]
//! rate_bps = 1800
//!
//! [currency]
//! code = "USD"
//! symbol = "$"
//! decimals = 2
//!
//! [thresholds]
//! order_follow_up_minutes = 30
//! cleaning_hours = 4
//!
//! [database]
//! path = "bistro.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//! ```

use bistro_core::query::AttentionThresholds;
use bistro_core::{TaxRate, CLEANING_THRESHOLD_HOURS, DEFAULT_TAX_RATE_BPS, ORDER_FOLLOW_UP_MINUTES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::pool::DbConfig;

const DEFAULT_CONFIG_FILE: &str = "bistro.toml";

// =============================================================================
// Sections
// =============================================================================

/// Value-added tax applied to every invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Rate in basis points (1800 = 18%).
    #[serde(default = "default_rate_bps")]
    pub rate_bps: u32,
}

fn default_rate_bps() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings {
            rate_bps: default_rate_bps(),
        }
    }
}

/// How amounts are rendered for people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// ISO 4217 code.
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    /// Minor-unit digits. Amounts are always stored in cents.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_currency_code() -> String {
    "USD".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_decimals() -> u8 {
    2
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
            decimals: default_decimals(),
        }
    }
}

/// Limits behind the "needs attention" and "overdue" views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    #[serde(default = "default_follow_up")]
    pub order_follow_up_minutes: i64,

    #[serde(default = "default_cleaning_hours")]
    pub cleaning_hours: i64,
}

fn default_follow_up() -> i64 {
    ORDER_FOLLOW_UP_MINUTES
}

fn default_cleaning_hours() -> i64 {
    CLEANING_THRESHOLD_HOURS
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        ThresholdSettings {
            order_follow_up_minutes: default_follow_up(),
            cleaning_hours: default_cleaning_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the lock before reporting a conflict.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bistro.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

// =============================================================================
// PosConfig
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub tax: TaxSettings,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub thresholds: ThresholdSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`bistro.toml` unless a path is given)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            info!(?path, "Loading POS config from file");
            let contents = std::fs::read_to_string(&path)?;
            config = toml::from_str(&contents)?;
        } else {
            debug!(?path, "Config file not found, using defaults");
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns the defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load POS config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(?path, "POS config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax.rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "tax rate must be at most 100%, got {} bps",
                self.tax.rate_bps
            )));
        }
        if self.currency.decimals > 4 {
            return Err(ConfigError::Invalid(format!(
                "currency decimals must be at most 4, got {}",
                self.currency.decimals
            )));
        }
        if self.thresholds.order_follow_up_minutes <= 0 || self.thresholds.cleaning_hours <= 0 {
            return Err(ConfigError::Invalid(
                "attention thresholds must be greater than 0".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `BISTRO_*` overrides from `lookup`. Unparsable values are
    /// logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(rate) = lookup("BISTRO_TAX_RATE") {
            match rate.trim().parse::<f64>() {
                Ok(pct) if pct >= 0.0 => {
                    debug!(percent = pct, "Overriding tax rate from environment");
                    self.tax.rate_bps = TaxRate::from_percentage(pct).bps();
                }
                _ => warn!(value = %rate, "Ignoring invalid BISTRO_TAX_RATE"),
            }
        }

        if let Some(symbol) = lookup("BISTRO_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }

        if let Some(path) = lookup("BISTRO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(minutes) = lookup("BISTRO_FOLLOW_UP_MINUTES") {
            match minutes.parse() {
                Ok(m) => self.thresholds.order_follow_up_minutes = m,
                Err(_) => warn!(value = %minutes, "Ignoring invalid BISTRO_FOLLOW_UP_MINUTES"),
            }
        }

        if let Some(hours) = lookup("BISTRO_CLEANING_HOURS") {
            match hours.parse() {
                Ok(h) => self.thresholds.cleaning_hours = h,
                Err(_) => warn!(value = %hours, "Ignoring invalid BISTRO_CLEANING_HOURS"),
            }
        }
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax.rate_bps)
    }

    pub fn thresholds(&self) -> AttentionThresholds {
        AttentionThresholds {
            order_follow_up_minutes: self.thresholds.order_follow_up_minutes,
            cleaning_hours: self.thresholds.cleaning_hours,
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }

    /// Renders an amount in cents with the configured symbol.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_db::PosConfig;
    ///
    /// let config = PosConfig::default();
    /// assert_eq!(config.format_currency(111_200), "$1112.00");
    /// assert_eq!(config.format_currency(-5), "-$0.05");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let sign = if cents < 0 { "-" } else { "" };
        let magnitude = cents.unsigned_abs();
        let decimals = u32::from(self.currency.decimals);
        if decimals == 0 {
            return format!("{sign}{}{magnitude}", self.currency.symbol);
        }

        let divisor = 10_u64.pow(decimals);
        format!(
            "{sign}{}{}.{:0width$}",
            self.currency.symbol,
            magnitude / divisor,
            magnitude % divisor,
            width = decimals as usize
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PosConfig::default();
        assert_eq!(config.tax_rate().bps(), 1800);
        assert_eq!(config.currency.symbol, "$");
        assert_eq!(config.thresholds(), AttentionThresholds::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PosConfig = toml::from_str(
            r#"
            [tax]
            rate_bps = 1600

            [currency]
            symbol = "RD$"
            "#,
        )
        .unwrap();

        assert_eq!(config.tax.rate_bps, 1600);
        assert_eq!(config.currency.symbol, "RD$");
        assert_eq!(config.currency.decimals, 2);
        assert_eq!(config.thresholds.cleaning_hours, 4);
        assert_eq!(config.database.busy_timeout_secs, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PosConfig::default();
        config.apply_overrides(env(&[
            ("BISTRO_TAX_RATE", "16"),
            ("BISTRO_CURRENCY_SYMBOL", "€"),
            ("BISTRO_DB_PATH", "/tmp/floor.db"),
            ("BISTRO_FOLLOW_UP_MINUTES", "20"),
            ("BISTRO_CLEANING_HOURS", "not-a-number"),
        ]));

        assert_eq!(config.tax.rate_bps, 1600);
        assert_eq!(config.currency.symbol, "€");
        assert_eq!(config.database.path, PathBuf::from("/tmp/floor.db"));
        assert_eq!(config.thresholds.order_follow_up_minutes, 20);
        // Unparsable values leave the previous setting
        assert_eq!(config.thresholds.cleaning_hours, 4);
    }

    #[test]
    fn test_validation() {
        let mut config = PosConfig::default();
        config.tax.rate_bps = 10_001;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PosConfig::default();
        config.thresholds.order_follow_up_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("bistro.toml");

        let mut config = PosConfig::default();
        config.tax.rate_bps = 1200;
        config.save(&path).unwrap();

        let loaded = PosConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.tax.rate_bps, 1200);
    }

    #[test]
    fn test_format_currency() {
        let mut config = PosConfig::default();
        assert_eq!(config.format_currency(1234), "$12.34");
        assert_eq!(config.format_currency(1), "$0.01");
        assert_eq!(config.format_currency(-1234), "-$12.34");

        config.currency.symbol = "¥".to_string();
        config.currency.decimals = 0;
        assert_eq!(config.format_currency(500), "¥500");
    }

    #[test]
    fn test_db_config() {
        let mut config = PosConfig::default();
        config.database.busy_timeout_secs = 2;
        let db = config.db_config();
        assert_eq!(db.busy_timeout, Duration::from_secs(2));
        assert_eq!(db.max_connections, 5);
    }
}
