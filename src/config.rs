//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct,
//! then narrows the wallet-related values into [`WalletSettings`] for the domain code.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::money::AmountParsePolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `GST_RATE_PERCENT` (optional): GST rate applied to tax-inclusive billing, defaults to 18
/// - `SECURITY_DEPOSIT_PAISE` (optional): non-withdrawable floor, defaults to ₹4,000
/// - `MANDATORY_DEPOSIT_THRESHOLD_PAISE` (optional): cumulative deposits that unlock
///   task acceptance after the first task, defaults to ₹3,999
/// - `WITHDRAWAL_MIN_AVAILABLE_PAISE` (optional): available balance required before a
///   withdrawal request is accepted, defaults to ₹5,000
/// - `REJECTION_PENALTY_PAISE` / `CANCELLATION_PENALTY_PAISE` (optional): default
///   penalty amounts, both ₹100
/// - `AMOUNT_PARSE_POLICY` (optional): `lenient` or `strict`, defaults to `lenient`
/// - `PAYMENT_GATEWAY_URL`, `PAYMENT_KEY_ID`, `PAYMENT_KEY_SECRET` (optional): payment
///   gateway credentials; deposit orders are rejected when unset
/// - `WEBHOOK_TIMEOUT_SECS` (optional): per-delivery timeout, defaults to 5
/// - `NOTIFICATION_BUFFER` (optional): queued wallet events before new ones are dropped
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_gst_rate")]
    pub gst_rate_percent: Decimal,

    #[serde(default = "default_security_deposit")]
    pub security_deposit_paise: i64,

    #[serde(default = "default_mandatory_deposit_threshold")]
    pub mandatory_deposit_threshold_paise: i64,

    #[serde(default = "default_withdrawal_min_available")]
    pub withdrawal_min_available_paise: i64,

    #[serde(default = "default_penalty")]
    pub rejection_penalty_paise: i64,

    #[serde(default = "default_penalty")]
    pub cancellation_penalty_paise: i64,

    #[serde(default)]
    pub amount_parse_policy: AmountParsePolicy,

    #[serde(default)]
    pub payment_gateway_url: Option<String>,

    #[serde(default)]
    pub payment_key_id: Option<String>,

    #[serde(default)]
    pub payment_key_secret: Option<String>,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,

    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

fn default_port() -> u16 {
    3000
}

fn default_gst_rate() -> Decimal {
    Decimal::from(18)
}

fn default_security_deposit() -> i64 {
    400_000
}

fn default_mandatory_deposit_threshold() -> i64 {
    399_900
}

fn default_withdrawal_min_available() -> i64 {
    500_000
}

fn default_penalty() -> i64 {
    10_000
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_notification_buffer() -> usize {
    1024
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Wallet rules derived from this configuration.
    pub fn wallet_settings(&self) -> WalletSettings {
        WalletSettings {
            gst_rate_percent: self.gst_rate_percent,
            security_deposit_paise: self.security_deposit_paise,
            mandatory_deposit_threshold_paise: self.mandatory_deposit_threshold_paise,
            withdrawal_min_available_paise: self.withdrawal_min_available_paise,
            rejection_penalty_paise: self.rejection_penalty_paise,
            cancellation_penalty_paise: self.cancellation_penalty_paise,
            amount_parse_policy: self.amount_parse_policy,
        }
    }
}

/// Business constants the wallet aggregate and calculation service depend on.
///
/// Every threshold lives here once; nothing in the domain hardcodes a rupee figure.
#[derive(Debug, Clone)]
pub struct WalletSettings {
    pub gst_rate_percent: Decimal,
    pub security_deposit_paise: i64,
    pub mandatory_deposit_threshold_paise: i64,
    pub withdrawal_min_available_paise: i64,
    pub rejection_penalty_paise: i64,
    pub cancellation_penalty_paise: i64,
    pub amount_parse_policy: AmountParsePolicy,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            gst_rate_percent: default_gst_rate(),
            security_deposit_paise: default_security_deposit(),
            mandatory_deposit_threshold_paise: default_mandatory_deposit_threshold(),
            withdrawal_min_available_paise: default_withdrawal_min_available(),
            rejection_penalty_paise: default_penalty(),
            cancellation_penalty_paise: default_penalty(),
            amount_parse_policy: AmountParsePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_rupee_figures() {
        let settings = WalletSettings::default();
        assert_eq!(settings.security_deposit_paise, 4_000_00);
        assert_eq!(settings.mandatory_deposit_threshold_paise, 3_999_00);
        assert_eq!(settings.withdrawal_min_available_paise, 5_000_00);
        assert_eq!(settings.rejection_penalty_paise, 100_00);
        assert_eq!(settings.gst_rate_percent, Decimal::from(18));
        assert_eq!(settings.amount_parse_policy, AmountParsePolicy::Lenient);
    }

    #[test]
    fn config_reads_overrides_from_pairs() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/wallet".to_string()),
            ("GST_RATE_PERCENT".to_string(), "12".to_string()),
            ("AMOUNT_PARSE_POLICY".to_string(), "strict".to_string()),
            ("SECURITY_DEPOSIT_PAISE".to_string(), "200000".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.server_port, 3000);
        let settings = config.wallet_settings();
        assert_eq!(settings.gst_rate_percent, Decimal::from(12));
        assert_eq!(settings.amount_parse_policy, AmountParsePolicy::Strict);
        assert_eq!(settings.security_deposit_paise, 200_000);
        assert!(config.payment_key_secret.is_none());
    }
}
