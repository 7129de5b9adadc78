use std::{env, str::FromStr};

use chrono::Duration;
use log::*;
use settle_common::{helpers::env_flag, Money, Rate, Secret, DEFAULT_CURRENCY_CODE};
use settlement_engine::{db_types::AccountId, EngineConfig, FeeSchedule, SettlementConfig, StaticFeeConfig};

use crate::middleware::CourierSignature;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8360;
const DEFAULT_COMMISSION_RATE: Rate = Rate::from_percent(12);
const DEFAULT_PROCESSING_FEE_RATE: Rate = Rate::from_bps(290);
const DEFAULT_PROCESSING_FEE_FIXED: Money = Money::from_cents(30);
const DEFAULT_AUTO_CAPTURE_HOURS: i64 = 72;
const DEFAULT_HOLD_VALIDITY_HOURS: i64 = 168;
const DEFAULT_DELIVERY_BUFFER: Rate = Rate::from_percent(20);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub currency: String,
    pub fees: FeeSettings,
    /// Authorized payments on orders handed over at least this long ago are captured by the sweep.
    pub auto_capture_after: Duration,
    /// Validity assumed for a card hold when the processor does not report one.
    pub hold_validity: Duration,
    /// Margin added to the courier estimate when the buyer is charged for professional delivery.
    pub delivery_buffer: Rate,
    /// How often the in-process sweep runs. `None` disables it, leaving the sweep endpoint as the only trigger.
    pub sweep_interval: Option<std::time::Duration>,
    /// Bearer token for `POST /orders/auto-capture-payments`. The endpoint refuses every call while this is empty.
    pub sweep_token: Secret<String>,
    pub processor: ProcessorConfig,
    pub courier: CourierConfig,
    /// Participant notifications are POSTed here. When unset they are only logged.
    pub notification_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            fees: FeeSettings::default(),
            auto_capture_after: Duration::hours(DEFAULT_AUTO_CAPTURE_HOURS),
            hold_validity: Duration::hours(DEFAULT_HOLD_VALIDITY_HOURS),
            delivery_buffer: DEFAULT_DELIVERY_BUFFER,
            sweep_interval: Some(std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
            sweep_token: Secret::default(),
            processor: ProcessorConfig::default(),
            courier: CourierConfig::default(),
            notification_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let currency = env::var("MKT_CURRENCY").ok().unwrap_or_else(|| DEFAULT_CURRENCY_CODE.into());
        let auto_capture_after = Duration::hours(env_or_default("MKT_AUTO_CAPTURE_HOURS", DEFAULT_AUTO_CAPTURE_HOURS));
        let hold_validity = Duration::hours(env_or_default("MKT_HOLD_VALIDITY_HOURS", DEFAULT_HOLD_VALIDITY_HOURS));
        let delivery_buffer = env_or_default("MKT_DELIVERY_BUFFER_PERCENT", DEFAULT_DELIVERY_BUFFER);
        let sweep_interval = match env_or_default("MKT_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS) {
            0 => {
                info!("🪛️ MKT_SWEEP_INTERVAL_SECS is 0. The in-process capture sweep is disabled.");
                None
            },
            secs => Some(std::time::Duration::from_secs(secs)),
        };
        let sweep_token = Secret::new(env::var("MKT_SWEEP_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_SWEEP_TOKEN is not set. The auto-capture endpoint will refuse every request.");
            String::default()
        }));
        let notification_url = env::var("MKT_NOTIFICATION_URL").ok().filter(|s| !s.is_empty());
        if notification_url.is_none() {
            info!("🪛️ MKT_NOTIFICATION_URL is not set. Notifications will only be logged.");
        }
        Self {
            host,
            port,
            database_url,
            currency,
            fees: FeeSettings::from_env_or_default(),
            auto_capture_after,
            hold_validity,
            delivery_buffer,
            sweep_interval,
            sweep_token,
            processor: ProcessorConfig::from_env_or_default(),
            courier: CourierConfig::from_env_or_default(),
            notification_url,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let settlement =
            SettlementConfig { currency: self.currency.clone(), hold_validity: self.hold_validity, ..Default::default() };
        EngineConfig { settlement, delivery_buffer: self.delivery_buffer }
    }
}

fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  FeeSettings  -----------------------------------------------------
#[derive(Clone, Debug)]
pub struct FeeSettings {
    pub default_commission: Rate,
    pub commission_overrides: Vec<(AccountId, Rate)>,
    pub processing_rate: Rate,
    pub processing_fixed: Money,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            default_commission: DEFAULT_COMMISSION_RATE,
            commission_overrides: Vec::new(),
            processing_rate: DEFAULT_PROCESSING_FEE_RATE,
            processing_fixed: DEFAULT_PROCESSING_FEE_FIXED,
        }
    }
}

impl FeeSettings {
    pub fn from_env_or_default() -> Self {
        let default_commission = env_or_default("MKT_DEFAULT_COMMISSION_RATE", DEFAULT_COMMISSION_RATE);
        let commission_overrides = env::var("MKT_SELLER_COMMISSION_OVERRIDES")
            .map(|s| parse_commission_overrides(&s))
            .unwrap_or_default();
        let processing_rate = env_or_default("MKT_PROCESSING_FEE_RATE", DEFAULT_PROCESSING_FEE_RATE);
        let processing_fixed =
            Money::from_cents(env_or_default("MKT_PROCESSING_FEE_FIXED", DEFAULT_PROCESSING_FEE_FIXED.value()));
        info!(
            "🪛️ Fees: {default_commission} commission ({} seller overrides), processing {processing_rate} + \
             {processing_fixed}",
            commission_overrides.len()
        );
        Self { default_commission, commission_overrides, processing_rate, processing_fixed }
    }

    pub fn fee_config(&self) -> StaticFeeConfig {
        let schedule = FeeSchedule { processing_rate: self.processing_rate, processing_fixed: self.processing_fixed };
        self.commission_overrides
            .iter()
            .fold(StaticFeeConfig::new(self.default_commission, schedule), |config, (seller, rate)| {
                config.with_override(seller.clone(), *rate)
            })
    }
}

/// Parses `seller:percent` pairs separated by commas. Malformed pairs are skipped with a warning.
pub fn parse_commission_overrides(s: &str) -> Vec<(AccountId, Rate)> {
    s.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let Some((seller, rate)) = pair.split_once(':') else {
                warn!("🪛️ Ignoring commission override without a rate: {pair}");
                return None;
            };
            match rate.trim().parse::<Rate>() {
                Ok(rate) if !seller.trim().is_empty() => Some((AccountId::from(seller.trim()), rate)),
                Ok(_) => {
                    warn!("🪛️ Ignoring commission override without a seller: {pair}");
                    None
                },
                Err(e) => {
                    warn!("🪛️ Ignoring invalid commission override {pair}. {e}");
                    None
                },
            }
        })
        .collect()
}

//-------------------------------------------------  Integrations  ----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct ProcessorConfig {
    pub url: String,
    pub api_key: Secret<String>,
}

impl ProcessorConfig {
    pub fn from_env_or_default() -> Self {
        let url = env::var("MKT_PROCESSOR_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_PROCESSOR_URL is not set. Card payments will fail until it is configured.");
            String::default()
        });
        let api_key = Secret::new(env::var("MKT_PROCESSOR_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_PROCESSOR_API_KEY is not set.");
            String::default()
        }));
        Self { url, api_key }
    }
}

#[derive(Clone, Debug)]
pub struct CourierConfig {
    pub url: String,
    pub api_key: Secret<String>,
    /// Signing key for the courier's webhook calls.
    pub webhook_secret: Secret<String>,
    /// If false, webhook signatures are not checked. **DANGER**
    pub hmac_checks: bool,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self { url: String::default(), api_key: Secret::default(), webhook_secret: Secret::default(), hmac_checks: true }
    }
}

impl CourierConfig {
    /// The signature contract for the courier's webhook calls.
    pub fn signature(&self) -> CourierSignature {
        CourierSignature::new(self.webhook_secret.clone(), self.hmac_checks)
    }

    pub fn from_env_or_default() -> Self {
        let url = env::var("MKT_COURIER_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_COURIER_URL is not set. Professional deliveries will fail until it is configured.");
            String::default()
        });
        let api_key = Secret::new(env::var("MKT_COURIER_API_KEY").ok().unwrap_or_default());
        let webhook_secret = Secret::new(env::var("MKT_COURIER_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_COURIER_WEBHOOK_SECRET is not set. Signed courier webhooks will be rejected.");
            String::default()
        }));
        let hmac_checks = env_flag("MKT_COURIER_HMAC_CHECKS", true);
        if !hmac_checks {
            warn!("🚨️ Courier webhook signature checks are DISABLED. Do not run production like this.");
        }
        Self { url, api_key, webhook_secret, hmac_checks }
    }
}
