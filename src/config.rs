use crate::application::FinePolicy;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_PAYMENT_CURRENCY: &str = "usd";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
/// 毎日 09:00（秒 分 時 日 月 曜日）
const DEFAULT_REMINDER_CRON: &str = "0 0 9 * * *";
const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_NOTIFY_MAX_ATTEMPTS: u32 = 3;

/// 設定読み込みのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// 環境変数から読み込むデプロイ設定
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// コールバックURLの公開ベース。未設定ならリクエストヘッダーから組み立てる
    pub public_base_url: Option<Url>,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: Url,
    pub payment_currency: String,
    pub webhook_tolerance_secs: i64,

    pub telegram_bot_token: String,
    pub telegram_api_base: Url,

    pub fine_policy: FinePolicy,
    pub reminder_cron: String,
    pub notify_queue_capacity: usize,
    pub notify_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の変数ソースから読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .map(|value| parse_value::<Url>("PUBLIC_BASE_URL", &value))
                .transpose()?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: parse_or(
                &lookup,
                "STRIPE_API_BASE",
                parse_value("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)?,
            )?,
            payment_currency: lookup("PAYMENT_CURRENCY")
                .unwrap_or_else(|| DEFAULT_PAYMENT_CURRENCY.to_string())
                .to_lowercase(),
            webhook_tolerance_secs: parse_or(
                &lookup,
                "WEBHOOK_TOLERANCE_SECS",
                DEFAULT_WEBHOOK_TOLERANCE_SECS,
            )?,
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base: parse_or(
                &lookup,
                "TELEGRAM_API_BASE",
                parse_value("TELEGRAM_API_BASE", DEFAULT_TELEGRAM_API_BASE)?,
            )?,
            fine_policy: parse_or(&lookup, "FINE_POLICY", FinePolicy::default())?,
            reminder_cron: lookup("REMINDER_CRON")
                .unwrap_or_else(|| DEFAULT_REMINDER_CRON.to_string()),
            notify_queue_capacity: parse_or(
                &lookup,
                "NOTIFY_QUEUE_CAPACITY",
                DEFAULT_NOTIFY_QUEUE_CAPACITY,
            )?,
            notify_max_attempts: parse_or(
                &lookup,
                "NOTIFY_MAX_ATTEMPTS",
                DEFAULT_NOTIFY_MAX_ATTEMPTS,
            )?,
        })
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}
