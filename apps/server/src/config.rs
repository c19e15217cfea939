use anyhow::{anyhow, bail, Context};
use std::path::PathBuf;
use url::Url;

use crate::notify::MailSettings;
use crate::rate_limit::{RateLimitConfig, RateLimitSettings, Tier};

const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Empty means delivery is disabled and messages are only logged.
    pub api_key: String,
    pub api_url: Url,
    pub customer_from: String,
    pub system_from: String,
    pub admin_email: String,
}

impl EmailConfig {
    pub fn mail_settings(&self) -> MailSettings {
        MailSettings {
            customer_from: self.customer_from.clone(),
            system_from: self.system_from.clone(),
            admin_email: self.admin_email.clone(),
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// CORS origin. `None` allows any origin.
    pub webapp_url: Option<String>,
    pub email: EmailConfig,
    pub alert_webhook_url: Option<Url>,
    pub discount_rules_path: Option<PathBuf>,
    pub rate_limits: RateLimitSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => 3000,
        };

        let defaults = MailSettings::default();
        let api_url = or("EMAIL_API_URL", DEFAULT_EMAIL_API_URL);
        let email = EmailConfig {
            api_key: get("EMAIL_API_KEY").unwrap_or_default(),
            api_url: Url::parse(&api_url).with_context(|| format!("EMAIL_API_URL is not a valid URL: {api_url}"))?,
            customer_from: or("EMAIL_FROM", &defaults.customer_from),
            system_from: or("EMAIL_SYSTEM_FROM", &defaults.system_from),
            admin_email: or("ADMIN_EMAIL", &defaults.admin_email),
        };

        let alert_webhook_url = get("ALERT_WEBHOOK_URL")
            .map(|raw| Url::parse(&raw).with_context(|| format!("ALERT_WEBHOOK_URL is not a valid URL: {raw}")))
            .transpose()?;

        let mut rate_limits = RateLimitSettings::default();
        for tier in Tier::ALL {
            let key = format!("RATE_LIMIT_{}", tier.name().to_uppercase());
            if let Some(raw) = get(key.as_str()) {
                *rate_limits.get_mut(tier) = parse_rate_limit(&raw).with_context(|| format!("invalid {key}"))?;
            }
        }

        Ok(Self {
            database_url: or("DATABASE_URL", "sqlite:tours.db?mode=rwc"),
            host: or("HOST", "0.0.0.0"),
            port,
            webapp_url: get("WEBAPP_URL"),
            email,
            alert_webhook_url,
            discount_rules_path: get("DISCOUNT_RULES_PATH").map(PathBuf::from),
            rate_limits,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `"<max_requests>/<window_secs>"`, e.g. `"5/300"`.
fn parse_rate_limit(raw: &str) -> anyhow::Result<RateLimitConfig> {
    let (max, secs) = raw
        .split_once('/')
        .ok_or_else(|| anyhow!("expected <requests>/<seconds>, got {raw:?}"))?;
    let max: u32 = max.trim().parse().context("request count")?;
    let secs: u64 = secs.trim().parse().context("window seconds")?;
    if max == 0 || secs == 0 {
        bail!("request count and window must be positive, got {raw:?}");
    }
    Ok(RateLimitConfig::new(max, secs))
}
