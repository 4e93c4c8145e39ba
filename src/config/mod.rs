//! Runtime configuration from environment variables.
//!
//! The bot is configured entirely through the environment (plus an optional
//! `.env` file loaded by the binary):
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TELEGRAM_TOKEN` | main bot token | required |
//! | `GEMINI_API_KEY` | Gemini API key | required |
//! | `GEMINI_IMAGE_MODEL` | image model name | `gemini-2.5-flash-image` |
//! | `DAILY_LIMIT` | generations per user per day | `5` |
//! | `QUOTA_TIMEZONE` | IANA zone for the daily window | `Europe/Moscow` |
//! | `REDIS_URL` | shared counter store | unset → in-process counters |
//! | `CATALOG_PATH` | product catalog | `assets/catalog.json` |
//! | `LOGO_PATH` | brand logo image | `assets/logo.png` |
//! | `ADMIN_BOT_TOKEN` / `ADMIN_CHAT_ID` | audit sink target | unset → disabled |
//! | `ADMIN_LOG_ENABLED` | `0` disables the audit sink | `1` |

use std::path::PathBuf;

use crate::audit::AdminLogConfig;
use crate::error::{FitroomError, Result};
use crate::providers::gemini::DEFAULT_IMAGE_MODEL;

const DEFAULT_DAILY_LIMIT: u32 = 5;
const DEFAULT_QUOTA_TIMEZONE: &str = "Europe/Moscow";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Daily generation allowance per user (positive).
    pub daily_limit: u32,
    /// IANA zone name for day-window computation; invalid names fall back to
    /// UTC at resolution time, not here.
    pub quota_timezone: String,
    /// Shared counter store target. `None` selects in-process counters.
    pub redis_url: Option<String>,
    pub catalog_path: PathBuf,
    pub logo_path: PathBuf,
    /// Audit sink target; `None` disables admin logging.
    pub admin_log: Option<AdminLogConfig>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Testable core of [`from_env`]: reads through a lookup function.
    ///
    /// [`from_env`]: Config::from_env
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = get("TELEGRAM_TOKEN")
            .ok_or_else(|| FitroomError::Config("TELEGRAM_TOKEN is not set".into()))?;
        let gemini_api_key = get("GEMINI_API_KEY")
            .ok_or_else(|| FitroomError::Config("GEMINI_API_KEY is not set".into()))?;

        let daily_limit = match get("DAILY_LIMIT") {
            Some(raw) => parse_daily_limit(&raw)?,
            None => DEFAULT_DAILY_LIMIT,
        };

        let admin_enabled = get("ADMIN_LOG_ENABLED").as_deref() != Some("0");
        let admin_log = match (get("ADMIN_BOT_TOKEN"), get("ADMIN_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) if admin_enabled => {
                Some(AdminLogConfig { bot_token, chat_id })
            }
            _ => None,
        };

        Ok(Self {
            telegram_token,
            gemini_api_key,
            gemini_model: get("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
            daily_limit,
            quota_timezone: get("QUOTA_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_QUOTA_TIMEZONE.into()),
            redis_url: get("REDIS_URL"),
            catalog_path: get("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/catalog.json")),
            logo_path: get("LOGO_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/logo.png")),
            admin_log,
        })
    }
}

/// The allowance must be a positive integer; zero would deny every request.
fn parse_daily_limit(raw: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(FitroomError::Config(format!(
            "DAILY_LIMIT must be a positive integer, got {:?}",
            raw
        ))),
    }
}
