use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::TenantId;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a very good friend who understands everything going on at user's workplace.";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub notifier: NotifierConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Also selects the database (`/N` or `?db=N`) whose expiry channel is watched.
    pub redis_url: String,
    /// Sweep interval for the memory backend.
    pub reaper_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub tenant_id: String,
    pub ttl_seconds: u64,
    pub default_history_limit: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifierConfig {
    /// Run the expiry notifier inside the server process.
    pub embedded: bool,
    /// Overrides `__keyevent@{db}__:expired`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Issue `CONFIG SET notify-keyspace-events Ex` on connect.
    pub configure_keyspace_events: bool,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Consecutive failed connects before giving up; 0 retries forever.
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("store.backend", "redis")?
            .set_default("store.redis_url", "redis://127.0.0.1:6379/0")?
            .set_default("store.reaper_interval_ms", 1000)?
            .set_default("session.tenant_id", "999999")?
            .set_default("session.ttl_seconds", 1800)?
            .set_default("session.default_history_limit", 20)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.model", "gpt-4o")?
            .set_default("llm.timeout_seconds", 60)?
            .set_default("llm.system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("notifier.embedded", false)?
            .set_default("notifier.configure_keyspace_events", false)?
            .set_default("notifier.backoff_initial_ms", 500)?
            .set_default("notifier.backoff_max_ms", 30_000)?
            .set_default("notifier.max_reconnect_attempts", 0)?
            .set_default("archive.timeout_seconds", 10)?
            // Load from config file
            .add_source(File::with_name("config/settings").required(false))
            // Override with environment variables (prefix: APP)
            // Example: APP__STORE__REDIS_URL=redis://...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        if settings.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                settings.llm.api_key = key;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.tenant()?;
        self.redis_db()?;

        if self.session.ttl_seconds == 0 {
            anyhow::bail!("session.ttl_seconds must be greater than zero");
        }
        if self.session.default_history_limit <= 0 {
            anyhow::bail!("session.default_history_limit must be positive");
        }
        if self.llm.timeout_seconds == 0 {
            anyhow::bail!("llm.timeout_seconds must be greater than zero");
        }
        if self.notifier.backoff_initial_ms == 0
            || self.notifier.backoff_initial_ms > self.notifier.backoff_max_ms
        {
            anyhow::bail!(
                "notifier backoff must satisfy 0 < backoff_initial_ms ({}) <= backoff_max_ms ({})",
                self.notifier.backoff_initial_ms,
                self.notifier.backoff_max_ms
            );
        }
        Ok(())
    }

    pub fn tenant(&self) -> Result<TenantId> {
        Ok(TenantId::new(self.session.tenant_id.clone())?)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_seconds)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_seconds)
    }

    /// Database index selected by `store.redis_url`, 0 when the URL names none.
    pub fn redis_db(&self) -> Result<i64> {
        let url = reqwest::Url::parse(&self.store.redis_url)
            .with_context(|| format!("store.redis_url is not a valid URL: {}", self.store.redis_url))?;

        let from_query = url
            .query_pairs()
            .find(|(name, _)| name == "db")
            .map(|(_, value)| value.into_owned());
        let db = match from_query {
            Some(db) => db,
            // Unix socket URLs carry a filesystem path, not a database.
            None if url.scheme().contains("unix") => return Ok(0),
            None => url.path().trim_matches('/').to_string(),
        };
        if db.is_empty() {
            return Ok(0);
        }

        let index = db
            .parse::<i64>()
            .with_context(|| format!("store.redis_url has an invalid database index: {db}"))?;
        if index < 0 {
            anyhow::bail!("store.redis_url has a negative database index: {index}");
        }
        Ok(index)
    }

    /// Redis channel carrying "expired key" events for the session database.
    pub fn expiry_channel(&self) -> Result<String> {
        match &self.notifier.channel {
            Some(channel) => Ok(channel.clone()),
            None => Ok(format!("__keyevent@{}__:expired", self.redis_db()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            store: StoreConfig {
                backend: StoreBackendKind::Memory,
                redis_url: "redis://127.0.0.1:6379/3".to_string(),
                reaper_interval_ms: 1000,
            },
            session: SessionConfig {
                tenant_id: "999999".to_string(),
                ttl_seconds: 1800,
                default_history_limit: 20,
            },
            llm: LlmConfig {
                base_url: "http://localhost".to_string(),
                api_key: String::new(),
                model: "gpt-4o".to_string(),
                timeout_seconds: 60,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            notifier: NotifierConfig {
                embedded: false,
                channel: None,
                configure_keyspace_events: false,
                backoff_initial_ms: 500,
                backoff_max_ms: 30_000,
                max_reconnect_attempts: 0,
            },
            archive: ArchiveConfig {
                webhook_url: None,
                timeout_seconds: 10,
            },
        }
    }

    #[test]
    fn test_expiry_channel_follows_db() {
        let mut settings = sample();
        assert_eq!(settings.expiry_channel().unwrap(), "__keyevent@3__:expired");

        settings.notifier.channel = Some("custom".to_string());
        assert_eq!(settings.expiry_channel().unwrap(), "custom");
    }

    #[test]
    fn test_redis_db_comes_from_url() {
        let mut settings = sample();
        let cases = [
            ("redis://h/2", 2),
            ("redis://:secret@h:6380/11", 11),
            ("redis://h:6379", 0),
            ("redis://h:6379/", 0),
            ("rediss://h/4?protocol=resp3", 4),
            ("redis://h/?db=5", 5),
            ("redis+unix:///tmp/redis.sock?db=7", 7),
            ("redis+unix:///tmp/redis.sock", 0),
        ];
        for (url, db) in cases {
            settings.store.redis_url = url.to_string();
            assert_eq!(settings.redis_db().unwrap(), db, "{url}");
        }

        settings.store.redis_url = "redis://h/2".to_string();
        assert_eq!(settings.expiry_channel().unwrap(), "__keyevent@2__:expired");
    }

    #[test]
    fn test_validate_rejects_bad_redis_db() {
        let mut settings = sample();
        settings.store.redis_url = "redis://h/sessions".to_string();
        assert!(settings.validate().is_err());

        settings.store.redis_url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(sample().validate().is_ok());

        let mut settings = sample();
        settings.session.ttl_seconds = 0;
        assert!(settings.validate().is_err());

        let mut settings = sample();
        settings.session.tenant_id = "bad:tenant".to_string();
        assert!(settings.validate().is_err());

        let mut settings = sample();
        settings.notifier.backoff_initial_ms = 60_000;
        assert!(settings.validate().is_err());
    }
}
