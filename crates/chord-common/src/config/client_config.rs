//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::{Deserialize, Serialize, Serializer};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub env: Environment,
    pub token: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_gateway_version")]
    pub gateway_version: u8,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default)]
    pub shard: Option<ShardInfo>,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
    #[serde(default = "default_bot_url")]
    pub bot_url: String,
    #[serde(default = "default_bot_version")]
    pub bot_version: String,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Kind of account the token belongs to
///
/// Determines the `Authorization` header prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Bot,
    Bearer,
}

impl UserType {
    /// Authorization header prefix for this account type
    #[must_use]
    pub const fn auth_prefix(self) -> &'static str {
        match self {
            Self::Bot => "Bot",
            Self::Bearer => "Bearer",
        }
    }
}

impl FromStr for UserType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bot" => Ok(Self::Bot),
            "bearer" => Ok(Self::Bearer),
            other => Err(ConfigError::InvalidValue("CHORD_USER_TYPE", other.to_string())),
        }
    }
}

/// Shard identity sent with identify, `[id, count]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "(u32, u32)")]
pub struct ShardInfo {
    pub id: u32,
    pub count: u32,
}

impl ShardInfo {
    /// Create a shard pair
    ///
    /// Returns `None` unless `id < count`.
    #[must_use]
    pub fn new(id: u32, count: u32) -> Option<Self> {
        (id < count).then_some(Self { id, count })
    }
}

impl From<(u32, u32)> for ShardInfo {
    fn from((id, count): (u32, u32)) -> Self {
        Self { id, count }
    }
}

impl Serialize for ShardInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.id, self.count].serialize(serializer)
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.id, self.count)
    }
}

// Default value functions
fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_version() -> u8 {
    10
}

fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_large_threshold() -> u32 {
    50
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_bot_url() -> String {
    env!("CARGO_PKG_REPOSITORY").to_string()
}

fn default_bot_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            env: Environment::default(),
            token: token.into(),
            user_type: UserType::default(),
            api_base_url: default_api_base_url(),
            gateway_version: default_gateway_version(),
            intents: default_intents(),
            shard: None,
            large_threshold: default_large_threshold(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_rate_limit_retries: None,
            bot_url: default_bot_url(),
            bot_version: default_bot_version(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHORD_TOKEN` is missing or a present variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is not an error.
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("CHORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CHORD_TOKEN"))?;

        let mut config = Self::new(token);

        config.env = lookup("APP_ENV")
            .and_then(|s| match s.to_lowercase().as_str() {
                "production" => Some(Environment::Production),
                "staging" => Some(Environment::Staging),
                "development" => Some(Environment::Development),
                _ => None,
            })
            .unwrap_or_default();

        if let Some(user_type) = lookup("CHORD_USER_TYPE") {
            config.user_type = user_type.parse()?;
        }
        if let Some(url) = lookup("CHORD_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(version) = parse_var(&lookup, "CHORD_GATEWAY_VERSION")? {
            config.gateway_version = version;
        }
        if let Some(intents) = parse_var(&lookup, "CHORD_INTENTS")? {
            config.intents = intents;
        }
        if let Some(threshold) = parse_var(&lookup, "CHORD_LARGE_THRESHOLD")? {
            config.large_threshold = threshold;
        }
        if let Some(delay) = parse_var(&lookup, "CHORD_RECONNECT_DELAY_MS")? {
            config.reconnect_delay_ms = delay;
        }
        config.max_rate_limit_retries = parse_var(&lookup, "CHORD_MAX_RATE_LIMIT_RETRIES")?;
        if let Some(url) = lookup("CHORD_BOT_URL") {
            config.bot_url = url;
        }
        if let Some(version) = lookup("CHORD_BOT_VERSION") {
            config.bot_version = version;
        }

        config.shard = match (
            parse_var::<u32, _>(&lookup, "CHORD_SHARD_ID")?,
            parse_var::<u32, _>(&lookup, "CHORD_SHARD_COUNT")?,
        ) {
            (None, None) => None,
            (Some(id), Some(count)) => Some(ShardInfo::new(id, count).ok_or_else(|| {
                ConfigError::InvalidValue("CHORD_SHARD_ID", format!("{id} is not below {count}"))
            })?),
            (Some(_), None) => return Err(ConfigError::MissingVar("CHORD_SHARD_COUNT")),
            (None, Some(_)) => return Err(ConfigError::MissingVar("CHORD_SHARD_ID")),
        };

        Ok(config)
    }

    /// Set the account type
    #[must_use]
    pub fn with_user_type(mut self, user_type: UserType) -> Self {
        self.user_type = user_type;
        self
    }

    /// Set the REST base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the gateway intents bitfield
    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    /// Set the shard pair sent with identify
    #[must_use]
    pub fn with_shard(mut self, shard: ShardInfo) -> Self {
        self.shard = Some(shard);
        self
    }

    /// Set the base reconnect delay
    #[must_use]
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Bound the number of retries after a throttled response
    #[must_use]
    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = Some(retries);
        self
    }

    /// `Authorization` header value
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("{} {}", self.user_type.auth_prefix(), self.token)
    }

    /// `User-Agent` header value
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!("DiscordBot ({}, {})", self.bot_url, self.bot_version)
    }

    /// Base delay before a reconnect attempt
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("env", &self.env)
            .field("token", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("api_base_url", &self.api_base_url)
            .field("gateway_version", &self.gateway_version)
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("large_threshold", &self.large_threshold)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw.clone()))
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
