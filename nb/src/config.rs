//! nudgebot configuration types and loading
//!
//! Values come from a YAML file (optional) and are then overridden by
//! environment variables, which is how most deployments configure the bot.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the bot credential
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
/// Environment variable overriding the transport API root
pub const API_ROOT_ENV: &str = "TG_API";
/// Environment variable overriding the focus interval (minutes)
pub const FOCUS_MINUTES_ENV: &str = "FOCUS_MIN";
/// Environment variable overriding the morning prompt hour (UTC)
pub const MORNING_HOUR_ENV: &str = "MORNING_HOUR_UTC";
/// Environment variable overriding the listen address
pub const BIND_ENV: &str = "NUDGEBOT_BIND";

/// Longest allowed focus interval: one day
pub const MAX_FOCUS_MINUTES: u64 = 24 * 60;

/// Main nudgebot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat transport configuration
    pub telegram: TelegramConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Coaching text generation limits
    pub coach: CoachConfig,

    /// Reminder cadence and daily trigger
    pub schedule: ScheduleConfig,

    /// HTTP listener
    pub server: ServerConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load only the log level, before logging is initialised
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .nudgebot.yml
        let local_config = PathBuf::from(".nudgebot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/nudgebot/nudgebot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nudgebot").join("nudgebot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = non_empty(BOT_TOKEN_ENV) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(root) = non_empty(API_ROOT_ENV) {
            self.telegram.api_root = root;
        }
        if let Some(minutes) = non_empty(FOCUS_MINUTES_ENV) {
            self.schedule.focus_minutes = minutes
                .parse()
                .context(format!("{} must be a whole number of minutes", FOCUS_MINUTES_ENV))?;
        }
        if let Some(hour) = non_empty(MORNING_HOUR_ENV) {
            self.schedule.morning_hour_utc = hour
                .parse()
                .context(format!("{} must be an hour between 0 and 23", MORNING_HOUR_ENV))?;
        }
        if let Some(bind) = non_empty(BIND_ENV) {
            self.server.bind = bind;
        }
        if let Some(key) = non_empty(&self.llm.api_key_env) {
            self.llm.api_key = Some(key);
        }
        Ok(())
    }

    /// Validate configuration before use
    ///
    /// Call this early in startup: the process must not serve without credentials.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.as_deref().is_none_or(str::is_empty) {
            return Err(eyre::eyre!(
                "Bot token not found. Set the {} environment variable.",
                BOT_TOKEN_ENV
            ));
        }
        if self.llm.api_key().is_none() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.schedule.focus_minutes == 0 || self.schedule.focus_minutes > MAX_FOCUS_MINUTES {
            return Err(eyre::eyre!(
                "schedule.focus-minutes must be between 1 and {}, got {}",
                MAX_FOCUS_MINUTES,
                self.schedule.focus_minutes
            ));
        }
        if self.schedule.morning_hour_utc > 23 {
            return Err(eyre::eyre!(
                "schedule.morning-hour-utc must be between 0 and 23, got {}",
                self.schedule.morning_hour_utc
            ));
        }
        if self.coach.max_in_flight == 0 {
            return Err(eyre::eyre!("coach.max-in-flight must be at least 1"));
        }
        Ok(())
    }

    /// Copy of the config safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.telegram.bot_token = copy.telegram.bot_token.map(|_| "***".to_string());
        copy.llm.api_key = copy.llm.api_key.map(|_| "***".to_string());
        copy
    }
}

/// Chat transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot credential (normally supplied via BOT_TOKEN)
    #[serde(rename = "bot-token")]
    pub bot_token: Option<String>,

    /// API root, overridable for self-hosted gateways
    #[serde(rename = "api-root")]
    pub api_root: String,

    /// Outbound request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_root: "https://api.telegram.org".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API key resolved from `api-key-env` (or set directly)
    #[serde(rename = "api-key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Resolved API key: explicit value first, then the named environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty()))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 60,
            timeout_ms: 30_000,
        }
    }
}

/// Coaching text generation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Maximum concurrent generation requests, process-wide
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: usize,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self { max_in_flight: 3 }
    }
}

/// Reminder cadence and daily trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Minutes between nudges while a task stays open
    #[serde(rename = "focus-minutes")]
    pub focus_minutes: u64,

    /// Hour of day (UTC) for the morning prompt
    #[serde(rename = "morning-hour-utc")]
    pub morning_hour_utc: u32,
}

impl ScheduleConfig {
    pub fn focus_interval(&self) -> Duration {
        Duration::from_secs(self.focus_minutes.saturating_mul(60))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            // 7 AM Pacific
            morning_hour_utc: 14,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the webhook listener on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123:abc".to_string());
        config.llm.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.telegram.api_root, "https://api.telegram.org");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 60);
        assert_eq!(config.coach.max_in_flight, 3);
        assert_eq!(config.schedule.focus_minutes, 25);
        assert_eq!(config.schedule.morning_hour_utc, 14);
        assert_eq!(config.schedule.focus_interval(), Duration::from_secs(25 * 60));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
telegram:
  api-root: http://localhost:8081
llm:
  model: gpt-4o
  api-key-env: MY_KEY
  max-tokens: 80
coach:
  max-in-flight: 5
schedule:
  focus-minutes: 30
  morning-hour-utc: 6
server:
  bind: 127.0.0.1:9000
log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.telegram.api_root, "http://localhost:8081");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_KEY");
        assert_eq!(config.llm.max_tokens, 80);
        assert_eq!(config.coach.max_in_flight, 5);
        assert_eq!(config.schedule.focus_minutes, 30);
        assert_eq!(config.schedule.morning_hour_utc, 6);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("schedule:\n  focus-minutes: 10\n").unwrap();

        assert_eq!(config.schedule.focus_minutes, 10);
        assert_eq!(config.schedule.morning_hour_utc, 14);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_from(lookup(&[
                ("BOT_TOKEN", "123:abc"),
                ("TG_API", "http://tg.local"),
                ("OPENAI_API_KEY", "sk-live"),
                ("FOCUS_MIN", "15"),
                ("MORNING_HOUR_UTC", "7"),
                ("NUDGEBOT_BIND", "127.0.0.1:8080"),
            ]))
            .unwrap();

        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.api_root, "http://tg.local");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-live"));
        assert_eq!(config.schedule.focus_minutes, 15);
        assert_eq!(config.schedule.morning_hour_utc, 7);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_env_blank_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_from(lookup(&[("BOT_TOKEN", "  "), ("TG_API", "")])).unwrap();

        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.telegram.api_root, "https://api.telegram.org");
    }

    #[test]
    fn test_env_bad_number_is_an_error() {
        let mut config = Config::default();
        assert!(config.apply_env_from(lookup(&[("FOCUS_MIN", "soon")])).is_err());
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(valid_config().validate().is_ok());

        let mut missing_token = valid_config();
        missing_token.telegram.bot_token = None;
        let err = missing_token.validate().unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));

        let mut missing_key = valid_config();
        missing_key.llm.api_key = None;
        missing_key.llm.api_key_env = "NUDGEBOT_TEST_UNSET_KEY".to_string();
        let err = missing_key.validate().unwrap_err();
        assert!(err.to_string().contains("NUDGEBOT_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_validate_ranges() {
        let mut zero_focus = valid_config();
        zero_focus.schedule.focus_minutes = 0;
        assert!(zero_focus.validate().is_err());

        let mut bad_hour = valid_config();
        bad_hour.schedule.morning_hour_utc = 24;
        assert!(bad_hour.validate().is_err());
    }

    #[test]
    fn test_huge_focus_minutes_rejected() {
        let mut config = valid_config();
        config.apply_env_from(lookup(&[("FOCUS_MIN", "307445734561825861")])).unwrap();
        assert_eq!(config.schedule.focus_minutes, 307445734561825861);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("focus-minutes"));
        assert_eq!(config.schedule.focus_interval(), Duration::from_secs(u64::MAX));

        config.schedule.focus_minutes = MAX_FOCUS_MINUTES;
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.focus_interval(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let redacted = valid_config().redacted();
        assert_eq!(redacted.telegram.bot_token.as_deref(), Some("***"));
        assert_eq!(redacted.llm.api_key.as_deref(), Some("***"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nudgebot.yml");
        std::fs::write(&path, "schedule:\n  focus-minutes: 45\nlog-level: warn\n").unwrap();

        let config = Config::load_file_chain(Some(&path)).unwrap();
        assert_eq!(config.schedule.focus_minutes, 45);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load_file_chain(Some(&path)).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_load_reads_process_env() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nudgebot.yml");
        std::fs::write(&path, "llm:\n  api-key-env: NUDGEBOT_TEST_KEY\n").unwrap();

        // SAFETY: serialised with the other env-mutating tests
        unsafe {
            std::env::set_var("BOT_TOKEN", "999:xyz");
            std::env::set_var("NUDGEBOT_TEST_KEY", "sk-from-env");
        }

        let config = Config::load(Some(&path)).unwrap();

        unsafe {
            std::env::remove_var("BOT_TOKEN");
            std::env::remove_var("NUDGEBOT_TEST_KEY");
        }

        assert_eq!(config.telegram.bot_token.as_deref(), Some("999:xyz"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-from-env"));
        assert!(config.validate().is_ok());
    }
}
