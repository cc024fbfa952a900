use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Where the activity fragment is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Origin of the site serving the activity endpoint, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Viewed user. `None` asks for the authenticated user's own activity.
    #[serde(default)]
    pub username: Option<String>,
    /// Send `X-Requested-With: XMLHttpRequest` like the page script does.
    #[serde(default = "default_send_xhr_header")]
    pub send_xhr_header: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay after a successful poll.
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,
    /// Delay after a failed poll.
    #[serde(default = "default_backoff_interval_secs")]
    pub backoff_interval_secs: u64,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: u64,
}

/// CSS selectors describing the markup contract of the activity fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_anchor")]
    pub anchor: String,
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_artists")]
    pub artists: String,
    #[serde(default = "default_lyrics_modal")]
    pub lyrics_modal: String,
    #[serde(default = "default_lyrics_open")]
    pub lyrics_open: String,
    #[serde(default = "default_lyrics_close")]
    pub lyrics_close: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_path(),
            username: None,
            send_xhr_header: default_send_xhr_header(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval_secs(),
            backoff_interval_secs: default_backoff_interval_secs(),
            fade_out_ms: default_fade_out_ms(),
            fade_in_ms: default_fade_in_ms(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            header: default_header(),
            status: default_status(),
            title: default_title(),
            artists: default_artists(),
            lyrics_modal: default_lyrics_modal(),
            lyrics_open: default_lyrics_open(),
            lyrics_close: default_lyrics_close(),
        }
    }
}

impl EndpointConfig {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PollingConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    pub fn backoff_interval(&self) -> Duration {
        Duration::from_secs(self.backoff_interval_secs)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_path() -> String {
    "/api/me".to_string()
}

fn default_send_xhr_header() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("nowplaying-watch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_base_interval_secs() -> u64 {
    10
}

fn default_backoff_interval_secs() -> u64 {
    60
}

fn default_fade_out_ms() -> u64 {
    300
}

fn default_fade_in_ms() -> u64 {
    50
}

fn default_anchor() -> String {
    "#user-activity".to_string()
}

fn default_header() -> String {
    ".user-activity-header".to_string()
}

fn default_status() -> String {
    ".user-activity-header h4".to_string()
}

fn default_title() -> String {
    ".music-info span.ellipsis".to_string()
}

fn default_artists() -> String {
    ".music-info:nth-child(3) span.ellipsis".to_string()
}

fn default_lyrics_modal() -> String {
    "#lyrics".to_string()
}

fn default_lyrics_open() -> String {
    "#show-lyrics".to_string()
}

fn default_lyrics_close() -> String {
    "#close-lyrics".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.url(), "http://127.0.0.1:5000/api/me");
        assert!(config.endpoint.send_xhr_header);
        assert!(config.endpoint.username.is_none());
        assert_eq!(config.polling.base_interval(), Duration::from_secs(10));
        assert_eq!(config.polling.backoff_interval(), Duration::from_secs(60));
        assert_eq!(config.polling.fade_out(), Duration::from_millis(300));
        assert_eq!(config.polling.fade_in(), Duration::from_millis(50));
        assert_eq!(config.selectors.anchor, "#user-activity");
        assert!(Config::config_path().ends_with("nowplaying/config.toml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [endpoint]
            base_url = "https://example.org/"
            username = "mika"

            [polling]
            backoff_interval_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint.url(), "https://example.org/api/me");
        assert_eq!(config.endpoint.username.as_deref(), Some("mika"));
        assert_eq!(config.polling.base_interval_secs, 10);
        assert_eq!(config.polling.backoff_interval_secs, 30);
        assert_eq!(config.selectors.title, ".music-info span.ellipsis");
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = std::env::temp_dir().join(format!("nowplaying-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.endpoint.username = Some("someone else".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.endpoint.username.as_deref(), Some("someone else"));
        assert_eq!(loaded.polling.base_interval_secs, 10);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
