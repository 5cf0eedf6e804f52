use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CRA_CONTACT_URL: &str =
    "https://www.canada.ca/en/revenue-agency/corporate/contact-information.html";

const EDGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36 Edg/98.0.1108.62";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid setting {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub page: PageLayout,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub alert: AlertSettings,
}

/// Poll loop target and timing. Timings are whole seconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorSettings {
    pub url: String,
    pub line_name: String,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub refresh_settle_secs: u64,
    pub initial_settle_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            url: CRA_CONTACT_URL.to_string(),
            line_name: "Personal Taxes (1-800-959-8281)".to_string(),
            poll_interval_secs: 60,
            max_retries: 3,
            retry_delay_secs: 5,
            refresh_settle_secs: 5,
            initial_settle_secs: 3,
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn refresh_settle(&self) -> Duration {
        Duration::from_secs(self.refresh_settle_secs)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_secs(self.initial_settle_secs)
    }
}

/// Structural queries tied to the contact page markup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PageLayout {
    pub section_label: String,
    pub status_xpath: String,
    pub hidden_class: String,
    pub section_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub check_interval_ms: u64,
    pub scroll_pause_ms: u64,
    pub expand_pause_ms: u64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            section_label: "Personal taxes, benefits and trusts".to_string(),
            status_xpath: "//tr[@id='prs-01']//ul[contains(@class, 'fa-ul')]\
                           //div[strong[contains(text(), 'Wait time:')]]/a"
                .to_string(),
            hidden_class: "wb-inv".to_string(),
            section_timeout_ms: 15_000,
            status_timeout_ms: 10_000,
            check_interval_ms: 500,
            scroll_pause_ms: 500,
            expand_pause_ms: 2_000,
        }
    }
}

impl PageLayout {
    pub fn summary_xpath(&self) -> String {
        format!(
            "//summary[normalize-space()={}]",
            xpath_literal(&self.section_label)
        )
    }

    pub fn details_xpath(&self) -> String {
        format!("{}/parent::details", self.summary_xpath())
    }
}

/// Quotes a value for use as an XPath 1.0 string literal. XPath has no escape
/// sequences, so values holding both quote kinds go through `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_agent: EDGE_USER_AGENT.to_string(),
            extra_args: vec!["--disable-gpu".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertSettings {
    pub duration_secs: u64,
    pub message: String,
    pub speech_estimate_ms: u64,
    pub overshoot_ms: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            message: "Alert. C R A. Line open.".to_string(),
            speech_estimate_ms: 1_500,
            overshoot_ms: 1_000,
        }
    }
}

impl AlertSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn speech_estimate(&self) -> Duration {
        Duration::from_millis(self.speech_estimate_ms)
    }

    pub fn overshoot(&self) -> Duration {
        Duration::from_millis(self.overshoot_ms)
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let paths = vec![
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cra-line-watch/config.toml"),
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cra-line-watch/config.toml"),
        ];
        Self::load_first(&paths)
    }

    /// Returns the first candidate that reads and parses. Broken files are
    /// logged and skipped; no usable file means defaults.
    pub fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load_from(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.monitor.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.monitor.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.monitor.url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if self.monitor.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.alert.duration_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "alert.duration_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.page.check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page.check_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_contact_page() {
        let config = AppConfig::default();
        assert_eq!(config.monitor.url, CRA_CONTACT_URL);
        assert_eq!(config.monitor.max_retries, 3);
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.alert.duration(), Duration::from_secs(30));
        assert_eq!(config.page.hidden_class, "wb-inv");
        assert!(config.page.status_xpath.contains("prs-01"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [monitor]
            poll_interval_secs = 15

            [browser]
            headless = true
            "#,
        )
        .unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 15);
        assert_eq!(config.monitor.max_retries, 3);
        assert!(config.browser.headless);
        assert_eq!(config.alert.duration_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[alert]\nduration_secs = 5\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.alert.duration_secs, 5);
    }

    #[test]
    fn test_load_from_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitor\nurl = ").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_first_skips_malformed_file() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let valid = dir.path().join("valid.toml");
        fs::write(&broken, "[monitor\nurl = ").unwrap();
        fs::write(&valid, "[monitor]\nmax_retries = 7\n").unwrap();

        let config = AppConfig::load_first(&[broken, valid]);
        assert_eq!(config.monitor.max_retries, 7);
    }

    #[test]
    fn test_load_first_without_files_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_first(&[
            dir.path().join("missing.toml"),
            dir.path().join("also-missing.toml"),
        ]);
        assert_eq!(config.monitor.url, CRA_CONTACT_URL);
        assert_eq!(config.monitor.max_retries, 3);
    }

    #[test]
    fn test_load_first_prefers_earliest_valid_file() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        fs::write(&first, "[alert]\nduration_secs = 10\n").unwrap();
        fs::write(&second, "[alert]\nduration_secs = 20\n").unwrap();

        let config = AppConfig::load_first(&[first, second]);
        assert_eq!(config.alert.duration_secs, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.monitor.url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        config.monitor.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        let mut config = AppConfig::default();
        config.monitor.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "monitor.max_retries", .. })
        ));
    }

    #[test]
    fn test_summary_xpath_quotes_label() {
        let layout = PageLayout::default();
        assert_eq!(
            layout.summary_xpath(),
            "//summary[normalize-space()='Personal taxes, benefits and trusts']"
        );
        assert!(layout.details_xpath().ends_with("/parent::details"));
    }

    #[test]
    fn test_xpath_literal_handles_quotes() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }
}
