use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cra-line-watch",
    version,
    about = "Watches the CRA contact page and sounds an alert once the personal taxes line opens"
)]
pub struct Cli {
    /// Config file to use instead of the default search path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Contact page URL
    #[arg(long)]
    pub url: Option<String>,

    /// Seconds between checks while the line is closed
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Consecutive extraction failures before a full page reload
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// How long the alert plays
    #[arg(long, value_name = "SECS")]
    pub alert_secs: Option<u64>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Browser executable (Chrome, Chromium or Edge)
    #[arg(long, value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `cra_line_watch=trace`. Overrides `RUST_LOG`
    #[arg(long)]
    pub log_level: Option<String>,

    /// Play the alert once and exit
    #[arg(long)]
    pub test_alert: bool,
}

impl Cli {
    /// Layers command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.monitor.url = url.clone();
        }
        if let Some(interval) = self.interval {
            config.monitor.poll_interval_secs = interval;
        }
        if let Some(max_retries) = self.max_retries {
            config.monitor.max_retries = max_retries;
        }
        if let Some(secs) = self.alert_secs {
            config.alert.duration_secs = secs;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(path) = &self.browser {
            config.browser.executable = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let cli = Cli::parse_from([
            "cra-line-watch",
            "--interval",
            "30",
            "--max-retries",
            "5",
            "--headless",
            "--browser",
            "/usr/bin/microsoft-edge",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.monitor.max_retries, 5);
        assert!(config.browser.headless);
        assert_eq!(
            config.browser.executable,
            Some(PathBuf::from("/usr/bin/microsoft-edge"))
        );
        assert_eq!(config.alert.duration_secs, 30);
    }

    #[test]
    fn test_no_flags_leave_config_untouched() {
        let cli = Cli::parse_from(["cra-line-watch"]);
        let mut config = AppConfig::from_toml_str("[browser]\nheadless = true\n").unwrap();
        cli.apply(&mut config);

        assert!(config.browser.headless);
        assert_eq!(config.monitor.max_retries, 3);
        assert!(!cli.test_alert);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
