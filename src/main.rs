use cra_line_watch::alert::{AlertCascade, Alerter};
use cra_line_watch::browser::ChromeSession;
use cra_line_watch::cli::Cli;
use cra_line_watch::config::AppConfig;
use cra_line_watch::extractor::WaitTimeExtractor;
use cra_line_watch::logging::{init_logging, LoggingConfig};
use cra_line_watch::monitor::{run_session, Monitor, SessionEnd};

use clap::Parser;
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();
    let cli = Cli::parse();

    let _log_guard = init_logging(LoggingConfig {
        log_level: cli.log_level.clone(),
        ..Default::default()
    })?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let alerter = AlertCascade::for_platform(&config.alert);
    if cli.test_alert {
        tracing::info!("Alert backends: {}", alerter.strategy_names().join(" -> "));
        alerter.alert().await;
        return Ok(());
    }

    tracing::info!("Monitoring CRA contact page: {}", config.monitor.url);
    tracing::info!("Will check for {} line status", config.monitor.line_name);
    tracing::info!(
        "Refresh interval: {} seconds",
        config.monitor.poll_interval_secs
    );

    let mut session = match ChromeSession::launch(&config.browser).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Error initializing browser: {}", e);
            tracing::error!(
                "Make sure Chrome, Chromium or Edge is installed, or point --browser at its executable"
            );
            return Ok(());
        }
    };

    let mut monitor = Monitor::new(
        WaitTimeExtractor::new(config.page.clone()),
        config.monitor.clone(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match run_session(&mut session, &mut monitor, &alerter, shutdown).await {
        SessionEnd::LineOpen(status) => tracing::info!("Line opened: {}", status),
        SessionEnd::Interrupted => tracing::info!("Stopped before the line opened"),
        SessionEnd::Failed(reason) => tracing::info!("Stopped after an error: {}", reason),
    }

    Ok(())
}
