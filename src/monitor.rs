use std::future::Future;
use thiserror::Error;

use crate::alert::Alerter;
use crate::browser::{BrowserError, PageDriver};
use crate::config::MonitorSettings;
use crate::extractor::StatusReader;
use crate::status::WaitTimeStatus;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to open {url}: {source}")]
    Open {
        url: String,
        #[source]
        source: BrowserError,
    },
    #[error("Page refresh failed: {0}")]
    Refresh(#[source] BrowserError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    LineOpen(WaitTimeStatus),
    LineClosed(WaitTimeStatus),
    ExtractionFailed { refreshed: bool },
}

/// Consecutive extraction failures since the last successful read or reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    failures: u32,
}

impl RetryState {
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Counts a failure and reports whether the ceiling has been reached.
    pub fn record_failure(&mut self, ceiling: u32) -> bool {
        self.failures += 1;
        self.failures >= ceiling
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    LineOpen(WaitTimeStatus),
    Interrupted,
    Failed(String),
}

pub struct Monitor<R: StatusReader> {
    reader: R,
    settings: MonitorSettings,
    retry: RetryState,
}

impl<R: StatusReader> Monitor<R> {
    pub fn new(reader: R, settings: MonitorSettings) -> Self {
        Self {
            reader,
            settings,
            retry: RetryState::default(),
        }
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// One poll: read the status, classify it, and reload the page when the
    /// failure ceiling is hit. Sleeping is left to the caller.
    pub async fn step(&mut self, page: &dyn PageDriver) -> Result<PollOutcome, MonitorError> {
        tracing::info!(
            "--- [{}] Attempting to check ---",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        match self.reader.read(page).await {
            Some(status) if !status.is_unavailable() => {
                tracing::info!("Current wait time status: '{}'", status);
                Ok(PollOutcome::LineOpen(status))
            }
            Some(status) => {
                tracing::info!("Current wait time status: '{}'", status);
                tracing::info!("Line is currently not available, will re-check");
                self.retry.reset();
                Ok(PollOutcome::LineClosed(status))
            }
            None => {
                tracing::warn!("Failed to get wait time");
                if !self.retry.record_failure(self.settings.max_retries) {
                    return Ok(PollOutcome::ExtractionFailed { refreshed: false });
                }
                tracing::warn!(
                    "Max retries ({}) for element finding reached, performing full page refresh",
                    self.settings.max_retries
                );
                page.reload().await.map_err(MonitorError::Refresh)?;
                self.retry.reset();
                Ok(PollOutcome::ExtractionFailed { refreshed: true })
            }
        }
    }

    /// Polls until a status other than "unavailable" is read.
    pub async fn poll_until_open(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<WaitTimeStatus, MonitorError> {
        loop {
            match self.step(page).await? {
                PollOutcome::LineOpen(status) => return Ok(status),
                PollOutcome::LineClosed(_) => {
                    tracing::info!(
                        "Waiting for {} seconds before next check",
                        self.settings.poll_interval_secs
                    );
                    tokio::time::sleep(self.settings.poll_interval()).await;
                }
                PollOutcome::ExtractionFailed { refreshed: true } => {
                    tokio::time::sleep(self.settings.refresh_settle()).await;
                }
                PollOutcome::ExtractionFailed { refreshed: false } => {
                    // Only the retry delay. The poll interval is deliberately
                    // not slept on top of it, unlike a closed-line check.
                    tokio::time::sleep(self.settings.retry_delay()).await;
                }
            }
        }
    }

    /// Polls until the line opens, then alerts once and returns the status.
    pub async fn run(
        &mut self,
        page: &dyn PageDriver,
        alerter: &dyn Alerter,
    ) -> Result<WaitTimeStatus, MonitorError> {
        let status = self.poll_until_open(page).await?;
        announce_open(&status);
        alerter.alert().await;
        Ok(status)
    }

    /// Loads the target page, lets it settle, then polls until the line opens.
    pub async fn watch(&mut self, page: &dyn PageDriver) -> Result<WaitTimeStatus, MonitorError> {
        page.goto(&self.settings.url)
            .await
            .map_err(|source| MonitorError::Open {
                url: self.settings.url.clone(),
                source,
            })?;
        tokio::time::sleep(self.settings.initial_settle()).await;
        self.poll_until_open(page).await
    }
}

fn announce_open(status: &WaitTimeStatus) {
    let rule = "=".repeat(50);
    println!();
    println!("{}", console::style(&rule).red().bold());
    println!(
        "{}",
        console::style(">>> !!! CRA PHONE LINE IS LIKELY OPEN !!! <<<")
            .red()
            .bold()
    );
    println!("{}", console::style(format!(">>> Wait Time: {} <<<", status)).bold());
    println!("{}", console::style(&rule).red().bold());
    println!();
}

/// Runs the watch over `page`, alerts once if the line opens, and closes the
/// page before returning, whether the line opens, `shutdown` resolves first,
/// or the loop fails.
pub async fn run_session<P, R, F>(
    page: &mut P,
    monitor: &mut Monitor<R>,
    alerter: &dyn Alerter,
    shutdown: F,
) -> SessionEnd
where
    P: PageDriver,
    R: StatusReader,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let end = tokio::select! {
        result = monitor.watch(&*page) => match result {
            Ok(status) => SessionEnd::LineOpen(status),
            Err(e) => {
                tracing::error!("A critical error occurred: {}", e);
                SessionEnd::Failed(e.to_string())
            }
        },
        _ = &mut shutdown => {
            tracing::info!("Monitoring stopped by user");
            SessionEnd::Interrupted
        }
    };

    // The line has been seen open; an interrupt now only cuts the alert short.
    if let SessionEnd::LineOpen(status) = &end {
        announce_open(status);
        tokio::select! {
            _ = alerter.alert() => {}
            _ = &mut shutdown => tracing::info!("Alert stopped by user"),
        }
    }

    tracing::info!("Closing browser");
    if let Err(e) = page.close().await {
        tracing::warn!("Failed to close browser cleanly: {}", e);
    }
    end
}
