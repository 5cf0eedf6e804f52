//! Loud local alert played once the line opens.
//!
//! Each backend is an [`AlertStrategy`]. An [`AlertCascade`] tries them in
//! order, skipping backends whose capability check fails and falling through
//! on playback errors. The terminal bell always closes the list, so the cascade
//! itself never fails.

mod bell;
mod speech;
#[cfg_attr(not(windows), allow(dead_code))]
mod tone;

pub use bell::TerminalBell;
pub use speech::SpeechLoop;
#[cfg(windows)]
pub use tone::ToneLoop;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::AlertSettings;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("{0} is not available")]
    Unavailable(String),
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    ExitStatus { program: String, status: String },
    #[error("Audio output failed: {0}")]
    Audio(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait AlertStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    /// Plays for roughly `duration`. Implementations may overshoot by at most
    /// one unit of their own pattern.
    async fn play(&self, duration: Duration) -> Result<(), AlertError>;
}

/// Fire-and-forget notification invoked by the monitor on success.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self);
}

pub struct AlertCascade {
    strategies: Vec<Arc<dyn AlertStrategy>>,
    duration: Duration,
}

impl AlertCascade {
    /// Builds a cascade from `strategies` with the terminal bell appended.
    pub fn new(strategies: Vec<Arc<dyn AlertStrategy>>, duration: Duration) -> Self {
        let mut strategies = strategies;
        strategies.push(Arc::new(TerminalBell::default()));
        Self {
            strategies,
            duration,
        }
    }

    /// Tone pattern on Windows, `say` on macOS, `spd-say` then `espeak`
    /// elsewhere.
    pub fn for_platform(settings: &AlertSettings) -> Self {
        let mut strategies: Vec<Arc<dyn AlertStrategy>> = Vec::new();
        #[cfg(windows)]
        strategies.push(Arc::new(ToneLoop::default()));
        #[cfg(target_os = "macos")]
        strategies.push(Arc::new(SpeechLoop::new("say", &[], settings)));
        #[cfg(not(any(windows, target_os = "macos")))]
        {
            strategies.push(Arc::new(SpeechLoop::new("spd-say", &["-w"], settings)));
            strategies.push(Arc::new(SpeechLoop::new("espeak", &["-a", "150"], settings)));
        }
        Self::new(strategies, settings.duration())
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Runs the first usable strategy. A strategy that fails part way hands
    /// the remaining time to the next one.
    pub async fn play(&self) -> Option<String> {
        tracing::warn!(
            "!!! PLAYING LOUD ALERT FOR {} SECONDS !!!",
            self.duration.as_secs()
        );
        let start = Instant::now();
        let mut played = None;

        for strategy in &self.strategies {
            let remaining = self.duration.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            if !strategy.is_available() {
                tracing::info!("{} is not available, trying next alert", strategy.name());
                continue;
            }
            match strategy.play(remaining).await {
                Ok(()) => {
                    played = Some(strategy.name().to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!("{} alert failed: {}. Trying next alert", strategy.name(), e);
                }
            }
        }

        tracing::info!(
            "Loud alert finished after approximately {:.1} seconds",
            start.elapsed().as_secs_f64()
        );
        played
    }
}

#[async_trait]
impl Alerter for AlertCascade {
    async fn alert(&self) {
        self.play().await;
    }
}
