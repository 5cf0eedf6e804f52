use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;

use super::{AlertError, AlertStrategy};

const BELLS: &str = "\x07\x07\x07";

/// Rings the terminal bell in bursts. Works anywhere there is a terminal.
pub struct TerminalBell {
    interval: Duration,
}

impl TerminalBell {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[async_trait]
impl AlertStrategy for TerminalBell {
    fn name(&self) -> &str {
        "terminal bell"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn play(&self, duration: Duration) -> Result<(), AlertError> {
        let start = Instant::now();
        let mut rings = 0usize;
        while start.elapsed() < duration {
            {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(BELLS.as_bytes())?;
                stdout.flush()?;
            }
            rings += 1;
            let remaining = duration.saturating_sub(start.elapsed());
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
        tracing::debug!("Rang terminal bell {} times", rings);
        Ok(())
    }
}
