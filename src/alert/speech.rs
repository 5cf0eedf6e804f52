use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

use super::{AlertError, AlertStrategy};
use crate::config::AlertSettings;

/// Speaks a short phrase repeatedly through a command-line synthesizer such as
/// `say`, `spd-say` or `espeak`.
pub struct SpeechLoop {
    program: String,
    args: Vec<String>,
    message: String,
    estimate: Duration,
    overshoot: Duration,
}

impl SpeechLoop {
    pub fn new(program: &str, args: &[&str], settings: &AlertSettings) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            message: settings.message.clone(),
            estimate: settings.speech_estimate(),
            overshoot: settings.overshoot(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&self.message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AlertStrategy for SpeechLoop {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn play(&self, duration: Duration) -> Result<(), AlertError> {
        let start = Instant::now();
        let deadline = duration + self.overshoot;
        let mut iterations = 0usize;

        while start.elapsed() < duration {
            // Skip a repetition that would run past the allowance.
            if iterations > 0 && start.elapsed() + self.estimate > deadline {
                break;
            }

            let remaining = deadline.saturating_sub(start.elapsed());
            let mut cmd = self.command();
            let status = match tokio::time::timeout(remaining, cmd.status()).await {
                Ok(result) => result.map_err(|source| AlertError::Spawn {
                    program: self.program.clone(),
                    source,
                })?,
                Err(_) => {
                    tracing::debug!("{} overran the alert window, stopping", self.program);
                    break;
                }
            };
            if !status.success() {
                return Err(AlertError::ExitStatus {
                    program: self.program.clone(),
                    status: status.to_string(),
                });
            }
            iterations += 1;
        }

        tracing::info!("Played speech alert {} times", iterations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AlertSettings {
        AlertSettings {
            speech_estimate_ms: 10,
            overshoot_ms: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_synthesizer_is_unavailable() {
        let speech = SpeechLoop::new("definitely-not-a-speech-synth", &[], &settings());
        assert!(!speech.is_available());
    }

    #[tokio::test]
    async fn test_missing_synthesizer_fails_to_spawn() {
        let speech = SpeechLoop::new("definitely-not-a-speech-synth", &[], &settings());
        let err = speech.play(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, AlertError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_synthesizer_reports_exit_status() {
        let speech = SpeechLoop::new("false", &[], &settings());
        let err = speech.play(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, AlertError::ExitStatus { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_speech_stays_within_duration_and_overshoot() {
        let settings = settings();
        let speech = SpeechLoop::new("true", &[], &settings);
        assert!(speech.is_available());

        let duration = Duration::from_millis(300);
        let start = std::time::Instant::now();
        speech.play(duration).await.unwrap();
        assert!(start.elapsed() <= duration + settings.overshoot() + Duration::from_millis(500));
    }
}
