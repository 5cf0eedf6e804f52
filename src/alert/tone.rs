use std::time::Duration;

use super::AlertError;

/// Alternating high tones, then a short gap.
pub(crate) const TONE_PATTERN: [(f32, Duration); 2] = [
    (2500.0, Duration::from_millis(150)),
    (2000.0, Duration::from_millis(100)),
];
pub(crate) const TONE_GAP: Duration = Duration::from_millis(50);

/// Audio sink the tone pattern is played through.
pub(crate) trait TonePlayer {
    /// Plays one tone to completion.
    fn tone(&mut self, freq: f32, length: Duration) -> Result<(), AlertError>;
    fn pause(&mut self, length: Duration);
    fn elapsed(&self) -> Duration;
}

/// Repeats the pattern until `duration` has passed. A tone already started
/// finishes, so the overshoot is at most one tone length.
pub(crate) fn play_pattern(
    player: &mut dyn TonePlayer,
    pattern: &[(f32, Duration)],
    gap: Duration,
    duration: Duration,
) -> Result<usize, AlertError> {
    let mut cycles = 0usize;
    'outer: while player.elapsed() < duration {
        for (freq, length) in pattern {
            player.tone(*freq, *length)?;
            if player.elapsed() >= duration {
                break 'outer;
            }
        }
        player.pause(gap.min(duration.saturating_sub(player.elapsed())));
        cycles += 1;
    }
    Ok(cycles)
}

#[cfg(windows)]
pub use self::rodio_tone::ToneLoop;

#[cfg(windows)]
mod rodio_tone {
    use async_trait::async_trait;
    use rodio::cpal::traits::HostTrait;
    use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};
    use std::time::{Duration, Instant};

    use super::{play_pattern, TonePlayer, TONE_GAP, TONE_PATTERN};
    use crate::alert::{AlertError, AlertStrategy};

    struct RodioPlayer {
        // Dropping the stream stops playback.
        _stream: OutputStream,
        sink: Sink,
        volume: f32,
        start: Instant,
    }

    impl RodioPlayer {
        fn open(volume: f32) -> Result<Self, AlertError> {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| AlertError::Audio(e.to_string()))?;
            stream.log_on_drop(false);
            let sink = Sink::connect_new(stream.mixer());
            Ok(Self {
                _stream: stream,
                sink,
                volume,
                start: Instant::now(),
            })
        }
    }

    impl TonePlayer for RodioPlayer {
        fn tone(&mut self, freq: f32, length: Duration) -> Result<(), AlertError> {
            let tone = rodio::source::SineWave::new(freq)
                .take_duration(length)
                .amplify(self.volume);
            self.sink.append(tone);
            self.sink.sleep_until_end();
            Ok(())
        }

        fn pause(&mut self, length: Duration) {
            std::thread::sleep(length);
        }

        fn elapsed(&self) -> Duration {
            self.start.elapsed()
        }
    }

    /// Tone pattern through the default audio output.
    pub struct ToneLoop {
        volume: f32,
    }

    impl Default for ToneLoop {
        fn default() -> Self {
            Self { volume: 0.5 }
        }
    }

    #[async_trait]
    impl AlertStrategy for ToneLoop {
        fn name(&self) -> &str {
            "tone"
        }

        fn is_available(&self) -> bool {
            rodio::cpal::default_host().default_output_device().is_some()
        }

        async fn play(&self, duration: Duration) -> Result<(), AlertError> {
            let volume = self.volume;
            let cycles = tokio::task::spawn_blocking(move || {
                let mut player = RodioPlayer::open(volume)?;
                play_pattern(&mut player, &TONE_PATTERN, TONE_GAP, duration)
            })
            .await
            .map_err(|e| AlertError::Audio(format!("tone task failed: {}", e)))??;
            tracing::debug!("Played {} tone cycles", cycles);
            Ok(())
        }
    }
}
