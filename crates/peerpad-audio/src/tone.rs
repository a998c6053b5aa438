//! Tiny tone generator for UI sound effects.

use std::f32::consts::TAU;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    pub waveform: Waveform,
    /// Peak amplitude before the gain stage, `0..=1`.
    pub amplitude: f32,
}

impl Tone {
    /// Short square blip used for menu/confirm feedback.
    pub fn beep() -> Self {
        Self {
            frequency_hz: 880.0,
            duration: Duration::from_millis(80),
            waveform: Waveform::Square,
            amplitude: 0.25,
        }
    }

    /// Lower sine tone used when the second player connects or leaves.
    pub fn chime(frequency_hz: f32) -> Self {
        Self {
            frequency_hz,
            duration: Duration::from_millis(150),
            waveform: Waveform::Sine,
            amplitude: 0.3,
        }
    }

    /// Render interleaved samples. The last few milliseconds fade out to
    /// avoid a click at the cut.
    pub fn render(&self, sample_rate: u32, channels: u16) -> Vec<f32> {
        let channels = channels.max(1) as usize;
        let frames = (self.duration.as_secs_f32() * sample_rate as f32).round() as usize;
        let fade = ((sample_rate as f32 * 0.005) as usize).clamp(1, frames.max(1));
        let step = self.frequency_hz / sample_rate.max(1) as f32;

        let mut out = Vec::with_capacity(frames * channels);
        let mut phase = 0.0f32;
        for i in 0..frames {
            let raw = match self.waveform {
                Waveform::Sine => (phase * TAU).sin(),
                Waveform::Square => {
                    if phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            let remaining = frames - i;
            let envelope = if remaining < fade {
                remaining as f32 / fade as f32
            } else {
                1.0
            };
            let sample = (raw * self.amplitude * envelope).clamp(-1.0, 1.0);
            out.extend(std::iter::repeat_n(sample, channels));

            phase = (phase + step).fract();
        }
        out
    }
}
