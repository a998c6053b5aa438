//! Audio context abstraction and the gain node inserted in front of each
//! context's real output.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use crate::error::AudioError;

/// Something interleaved PCM samples can be written to.
pub trait AudioSink: Send + Sync {
    fn write(&self, samples: &[f32]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Created but not producing sound; usually waiting on a user gesture.
    Suspended,
    Closed,
}

/// An audio-processing context, as created by an [`crate::AudioContextFactory`].
pub trait AudioContext: Send + Sync {
    fn state(&self) -> ContextState;

    /// Ask the context to start (or restart) producing sound.
    fn resume(&self) -> Result<(), AudioError>;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16 {
        2
    }

    /// The node producers should connect their output to.
    fn destination(&self) -> Arc<dyn AudioSink>;
}

/// Scales every sample by a gain value before forwarding to the real output.
pub struct GainNode {
    /// `f32` bits.
    gain: AtomicU32,
    output: Arc<dyn AudioSink>,
}

impl GainNode {
    pub fn new(output: Arc<dyn AudioSink>, gain: f32) -> Self {
        Self {
            gain: AtomicU32::new(gain.to_bits()),
            output,
        }
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Acquire))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Release);
    }
}

impl AudioSink for GainNode {
    fn write(&self, samples: &[f32]) {
        let gain = self.gain();
        if gain == 1.0 {
            self.output.write(samples);
            return;
        }
        let scaled: Vec<f32> = samples.iter().map(|s| s * gain).collect();
        self.output.write(&scaled);
    }
}

/// A context whose output resolves to its dedicated [`GainNode`].
///
/// Everything except [`AudioContext::destination`] is delegated to the
/// context the real factory produced.
pub struct RoutedContext {
    inner: Arc<dyn AudioContext>,
    gain: Arc<GainNode>,
}

impl RoutedContext {
    pub(crate) fn new(inner: Arc<dyn AudioContext>, initial_gain: f32) -> Self {
        let gain = Arc::new(GainNode::new(inner.destination(), initial_gain));
        Self { inner, gain }
    }

    pub fn gain_node(&self) -> &Arc<GainNode> {
        &self.gain
    }

    /// The output of the wrapped context, bypassing the gain stage.
    pub fn real_destination(&self) -> Arc<dyn AudioSink> {
        self.inner.destination()
    }
}

impl AudioContext for RoutedContext {
    fn state(&self) -> ContextState {
        self.inner.state()
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.inner.resume()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn destination(&self) -> Arc<dyn AudioSink> {
        self.gain.clone()
    }
}
