//! Centralized volume control over every intercepted audio context.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU32, Ordering},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    context::{AudioContext, ContextState, GainNode, RoutedContext},
    error::AudioError,
    hook::{AudioContextFactory, AudioHook},
    tone::Tone,
};

/// Clamp a requested volume into `[0, 1]`. NaN is treated as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// The shared volume value plus every context routed through it.
pub struct GainStage {
    /// `f32` bits.
    volume: AtomicU32,
    graphs: Mutex<Vec<Weak<RoutedContext>>>,
}

impl GainStage {
    pub(crate) fn new() -> Self {
        Self {
            volume: AtomicU32::new(1.0f32.to_bits()),
            graphs: Mutex::new(Vec::new()),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }

    /// Wrap a freshly created context and track it. Called once per creation.
    pub(crate) fn register(&self, ctx: Arc<dyn AudioContext>) -> Arc<dyn AudioContext> {
        // Read under the registry lock; `apply` stores under the same lock.
        let mut graphs = self.graphs.lock();
        let routed = Arc::new(RoutedContext::new(ctx, self.volume()));
        graphs.retain(|g| g.strong_count() > 0);
        graphs.push(Arc::downgrade(&routed));
        debug!(registered = graphs.len(), "audio context routed through gain stage");
        routed
    }

    /// Store `volume` (already clamped) and push it to every live gain node.
    fn apply(&self, volume: f32) {
        let mut graphs = self.graphs.lock();
        self.volume.store(volume.to_bits(), Ordering::Release);
        for ctx in Self::prune(&mut graphs) {
            ctx.gain_node().set_gain(volume);
        }
    }

    fn live(&self) -> Vec<Arc<RoutedContext>> {
        Self::prune(&mut self.graphs.lock())
    }

    fn prune(graphs: &mut Vec<Weak<RoutedContext>>) -> Vec<Arc<RoutedContext>> {
        graphs.retain(|g| g.strong_count() > 0);
        graphs.iter().filter_map(Weak::upgrade).collect()
    }

    /// Gain nodes of all contexts that are still alive.
    pub fn gain_nodes(&self) -> Vec<Arc<GainNode>> {
        self.live().iter().map(|c| c.gain_node().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One volume control for the whole session.
///
/// Constructed from the shared [`AudioHook`]; the hook is installed on first
/// construction and reused by any later router.
pub struct AudioRouter {
    hook: Arc<AudioHook>,
    stage: Arc<GainStage>,
    ui_context: Mutex<Option<Arc<dyn AudioContext>>>,
}

impl AudioRouter {
    pub fn new(hook: Arc<AudioHook>) -> Self {
        let stage = hook.install();
        Self {
            hook,
            stage,
            ui_context: Mutex::new(None),
        }
    }

    /// Factory every sound producer should create its contexts through.
    pub fn factory(&self) -> Arc<dyn AudioContextFactory> {
        self.hook.clone()
    }

    pub fn stage(&self) -> &Arc<GainStage> {
        &self.stage
    }

    pub fn volume(&self) -> f32 {
        self.stage.volume()
    }

    /// Set the volume of every routed context. Returns the applied value.
    ///
    /// Also retries resuming suspended contexts, since a volume change is
    /// usually the result of a user gesture.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.stage.apply(volume);
        debug!(volume, "volume applied");
        self.resume();
        volume
    }

    /// Resume every suspended context. Returns how many resumed.
    ///
    /// Refusals are logged; some contexts cannot start before a user gesture.
    pub fn resume(&self) -> usize {
        let mut resumed = 0;
        for ctx in self.stage.live() {
            if ctx.state() != ContextState::Suspended {
                continue;
            }
            match ctx.resume() {
                Ok(()) => resumed += 1,
                Err(e) => warn!(error = %e, "audio context did not resume"),
            }
        }
        resumed
    }

    /// The router's own context for UI sound effects, created on first use
    /// through the intercepted path.
    pub fn ui_context(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        let mut guard = self.ui_context.lock();
        if let Some(ctx) = guard.as_ref() {
            return Ok(ctx.clone());
        }
        let ctx = self.hook.create()?;
        *guard = Some(ctx.clone());
        Ok(ctx)
    }

    /// Render `tone` into the UI context.
    pub fn play_tone(&self, tone: &Tone) -> Result<(), AudioError> {
        let ctx = self.ui_context()?;
        if ctx.state() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        let samples = tone.render(ctx.sample_rate(), ctx.channels());
        ctx.destination().write(&samples);
        Ok(())
    }
}
