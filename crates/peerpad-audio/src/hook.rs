//! Process-wide interception of audio context creation.
//!
//! Everything that makes sound (the emulator core, UI effects) is handed the
//! same [`AudioHook`] as its context factory. While a [`GainStage`] is
//! installed, each created context is wrapped so that its output resolves to
//! a gain node governed by that stage. The real factory still does all of the
//! actual work.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{context::AudioContext, error::AudioError, router::GainStage};

/// Creates audio contexts.
pub trait AudioContextFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError>;
}

pub struct AudioHook {
    real: Arc<dyn AudioContextFactory>,
    stage: Mutex<Option<Arc<GainStage>>>,
}

impl AudioHook {
    pub fn new(real: Arc<dyn AudioContextFactory>) -> Self {
        Self {
            real,
            stage: Mutex::new(None),
        }
    }

    /// Install the interception and return the active gain stage.
    ///
    /// A second call is a no-op that hands back the stage installed first, so
    /// every router sharing this hook governs the same set of contexts.
    pub fn install(&self) -> Arc<GainStage> {
        let mut guard = self.stage.lock();
        if let Some(stage) = guard.as_ref() {
            debug!("audio hook already installed");
            return stage.clone();
        }
        let stage = Arc::new(GainStage::new());
        *guard = Some(stage.clone());
        info!("audio context hook installed");
        stage
    }

    /// Remove the interception. Contexts created afterwards bypass the gain
    /// stage; contexts already routed keep their gain node.
    pub fn uninstall(&self) -> bool {
        let removed = self.stage.lock().take().is_some();
        if removed {
            info!("audio context hook removed");
        }
        removed
    }

    pub fn is_installed(&self) -> bool {
        self.stage.lock().is_some()
    }
}

impl AudioContextFactory for AudioHook {
    fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        let ctx = self.real.create()?;
        // Clone out of the lock; registering takes the stage's own lock.
        let stage = self.stage.lock().clone();
        match stage {
            Some(stage) => Ok(stage.register(ctx)),
            None => Ok(ctx),
        }
    }
}
