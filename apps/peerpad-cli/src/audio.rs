use std::sync::Arc;

use peerpad_audio::AudioContextFactory;

/// Output factory every context in the process is created through.
#[cfg(feature = "cpal")]
pub fn output_factory() -> Arc<dyn AudioContextFactory> {
    Arc::new(peerpad_audio::CpalFactory)
}

#[cfg(not(feature = "cpal"))]
pub fn output_factory() -> Arc<dyn AudioContextFactory> {
    Arc::new(silent::SilentFactory)
}

#[cfg(not(feature = "cpal"))]
mod silent {
    use std::sync::Arc;

    use peerpad_audio::{AudioContext, AudioContextFactory, AudioError, AudioSink, ContextState};

    pub struct SilentFactory;

    impl AudioContextFactory for SilentFactory {
        fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
            Ok(Arc::new(SilentContext))
        }
    }

    struct SilentContext;

    struct Discard;

    impl AudioSink for Discard {
        fn write(&self, _samples: &[f32]) {}
    }

    impl AudioContext for SilentContext {
        fn state(&self) -> ContextState {
            ContextState::Running
        }

        fn resume(&self) -> Result<(), AudioError> {
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            48_000
        }

        fn destination(&self) -> Arc<dyn AudioSink> {
            Arc::new(Discard)
        }
    }
}
