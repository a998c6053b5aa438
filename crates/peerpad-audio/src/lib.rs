//! Centralized audio routing for peerpad.
//!
//! Sound producers never talk to an output device directly; they create
//! contexts through an [`AudioHook`]. Once an [`AudioRouter`] is built on that
//! hook, every context is routed through a per-context [`GainNode`] that the
//! router's single volume control drives.

pub mod context;
#[cfg(feature = "cpal")]
pub mod cpal_backend;
pub mod error;
pub mod hook;
pub mod router;
pub mod tone;

pub use context::{AudioContext, AudioSink, ContextState, GainNode, RoutedContext};
#[cfg(feature = "cpal")]
pub use cpal_backend::{CpalContext, CpalFactory};
pub use error::AudioError;
pub use hook::{AudioContextFactory, AudioHook};
pub use router::{AudioRouter, GainStage, clamp_volume};
pub use tone::{Tone, Waveform};
