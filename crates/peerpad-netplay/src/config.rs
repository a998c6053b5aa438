use std::time::Duration;

use clap::{Args, ValueEnum};
use peerpad_netproto::PlatformId;

use crate::injector::gamepad::DEFAULT_VIRTUAL_PAD_INDEX;

/// How the remote player's input is made visible to the emulator.
///
/// Exactly one strategy is active per session; running both would count
/// every press twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InjectionStrategy {
    /// Dispatch key press/release events with player-2 key identities.
    SyntheticKeys,
    /// Splice a virtual pad into the polled device list.
    VirtualGamepad,
}

#[derive(Debug, Clone, Args)]
pub struct NetplayConfig {
    /// Remote input injection strategy. Defaults to what the emulator polls.
    #[arg(long, value_enum)]
    pub injection: Option<InjectionStrategy>,

    /// Device list slot reserved for the remote player's virtual pad.
    #[arg(long, default_value_t = DEFAULT_VIRTUAL_PAD_INDEX)]
    pub virtual_pad_index: usize,

    /// Platform the host starts on.
    #[arg(long, default_value = "snes")]
    pub platform: String,

    /// Interval between placeholder state updates while no ROM is loaded.
    #[arg(long, default_value_t = 250)]
    pub idle_sync_ms: u64,

    /// Input sampling / injection tick.
    #[arg(long, default_value_t = 16)]
    pub frame_ms: u64,
}

impl Default for NetplayConfig {
    fn default() -> Self {
        Self {
            injection: None,
            virtual_pad_index: DEFAULT_VIRTUAL_PAD_INDEX,
            platform: "snes".into(),
            idle_sync_ms: 250,
            frame_ms: 16,
        }
    }
}

impl NetplayConfig {
    pub fn platform_id(&self) -> PlatformId {
        PlatformId::new(self.platform.as_str())
    }

    pub fn idle_sync_interval(&self) -> Duration {
        Duration::from_millis(self.idle_sync_ms.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}
