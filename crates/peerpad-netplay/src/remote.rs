use parking_lot::Mutex;
use peerpad_netproto::ControllerSnapshot;

/// The remote player's current controller state.
///
/// One mutable slot, last write wins. There is no queue and no ordering
/// guarantee beyond "the most recent store is what readers see": a snapshot
/// stored before the previous one was read is simply replaced.
#[derive(Debug, Default)]
pub struct LatestInput {
    inner: Mutex<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    latest: Option<ControllerSnapshot>,
    unread: bool,
    superseded: u64,
}

impl LatestInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, snapshot: ControllerSnapshot) {
        let mut slot = self.inner.lock();
        if slot.unread {
            slot.superseded += 1;
        }
        slot.latest = Some(snapshot);
        slot.unread = true;
    }

    /// The most recent snapshot, or `None` when no remote player is present.
    pub fn current(&self) -> Option<ControllerSnapshot> {
        let mut slot = self.inner.lock();
        slot.unread = false;
        slot.latest
    }

    /// Drop the held snapshot so nothing stale is replayed.
    pub fn clear(&self) {
        let mut slot = self.inner.lock();
        slot.latest = None;
        slot.unread = false;
    }

    /// Number of snapshots overwritten before anyone read them.
    pub fn superseded(&self) -> u64 {
        self.inner.lock().superseded
    }
}
