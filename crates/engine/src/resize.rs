//! Window resize notifications.
//!
//! The windowing layer writes the newest client-area extent into a single
//! slot; the render loop takes it once per iteration. Writes never block and
//! a later write replaces an earlier one that has not been taken yet, so a
//! burst of resizes collapses into its last extent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;

/// Slot value meaning "nothing pending". A real window is never
/// `u32::MAX` pixels on both sides.
const EMPTY: u64 = u64::MAX;

#[inline]
fn pack(extent: vk::Extent2D) -> u64 {
    (u64::from(extent.width) << 32) | u64::from(extent.height)
}

#[inline]
fn unpack(value: u64) -> vk::Extent2D {
    vk::Extent2D {
        width: (value >> 32) as u32,
        height: value as u32,
    }
}

/// Receiving end, owned by the render loop.
#[derive(Debug)]
pub struct ResizeSignal {
    slot: Arc<AtomicU64>,
}

impl ResizeSignal {
    /// Creates an empty signal.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(AtomicU64::new(EMPTY)),
        }
    }

    /// Returns a handle that can post resizes from anywhere.
    pub fn notifier(&self) -> ResizeNotifier {
        ResizeNotifier {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Takes the latest extent, leaving the slot empty.
    pub fn take(&self) -> Option<vk::Extent2D> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            value => Some(unpack(value)),
        }
    }

    /// Returns true if a resize is waiting to be taken.
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) != EMPTY
    }
}

impl Default for ResizeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending end. Cheap to clone; safe to call from a window callback.
#[derive(Debug, Clone)]
pub struct ResizeNotifier {
    slot: Arc<AtomicU64>,
}

impl ResizeNotifier {
    /// Posts a new extent, replacing any that has not been taken.
    pub fn notify(&self, extent: vk::Extent2D) {
        self.slot.store(pack(extent), Ordering::Release);
    }
}
