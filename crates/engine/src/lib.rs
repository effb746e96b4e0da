//! Frame presentation engine.
//!
//! This crate drives a [`PresentationChain`](presenter_rhi::chain::PresentationChain)
//! frame after frame:
//! - [`FrameSlotRing`] holds the per-frame semaphores, fence and command buffer
//! - [`FrameSynchronizer`] runs the acquire, record, submit and present protocol
//! - [`RecreationController`] rebuilds the chain and its framebuffers when the
//!   surface goes stale
//! - [`PresentationEngine`] ties them together behind `render_frame`,
//!   `notify_resized` and `shutdown`

pub mod engine;
pub mod frame_ring;
pub mod recreation;
pub mod resize;
pub mod synchronizer;

pub use engine::{EngineStats, FrameStatus, PresentationEngine};
pub use frame_ring::{FrameSlot, FrameSlotRing};
pub use recreation::{Recreation, RecreationController};
pub use resize::{ResizeNotifier, ResizeSignal};
pub use synchronizer::{
    ClearColor, FrameCursor, FrameOutcome, FrameRecorder, FrameState, FrameSynchronizer,
    RecordContext,
};
