//! The presentation engine driver.
//!
//! [`PresentationEngine`] is what the application loop talks to:
//!
//! ```no_run
//! use std::sync::Arc;
//! use presenter_core::PresentConfig;
//! use presenter_engine::{ClearColor, FrameStatus, PresentationEngine};
//! use presenter_rhi::{vk, PresentDevice};
//!
//! # fn demo(device: Arc<dyn PresentDevice>, render_pass: vk::RenderPass) -> presenter_rhi::RhiResult<()> {
//! let extent = vk::Extent2D { width: 1280, height: 720 };
//! let recorder = Box::new(ClearColor([0.0, 0.0, 0.0, 1.0]));
//! let mut engine =
//!     PresentationEngine::new(device, render_pass, extent, &PresentConfig::default(), recorder)?;
//!
//! let resize = engine.resize_notifier(); // hand to the window callback
//!
//! loop {
//!     match engine.render_frame()? {
//!         FrameStatus::Suspended => break, // minimized: wait for events
//!         _ => {}
//!     }
//! }
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{error, info, warn};

use presenter_core::PresentConfig;
use presenter_rhi::chain::PresentationChain;
use presenter_rhi::{PresentDevice, RhiError, RhiResult};

use crate::frame_ring::FrameSlotRing;
use crate::recreation::{Recreation, RecreationController};
use crate::resize::{ResizeNotifier, ResizeSignal};
use crate::synchronizer::{FrameCursor, FrameOutcome, FrameRecorder, FrameState, FrameSynchronizer};

/// Result of one [`PresentationEngine::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was presented.
    Presented,
    /// A frame was presented and the chain was rebuilt around it.
    Rebuilt,
    /// Acquire was out of date; the frame was dropped and the chain rebuilt.
    Skipped,
    /// The window has no area. No chain exists; call again later.
    Suspended,
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames submitted and handed to presentation.
    pub frames_presented: u64,
    /// Frames abandoned on an out-of-date acquire.
    pub frames_skipped: u64,
    /// Successful chain builds, the first one included.
    pub rebuilds: u64,
    /// Calls that found the window without area.
    pub suspended_polls: u64,
}

/// Owns the frame slot ring, the chain and everything per-image, and runs
/// one frame per [`render_frame`](Self::render_frame) call.
pub struct PresentationEngine {
    device: Arc<dyn PresentDevice>,
    controller: RecreationController,
    synchronizer: Option<FrameSynchronizer>,
    recorder: Box<dyn FrameRecorder>,
    resize: ResizeSignal,
    stats: EngineStats,
    shut_down: bool,
}

impl PresentationEngine {
    /// Creates the frame slot ring and builds the first chain.
    ///
    /// A window that starts minimized is fine: the engine starts suspended.
    /// `render_pass` must outlive the engine.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidConfig`] for zero frames in flight, or the
    /// first fatal error from building the ring or the chain.
    pub fn new(
        device: Arc<dyn PresentDevice>,
        render_pass: vk::RenderPass,
        initial_extent: vk::Extent2D,
        config: &PresentConfig,
        recorder: Box<dyn FrameRecorder>,
    ) -> RhiResult<Self> {
        let queue_family = device.queue_families().graphics_family.ok_or_else(|| {
            RhiError::InvalidConfig("device has no graphics queue family".to_string())
        })?;

        let ring = FrameSlotRing::new(device.clone(), queue_family, config.frames_in_flight)?;
        let synchronizer = FrameSynchronizer::new(device.clone(), ring);

        let mut controller = RecreationController::new(
            device.clone(),
            render_pass,
            initial_extent,
            config.vsync,
            config.resize_settle(),
        );
        if controller.recreate_if_needed()? == Recreation::Suspended {
            info!("Window has no area at startup, presentation suspended");
        }

        info!(
            "Presentation engine ready ({} frames in flight, vsync {})",
            config.frames_in_flight,
            if config.vsync { "on" } else { "off" }
        );

        Ok(Self {
            device,
            controller,
            synchronizer: Some(synchronizer),
            recorder,
            resize: ResizeSignal::new(),
            stats: EngineStats::default(),
            shut_down: false,
        })
    }

    /// Runs one iteration of the frame loop.
    ///
    /// Recoverable conditions (out-of-date, suboptimal, resize, minimized)
    /// are handled here and reported through [`FrameStatus`].
    ///
    /// # Errors
    ///
    /// Every error is fatal; the caller should stop rendering.
    pub fn render_frame(&mut self) -> RhiResult<FrameStatus> {
        if self.shut_down {
            return Err(RhiError::InvalidConfig(
                "render_frame called after shutdown".to_string(),
            ));
        }

        // The only read of the resize slot this iteration
        if let Some(extent) = self.resize.take() {
            self.controller.notify_resized(extent);
        }

        let mut resumed = false;
        if self.controller.chain().is_none() {
            match self.controller.recreate_if_needed()? {
                Recreation::Suspended => {
                    self.stats.suspended_polls += 1;
                    return Ok(FrameStatus::Suspended);
                }
                Recreation::Rebuilt => {
                    info!("Presentation resumed");
                    resumed = true;
                }
                Recreation::NotNeeded => {}
            }
        }

        let (Some(synchronizer), Some((chain, framebuffers))) =
            (self.synchronizer.as_mut(), self.controller.targets())
        else {
            return Ok(FrameStatus::Suspended);
        };

        let outcome = synchronizer
            .run_frame(
                chain,
                framebuffers,
                self.controller.render_pass(),
                self.recorder.as_mut(),
            )
            .inspect_err(|e| error!("Frame failed: {}", e))?;

        if let Some(reason) = outcome.rebuild_reason() {
            info!("Rebuilding presentation chain: {}", reason);
        }

        let status = match outcome {
            FrameOutcome::OutOfDate => {
                self.stats.frames_skipped += 1;
                self.controller.invalidate();
                match self.controller.recreate_if_needed()? {
                    Recreation::Suspended => FrameStatus::Suspended,
                    _ => FrameStatus::Skipped,
                }
            }
            FrameOutcome::PresentedNeedsRebuild => {
                self.stats.frames_presented += 1;
                self.controller.invalidate();
                match self.controller.recreate_if_needed()? {
                    Recreation::Suspended => FrameStatus::Suspended,
                    _ => FrameStatus::Rebuilt,
                }
            }
            FrameOutcome::Presented => {
                self.stats.frames_presented += 1;
                // A resize can race a successful present
                let recreation = if self.controller.has_pending_resize() {
                    self.controller.recreate_if_needed()?
                } else {
                    Recreation::NotNeeded
                };
                match recreation {
                    Recreation::Suspended => FrameStatus::Suspended,
                    Recreation::Rebuilt => FrameStatus::Rebuilt,
                    Recreation::NotNeeded if resumed => FrameStatus::Rebuilt,
                    Recreation::NotNeeded => FrameStatus::Presented,
                }
            }
        };

        if status == FrameStatus::Suspended {
            self.stats.suspended_polls += 1;
        }

        Ok(status)
    }

    /// Records a new window extent. The latest one before the next
    /// [`render_frame`](Self::render_frame) wins.
    pub fn notify_resized(&self, extent: vk::Extent2D) {
        self.resize.notifier().notify(extent);
    }

    /// Returns a handle for posting resizes from a window callback.
    pub fn resize_notifier(&self) -> ResizeNotifier {
        self.resize.notifier()
    }

    /// Waits for the device to go idle, then destroys the framebuffers, the
    /// chain and the frame slot ring.
    ///
    /// Idempotent; also run on drop.
    ///
    /// # Errors
    ///
    /// Returns the idle wait's error. Teardown still happens.
    pub fn shutdown(&mut self) -> RhiResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let idle = self.device.wait_idle();
        if let Err(e) = idle {
            warn!("Device did not go idle before shutdown: {:?}", e);
        }

        self.controller.release();
        self.synchronizer = None;

        info!(
            "Presentation engine shut down ({} frames presented, {} chain builds)",
            self.stats.frames_presented,
            self.controller.rebuild_count()
        );

        idle.map_err(RhiError::from)
    }

    /// The live chain, if any.
    #[inline]
    pub fn chain(&self) -> Option<&PresentationChain> {
        self.controller.chain()
    }

    /// Returns true while there is no chain to render to.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.controller.chain().is_none()
    }

    /// Number of frame slots, or 0 after shutdown.
    pub fn frames_in_flight(&self) -> usize {
        self.synchronizer
            .as_ref()
            .map_or(0, |s| s.ring().depth())
    }

    /// The frame cursor, until shutdown.
    pub fn cursor(&self) -> Option<FrameCursor> {
        self.synchronizer.as_ref().map(FrameSynchronizer::cursor)
    }

    /// Protocol state of the last frame, until shutdown.
    pub fn frame_state(&self) -> Option<FrameState> {
        self.synchronizer.as_ref().map(FrameSynchronizer::state)
    }

    /// Counters since startup.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            rebuilds: self.controller.rebuild_count(),
            ..self.stats
        }
    }
}

impl Drop for PresentationEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Presentation engine shutdown failed: {}", e);
        }
    }
}
