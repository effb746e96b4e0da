//! Vulkan objects that live as long as the window.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use presenter_core::PresentConfig;
use presenter_engine::{EngineStats, FrameRecorder, FrameStatus, PresentationEngine};
use presenter_platform::{Surface, Window};
use presenter_rhi::chain::choose_surface_format;
use presenter_rhi::device::Device;
use presenter_rhi::instance::Instance;
use presenter_rhi::physical_device::select_physical_device;
use presenter_rhi::render_pass::RenderPass;
use presenter_rhi::{PresentDevice, RhiError, RhiResult};

/// Instance, surface, device, render pass and the presentation engine.
///
/// ManuallyDrop is used to ensure destruction order: engine, render pass,
/// device, surface, instance.
pub struct GpuContext {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    render_pass: ManuallyDrop<RenderPass>,
    engine: ManuallyDrop<PresentationEngine>,
}

impl GpuContext {
    /// Brings up Vulkan for `window` and builds the first presentation chain.
    pub fn new(
        window: &Window,
        app_name: &str,
        config: &PresentConfig,
        recorder: Box<dyn FrameRecorder>,
    ) -> RhiResult<Self> {
        let extent = window.extent();
        info!(
            "Initializing presentation ({}x{}, {} frames in flight)",
            extent.width, extent.height, config.frames_in_flight
        );

        let window_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(app_name, config.validation, &window_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle(), instance.surface_loader())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info, surface.handle())?;

        // The render pass outlives every chain, so fix its format up front
        let support = device.surface_support()?;
        let surface_format = choose_surface_format(&support.formats);
        let render_pass = RenderPass::new(device.clone(), surface_format.format)?;

        let engine = PresentationEngine::new(
            device.clone(),
            render_pass.handle(),
            extent,
            config,
            recorder,
        )?;

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            render_pass: ManuallyDrop::new(render_pass),
            engine: ManuallyDrop::new(engine),
        })
    }

    /// Runs one frame.
    pub fn render_frame(&mut self) -> RhiResult<FrameStatus> {
        self.engine.render_frame()
    }

    /// Forwards a window resize.
    pub fn notify_resized(&self, extent: vk::Extent2D) {
        self.engine.notify_resized(extent);
    }

    /// Returns true while the window has no area to present to.
    pub fn is_suspended(&self) -> bool {
        self.engine.is_suspended()
    }

    /// Frame counters since startup.
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        if let Err(e) = self.engine.shutdown() {
            error!("Failed to shut down presentation engine: {}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.engine);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("GPU context destroyed");
    }
}
