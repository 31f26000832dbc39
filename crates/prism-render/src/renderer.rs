//! Frame driver.
//!
//! Owns the device context, swapchain, render path, and frame ring, and
//! drives one begin/draw/present cycle per tick. A frame either
//! completes or the tick returns an error; there are no partial frames.

use ash::vk;
use prism_gpu::{command, DeviceContext, DeviceContextBuilder, GpuError, ShaderModule, Swapchain};
use prism_scene::World;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};

use crate::config::{RendererConfig, ShaderConfig};
use crate::error::Result;
use crate::frame::Frame;
use crate::render_path::RenderPath;
use crate::render_scene::RenderScene;

pub struct Renderer {
    ctx: DeviceContext,
    swapchain: Swapchain,
    path: RenderPath,
    scene: Option<RenderScene>,
    frame: Frame,
    hooks: Vec<Box<dyn FnMut(vk::CommandBuffer)>>,
    config: RendererConfig,
    swapchain_stale: bool,
    minimized: bool,
}

impl Renderer {
    /// Build the device chain, swapchain, configured render path, and
    /// frame ring for `window`.
    pub fn new<W>(window: &W, width: u32, height: u32, config: RendererConfig) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let ctx = DeviceContextBuilder::new()
            .app_name("prism")
            .validation(config.validation)
            .build(window)?;
        let swapchain = unsafe { Swapchain::new(&ctx, width, height, config.vsync, None)? };
        let path = RenderPath::new(&ctx, &swapchain, config.path)?;
        let frame = Frame::new(&ctx, swapchain.image_count())?;

        info!(
            "Renderer ready: {:?} path, {}x{}",
            config.path, swapchain.extent.width, swapchain.extent.height
        );
        Ok(Self {
            ctx,
            swapchain,
            path,
            scene: None,
            frame,
            hooks: Vec::new(),
            config,
            swapchain_stale: false,
            minimized: false,
        })
    }

    /// Mirror `world` on the GPU and build the path's pipelines from
    /// the mirror's descriptor layouts and the configured shaders.
    ///
    /// Replaces any previous mirror.
    pub fn set_world(&mut self, world: &World) -> Result<()> {
        if let Some(mut scene) = self.scene.take() {
            self.ctx.wait_idle()?;
            unsafe { scene.destroy(&self.ctx)? };
        }

        let scene = RenderScene::new(&self.ctx, world)?;
        self.build_pipelines(&scene.descriptor_set_layouts())?;
        self.scene = Some(scene);
        Ok(())
    }

    /// Render one frame of `world`. A no-op until [`set_world`] has
    /// built the GPU mirror, or while the window is minimized.
    ///
    /// [`set_world`]: Renderer::set_world
    pub fn tick(&mut self, world: &World, dt: f32) -> Result<()> {
        if self.minimized {
            return Ok(());
        }
        if self.scene.is_none() {
            return Ok(());
        }

        if let Some(scene) = self.scene.as_mut() {
            scene.update(&self.ctx, world, dt)?;
        }

        let Some((slot, image_index)) = self.begin_frame()? else {
            return Ok(());
        };

        let cmd = self.frame.command(slot);
        if let Some(scene) = self.scene.as_ref() {
            unsafe {
                self.path
                    .draw(&self.ctx, cmd, image_index as usize, scene, &mut self.hooks)?;
            }
        }

        self.end_frame(slot, image_index)
    }

    /// Register an overlay callback run inside the swapchain-writing
    /// pass every frame.
    pub fn hook<F>(&mut self, f: F)
    where
        F: FnMut(vk::CommandBuffer) + 'static,
    {
        self.hooks.push(Box::new(f));
    }

    /// The pass overlays render in, for building their own pipelines.
    pub fn ui_render_pass(&self) -> vk::RenderPass {
        self.path.ui_render_pass()
    }

    /// Handle a window resize. A zero extent marks the window minimized
    /// and rendering pauses until a real size arrives.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            self.minimized = true;
            return Ok(());
        }
        self.minimized = false;
        self.recreate_swapchain_at(width, height)
    }

    /// Block until the GPU finishes all submitted work.
    pub fn wait(&self) -> Result<()> {
        Ok(self.ctx.wait_idle()?)
    }

    /// Wait for the frame slot's fence, acquire an image, and start
    /// recording. Returns `None` when the swapchain was out of date and
    /// has been recreated instead; the caller skips this frame.
    fn begin_frame(&mut self) -> Result<Option<(usize, u32)>> {
        let device = self.ctx.device();
        let slot = self.frame.ring().current();

        unsafe {
            self.frame.sync(slot).in_flight.wait(device)?;
        }

        let acquired = unsafe {
            self.swapchain.acquire_next_image(
                &self.ctx,
                self.frame.sync(slot).image_available.handle(),
                u64::MAX,
            )
        };
        let (image_index, suboptimal) = match acquired {
            Ok(acquired) => acquired,
            Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                self.recreate_swapchain()?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if suboptimal && !self.swapchain_stale {
            warn!("Swapchain suboptimal; recreating after this frame");
            self.swapchain_stale = true;
        }

        // The image may still be owned by the other slot's submission.
        let plan = self.frame.ring_mut().begin_frame(image_index as usize);
        if let Some(prior) = plan.extra_wait {
            unsafe { self.frame.sync(prior).in_flight.wait(device)? };
        }

        unsafe {
            self.frame.sync(slot).in_flight.reset(device)?;
            let cmd = self.frame.command(slot);
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(GpuError::from)?;
            command::begin_command_buffer(
                device,
                cmd,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )?;
        }
        Ok(Some((slot, image_index)))
    }

    /// Submit the recorded frame and present it, then advance the ring.
    fn end_frame(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let device = self.ctx.device();
        let cmd = self.frame.command(slot);
        let sync = self.frame.sync(slot);
        let render_finished = sync.render_finished.handle();

        unsafe {
            command::end_command_buffer(device, cmd)?;
            self.ctx.submit(
                &[cmd],
                &[sync.image_available.handle()],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[render_finished],
                sync.in_flight.handle(),
            )?;
        }

        let stale = self
            .ctx
            .present(self.swapchain.swapchain, image_index, render_finished)?;

        self.frame.ring_mut().end_frame();

        if stale || self.swapchain_stale {
            self.recreate_swapchain()?;
        }
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        let extent = self.swapchain.extent;
        self.recreate_swapchain_at(extent.width, extent.height)
    }

    /// Tear down and rebuild the swapchain chain: new swapchain, path
    /// framebuffers, and a frame ring with forgotten image ownership.
    fn recreate_swapchain_at(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;

        let new_swapchain = unsafe {
            Swapchain::new(
                &self.ctx,
                width,
                height,
                self.config.vsync,
                Some(self.swapchain.swapchain),
            )?
        };
        let old = std::mem::replace(&mut self.swapchain, new_swapchain);
        unsafe { old.destroy(&self.ctx) };

        self.path.resize(&self.ctx, &self.swapchain)?;
        self.frame
            .ring_mut()
            .reset_images(self.swapchain.image_count());
        self.swapchain_stale = false;

        info!(
            "Swapchain recreated at {}x{}",
            self.swapchain.extent.width, self.swapchain.extent.height
        );
        Ok(())
    }

    fn build_pipelines(&mut self, set_layouts: &[vk::DescriptorSetLayout]) -> Result<()> {
        let device = self.ctx.device();
        match &mut self.path {
            RenderPath::Forward(path) => {
                let shader = load_shader(device, &self.config, &self.config.shaders.forward)?;
                let built = path.build_pipeline(&self.ctx, &shader, set_layouts);
                unsafe { shader.destroy(device) };
                built
            }
            RenderPath::Deferred(path) => {
                let geometry = load_shader(device, &self.config, &self.config.shaders.geometry)?;
                let lighting =
                    match load_shader(device, &self.config, &self.config.shaders.lighting) {
                        Ok(lighting) => lighting,
                        Err(e) => {
                            unsafe { geometry.destroy(device) };
                            return Err(e);
                        }
                    };
                let built = path.build_pipelines(&self.ctx, &geometry, &lighting, set_layouts);
                unsafe {
                    geometry.destroy(device);
                    lighting.destroy(device);
                }
                built
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.ctx.wait_idle().is_err() {
            return;
        }
        unsafe {
            if let Some(mut scene) = self.scene.take() {
                let _ = scene.destroy(&self.ctx);
            }
            let _ = self.path.destroy(&self.ctx);
            self.frame.destroy(&self.ctx);
            self.swapchain.destroy(&self.ctx);
        }
    }
}

/// Load one pipeline's SPIR-V module. Modules may be destroyed as soon
/// as pipeline creation returns.
fn load_shader(
    device: &ash::Device,
    config: &RendererConfig,
    shader: &ShaderConfig,
) -> Result<ShaderModule> {
    let path = config.shader_path(shader);
    let module = unsafe {
        ShaderModule::from_file(device, &path, &shader.vertex_entry, &shader.fragment_entry)?
    };
    Ok(module)
}
