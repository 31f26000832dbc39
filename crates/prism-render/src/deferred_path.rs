//! Deferred render path: geometry into the GBuffer, then a fullscreen
//! lighting composite into the swapchain.

use ash::vk;
use prism_gpu::{DeviceContext, GraphicsPipeline, GraphicsPipelineConfig, ShaderModule, Swapchain};

use crate::error::{RenderError, Result};
use crate::gbuffer::{GBuffer, GBUFFER_COLOR_COUNT};
use crate::geometry_pass::GeometryPass;
use crate::gpu_data::GpuVertex;
use crate::lighting_pass::LightingPass;
use crate::render_scene::RenderScene;

pub struct DeferredPath {
    gbuffer: GBuffer,
    geometry: GeometryPass,
    lighting: LightingPass,
    geometry_pipeline: Option<GraphicsPipeline>,
    lighting_pipeline: Option<GraphicsPipeline>,
}

impl DeferredPath {
    /// Create the GBuffer and both passes at the swapchain extent.
    pub fn new(ctx: &DeviceContext, swapchain: &Swapchain) -> Result<Self> {
        let gbuffer = GBuffer::new(ctx, swapchain.extent)?;
        let geometry = GeometryPass::new(ctx, &gbuffer)?;
        let lighting = LightingPass::new(ctx, swapchain, &gbuffer)?;

        Ok(Self {
            gbuffer,
            geometry,
            lighting,
            geometry_pipeline: None,
            lighting_pipeline: None,
        })
    }

    /// Build (or rebuild) both pipelines against the scene's set
    /// layouts.
    ///
    /// The lighting layout appends the GBuffer tier after the scene
    /// tiers, so the scene set stays bound across the pass boundary.
    pub fn build_pipelines(
        &mut self,
        ctx: &DeviceContext,
        geometry_shader: &ShaderModule,
        lighting_shader: &ShaderModule,
        scene_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<()> {
        let device = ctx.device();
        if let Some(pipeline) = self.geometry_pipeline.take() {
            unsafe { pipeline.destroy(device) };
        }
        if let Some(pipeline) = self.lighting_pipeline.take() {
            unsafe { pipeline.destroy(device) };
        }

        let geometry_config = GraphicsPipelineConfig {
            vertex_bindings: vec![GpuVertex::binding_description(0)],
            vertex_attributes: GpuVertex::attribute_descriptions(0).to_vec(),
            color_attachment_count: GBUFFER_COLOR_COUNT,
            ..GraphicsPipelineConfig::default()
        };
        self.geometry_pipeline = Some(unsafe {
            GraphicsPipeline::new(
                device,
                self.geometry.pass().handle(),
                geometry_shader,
                &geometry_config,
                scene_layouts,
            )?
        });

        let mut lighting_layouts = scene_layouts.to_vec();
        lighting_layouts.push(self.lighting.gbuffer_layout());
        let lighting_config = GraphicsPipelineConfig {
            depth_test: false,
            depth_write: false,
            cull_mode: vk::CullModeFlags::NONE,
            ..GraphicsPipelineConfig::default()
        };
        self.lighting_pipeline = Some(unsafe {
            GraphicsPipeline::new(
                device,
                self.lighting.pass().handle(),
                lighting_shader,
                &lighting_config,
                &lighting_layouts,
            )?
        });
        Ok(())
    }

    /// Record the frame: geometry fills the GBuffer, lighting reads it
    /// back with a fullscreen triangle, overlay hooks run inside the
    /// swapchain-writing pass.
    ///
    /// # Safety
    /// The command buffer must be recording and `image_index` must be
    /// the image acquired for this frame.
    pub unsafe fn draw(
        &self,
        ctx: &DeviceContext,
        cmd: vk::CommandBuffer,
        image_index: usize,
        scene: &RenderScene,
        hooks: &mut [Box<dyn FnMut(vk::CommandBuffer)>],
    ) -> Result<()> {
        let device = ctx.device();
        let geometry_pipeline = self
            .geometry_pipeline
            .as_ref()
            .ok_or_else(|| RenderError::InvalidState("Geometry pipeline not built".to_string()))?;
        let lighting_pipeline = self
            .lighting_pipeline
            .as_ref()
            .ok_or_else(|| RenderError::InvalidState("Lighting pipeline not built".to_string()))?;

        self.geometry.begin(device, cmd)?;
        geometry_pipeline.bind(device, cmd);
        scene.draw(device, cmd, geometry_pipeline.layout);
        self.geometry.end(device, cmd);

        self.lighting.begin(device, cmd, image_index)?;
        lighting_pipeline.bind(device, cmd);
        self.lighting
            .bind_gbuffer(device, cmd, lighting_pipeline.layout);
        device.cmd_draw(cmd, 3, 1, 0, 0);
        for hook in hooks.iter_mut() {
            hook(cmd);
        }
        self.lighting.end(device, cmd);
        Ok(())
    }

    /// The swapchain-writing pass, for overlay pipeline creation.
    pub fn ui_render_pass(&self) -> vk::RenderPass {
        self.lighting.pass().handle()
    }

    /// Rebuild for a recreated swapchain.
    ///
    /// Order matters: both passes rebuild against the new GBuffer
    /// images, then the lighting set re-points at the new views.
    pub fn resize(&mut self, ctx: &DeviceContext, swapchain: &Swapchain) -> Result<()> {
        self.gbuffer.resize(ctx, swapchain.extent)?;
        self.geometry.resize(ctx, &self.gbuffer)?;
        self.lighting.resize(ctx, swapchain)?;
        self.lighting.rebind_gbuffer(ctx, &self.gbuffer);
        Ok(())
    }

    /// Destroy the pipelines, passes, and GBuffer.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        let device = ctx.device();
        if let Some(pipeline) = self.geometry_pipeline.take() {
            pipeline.destroy(device);
        }
        if let Some(pipeline) = self.lighting_pipeline.take() {
            pipeline.destroy(device);
        }
        self.lighting.destroy(ctx);
        self.geometry.destroy(ctx);
        self.gbuffer.destroy(ctx)
    }
}
