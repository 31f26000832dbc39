//! Forward render path: one pass straight to the swapchain.

use ash::vk;
use prism_gpu::{DeviceContext, GraphicsPipeline, GraphicsPipelineConfig, ShaderModule, Swapchain};

use crate::error::{RenderError, Result};
use crate::forward_pass::ForwardPass;
use crate::gpu_data::GpuVertex;
use crate::render_scene::RenderScene;

pub struct ForwardPath {
    pass: ForwardPass,
    pipeline: Option<GraphicsPipeline>,
}

impl ForwardPath {
    /// Create the forward pass. The pipeline is built later, once a
    /// scene provides its descriptor set layouts.
    pub fn new(ctx: &DeviceContext, swapchain: &Swapchain) -> Result<Self> {
        Ok(Self {
            pass: ForwardPass::new(ctx, swapchain)?,
            pipeline: None,
        })
    }

    /// Build (or rebuild) the forward pipeline against the scene's set
    /// layouts.
    pub fn build_pipeline(
        &mut self,
        ctx: &DeviceContext,
        shader: &ShaderModule,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<()> {
        let device = ctx.device();
        if let Some(pipeline) = self.pipeline.take() {
            unsafe { pipeline.destroy(device) };
        }

        let config = GraphicsPipelineConfig {
            vertex_bindings: vec![GpuVertex::binding_description(0)],
            vertex_attributes: GpuVertex::attribute_descriptions(0).to_vec(),
            ..GraphicsPipelineConfig::default()
        };
        self.pipeline = Some(unsafe {
            GraphicsPipeline::new(
                device,
                self.pass.pass().handle(),
                shader,
                &config,
                set_layouts,
            )?
        });
        Ok(())
    }

    /// Record the frame: scene geometry, then overlay hooks, all inside
    /// the swapchain-writing pass.
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
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| RenderError::InvalidState("Forward pipeline not built".to_string()))?;

        self.pass.begin(device, cmd, image_index)?;
        pipeline.bind(device, cmd);
        scene.draw(device, cmd, pipeline.layout);
        for hook in hooks.iter_mut() {
            hook(cmd);
        }
        self.pass.end(device, cmd);
        Ok(())
    }

    /// The swapchain-writing pass, for overlay pipeline creation.
    pub fn ui_render_pass(&self) -> vk::RenderPass {
        self.pass.pass().handle()
    }

    /// Rebuild the framebuffers for a recreated swapchain.
    pub fn resize(&mut self, ctx: &DeviceContext, swapchain: &Swapchain) -> Result<()> {
        self.pass.resize(ctx, swapchain)
    }

    /// Destroy the pipeline and pass.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy(ctx.device());
        }
        self.pass.destroy(ctx)
    }
}
