//! Render pass and framebuffer management.

use crate::error::{GpuError, Result};
use ash::vk;

/// Declarative description of a single-subpass render pass.
#[derive(Default)]
pub struct RenderPassConfig {
    /// All attachments in framebuffer order.
    pub attachments: Vec<vk::AttachmentDescription>,
    /// References into `attachments` used as color outputs.
    pub color_attachments: Vec<vk::AttachmentReference>,
    /// Optional depth-stencil reference.
    pub depth_attachment: Option<vk::AttachmentReference>,
    /// Subpass dependencies.
    pub dependencies: Vec<vk::SubpassDependency>,
}

/// A render pass together with its framebuffers.
///
/// Framebuffers are created separately so they can be rebuilt on resize
/// while the pass itself stays alive.
pub struct RenderPass {
    pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl RenderPass {
    /// Create a render pass with one graphics subpass.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, config: &RenderPassConfig) -> Result<Self> {
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&config.color_attachments);

        if let Some(depth) = config.depth_attachment.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth);
        }

        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&config.attachments)
            .subpasses(&subpasses)
            .dependencies(&config.dependencies);

        let pass = device.create_render_pass(&create_info, None)?;

        Ok(Self {
            pass,
            framebuffers: Vec::new(),
        })
    }

    /// Get the raw render pass handle.
    pub fn handle(&self) -> vk::RenderPass {
        self.pass
    }

    /// Number of framebuffers currently attached.
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// (Re)create one framebuffer per attachment set.
    ///
    /// Any previous framebuffers are destroyed first.
    ///
    /// # Safety
    /// The device and views must be valid, and the old framebuffers must
    /// not be in use.
    pub unsafe fn create_framebuffers(
        &mut self,
        device: &ash::Device,
        attachment_sets: &[Vec<vk::ImageView>],
        extent: vk::Extent2D,
    ) -> Result<()> {
        self.destroy_framebuffers(device);

        let mut framebuffers = Vec::with_capacity(attachment_sets.len());
        for views in attachment_sets {
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.pass)
                .attachments(views)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            framebuffers.push(device.create_framebuffer(&create_info, None)?);
        }

        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Begin the pass on the given framebuffer.
    ///
    /// # Safety
    /// The device and command buffer must be valid, and the command
    /// buffer must be in the recording state.
    pub unsafe fn begin(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        framebuffer_index: usize,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> Result<()> {
        let framebuffer = self.framebuffers.get(framebuffer_index).copied().ok_or_else(|| {
            GpuError::InvalidState(format!(
                "Framebuffer index {framebuffer_index} out of range ({} framebuffers)",
                self.framebuffers.len()
            ))
        })?;

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        Ok(())
    }

    /// End the pass.
    ///
    /// # Safety
    /// The command buffer must be recording inside this pass.
    pub unsafe fn end(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        device.cmd_end_render_pass(cmd);
    }

    /// Destroy the framebuffers, keeping the pass.
    ///
    /// # Safety
    /// The device must be valid and the framebuffers must not be in use.
    pub unsafe fn destroy_framebuffers(&mut self, device: &ash::Device) {
        for &framebuffer in &self.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        self.framebuffers.clear();
    }

    /// Destroy the pass and its framebuffers.
    ///
    /// # Safety
    /// The device must be valid and the pass must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.destroy_framebuffers(device);
        device.destroy_render_pass(self.pass, None);
    }
}
