//! Deferred geometry pass writing the GBuffer.

use ash::vk;
use prism_gpu::{command, DeviceContext, RenderPass, RenderPassConfig};

use crate::error::Result;
use crate::gbuffer::{attachment_specs, GBuffer, GBUFFER_COLOR_COUNT};

/// Renders scene geometry into all GBuffer attachments at once.
pub struct GeometryPass {
    pass: RenderPass,
    extent: vk::Extent2D,
}

impl GeometryPass {
    /// Create the pass and its single framebuffer over the GBuffer.
    pub fn new(ctx: &DeviceContext, gbuffer: &GBuffer) -> Result<Self> {
        let config = pass_config();
        let mut pass = unsafe { RenderPass::new(ctx.device(), &config)? };
        unsafe {
            pass.create_framebuffers(ctx.device(), &[gbuffer.views()], gbuffer.extent())?;
        }

        Ok(Self {
            pass,
            extent: gbuffer.extent(),
        })
    }

    pub fn pass(&self) -> &RenderPass {
        &self.pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin the pass, clearing every attachment, and set the dynamic
    /// viewport state.
    ///
    /// # Safety
    /// The command buffer must be recording, outside any pass.
    pub unsafe fn begin(&self, device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
        let mut clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 0.0],
            },
        }; GBUFFER_COLOR_COUNT + 1];
        clear_values[GBUFFER_COLOR_COUNT] = vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        };

        self.pass.begin(device, cmd, 0, self.extent, &clear_values)?;
        command::set_viewport_scissor(device, cmd, self.extent);
        Ok(())
    }

    /// # Safety
    /// The command buffer must be recording inside this pass.
    pub unsafe fn end(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        self.pass.end(device, cmd);
    }

    /// Rebuild the framebuffer over a resized GBuffer. The caller must
    /// have idled the device and resized the GBuffer first.
    pub fn resize(&mut self, ctx: &DeviceContext, gbuffer: &GBuffer) -> Result<()> {
        self.extent = gbuffer.extent();
        unsafe {
            self.pass
                .create_framebuffers(ctx.device(), &[gbuffer.views()], self.extent)?;
        }
        Ok(())
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        self.pass.destroy(ctx.device());
    }
}

fn pass_config() -> RenderPassConfig {
    let specs = attachment_specs();

    let attachments = specs
        .iter()
        .map(|spec| {
            vk::AttachmentDescription::default()
                .format(spec.format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        })
        .collect();

    let color_attachments = (0..GBUFFER_COLOR_COUNT as u32)
        .map(|i| vk::AttachmentReference {
            attachment: i,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();

    RenderPassConfig {
        attachments,
        color_attachments,
        depth_attachment: Some(vk::AttachmentReference {
            attachment: GBUFFER_COLOR_COUNT as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }),
        dependencies: vec![
            // Prior reads of the GBuffer finish before this frame overwrites it.
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .src_access_mask(vk::AccessFlags::MEMORY_READ)
                .dst_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .dst_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
            // Writes finish before the lighting pass samples the attachments.
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                )
                .src_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_matches_the_gbuffer_table() {
        let config = pass_config();
        let specs = attachment_specs();

        assert_eq!(config.attachments.len(), specs.len());
        for (attachment, spec) in config.attachments.iter().zip(specs.iter()) {
            assert_eq!(attachment.format, spec.format);
            assert_eq!(
                attachment.final_layout,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            );
        }

        assert_eq!(config.color_attachments.len(), GBUFFER_COLOR_COUNT);
        assert_eq!(
            config.depth_attachment.map(|d| d.attachment),
            Some(GBUFFER_COLOR_COUNT as u32)
        );
        assert_eq!(config.dependencies.len(), 2);
    }
}
