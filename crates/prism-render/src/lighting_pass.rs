//! Deferred lighting pass: fullscreen resolve into the swapchain.

use ash::vk;
use prism_gpu::{
    command, DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DeviceContext, RenderPass, RenderPassConfig, Swapchain,
};

use crate::error::Result;
use crate::gbuffer::{GBuffer, GBufferAttachment, GBUFFER_COLOR_COUNT};

/// Samples the GBuffer and shades into the swapchain image.
///
/// Owns the GBuffer descriptor tier (set 3): a private single-set pool,
/// its layout, and the set pointing at the current attachment views.
pub struct LightingPass {
    pass: RenderPass,
    gbuffer_layout: DescriptorSetLayout,
    gbuffer_pool: DescriptorPool,
    gbuffer_set: DescriptorSet,
    extent: vk::Extent2D,
}

impl LightingPass {
    /// Create the pass, one framebuffer per swapchain image, and the
    /// GBuffer descriptor set.
    pub fn new(ctx: &DeviceContext, swapchain: &Swapchain, gbuffer: &GBuffer) -> Result<Self> {
        let device = ctx.device();

        let config = pass_config(swapchain.format);
        let mut pass = unsafe { RenderPass::new(device, &config)? };
        unsafe {
            pass.create_framebuffers(
                device,
                &framebuffer_sets(&swapchain.image_views),
                swapchain.extent,
            )?;
        }

        let mut layout_builder = DescriptorSetLayoutBuilder::new();
        for binding in 0..GBUFFER_COLOR_COUNT as u32 {
            layout_builder = layout_builder.sampled_image(binding, vk::ShaderStageFlags::FRAGMENT);
        }
        let gbuffer_layout = unsafe { layout_builder.build(device)? };

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: GBUFFER_COLOR_COUNT as u32,
        }];
        let mut gbuffer_pool = unsafe { DescriptorPool::new(device, 1, &pool_sizes)? };
        let gbuffer_set = unsafe { gbuffer_pool.allocate(device, &gbuffer_layout)? };

        let lighting = Self {
            pass,
            gbuffer_layout,
            gbuffer_pool,
            gbuffer_set,
            extent: swapchain.extent,
        };
        lighting.rebind_gbuffer(ctx, gbuffer);
        Ok(lighting)
    }

    pub fn pass(&self) -> &RenderPass {
        &self.pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Layout of the GBuffer tier, appended after the scene tiers in the
    /// lighting pipeline layout.
    pub fn gbuffer_layout(&self) -> vk::DescriptorSetLayout {
        self.gbuffer_layout.handle()
    }

    /// Point the GBuffer set at the current attachment views.
    ///
    /// Must run after every GBuffer recreation; the old views dangle
    /// otherwise.
    pub fn rebind_gbuffer(&self, ctx: &DeviceContext, gbuffer: &GBuffer) {
        let device = ctx.device();
        let sampler = gbuffer.sampler();
        let attachments = [
            GBufferAttachment::Position,
            GBufferAttachment::Normal,
            GBufferAttachment::Albedo,
            GBufferAttachment::Metallic,
            GBufferAttachment::Roughness,
        ];

        for (binding, attachment) in attachments.into_iter().enumerate() {
            unsafe {
                self.gbuffer_set.update_image(
                    device,
                    binding as u32,
                    gbuffer.view(attachment),
                    sampler,
                );
            }
        }
    }

    /// Bind the GBuffer set at index 3.
    ///
    /// # Safety
    /// Must be called inside this pass with a compatible pipeline layout.
    pub unsafe fn bind_gbuffer(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline_layout,
            3,
            &[self.gbuffer_set.handle()],
            &[],
        );
    }

    /// Begin on the acquired image's framebuffer and set the dynamic
    /// viewport state.
    ///
    /// # Safety
    /// The command buffer must be recording, outside any pass.
    pub unsafe fn begin(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_index: usize,
    ) -> Result<()> {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];

        self.pass
            .begin(device, cmd, image_index, self.extent, &clear_values)?;
        command::set_viewport_scissor(device, cmd, self.extent);
        Ok(())
    }

    /// # Safety
    /// The command buffer must be recording inside this pass.
    pub unsafe fn end(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        self.pass.end(device, cmd);
    }

    /// Rebuild the framebuffers for a new swapchain. The caller must
    /// have idled the device.
    pub fn resize(&mut self, ctx: &DeviceContext, swapchain: &Swapchain) -> Result<()> {
        self.extent = swapchain.extent;
        unsafe {
            self.pass.create_framebuffers(
                ctx.device(),
                &framebuffer_sets(&swapchain.image_views),
                self.extent,
            )?;
        }
        Ok(())
    }

    /// # Safety
    /// The pass and descriptor resources must not be in use.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        self.gbuffer_pool.destroy(device);
        self.gbuffer_layout.destroy(device);
        self.pass.destroy(device);
    }
}

fn pass_config(color_format: vk::Format) -> RenderPassConfig {
    RenderPassConfig {
        attachments: vec![vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)],
        color_attachments: vec![vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }],
        depth_attachment: None,
        dependencies: vec![vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::NONE)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)],
    }
}

fn framebuffer_sets(swapchain_views: &[vk::ImageView]) -> Vec<Vec<vk::ImageView>> {
    swapchain_views.iter().map(|&view| vec![view]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_a_single_presentable_color_attachment() {
        let config = pass_config(vk::Format::R8G8B8A8_SRGB);
        assert_eq!(config.attachments.len(), 1);
        assert_eq!(
            config.attachments[0].final_layout,
            vk::ImageLayout::PRESENT_SRC_KHR
        );
        assert!(config.depth_attachment.is_none());
    }
}
