//! Single-pass forward rendering into the swapchain.

use ash::vk;
use prism_gpu::{command, DeviceContext, GpuImage, RenderPass, RenderPassConfig, Swapchain};

use crate::error::Result;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Swapchain color attachment plus an owned depth attachment.
pub struct ForwardPass {
    pass: RenderPass,
    depth: GpuImage,
    extent: vk::Extent2D,
}

impl ForwardPass {
    /// Create the pass and one framebuffer per swapchain image.
    pub fn new(ctx: &DeviceContext, swapchain: &Swapchain) -> Result<Self> {
        let extent = swapchain.extent;
        let depth = create_depth_image(ctx, extent)?;

        let config = pass_config(swapchain.format);
        let mut pass = unsafe { RenderPass::new(ctx.device(), &config)? };
        unsafe {
            pass.create_framebuffers(
                ctx.device(),
                &framebuffer_sets(&swapchain.image_views, depth.view),
                extent,
            )?;
        }

        Ok(Self {
            pass,
            depth,
            extent,
        })
    }

    pub fn pass(&self) -> &RenderPass {
        &self.pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin on the acquired image's framebuffer, clearing color and
    /// depth, and set the dynamic viewport state.
    ///
    /// # Safety
    /// The command buffer must be recording, outside any pass.
    pub unsafe fn begin(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_index: usize,
    ) -> Result<()> {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

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

    /// Recreate the depth attachment and framebuffers for a new
    /// swapchain. The caller must have idled the device.
    pub fn resize(&mut self, ctx: &DeviceContext, swapchain: &Swapchain) -> Result<()> {
        self.extent = swapchain.extent;

        unsafe { self.depth.destroy(ctx)? };
        self.depth = create_depth_image(ctx, self.extent)?;

        unsafe {
            self.pass.create_framebuffers(
                ctx.device(),
                &framebuffer_sets(&swapchain.image_views, self.depth.view),
                self.extent,
            )?;
        }
        Ok(())
    }

    /// # Safety
    /// The pass and depth image must not be in use.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        self.pass.destroy(ctx.device());
        self.depth.destroy(ctx)?;
        Ok(())
    }
}

fn create_depth_image(ctx: &DeviceContext, extent: vk::Extent2D) -> Result<GpuImage> {
    let image = GpuImage::attachment(
        ctx,
        DEPTH_FORMAT,
        extent,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        "forward depth",
    )?;
    Ok(image)
}

fn pass_config(color_format: vk::Format) -> RenderPassConfig {
    RenderPassConfig {
        attachments: vec![
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(DEPTH_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ],
        color_attachments: vec![vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }],
        depth_attachment: Some(vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }),
        dependencies: vec![vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::NONE)
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )],
    }
}

fn framebuffer_sets(
    swapchain_views: &[vk::ImageView],
    depth_view: vk::ImageView,
) -> Vec<Vec<vk::ImageView>> {
    swapchain_views
        .iter()
        .map(|&view| vec![view, depth_view])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_presents_color_and_keeps_depth_transient() {
        let config = pass_config(vk::Format::B8G8R8A8_SRGB);
        assert_eq!(config.attachments.len(), 2);
        assert_eq!(
            config.attachments[0].final_layout,
            vk::ImageLayout::PRESENT_SRC_KHR
        );
        assert_eq!(config.attachments[1].store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(config.color_attachments.len(), 1);
        assert!(config.depth_attachment.is_some());
    }

    #[test]
    fn each_swapchain_image_shares_the_depth_view() {
        let views = [
            vk::ImageView::null(),
            vk::ImageView::null(),
            vk::ImageView::null(),
        ];
        let sets = framebuffer_sets(&views, vk::ImageView::null());
        assert_eq!(sets.len(), 3);
        for set in &sets {
            assert_eq!(set.len(), 2);
        }
    }
}
