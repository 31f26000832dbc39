//! Geometry buffer backing the deferred path.

use ash::vk;
use prism_gpu::{DeviceContext, GpuImage, Sampler};

use crate::error::Result;

/// GBuffer attachment slots, in framebuffer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferAttachment {
    Position,
    Normal,
    Albedo,
    Metallic,
    Roughness,
    Depth,
}

pub const GBUFFER_ATTACHMENT_COUNT: usize = 6;
pub const GBUFFER_COLOR_COUNT: usize = 5;

/// Format and usage of one GBuffer attachment.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSpec {
    pub attachment: GBufferAttachment,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

/// The fixed attachment table. Formats are part of the geometry/lighting
/// shader contract and never change across resizes.
pub fn attachment_specs() -> [AttachmentSpec; GBUFFER_ATTACHMENT_COUNT] {
    let color_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED;
    [
        AttachmentSpec {
            attachment: GBufferAttachment::Position,
            format: vk::Format::R32G32B32A32_SFLOAT,
            usage: color_usage,
        },
        AttachmentSpec {
            attachment: GBufferAttachment::Normal,
            format: vk::Format::R16G16B16A16_SFLOAT,
            usage: color_usage,
        },
        AttachmentSpec {
            attachment: GBufferAttachment::Albedo,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: color_usage,
        },
        AttachmentSpec {
            attachment: GBufferAttachment::Metallic,
            format: vk::Format::R8_UNORM,
            usage: color_usage,
        },
        AttachmentSpec {
            attachment: GBufferAttachment::Roughness,
            format: vk::Format::R8_UNORM,
            usage: color_usage,
        },
        AttachmentSpec {
            attachment: GBufferAttachment::Depth,
            format: vk::Format::D32_SFLOAT,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        },
    ]
}

/// Per-frame geometry attachments, all sampled by the lighting pass.
pub struct GBuffer {
    images: Vec<GpuImage>,
    sampler: Sampler,
    extent: vk::Extent2D,
}

impl GBuffer {
    /// Create all attachments at the given extent.
    pub fn new(ctx: &DeviceContext, extent: vk::Extent2D) -> Result<Self> {
        let sampler = unsafe { Sampler::new(ctx.device())? };
        let images = create_attachment_images(ctx, extent)?;

        Ok(Self {
            images,
            sampler,
            extent,
        })
    }

    /// View of a single attachment.
    pub fn view(&self, attachment: GBufferAttachment) -> vk::ImageView {
        self.images[attachment as usize].view
    }

    /// All attachment views in framebuffer order (colors then depth).
    pub fn views(&self) -> Vec<vk::ImageView> {
        self.images.iter().map(|image| image.view).collect()
    }

    /// Sampler shared by every attachment when read in the lighting pass.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Recreate every attachment at the new extent.
    ///
    /// The caller must have idled the device; the old images are
    /// destroyed in place.
    pub fn resize(&mut self, ctx: &DeviceContext, extent: vk::Extent2D) -> Result<()> {
        for mut image in self.images.drain(..) {
            unsafe { image.destroy(ctx)? };
        }
        self.images = create_attachment_images(ctx, extent)?;
        self.extent = extent;
        Ok(())
    }

    /// Destroy all attachments and the sampler.
    ///
    /// # Safety
    /// The attachments must not be referenced by in-flight work.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        for mut image in self.images.drain(..) {
            image.destroy(ctx)?;
        }
        self.sampler.destroy(ctx.device());
        Ok(())
    }
}

fn create_attachment_images(ctx: &DeviceContext, extent: vk::Extent2D) -> Result<Vec<GpuImage>> {
    attachment_specs()
        .iter()
        .map(|spec| {
            let image = GpuImage::attachment(
                ctx,
                spec.format,
                extent,
                spec.usage,
                &format!("gbuffer {:?}", spec.attachment),
            )?;
            Ok(image)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_attachment_in_order() {
        let specs = attachment_specs();
        assert_eq!(specs.len(), GBUFFER_ATTACHMENT_COUNT);

        let order = [
            GBufferAttachment::Position,
            GBufferAttachment::Normal,
            GBufferAttachment::Albedo,
            GBufferAttachment::Metallic,
            GBufferAttachment::Roughness,
            GBufferAttachment::Depth,
        ];
        for (spec, expected) in specs.iter().zip(order) {
            assert_eq!(spec.attachment, expected);
            assert_eq!(spec.attachment as usize, expected as usize);
        }
    }

    #[test]
    fn color_attachments_are_sampled_render_targets() {
        for spec in attachment_specs().iter().take(GBUFFER_COLOR_COUNT) {
            assert!(spec.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
            assert!(spec.usage.contains(vk::ImageUsageFlags::SAMPLED));
        }
    }

    #[test]
    fn formats_match_the_shader_contract() {
        let specs = attachment_specs();
        assert_eq!(specs[0].format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(specs[1].format, vk::Format::R16G16B16A16_SFLOAT);
        assert_eq!(specs[2].format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(specs[3].format, vk::Format::R8_UNORM);
        assert_eq!(specs[4].format, vk::Format::R8_UNORM);
        assert_eq!(specs[5].format, vk::Format::D32_SFLOAT);
        assert!(specs[5]
            .usage
            .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
    }
}
