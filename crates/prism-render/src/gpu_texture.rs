//! GPU-resident textures mirroring scene [`Texture`] resources.

use ash::vk;
use prism_gpu::{DeviceContext, GpuImage};
use prism_scene::{Texture, TextureId};

use crate::error::{RenderError, Result};

/// Pixel format scene textures are uploaded in.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A sampled image built from a scene texture's RGBA8 pixels.
///
/// Sampling state is not stored here; the owning scene provides a
/// shared default sampler at descriptor-write time.
pub struct GpuTexture {
    image: GpuImage,
    source: Option<TextureId>,
}

impl GpuTexture {
    /// Upload a scene texture to the GPU.
    pub fn from_texture(ctx: &DeviceContext, id: TextureId, texture: &Texture) -> Result<Self> {
        if !texture.valid() {
            return Err(RenderError::InvalidState(format!(
                "Texture {} has inconsistent pixel data",
                id.index()
            )));
        }

        let image = GpuImage::from_pixels(
            ctx,
            &texture.pixels,
            texture.width,
            texture.height,
            TEXTURE_FORMAT,
            &format!("texture {}", id.index()),
        )?;

        Ok(Self {
            image,
            source: Some(id),
        })
    }

    /// Create the built-in 1x1 opaque white fallback texture.
    pub fn white(ctx: &DeviceContext) -> Result<Self> {
        let image = GpuImage::from_pixels(ctx, &[255u8; 4], 1, 1, TEXTURE_FORMAT, "white")?;
        Ok(Self {
            image,
            source: None,
        })
    }

    /// View over the full image, ready for sampling.
    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }

    /// Scene texture this was built from, if any.
    pub fn source(&self) -> Option<TextureId> {
        self.source
    }

    /// Destroy the underlying image.
    ///
    /// # Safety
    /// The image must not be referenced by in-flight work.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        self.image.destroy(ctx)?;
        Ok(())
    }
}
