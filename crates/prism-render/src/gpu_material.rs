//! GPU-resident materials mirroring scene [`Material`] resources.

use ash::vk;
use prism_gpu::{DescriptorPool, DescriptorSet, DescriptorSetLayout, DeviceContext, GpuBuffer};
use prism_scene::{Material, MaterialId};

use crate::error::Result;
use crate::gpu_data::GpuMaterialData;

/// Image views bound alongside the material uniform.
///
/// Slot order matches bindings 1..3 of the material set: base color,
/// metallic-roughness, and a reserved slot that always carries the
/// fallback texture.
#[derive(Debug, Clone, Copy)]
pub struct MaterialImages {
    pub base_color: vk::ImageView,
    pub metallic_roughness: vk::ImageView,
    pub fallback: vk::ImageView,
}

/// A material uniform buffer plus its descriptor set (set 1).
pub struct GpuMaterial {
    uniform: GpuBuffer,
    set: DescriptorSet,
    source: MaterialId,
}

impl GpuMaterial {
    /// Upload material factors and write the full descriptor set.
    ///
    /// Missing texture slots must already be resolved to the fallback
    /// view by the caller.
    pub fn new(
        ctx: &DeviceContext,
        id: MaterialId,
        material: &Material,
        layout: &DescriptorSetLayout,
        pool: &mut DescriptorPool,
        images: MaterialImages,
        sampler: vk::Sampler,
    ) -> Result<Self> {
        let data = GpuMaterialData {
            base_color: material.base_color,
            metallic: material.metallic,
            roughness: material.roughness,
            _padding: [0.0; 2],
        };

        let uniform = GpuBuffer::new_dynamic(
            ctx,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(&data),
            &format!("material {}", id.index()),
        )?;

        let device = ctx.device();
        let set = unsafe { pool.allocate(device, layout)? };
        unsafe {
            set.update_buffer(
                device,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                uniform.buffer,
            );
            set.update_image(device, 1, images.base_color, sampler);
            set.update_image(device, 2, images.metallic_roughness, sampler);
            set.update_image(device, 3, images.fallback, sampler);
        }

        Ok(Self {
            uniform,
            set,
            source: id,
        })
    }

    /// Bind the material set at index 1.
    ///
    /// # Safety
    /// Must be called inside an active render pass whose pipeline layout
    /// matches `layout`.
    pub unsafe fn bind(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
    ) {
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            1,
            &[self.set.handle()],
            &[],
        );
    }

    pub fn set(&self) -> DescriptorSet {
        self.set
    }

    /// Scene material this was built from.
    pub fn source(&self) -> MaterialId {
        self.source
    }

    /// Free the uniform buffer. The descriptor set returns to its pool
    /// on the next reset.
    ///
    /// # Safety
    /// The buffer must not be referenced by in-flight work.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        ctx.allocator().lock().free_buffer(&mut self.uniform)?;
        Ok(())
    }
}
