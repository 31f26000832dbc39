//! GPU-resident meshes mirroring scene [`SubMesh`] resources.

use ash::vk;
use glam::{Mat4, Vec2, Vec3, Vec4};
use prism_gpu::{DescriptorPool, DescriptorSet, DescriptorSetLayout, DeviceContext, GpuBuffer};
use prism_scene::{MaterialId, SubMesh, SubMeshId};

use crate::error::{RenderError, Result};
use crate::gpu_data::{GpuObjectData, GpuVertex};

/// Static vertex/index buffers plus the per-object uniform (set 2).
pub struct GpuMesh {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    object_uniform: GpuBuffer,
    object_data: GpuObjectData,
    set: DescriptorSet,
    index_count: u32,
    source: SubMeshId,
    material: Option<MaterialId>,
}

impl GpuMesh {
    /// Interleave and upload a submesh.
    pub fn new(
        ctx: &DeviceContext,
        id: SubMeshId,
        submesh: &SubMesh,
        layout: &DescriptorSetLayout,
        pool: &mut DescriptorPool,
    ) -> Result<Self> {
        if submesh.vertex_count() == 0 || submesh.index_count() == 0 {
            return Err(RenderError::InvalidState(format!(
                "Submesh {} has no geometry",
                id.index()
            )));
        }

        let vertices = interleave_vertices(submesh);
        let vertex_buffer = GpuBuffer::new_static(
            ctx,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&vertices),
            &format!("mesh {} vertices", id.index()),
        )?;
        let index_buffer = GpuBuffer::new_static(
            ctx,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(&submesh.indices),
            &format!("mesh {} indices", id.index()),
        )?;

        let object_data = GpuObjectData::default();
        let object_uniform = GpuBuffer::new_dynamic(
            ctx,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(&object_data),
            &format!("mesh {} object", id.index()),
        )?;

        let device = ctx.device();
        let set = unsafe { pool.allocate(device, layout)? };
        unsafe {
            set.update_buffer(
                device,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                object_uniform.buffer,
            );
        }

        Ok(Self {
            vertex_buffer,
            index_buffer,
            object_uniform,
            object_data,
            set,
            index_count: submesh.index_count() as u32,
            source: id,
            material: submesh.material,
        })
    }

    /// Record the model matrix for the next uniform upload.
    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.object_data.model = model;
    }

    /// Push the current object data through the persistent mapping.
    pub fn update_uniforms(&self) -> Result<()> {
        self.object_uniform
            .upload(bytemuck::bytes_of(&self.object_data), 0)?;
        Ok(())
    }

    /// Bind vertex/index buffers and the object set at index 2.
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
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
        device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT32);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            2,
            &[self.set.handle()],
            &[],
        );
    }

    /// Draw all indices.
    ///
    /// # Safety
    /// `bind` must have been recorded on `cmd` first.
    pub unsafe fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
    }

    /// Scene submesh this was built from.
    pub fn source(&self) -> SubMeshId {
        self.source
    }

    /// Material the submesh referenced at rebuild time.
    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Free all buffers. The descriptor set returns to its pool on the
    /// next reset.
    ///
    /// # Safety
    /// The buffers must not be referenced by in-flight work.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        let mut allocator = ctx.allocator().lock();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        allocator.free_buffer(&mut self.index_buffer)?;
        allocator.free_buffer(&mut self.object_uniform)?;
        Ok(())
    }
}

/// Interleave submesh attribute arrays into the vertex layout.
///
/// Attribute arrays shorter than the position array are padded with the
/// defaults: normal +Z, uv zero, color white.
pub fn interleave_vertices(submesh: &SubMesh) -> Vec<GpuVertex> {
    submesh
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| GpuVertex {
            position,
            normal: submesh.normals.get(i).copied().unwrap_or(Vec3::Z),
            uv: submesh.uvs.get(i).copied().unwrap_or(Vec2::ZERO),
            color: submesh.colors.get(i).copied().unwrap_or(Vec4::ONE),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SubMesh {
        SubMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2])
    }

    #[test]
    fn missing_attributes_take_defaults() {
        let vertices = interleave_vertices(&triangle());
        assert_eq!(vertices.len(), 3);
        for vertex in &vertices {
            assert_eq!(vertex.normal, Vec3::Z);
            assert_eq!(vertex.uv, Vec2::ZERO);
            assert_eq!(vertex.color, Vec4::ONE);
        }
    }

    #[test]
    fn present_attributes_are_interleaved() {
        let mut submesh = triangle();
        submesh.normals = vec![Vec3::Y, Vec3::Y, Vec3::Y];
        submesh.uvs = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        submesh.colors = vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 3];

        let vertices = interleave_vertices(&submesh);
        assert_eq!(vertices[1].position, Vec3::X);
        assert_eq!(vertices[1].normal, Vec3::Y);
        assert_eq!(vertices[1].uv, Vec2::X);
        assert_eq!(vertices[2].color, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn short_attribute_arrays_pad_the_tail() {
        let mut submesh = triangle();
        submesh.normals = vec![Vec3::X];

        let vertices = interleave_vertices(&submesh);
        assert_eq!(vertices[0].normal, Vec3::X);
        assert_eq!(vertices[1].normal, Vec3::Z);
        assert_eq!(vertices[2].normal, Vec3::Z);
    }
}
