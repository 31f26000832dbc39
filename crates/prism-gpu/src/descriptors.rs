//! Descriptor set management.

use crate::error::{GpuError, Result};
use ash::vk;

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a binding.
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags),
        );
        self
    }

    /// Add a uniform buffer binding.
    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    /// Add a combined image sampler binding.
    pub fn sampled_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1,
            stage_flags,
        )
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);

        let layout = device.create_descriptor_set_layout(&layout_info, None)?;
        Ok(DescriptorSetLayout { layout })
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned descriptor set layout.
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Get the raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Destroy the layout.
    ///
    /// # Safety
    /// The device must be valid and no pipeline may still reference the layout.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_set_layout(self.layout, None);
    }
}

/// Set-count bookkeeping for a descriptor pool.
///
/// Tracked on the CPU so exhaustion is reported before the Vulkan pool
/// is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacity {
    max_sets: u32,
    allocated: u32,
}

impl PoolCapacity {
    /// Create capacity tracking for `max_sets` sets.
    pub fn new(max_sets: u32) -> Self {
        Self {
            max_sets,
            allocated: 0,
        }
    }

    /// Total number of sets the pool can hold.
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Number of sets currently allocated.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Number of sets still available.
    pub fn available(&self) -> u32 {
        self.max_sets - self.allocated
    }

    /// Reserve `count` sets, failing without state change if they do not fit.
    pub fn try_reserve(&mut self, count: u32) -> Result<()> {
        if self.allocated + count > self.max_sets {
            return Err(GpuError::DescriptorPoolExhausted {
                requested: count,
                available: self.available(),
                capacity: self.max_sets,
            });
        }
        self.allocated += count;
        Ok(())
    }

    /// Return `count` sets to the pool.
    pub fn release(&mut self, count: u32) {
        self.allocated = self.allocated.saturating_sub(count);
    }

    /// Return all sets to the pool.
    pub fn release_all(&mut self) {
        self.allocated = 0;
    }
}

/// Descriptor pool with tracked capacity.
///
/// Sets are never freed individually; they return to the pool via `reset`.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    capacity: PoolCapacity,
}

impl DescriptorPool {
    /// Create a new descriptor pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = device.create_descriptor_pool(&create_info, None)?;
        Ok(Self {
            pool,
            capacity: PoolCapacity::new(max_sets),
        })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Get the current capacity state.
    pub fn capacity(&self) -> &PoolCapacity {
        &self.capacity
    }

    /// Allocate a single descriptor set.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(
        &mut self,
        device: &ash::Device,
        layout: &DescriptorSetLayout,
    ) -> Result<DescriptorSet> {
        let sets = self.allocate_batch(device, &[layout.handle()])?;
        Ok(sets[0])
    }

    /// Allocate one set per layout.
    ///
    /// Fails with the pool untouched when the request exceeds the
    /// remaining capacity.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate_batch(
        &mut self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<DescriptorSet>> {
        let count = layouts.len() as u32;
        self.capacity.try_reserve(count)?;

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        match device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => Ok(sets.into_iter().map(|set| DescriptorSet { set }).collect()),
            Err(e) => {
                self.capacity.release(count);
                Err(GpuError::from(e))
            }
        }
    }

    /// Reset the pool, returning all descriptor sets.
    ///
    /// # Safety
    /// The device must be valid and no descriptor sets must be in use.
    pub unsafe fn reset(&mut self, device: &ash::Device) -> Result<()> {
        device.reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        self.capacity.release_all();
        Ok(())
    }

    /// Destroy the pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.pool, None);
    }
}

/// A descriptor set allocated from a pool.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSet {
    set: vk::DescriptorSet,
}

impl DescriptorSet {
    /// Get the raw set handle.
    pub fn handle(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Point a buffer binding at the whole of `buffer`.
    ///
    /// # Safety
    /// Device and buffer must be valid.
    pub unsafe fn update_buffer(
        &self,
        device: &ash::Device,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
    ) {
        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(0)
            .range(vk::WHOLE_SIZE);

        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(descriptor_type)
            .buffer_info(std::slice::from_ref(&buffer_info));

        device.update_descriptor_sets(&[write], &[]);
    }

    /// Point a combined image sampler binding at `view` + `sampler`.
    ///
    /// The image is expected in `SHADER_READ_ONLY_OPTIMAL` when sampled.
    ///
    /// # Safety
    /// Device, view, and sampler must be valid.
    pub unsafe fn update_image(
        &self,
        device: &ash::Device,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(view)
            .sampler(sampler)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));

        device.update_descriptor_sets(&[write], &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_up_to_capacity_succeeds() {
        let mut capacity = PoolCapacity::new(10);
        for _ in 0..10 {
            capacity.try_reserve(1).unwrap();
        }
        assert_eq!(capacity.allocated(), 10);
        assert_eq!(capacity.available(), 0);
    }

    #[test]
    fn reserve_past_capacity_fails_without_state_change() {
        let mut capacity = PoolCapacity::new(10);
        capacity.try_reserve(10).unwrap();

        let err = capacity.try_reserve(1).unwrap_err();
        assert!(matches!(
            err,
            GpuError::DescriptorPoolExhausted {
                requested: 1,
                available: 0,
                capacity: 10,
            }
        ));
        assert_eq!(capacity.allocated(), 10);
    }

    #[test]
    fn batch_reserve_checks_whole_request() {
        let mut capacity = PoolCapacity::new(10);
        capacity.try_reserve(8).unwrap();

        // 3 more would overflow; the count must stay at 8
        assert!(capacity.try_reserve(3).is_err());
        assert_eq!(capacity.allocated(), 8);

        capacity.try_reserve(2).unwrap();
        assert_eq!(capacity.available(), 0);
    }

    #[test]
    fn release_all_restores_capacity() {
        let mut capacity = PoolCapacity::new(4);
        capacity.try_reserve(4).unwrap();
        capacity.release_all();
        assert_eq!(capacity.allocated(), 0);
        capacity.try_reserve(4).unwrap();
    }
}
