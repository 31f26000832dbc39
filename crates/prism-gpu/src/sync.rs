//! Synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Binary semaphore for GPU-GPU ordering.
pub struct Semaphore {
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a semaphore.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = device.create_semaphore(&create_info, None)?;
        Ok(Self { semaphore })
    }

    /// Get the raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Destroy the semaphore.
    ///
    /// # Safety
    /// The device must be valid and the semaphore must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.semaphore, None);
    }
}

/// Fence for GPU-CPU synchronization.
pub struct Fence {
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally in the signaled state.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = device.create_fence(&create_info, None)?;
        Ok(Self { fence })
    }

    /// Get the raw fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until the fence is signaled.
    ///
    /// # Safety
    /// The device and fence must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        self.wait_timeout(device, u64::MAX)
    }

    /// Block until the fence is signaled or the timeout elapses.
    ///
    /// # Safety
    /// The device and fence must be valid.
    pub unsafe fn wait_timeout(&self, device: &ash::Device, timeout_ns: u64) -> Result<()> {
        device.wait_for_fences(&[self.fence], true, timeout_ns)?;
        Ok(())
    }

    /// Query whether the fence is currently signaled without blocking.
    ///
    /// # Safety
    /// The device and fence must be valid.
    pub unsafe fn is_signaled(&self, device: &ash::Device) -> Result<bool> {
        Ok(device.get_fence_status(self.fence)?)
    }

    /// Reset the fence to the unsignaled state.
    ///
    /// # Safety
    /// The device and fence must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device.reset_fences(&[self.fence])?;
        Ok(())
    }

    /// Destroy the fence.
    ///
    /// # Safety
    /// The device must be valid and the fence must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_fence(self.fence, None);
    }
}

/// Synchronization resources for one frame slot.
pub struct FrameSync {
    /// Semaphore signaled when the swapchain image is available.
    pub image_available: Semaphore,
    /// Semaphore signaled when rendering is complete.
    pub render_finished: Semaphore,
    /// Fence signaled when the slot's submission has retired.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// The fence starts signaled so the first wait on a fresh slot
    /// returns immediately.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Destroy synchronization resources.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.image_available.destroy(device);
        self.render_finished.destroy(device);
        self.in_flight.destroy(device);
    }
}
