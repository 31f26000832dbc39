//! Frames-in-flight bookkeeping and per-slot GPU resources.

use ash::vk;
use prism_gpu::{DeviceContext, FrameSync};

use crate::error::Result;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Waits the caller must perform before recording into a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    /// Slot whose command buffer and sync objects this frame uses.
    pub slot: usize,
    /// An older slot still draining the acquired image; its fence must
    /// be waited as well before recording.
    pub extra_wait: Option<usize>,
}

/// Pure slot and image-ownership bookkeeping for the frame loop.
///
/// The ring never touches the device; the renderer performs the waits
/// the returned [`FramePlan`] directs.
pub struct FrameRing {
    current: usize,
    images_in_flight: Vec<Option<usize>>,
}

impl FrameRing {
    pub fn new(image_count: usize) -> Self {
        Self {
            current: 0,
            images_in_flight: vec![None; image_count],
        }
    }

    /// Slot the next frame will record into.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Claim `image_index` for the current slot.
    ///
    /// Returns the extra fence wait needed when an older slot still owns
    /// the image.
    pub fn begin_frame(&mut self, image_index: usize) -> FramePlan {
        let extra_wait = self.images_in_flight[image_index].filter(|&slot| slot != self.current);
        self.images_in_flight[image_index] = Some(self.current);

        FramePlan {
            slot: self.current,
            extra_wait,
        }
    }

    /// Advance to the next slot after submit and present.
    pub fn end_frame(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Forget image ownership after a swapchain recreation.
    ///
    /// Old images die with the old swapchain, so their slot associations
    /// are meaningless for the replacement.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, None);
    }
}

/// Per-slot command buffers and sync primitives plus the ring.
pub struct Frame {
    commands: Vec<vk::CommandBuffer>,
    sync: Vec<FrameSync>,
    ring: FrameRing,
}

impl Frame {
    /// Allocate one command buffer and one sync bundle per slot.
    pub fn new(ctx: &DeviceContext, image_count: usize) -> Result<Self> {
        let device = ctx.device();
        let commands = unsafe {
            ctx.graphics_pool()
                .allocate_primaries(device, MAX_FRAMES_IN_FLIGHT as u32)?
        };

        let mut sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            sync.push(unsafe { FrameSync::new(device)? });
        }

        Ok(Self {
            commands,
            sync,
            ring: FrameRing::new(image_count),
        })
    }

    pub fn command(&self, slot: usize) -> vk::CommandBuffer {
        self.commands[slot]
    }

    pub fn sync(&self, slot: usize) -> &FrameSync {
        &self.sync[slot]
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut FrameRing {
        &mut self.ring
    }

    /// Free the command buffers and destroy the sync objects.
    ///
    /// # Safety
    /// No slot may have work in flight.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        ctx.graphics_pool().free(device, &self.commands);
        self.commands.clear();
        for sync in self.sync.drain(..) {
            sync.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// CPU model of the per-slot fences: `Some(n)` means submission `n`
    /// has not been waited yet.
    struct FenceModel {
        pending: [Option<u64>; MAX_FRAMES_IN_FLIGHT],
        next_submission: u64,
    }

    impl FenceModel {
        fn new() -> Self {
            Self {
                pending: [None; MAX_FRAMES_IN_FLIGHT],
                next_submission: 0,
            }
        }

        fn wait(&mut self, slot: usize) {
            self.pending[slot] = None;
        }

        fn submit(&mut self, slot: usize) {
            self.pending[slot] = Some(self.next_submission);
            self.next_submission += 1;
        }

        fn outstanding(&self) -> usize {
            self.pending.iter().filter(|p| p.is_some()).count()
        }
    }

    #[test]
    fn slots_alternate() {
        let mut ring = FrameRing::new(3);
        let first = ring.begin_frame(0);
        ring.end_frame();
        let second = ring.begin_frame(1);
        ring.end_frame();
        let third = ring.begin_frame(2);

        assert_eq!(first.slot, 0);
        assert_eq!(second.slot, 1);
        assert_eq!(third.slot, 0);
    }

    #[test]
    fn outstanding_submissions_never_exceed_slot_count() {
        let mut ring = FrameRing::new(3);
        let mut fences = FenceModel::new();

        // Images repeat in an arbitrary pattern over many frames.
        let images = [0usize, 1, 2, 0, 2, 1, 0, 0, 1, 2, 2, 1];
        for &image in images.iter().cycle().take(120) {
            let plan = ring.begin_frame(image);
            fences.wait(plan.slot);
            if let Some(extra) = plan.extra_wait {
                fences.wait(extra);
            }
            fences.submit(plan.slot);
            ring.end_frame();

            assert!(fences.outstanding() <= MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn reacquired_image_waits_prior_owner() {
        let mut ring = FrameRing::new(2);

        // Slot 0 takes image 0, slot 1 re-acquires it next frame.
        let first = ring.begin_frame(0);
        assert_eq!(first.extra_wait, None);
        ring.end_frame();

        let second = ring.begin_frame(0);
        assert_eq!(second.slot, 1);
        assert_eq!(second.extra_wait, Some(0));
    }

    #[test]
    fn image_owned_by_current_slot_needs_no_extra_wait() {
        let mut ring = FrameRing::new(1);

        // A single image bounces between both slots; after a full cycle
        // the current slot already owns it again.
        ring.begin_frame(0);
        ring.end_frame();
        ring.begin_frame(0);
        ring.end_frame();

        let plan = ring.begin_frame(0);
        assert_eq!(plan.slot, 0);
        assert_eq!(plan.extra_wait, Some(1));
        ring.end_frame();

        // Re-begin on the same slot without an intervening end.
        let mut ring = FrameRing::new(1);
        ring.begin_frame(0);
        let again = ring.begin_frame(0);
        assert_eq!(again.extra_wait, None);
    }

    #[test]
    fn reset_forgets_stale_ownership() {
        let mut ring = FrameRing::new(2);
        ring.begin_frame(1);
        ring.end_frame();

        ring.reset_images(3);
        let plan = ring.begin_frame(1);
        assert_eq!(plan.extra_wait, None);
    }
}
