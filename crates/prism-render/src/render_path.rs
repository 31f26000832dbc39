//! Render path dispatch.

use ash::vk;
use prism_gpu::{DeviceContext, Swapchain};

use crate::config::PathKind;
use crate::deferred_path::DeferredPath;
use crate::error::Result;
use crate::forward_path::ForwardPath;
use crate::render_scene::RenderScene;

/// The active render path.
///
/// A closed enum keeps dispatch static; both variants share the same
/// frame surface: draw into the acquired image, resize with the
/// swapchain, expose the swapchain-writing pass for overlays.
pub enum RenderPath {
    Forward(ForwardPath),
    Deferred(DeferredPath),
}

impl RenderPath {
    /// Create the configured path at the swapchain's extent.
    pub fn new(ctx: &DeviceContext, swapchain: &Swapchain, kind: PathKind) -> Result<Self> {
        Ok(match kind {
            PathKind::Forward => Self::Forward(ForwardPath::new(ctx, swapchain)?),
            PathKind::Deferred => Self::Deferred(DeferredPath::new(ctx, swapchain)?),
        })
    }

    /// Record the frame for the acquired image.
    ///
    /// # Safety
    /// The command buffer must be recording and `image_index` must be
    /// the image acquired for this frame.
    pub unsafe fn draw(
        &self,
        ctx: &DeviceContext,
        cmd: vk::CommandBuffer,
        image_index: usize,
        scene: &RenderScene,
        hooks: &mut [Box<dyn FnMut(vk::CommandBuffer)>],
    ) -> Result<()> {
        match self {
            Self::Forward(path) => path.draw(ctx, cmd, image_index, scene, hooks),
            Self::Deferred(path) => path.draw(ctx, cmd, image_index, scene, hooks),
        }
    }

    /// Rebuild for a recreated swapchain.
    pub fn resize(&mut self, ctx: &DeviceContext, swapchain: &Swapchain) -> Result<()> {
        match self {
            Self::Forward(path) => path.resize(ctx, swapchain),
            Self::Deferred(path) => path.resize(ctx, swapchain),
        }
    }

    /// The swapchain-writing pass, for overlay pipeline creation.
    pub fn ui_render_pass(&self) -> vk::RenderPass {
        match self {
            Self::Forward(path) => path.ui_render_pass(),
            Self::Deferred(path) => path.ui_render_pass(),
        }
    }

    /// Destroy the path's pipelines, passes, and attachments.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        match self {
            Self::Forward(path) => path.destroy(ctx),
            Self::Deferred(path) => path.destroy(ctx),
        }
    }
}
