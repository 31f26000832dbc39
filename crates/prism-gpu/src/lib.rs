//! Vulkan abstraction layer for the Prism renderer.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Images, layout transitions, and samplers
//! - Descriptor pools with tracked capacity
//! - Render pass, framebuffer, and pipeline wrappers
//! - Swapchain handling

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod renderpass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{DeviceContext, DeviceContextBuilder};
pub use descriptors::{
    DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBuilder, PoolCapacity,
};
pub use error::{GpuError, Result};
pub use image::{GpuImage, Sampler};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use renderpass::{RenderPass, RenderPassConfig};
pub use shader::ShaderModule;
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
