// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Ownership tracking and protocol sequencing over `ash`.
//!
//! Objects are wrapped in [`HandleBox`] and destroyed exactly once by whoever
//! owns them. Everything that talks to the driver goes through [`Driver`], so
//! the swapchain and recording protocols can run against a simulated device.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod driver;
pub mod error;
pub mod handle;
pub mod image;
pub mod instance;
pub mod pass;
pub mod pipeline;
pub mod queue;
pub mod surface;
pub mod swapchain;

pub use ash;
pub use ash::vk;

pub use buffer::Buffer;
pub use command::{layout_barrier, CommandRecorder};
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use device::{DeviceContext, MEMORY_TYPE_NOT_FOUND};
pub use driver::{AshDriver, Driver};
pub use error::{status_name, Error, Result};
pub use handle::{CommandPool, Create, Fence, HandleBox, Semaphore};
pub use image::DepthBuffer;
pub use instance::{pick_device, Instance};
pub use pass::{Framebuffers, RenderPass};
pub use pipeline::{Pipeline, VertexInputState};
pub use queue::Queue;
pub use surface::Surface;
pub use swapchain::{Swapchain, SwapchainImage};
