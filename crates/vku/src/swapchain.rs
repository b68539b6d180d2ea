// SPDX-License-Identifier: CEPL-1.0
//! Present chain negotiation, per-image views and presentation.
//!
//! The recorder handed to [`Swapchain::new`] must already be recording; the
//! caller ends and submits it once the chain is built so the layout
//! transitions actually execute.

use crate::command::CommandRecorder;
use crate::device::DeviceContext;
use crate::driver::{AshDriver, Driver};
use crate::error::{Error, Result};
use crate::handle::HandleBox;
use crate::queue::Queue;
use ash::vk;
use tracing::{debug, info};

pub const SURFACE_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
pub const SURFACE_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// `current_extent.width == u32::MAX` means the surface lets the chain pick
/// its size; the requested size is used as is.
pub fn resolve_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D { width, height }
    } else {
        caps.current_extent
    }
}

/// MAILBOX, then IMMEDIATE, then FIFO (which every implementation supports).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// One more than the minimum, clamped to the maximum (0 = unbounded).
pub fn desired_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::MAILBOX => "mailbox",
        vk::PresentModeKHR::IMMEDIATE => "immediate",
        vk::PresentModeKHR::FIFO => "fifo",
        vk::PresentModeKHR::FIFO_RELAXED => "fifo_relaxed",
        _ => "other",
    }
}

/// Suboptimal counts as failure; the caller decides whether to recreate.
fn check_suboptimal(suboptimal: bool) -> Result<()> {
    if suboptimal {
        Err(Error::Vk(vk::Result::SUBOPTIMAL_KHR))
    } else {
        Ok(())
    }
}

/// A chain image (owned by the chain) and the view created over it.
pub struct SwapchainImage<D: Driver = AshDriver> {
    image: HandleBox<vk::Image, D>,
    view: HandleBox<vk::ImageView, D>,
}

impl<D: Driver> SwapchainImage<D> {
    pub fn image(&self) -> vk::Image {
        self.image.raw()
    }

    pub fn view(&self) -> vk::ImageView {
        self.view.raw()
    }
}

pub struct Swapchain<D: Driver = AshDriver> {
    // views must go before the chain that owns their images
    images: Vec<SwapchainImage<D>>,
    chain: HandleBox<vk::SwapchainKHR, D>,
    device: D,
    surface: vk::SurfaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl<D: Driver> Swapchain<D> {
    pub fn new(
        ctx: &DeviceContext<D>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        recorder: &CommandRecorder<D>,
    ) -> Result<Self> {
        Self::build(ctx, surface, width, height, recorder, vk::SwapchainKHR::null())
    }

    /// Builds a replacement against the same surface. The old chain is
    /// passed as `old_swapchain` and destroyed as soon as creation returns,
    /// whether it succeeded or not. Drain the queue before calling.
    pub fn recreate(
        self,
        ctx: &DeviceContext<D>,
        width: u32,
        height: u32,
        recorder: &CommandRecorder<D>,
    ) -> Result<Self> {
        let next = Self::build(ctx, self.surface, width, height, recorder, self.raw());
        drop(self);
        next
    }

    /// Builds a chain (or replaces `previous`, see [`recreate`](Self::recreate))
    /// and runs its layout transitions: begins `recorder`, records, ends it,
    /// submits it on `queue` and waits for the queue to drain.
    ///
    /// The recorder is closed again even if building the chain fails, so it
    /// can be reused for the next attempt. With no `previous` chain a fresh
    /// one is created against `surface`.
    pub fn create_submitted(
        ctx: &DeviceContext<D>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        previous: Option<Self>,
        recorder: &CommandRecorder<D>,
        queue: &Queue<D>,
    ) -> Result<Self> {
        recorder.begin()?;
        let built = match previous {
            Some(old) => old.recreate(ctx, width, height, recorder),
            None => Self::new(ctx, surface, width, height, recorder),
        };
        recorder.end()?;
        let chain = built?;
        queue.submit(None, recorder.raw())?;
        queue.wait_idle()?;
        Ok(chain)
    }

    fn build(
        ctx: &DeviceContext<D>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        recorder: &CommandRecorder<D>,
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let device = ctx.driver();
        let caps = device.surface_capabilities(ctx.physical_device(), surface)?;
        let modes = device.surface_present_modes(ctx.physical_device(), surface)?;

        let extent = resolve_extent(&caps, width, height);
        let present_mode = choose_present_mode(&modes);
        let min_images = desired_image_count(&caps);

        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(min_images)
            .image_format(SURFACE_FORMAT)
            .image_color_space(SURFACE_COLOR_SPACE)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(choose_pre_transform(&caps))
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old);

        let chain = HandleBox::adopt(device.create_swapchain(&info)?, device);

        let raw_images = device.swapchain_images(chain.raw())?;
        let mut images = Vec::with_capacity(raw_images.len());
        for (i, &image) in raw_images.iter().enumerate() {
            recorder.transition_layout(
                image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(SURFACE_FORMAT)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::R,
                    g: vk::ComponentSwizzle::G,
                    b: vk::ComponentSwizzle::B,
                    a: vk::ComponentSwizzle::A,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = HandleBox::adopt(device.create_image_view(&view_info)?, device);
            debug!(index = i, "swapchain image view created");

            images.push(SwapchainImage {
                image: HandleBox::wrap(image, device),
                view,
            });
        }

        info!(
            "swapchain ready ({}x{}, {} images, {}, requested {})",
            extent.width,
            extent.height,
            images.len(),
            present_mode_name(present_mode),
            min_images,
        );

        Ok(Self {
            images,
            chain,
            device: device.clone(),
            surface,
            extent,
            present_mode,
        })
    }

    /// Blocks until an image is available and returns its index.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> Result<u32> {
        let (index, suboptimal) = self.device.acquire_next_image(self.raw(), signal)?;
        check_suboptimal(suboptimal)?;
        Ok(index)
    }

    /// Queues `image_index` for presentation. No wait semaphores, no retry.
    pub fn present(&self, queue: &Queue<D>, image_index: u32) -> Result<()> {
        let chain = self.raw();
        let info = vk::PresentInfoKHR::default()
            .swapchains(std::slice::from_ref(&chain))
            .image_indices(std::slice::from_ref(&image_index));
        let suboptimal = self.device.queue_present(queue.raw(), &info)?;
        check_suboptimal(suboptimal)
    }

    pub fn raw(&self) -> vk::SwapchainKHR {
        self.chain.raw()
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        SURFACE_FORMAT
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[SwapchainImage<D>] {
        &self.images
    }

    /// Panics if `i` is out of range.
    pub fn image(&self, i: usize) -> vk::Image {
        self.images[i].image()
    }

    /// Panics if `i` is out of range.
    pub fn view(&self, i: usize) -> vk::ImageView {
        self.images[i].view()
    }
}
