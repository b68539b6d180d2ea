// SPDX-License-Identifier: CEPL-1.0
use crate::device::{DeviceContext, MEMORY_TYPE_NOT_FOUND};
use crate::driver::{AshDriver, Driver};
use crate::error::{Error, Result};
use crate::handle::HandleBox;
use ash::vk;
use tracing::debug;

/// Depth formats that also carry a stencil aspect.
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Device-local depth attachment in the best format the device offers.
pub struct DepthBuffer<D: Driver = AshDriver> {
    view: HandleBox<vk::ImageView, D>,
    image: HandleBox<vk::Image, D>,
    memory: HandleBox<vk::DeviceMemory, D>,
    format: vk::Format,
}

impl<D: Driver> DepthBuffer<D> {
    pub fn new(ctx: &DeviceContext<D>, width: u32, height: u32) -> Result<Self> {
        let format = ctx.resolve_depth_format();
        if format == vk::Format::UNDEFINED {
            return Err(Error::NoDepthFormat);
        }
        let device = ctx.driver();

        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = HandleBox::adopt(device.create_image(&info)?, device);

        let req = device.image_memory_requirements(image.raw());
        let required = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        let type_index = ctx.resolve_memory_type(req.memory_type_bits, required);
        if type_index == MEMORY_TYPE_NOT_FOUND {
            return Err(Error::NoMemoryType {
                type_bits: req.memory_type_bits,
                required,
            });
        }
        let alloc = vk::MemoryAllocateInfo::default()
            .allocation_size(req.size)
            .memory_type_index(type_index);
        let memory = HandleBox::adopt(device.allocate_memory(&alloc)?, device);
        device.bind_image_memory(image.raw(), memory.raw())?;

        let mut aspect = vk::ImageAspectFlags::DEPTH;
        if has_stencil(format) {
            aspect |= vk::ImageAspectFlags::STENCIL;
        }
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.raw())
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = HandleBox::adopt(device.create_image_view(&view_info)?, device);
        debug!(?format, width, height, "depth buffer created");

        Ok(Self {
            view,
            image,
            memory,
            format,
        })
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn image(&self) -> vk::Image {
        self.image.raw()
    }

    pub fn view(&self) -> vk::ImageView {
        self.view.raw()
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory.raw()
    }
}
