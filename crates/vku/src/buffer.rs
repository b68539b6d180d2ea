// SPDX-License-Identifier: CEPL-1.0
use crate::device::{DeviceContext, MEMORY_TYPE_NOT_FOUND};
use crate::driver::{AshDriver, Driver};
use crate::error::{Error, Result};
use crate::handle::HandleBox;
use ash::vk;
use bytemuck::Pod;
use std::ffi::c_void;

/// Host-visible, host-coherent buffer with its own allocation.
pub struct Buffer<D: Driver = AshDriver> {
    buffer: HandleBox<vk::Buffer, D>,
    memory: HandleBox<vk::DeviceMemory, D>,
    device: D,
    size: vk::DeviceSize,
}

impl<D: Driver> Buffer<D> {
    pub const MEMORY_FLAGS: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    pub fn new(ctx: &DeviceContext<D>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Result<Self> {
        let device = ctx.driver();
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = HandleBox::adopt(device.create_buffer(&info)?, device);

        let req = device.buffer_memory_requirements(buffer.raw());
        let type_index = ctx.resolve_memory_type(req.memory_type_bits, Self::MEMORY_FLAGS);
        if type_index == MEMORY_TYPE_NOT_FOUND {
            return Err(Error::NoMemoryType {
                type_bits: req.memory_type_bits,
                required: Self::MEMORY_FLAGS,
            });
        }
        let alloc = vk::MemoryAllocateInfo::default()
            .allocation_size(req.size)
            .memory_type_index(type_index);
        let memory = HandleBox::adopt(device.allocate_memory(&alloc)?, device);
        device.bind_buffer_memory(buffer.raw(), memory.raw())?;

        Ok(Self {
            buffer,
            memory,
            device: device.clone(),
            size,
        })
    }

    /// Creates a buffer sized for `data` and uploads it.
    pub fn from_slice<T: Pod>(
        ctx: &DeviceContext<D>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = Self::new(ctx, bytes.len() as vk::DeviceSize, usage)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Copies `data` to the start of the buffer.
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len() as vk::DeviceSize;
        if len > self.size {
            return Err(Error::BufferOverflow {
                len,
                size: self.size,
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let dst = self.map()?;
        // SAFETY: the mapping covers the whole buffer and `len <= size`.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len()) };
        self.unmap();
        Ok(())
    }

    /// Maps the whole allocation. Pair with [`unmap`](Self::unmap).
    pub fn map(&self) -> Result<*mut c_void> {
        Ok(self.device.map_memory(self.memory.raw(), self.size)?)
    }

    pub fn unmap(&self) {
        self.device.unmap_memory(self.memory.raw());
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.raw(),
            offset: 0,
            range: self.size,
        }
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer.raw()
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory.raw()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}
