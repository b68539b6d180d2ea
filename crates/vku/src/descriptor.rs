// SPDX-License-Identifier: CEPL-1.0
//! The one descriptor shape this layer supports: a uniform buffer at
//! binding 0, visible to the vertex stage.

use crate::buffer::Buffer;
use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use crate::handle::HandleBox;
use ash::vk;

pub const UNIFORM_BINDING: u32 = 0;
pub const POOL_UNIFORM_DESCRIPTORS: u32 = 2;
pub const POOL_MAX_SETS: u32 = 2;

pub struct DescriptorSetLayout<D: Driver = AshDriver> {
    raw: HandleBox<vk::DescriptorSetLayout, D>,
}

impl<D: Driver> DescriptorSetLayout<D> {
    pub fn uniform(device: &D) -> Result<Self> {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX);
        let info =
            vk::DescriptorSetLayoutCreateInfo::default().bindings(std::slice::from_ref(&binding));
        let raw = device.create_descriptor_set_layout(&info)?;
        Ok(Self {
            raw: HandleBox::adopt(raw, device),
        })
    }

    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.raw.raw()
    }
}

/// Sets allocated here are freed with the pool.
pub struct DescriptorPool<D: Driver = AshDriver> {
    raw: HandleBox<vk::DescriptorPool, D>,
    device: D,
}

impl<D: Driver> DescriptorPool<D> {
    pub fn new(device: &D) -> Result<Self> {
        let sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: POOL_UNIFORM_DESCRIPTORS,
        }];
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&sizes)
            .max_sets(POOL_MAX_SETS);
        let raw = device.create_descriptor_pool(&info)?;
        Ok(Self {
            raw: HandleBox::adopt(raw, device),
            device: device.clone(),
        })
    }

    pub fn raw(&self) -> vk::DescriptorPool {
        self.raw.raw()
    }

    pub fn allocate(&self, layout: &DescriptorSetLayout<D>) -> Result<vk::DescriptorSet> {
        Ok(self.device.allocate_descriptor_set(self.raw(), layout.raw())?)
    }

    /// Points binding 0 of `set` at the whole of `buffer`.
    pub fn write_uniform(&self, set: vk::DescriptorSet, buffer: &Buffer<D>) {
        let info = buffer.descriptor_info();
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&info));
        self.device.update_descriptor_sets(std::slice::from_ref(&write));
    }
}
