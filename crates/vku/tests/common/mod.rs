// SPDX-License-Identifier: CEPL-1.0
//! A simulated single-GPU device that records every call made through the
//! `Driver` seam.

#![allow(dead_code)]

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;
use vku::Driver;

/// x, y, width, height
pub type Rect = (i32, i32, u32, u32);

fn rect(r: &vk::Rect2D) -> Rect {
    (r.offset.x, r.offset.y, r.extent.width, r.extent.height)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cmd {
    Begin,
    End,
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: Rect,
        clear_color: [f32; 4],
        clear_depth: f32,
        clear_stencil: u32,
    },
    EndRenderPass,
    /// x, y, width, height, min depth, max depth
    Viewport([f32; 6]),
    Scissor(Rect),
    Barrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
        image: vk::Image,
    },
    BindPipeline(vk::Pipeline),
    BindDescriptorSet(vk::PipelineLayout, vk::DescriptorSet),
    BindVertexBuffer(u32, vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    DrawIndexed(u32, u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitRecord {
    pub queue: vk::Queue,
    pub waits: Vec<vk::Semaphore>,
    pub stages: Vec<vk::PipelineStageFlags>,
    pub buffers: Vec<vk::CommandBuffer>,
    pub signals: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PresentRecord {
    pub queue: vk::Queue,
    pub chains: Vec<vk::SwapchainKHR>,
    pub indices: Vec<u32>,
    pub waits: u32,
}

#[derive(Clone, Debug)]
pub struct ChainRecord {
    pub handle: vk::SwapchainKHR,
    pub old: vk::SwapchainKHR,
    pub min_image_count: u32,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub clipped: bool,
}

pub struct State {
    next_handle: u64,
    pub created: Vec<(vk::ObjectType, u64)>,
    pub destroyed: Vec<(vk::ObjectType, u64)>,
    pub memory_props: vk::PhysicalDeviceMemoryProperties,
    pub depth_formats: Vec<vk::Format>,
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// How many images the "driver" hands back per chain.
    pub image_count: u32,
    pub chains: Vec<ChainRecord>,
    chain_images: HashMap<u64, Vec<vk::Image>>,
    pub view_targets: Vec<vk::Image>,
    pub commands: Vec<Cmd>,
    pub submits: Vec<SubmitRecord>,
    pub presents: Vec<PresentRecord>,
    pub present_result: VkResult<bool>,
    pub acquire_result: VkResult<(u32, bool)>,
    pub swapchain_failure: Option<vk::Result>,
    /// Status returned by the named driver call instead of success.
    pub fail: HashMap<&'static str, vk::Result>,
    /// Number of image views that succeed before `create_image_view` fails
    /// with `fail["create_image_view"]`.
    pub views_before_failure: usize,
    pub descriptor_writes: Vec<(vk::DescriptorSet, u32, vk::Buffer)>,
    pub queue_waits: u32,
    pub device_waits: u32,
    buffer_sizes: HashMap<u64, vk::DeviceSize>,
    memory: HashMap<u64, Vec<u8>>,
}

#[derive(Clone)]
pub struct MockDriver {
    pub state: Rc<RefCell<State>>,
}

pub const UNDEFINED_EXTENT: vk::Extent2D = vk::Extent2D {
    width: u32::MAX,
    height: u32::MAX,
};

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        let mut memory_props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            ..Default::default()
        };
        memory_props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_props.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: UNDEFINED_EXTENT,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        };

        Self {
            state: Rc::new(RefCell::new(State {
                next_handle: 0x1000,
                created: Vec::new(),
                destroyed: Vec::new(),
                memory_props,
                depth_formats: vec![vk::Format::D32_SFLOAT, vk::Format::D16_UNORM],
                caps,
                present_modes: vec![vk::PresentModeKHR::FIFO],
                image_count: 2,
                chains: Vec::new(),
                chain_images: HashMap::new(),
                view_targets: Vec::new(),
                commands: Vec::new(),
                submits: Vec::new(),
                presents: Vec::new(),
                present_result: Ok(false),
                acquire_result: Ok((0, false)),
                swapchain_failure: None,
                fail: HashMap::new(),
                views_before_failure: 0,
                descriptor_writes: Vec::new(),
                queue_waits: 0,
                device_waits: 0,
                buffer_sizes: HashMap::new(),
                memory: HashMap::new(),
            })),
        }
    }

    pub fn physical() -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(0xD0)
    }

    pub fn surface() -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5F)
    }

    pub fn queue() -> vk::Queue {
        vk::Queue::from_raw(0x0E)
    }

    pub fn command_buffer() -> vk::CommandBuffer {
        vk::CommandBuffer::from_raw(0xCB)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub fn destroy_count(&self, raw: u64) -> usize {
        self.with(|s| s.destroyed.iter().filter(|(_, r)| *r == raw).count())
    }

    /// Created objects not yet destroyed.
    pub fn live(&self) -> Vec<(vk::ObjectType, u64)> {
        self.with(|s| {
            s.created
                .iter()
                .filter(|c| !s.destroyed.contains(c))
                .copied()
                .collect()
        })
    }

    pub fn take_commands(&self) -> Vec<Cmd> {
        self.with(|s| std::mem::take(&mut s.commands))
    }

    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.with(|s| s.memory.get(&memory.as_raw()).cloned().unwrap_or_default())
    }

    fn mint<T: Handle>(&self) -> T {
        self.with(|s| {
            let raw = s.next_handle;
            s.next_handle += 1;
            s.created.push((T::TYPE, raw));
            T::from_raw(raw)
        })
    }

    /// Handles freed with their parent (command buffers, descriptor sets)
    /// are not tracked as live objects.
    fn mint_child<T: Handle>(&self) -> T {
        self.with(|s| {
            let raw = s.next_handle;
            s.next_handle += 1;
            T::from_raw(raw)
        })
    }

    /// Injected failure for `call`, if any.
    fn check(&self, call: &'static str) -> VkResult<()> {
        match self.with(|s| s.fail.get(call).copied()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&self, cmd: Cmd) {
        self.with(|s| s.commands.push(cmd));
    }
}

/// Copies `len` elements out of a driver-facing pointer.
unsafe fn read<T: Copy>(ptr: *const T, len: u32) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec()
    }
}

impl Driver for MockDriver {
    fn memory_properties(&self, _phys: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties {
        self.with(|s| s.memory_props)
    }

    fn format_properties(&self, _phys: vk::PhysicalDevice, format: vk::Format) -> vk::FormatProperties {
        let depth = self.with(|s| s.depth_formats.contains(&format));
        vk::FormatProperties {
            optimal_tiling_features: if depth {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            },
            ..Default::default()
        }
    }

    fn surface_capabilities(
        &self,
        _phys: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.with(|s| s.caps))
    }

    fn surface_present_modes(
        &self,
        _phys: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.with(|s| s.present_modes.clone()))
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.check("create_semaphore")?;
        Ok(self.mint())
    }

    fn create_fence(&self) -> VkResult<vk::Fence> {
        self.check("create_fence")?;
        Ok(self.mint())
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        self.check("create_command_pool")?;
        Ok(self.mint())
    }

    fn allocate_command_buffer(&self, _pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        Ok(self.mint_child())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        if let Some(err) = self.with(|s| s.swapchain_failure) {
            self.with(|s| {
                s.chains.push(ChainRecord {
                    handle: vk::SwapchainKHR::null(),
                    old: info.old_swapchain,
                    min_image_count: info.min_image_count,
                    extent: info.image_extent,
                    format: info.image_format,
                    present_mode: info.present_mode,
                    pre_transform: info.pre_transform,
                    clipped: info.clipped == vk::TRUE,
                })
            });
            return Err(err);
        }
        let handle: vk::SwapchainKHR = self.mint();
        self.with(|s| {
            s.chains.push(ChainRecord {
                handle,
                old: info.old_swapchain,
                min_image_count: info.min_image_count,
                extent: info.image_extent,
                format: info.image_format,
                present_mode: info.present_mode,
                pre_transform: info.pre_transform,
                clipped: info.clipped == vk::TRUE,
            })
        });
        Ok(handle)
    }

    fn swapchain_images(&self, chain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.with(|s| {
            let count = s.image_count;
            let mut next = s.next_handle;
            let images = s
                .chain_images
                .entry(chain.as_raw())
                .or_insert_with(|| {
                    (0..count)
                        .map(|_| {
                            next += 1;
                            vk::Image::from_raw(next)
                        })
                        .collect()
                })
                .clone();
            s.next_handle = next + 1;
            Ok(images)
        })
    }

    fn create_image(&self, _info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        Ok(self.mint())
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        let made = self.with(|s| s.view_targets.len());
        if made >= self.with(|s| s.views_before_failure) {
            self.check("create_image_view")?;
        }
        self.with(|s| s.view_targets.push(info.image));
        Ok(self.mint())
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 4096,
            alignment: 256,
            memory_type_bits: 0b11,
        }
    }

    fn bind_image_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory) -> VkResult<()> {
        Ok(())
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        let buffer: vk::Buffer = self.mint();
        self.with(|s| s.buffer_sizes.insert(buffer.as_raw(), info.size));
        Ok(buffer)
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self.with(|s| s.buffer_sizes.get(&buffer.as_raw()).copied().unwrap_or(0));
        vk::MemoryRequirements {
            size,
            alignment: 16,
            memory_type_bits: 0b11,
        }
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory) -> VkResult<()> {
        Ok(())
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        let memory: vk::DeviceMemory = self.mint();
        self.with(|s| {
            s.memory
                .insert(memory.as_raw(), vec![0; info.allocation_size as usize])
        });
        Ok(memory)
    }

    fn map_memory(&self, memory: vk::DeviceMemory, _size: vk::DeviceSize) -> VkResult<*mut c_void> {
        self.with(|s| {
            s.memory
                .get_mut(&memory.as_raw())
                .map(|bytes| bytes.as_mut_ptr().cast::<c_void>())
                .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)
        })
    }

    fn unmap_memory(&self, _memory: vk::DeviceMemory) {}

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        Ok(self.mint())
    }

    fn create_framebuffer(&self, _info: &vk::FramebufferCreateInfo<'_>) -> VkResult<vk::Framebuffer> {
        Ok(self.mint())
    }

    fn create_shader_module(&self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        Ok(self.mint())
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        Ok(self.mint())
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        Ok(self.mint())
    }

    fn allocate_descriptor_set(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> VkResult<vk::DescriptorSet> {
        Ok(self.mint_child())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        for w in writes {
            let infos = unsafe { read(w.p_buffer_info, w.descriptor_count) };
            self.with(|s| {
                for info in infos {
                    s.descriptor_writes.push((w.dst_set, w.dst_binding, info.buffer));
                }
            });
        }
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        Ok(self.mint())
    }

    fn create_graphics_pipeline(
        &self,
        _cache: vk::PipelineCache,
        _info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        Ok(self.mint())
    }

    fn destroy_object(&self, ty: vk::ObjectType, raw: u64) {
        self.with(|s| s.destroyed.push((ty, raw)));
    }

    fn begin_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        self.check("begin_command_buffer")?;
        self.record(Cmd::Begin);
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        self.record(Cmd::End);
        Ok(())
    }

    fn cmd_begin_render_pass(&self, _cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        let clears = unsafe { read(info.p_clear_values, info.clear_value_count) };
        let (clear_color, clear_depth, clear_stencil) = unsafe {
            (
                clears.first().map(|c| c.color.float32).unwrap_or_default(),
                clears.get(1).map(|c| c.depth_stencil.depth).unwrap_or_default(),
                clears.get(1).map(|c| c.depth_stencil.stencil).unwrap_or_default(),
            )
        };
        self.record(Cmd::BeginRenderPass {
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
            area: rect(&info.render_area),
            clear_color,
            clear_depth,
            clear_stencil,
        });
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.record(Cmd::EndRenderPass);
    }

    fn cmd_set_viewport(&self, _cmd: vk::CommandBuffer, viewport: &vk::Viewport) {
        let v = viewport;
        self.record(Cmd::Viewport([
            v.x,
            v.y,
            v.width,
            v.height,
            v.min_depth,
            v.max_depth,
        ]));
    }

    fn cmd_set_scissor(&self, _cmd: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.record(Cmd::Scissor(rect(scissor)));
    }

    fn cmd_pipeline_barrier(
        &self,
        _cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        for b in barriers {
            self.record(Cmd::Barrier {
                src_stage,
                dst_stage,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                old: b.old_layout,
                new: b.new_layout,
                image: b.image,
            });
        }
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(Cmd::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.record(Cmd::BindDescriptorSet(layout, set));
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, binding: u32, buffer: vk::Buffer) {
        self.record(Cmd::BindVertexBuffer(binding, buffer));
    }

    fn cmd_bind_index_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(Cmd::BindIndexBuffer(buffer));
    }

    fn cmd_draw_indexed(
        &self,
        _cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record(Cmd::DrawIndexed(index_count, instance_count));
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &vk::SubmitInfo<'_>) -> VkResult<()> {
        self.check("queue_submit")?;
        let record = unsafe {
            SubmitRecord {
                queue,
                waits: read(submit.p_wait_semaphores, submit.wait_semaphore_count),
                stages: read(submit.p_wait_dst_stage_mask, submit.wait_semaphore_count),
                buffers: read(submit.p_command_buffers, submit.command_buffer_count),
                signals: submit.signal_semaphore_count,
            }
        };
        self.with(|s| s.submits.push(record));
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.check("queue_wait_idle")?;
        self.with(|s| s.queue_waits += 1);
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.with(|s| s.device_waits += 1);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _chain: vk::SwapchainKHR,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.with(|s| s.acquire_result)
    }

    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        let record = unsafe {
            PresentRecord {
                queue,
                chains: read(info.p_swapchains, info.swapchain_count),
                indices: read(info.p_image_indices, info.swapchain_count),
                waits: info.wait_semaphore_count,
            }
        };
        self.with(|s| {
            s.presents.push(record);
            s.present_result
        })
    }
}
