// SPDX-License-Identifier: CEPL-1.0
use crate::buffer::Buffer;
use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use crate::handle::{CommandPool, HandleBox};
use crate::pipeline::Pipeline;
use ash::vk;

/// Colour attachment clear used by [`CommandRecorder::begin_frame`].
pub const CLEAR_COLOR: [f32; 4] = [0.025, 0.025, 0.025, 1.0];

/// Stages used for layout transitions. Coarse; not derived per operation.
pub const TRANSITION_STAGES: (vk::PipelineStageFlags, vk::PipelineStageFlags) = (
    vk::PipelineStageFlags::TOP_OF_PIPE,
    vk::PipelineStageFlags::TOP_OF_PIPE,
);

/// Stages used around presentation barriers.
pub const PRESENT_STAGES: (vk::PipelineStageFlags, vk::PipelineStageFlags) = (
    vk::PipelineStageFlags::ALL_COMMANDS,
    vk::PipelineStageFlags::TOP_OF_PIPE,
);

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Builds the image barrier for `old -> new` from a fixed access-mask table.
///
/// Only the layouts below are understood; any other layout contributes no
/// access bits, so an unlisted pair yields empty masks.
///
/// | layout                  | as `old` (src)               | as `new` (dst)                         |
/// |-------------------------|------------------------------|----------------------------------------|
/// | UNDEFINED               | HOST_WRITE \| TRANSFER_WRITE |                                        |
/// | COLOR_ATTACHMENT        | COLOR_ATTACHMENT_WRITE       | COLOR_ATTACHMENT_WRITE, src = TRANSFER_READ |
/// | TRANSFER_SRC            | TRANSFER_READ                | TRANSFER_READ, src \|= TRANSFER_READ   |
/// | TRANSFER_DST            |                              | TRANSFER_WRITE                         |
/// | DEPTH_STENCIL_ATTACHMENT|                              | dst \|= DEPTH_STENCIL_ATTACHMENT_WRITE |
/// | SHADER_READ_ONLY        | SHADER_READ                  | SHADER_READ, src = HOST_WRITE \| TRANSFER_WRITE |
pub fn layout_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> vk::ImageMemoryBarrier<'static> {
    let mut src = match old {
        vk::ImageLayout::UNDEFINED => {
            vk::AccessFlags::HOST_WRITE | vk::AccessFlags::TRANSFER_WRITE
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::AccessFlags::TRANSFER_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::AccessFlags::SHADER_READ,
        _ => vk::AccessFlags::empty(),
    };

    let mut dst = vk::AccessFlags::empty();
    match new {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => dst = vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => {
            src |= vk::AccessFlags::TRANSFER_READ;
            dst = vk::AccessFlags::TRANSFER_READ;
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
            src = vk::AccessFlags::TRANSFER_READ;
            dst = vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
        }
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            dst |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            src = vk::AccessFlags::HOST_WRITE | vk::AccessFlags::TRANSFER_WRITE;
            dst = vk::AccessFlags::SHADER_READ;
        }
        _ => {}
    }

    vk::ImageMemoryBarrier::default()
        .src_access_mask(src)
        .dst_access_mask(dst)
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            ..color_range()
        })
}

/// Records into one command buffer. Call [`begin`](Self::begin) (or
/// [`begin_frame`](Self::begin_frame)) before recording and
/// [`end`](Self::end) before handing the buffer to a queue.
pub struct CommandRecorder<D: Driver = AshDriver> {
    device: D,
    buffer: HandleBox<vk::CommandBuffer, D>,
}

impl<D: Driver> CommandRecorder<D> {
    /// Records into a command buffer owned by someone else.
    pub fn wrap(raw: vk::CommandBuffer, device: &D) -> Self {
        Self {
            device: device.clone(),
            buffer: HandleBox::wrap(raw, device),
        }
    }

    /// Allocates a primary buffer from `pool`. The buffer is freed with the pool.
    pub fn allocate(device: &D, pool: &CommandPool<D>) -> Result<Self> {
        let raw = device.allocate_command_buffer(pool.raw())?;
        Ok(Self::wrap(raw, device))
    }

    pub fn raw(&self) -> vk::CommandBuffer {
        self.buffer.raw()
    }

    pub fn begin(&self) -> Result<()> {
        self.device.begin_command_buffer(self.raw())?;
        Ok(())
    }

    pub fn end(&self) -> Result<()> {
        self.device.end_command_buffer(self.raw())?;
        Ok(())
    }

    /// Begin recording, open the render pass and set viewport and scissor to
    /// the full `width` x `height` area.
    pub fn begin_frame(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.begin()?;
        self.begin_render_pass(render_pass, framebuffer, 0, 0, width, height);
        self.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        self.set_scissor(0, 0, width, height);
        Ok(())
    }

    /// Close the render pass, make `present_image` presentable and end recording.
    pub fn end_frame(&self, present_image: vk::Image) -> Result<()> {
        self.end_render_pass();
        self.presentation_barrier(present_image);
        self.end()
    }

    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) {
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x, y },
                extent: vk::Extent2D { width, height },
            })
            .clear_values(&clears);
        self.device.cmd_begin_render_pass(self.raw(), &info);
    }

    pub fn set_viewport(&self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        let vp = vk::Viewport {
            x,
            y,
            width,
            height,
            min_depth,
            max_depth,
        };
        self.device.cmd_set_viewport(self.raw(), &vp);
    }

    pub fn set_scissor(&self, x: i32, y: i32, width: u32, height: u32) {
        let sc = vk::Rect2D {
            offset: vk::Offset2D { x, y },
            extent: vk::Extent2D { width, height },
        };
        self.device.cmd_set_scissor(self.raw(), &sc);
    }

    /// Binds the pipeline's descriptor set, then the pipeline itself.
    pub fn bind_pipeline(&self, pipeline: &Pipeline<D>) {
        if let Some(set) = pipeline.descriptor_set() {
            self.device
                .cmd_bind_descriptor_set(self.raw(), pipeline.layout(), set);
        }
        self.device.cmd_bind_pipeline(self.raw(), pipeline.raw());
    }

    pub fn bind_vertex_buffer(&self, buffer: &Buffer<D>, binding: u32) {
        self.device
            .cmd_bind_vertex_buffer(self.raw(), binding, buffer.raw());
    }

    /// Index data is always `u32`.
    pub fn bind_index_buffer(&self, buffer: &Buffer<D>) {
        self.device.cmd_bind_index_buffer(self.raw(), buffer.raw());
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.device.cmd_draw_indexed(
            self.raw(),
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    pub fn end_render_pass(&self) {
        self.device.cmd_end_render_pass(self.raw());
    }

    /// COLOR_ATTACHMENT_OPTIMAL -> PRESENT_SRC_KHR for a rendered swapchain image.
    pub fn presentation_barrier(&self, image: vk::Image) {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_range());
        let (src, dst) = PRESENT_STAGES;
        self.device
            .cmd_pipeline_barrier(self.raw(), src, dst, std::slice::from_ref(&barrier));
    }

    /// PRESENT_SRC_KHR -> COLOR_ATTACHMENT_OPTIMAL, returning a presented image
    /// to render-target use.
    pub fn post_present_barrier(&self, image: vk::Image) {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .old_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_range());
        let (src, dst) = PRESENT_STAGES;
        self.device
            .cmd_pipeline_barrier(self.raw(), src, dst, std::slice::from_ref(&barrier));
    }

    pub fn transition_layout(
        &self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        let barrier = layout_barrier(image, aspect, old, new);
        let (src, dst) = TRANSITION_STAGES;
        self.device
            .cmd_pipeline_barrier(self.raw(), src, dst, std::slice::from_ref(&barrier));
    }
}
