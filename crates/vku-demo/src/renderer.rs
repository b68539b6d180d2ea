// SPDX-License-Identifier: CEPL-1.0
use crate::config::DemoCfg;
use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::time::Instant;
use tracing::{debug, info};
use vku::swapchain::SURFACE_FORMAT;
use vku::vk;
use vku::{
    Buffer, CommandPool, CommandRecorder, DepthBuffer, DescriptorPool, DeviceContext,
    Framebuffers, Instance, Pipeline, Queue, RenderPass, Semaphore, Surface, Swapchain,
    VertexInputState,
};
use winit::raw_window_handle::HasDisplayHandle;
use winit::window::Window;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
#[allow(dead_code)] // read by the vertex shader
struct Vertex {
    pos: [f32; 3],
    color: [f32; 3],
}

const VERTICES: [Vertex; 3] = [
    Vertex {
        pos: [0.0, -0.6, 0.0],
        color: [1.0, 0.2, 0.2],
    },
    Vertex {
        pos: [0.6, 0.6, 0.0],
        color: [0.2, 1.0, 0.2],
    },
    Vertex {
        pos: [-0.6, 0.6, 0.0],
        color: [0.2, 0.2, 1.0],
    },
];
const INDICES: [u32; 3] = [0, 1, 2];

/// index count, instance count, first index, vertex offset, first instance
const TRIANGLE_DRAW: (u32, u32, u32, i32, u32) = (INDICES.len() as u32, 1, 0, 0, 0);

/// Reported by [`Renderer::draw`] while no swapchain exists, so the caller
/// rebuilds exactly as it would for a stale one.
fn missing_target() -> vku::Error {
    vku::Error::Vk(vk::Result::ERROR_OUT_OF_DATE_KHR)
}

fn vertex_layout() -> VertexInputState {
    let stride = std::mem::size_of::<Vertex>() as u32;
    VertexInputState::new()
        .binding(0, stride, vk::VertexInputRate::VERTEX)
        .attrib(0, 0, vk::Format::R32G32B32_SFLOAT, 0)
        .attrib(1, 0, vk::Format::R32G32B32_SFLOAT, 12)
}

/// Projection * view * model for a triangle spinning about Y.
pub fn mvp(aspect: f32, seconds: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 10.0);
    // clip space Y points down
    proj.y_axis.y *= -1.0;
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.5), Vec3::ZERO, Vec3::Y);
    let model = Mat4::from_rotation_y(seconds);
    proj * view * model
}

/// Everything sized to the swapchain; rebuilt together on resize.
struct Target {
    framebuffers: Framebuffers,
    depth: DepthBuffer,
    swapchain: Swapchain,
}

// Fields drop top to bottom: derived objects first, the instance last.
pub struct Renderer {
    frame: CommandRecorder,
    setup: CommandRecorder,
    pipeline: Pipeline,
    _descriptors: DescriptorPool,
    uniform: Buffer,
    vertices: Buffer,
    indices: Buffer,
    target: Option<Target>,
    pass: RenderPass,
    acquired: Semaphore,
    _pool: CommandPool,
    queue: Queue,
    ctx: DeviceContext,
    surface: Surface,
    _instance: Instance,
    started: Instant,
}

impl Renderer {
    pub fn new(window: &Window, cfg: &DemoCfg) -> Result<Self> {
        let display = window.display_handle()?.as_raw();
        let instance = Instance::with_display(&cfg.app_name, display).context("vulkan instance")?;
        let surface = instance.create_surface(window, window).context("surface")?;
        let ctx = instance.device();
        let queue = instance.queue();
        let driver = instance.driver();

        let pool = CommandPool::create(driver)?;
        let setup = CommandRecorder::allocate(driver, &pool)?;
        let frame = CommandRecorder::allocate(driver, &pool)?;
        let acquired = Semaphore::create(driver)?;

        let depth_format = ctx.resolve_depth_format();
        if depth_format == vk::Format::UNDEFINED {
            return Err(vku::Error::NoDepthFormat.into());
        }
        let pass = RenderPass::new(driver, SURFACE_FORMAT, depth_format)?;

        let size = window.inner_size();
        let target = build_target(
            &ctx,
            &queue,
            &setup,
            &pass,
            surface.raw(),
            (size.width, size.height),
            None,
        )?;

        let vertices = Buffer::from_slice(&ctx, vk::BufferUsageFlags::VERTEX_BUFFER, &VERTICES)?;
        let indices = Buffer::from_slice(&ctx, vk::BufferUsageFlags::INDEX_BUFFER, &INDICES)?;
        let uniform = Buffer::new(
            &ctx,
            std::mem::size_of::<[f32; 16]>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let descriptors = DescriptorPool::new(driver)?;
        let shader_dir = cfg.shaders.resolved_dir();
        let mut pipeline = Pipeline::new(
            driver,
            pass.raw(),
            &vertex_layout(),
            &shader_dir,
            &cfg.shaders.name,
            vk::PipelineCache::null(),
        )
        .with_context(|| format!("pipeline from {}", shader_dir.display()))?;
        pipeline.bind_uniform(&descriptors, &uniform)?;

        info!("renderer ready");
        Ok(Self {
            frame,
            setup,
            pipeline,
            _descriptors: descriptors,
            uniform,
            vertices,
            indices,
            target: Some(target),
            pass,
            acquired,
            _pool: pool,
            queue,
            ctx,
            surface,
            _instance: instance,
            started: Instant::now(),
        })
    }

    /// Rebuilds the swapchain and everything sized to it. If an earlier
    /// rebuild failed there is no chain left to hand over and a fresh one is
    /// created.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;
        let previous = self.target.take().map(|old| {
            let Target {
                framebuffers,
                depth,
                swapchain,
            } = old;
            drop(framebuffers);
            drop(depth);
            swapchain
        });

        let target = build_target(
            &self.ctx,
            &self.queue,
            &self.setup,
            &self.pass,
            self.surface.raw(),
            (width, height),
            previous,
        )?;
        debug!(width, height, "swapchain rebuilt");
        self.target = Some(target);
        // a suboptimal acquire may have left the old one signalled
        self.acquired = Semaphore::create(self.ctx.driver())?;
        Ok(())
    }

    /// Draws one frame. Out-of-date and suboptimal results come back as
    /// errors for the caller to answer with [`Renderer::resize`].
    pub fn draw(&mut self) -> vku::Result<()> {
        let Some(target) = &self.target else {
            return Err(missing_target());
        };
        let sc = &target.swapchain;
        let aspect = sc.width() as f32 / sc.height().max(1) as f32;
        let mvp = mvp(aspect, self.started.elapsed().as_secs_f32());
        self.uniform.write(&mvp.to_cols_array())?;

        let index = sc.acquire_next_image(self.acquired.raw())?;
        let image = sc.image(index as usize);

        let rec = &self.frame;
        rec.begin()?;
        rec.post_present_barrier(image);
        rec.begin_render_pass(
            self.pass.raw(),
            target.framebuffers.get(index as usize),
            0,
            0,
            sc.width(),
            sc.height(),
        );
        rec.set_viewport(0.0, 0.0, sc.width() as f32, sc.height() as f32, 0.0, 1.0);
        rec.set_scissor(0, 0, sc.width(), sc.height());
        rec.bind_pipeline(&self.pipeline);
        rec.bind_vertex_buffer(&self.vertices, 0);
        rec.bind_index_buffer(&self.indices);
        let (indices, instances, first_index, vertex_offset, first_instance) = TRIANGLE_DRAW;
        rec.draw_indexed(indices, instances, first_index, vertex_offset, first_instance);
        rec.end_frame(image)?;

        self.queue.submit(Some(self.acquired.raw()), rec.raw())?;
        // single frame in flight; present has nothing to wait on
        self.queue.wait_idle()?;
        sc.present(&self.queue, index)
    }
}

/// Creates (or recreates from `previous`) the swapchain with its layout
/// transitions already executed, then the depth buffer and the framebuffers.
fn build_target(
    ctx: &DeviceContext,
    queue: &Queue,
    setup: &CommandRecorder,
    pass: &RenderPass,
    surface: vk::SurfaceKHR,
    (width, height): (u32, u32),
    previous: Option<Swapchain>,
) -> Result<Target> {
    let swapchain =
        Swapchain::create_submitted(ctx, surface, width, height, previous, setup, queue)
            .context("swapchain")?;

    let depth = DepthBuffer::new(ctx, swapchain.width(), swapchain.height())?;
    let framebuffers = Framebuffers::new(ctx.driver(), pass, &swapchain, &depth)?;
    Ok(Target {
        framebuffers,
        depth,
        swapchain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_struct() {
        let vi = vertex_layout();
        assert_eq!(vi.bindings()[0].stride, 24);
        assert_eq!(vi.attributes()[1].offset, 12);
    }

    #[test]
    fn triangle_is_one_plain_instance() {
        let (indices, instances, first_index, vertex_offset, first_instance) = TRIANGLE_DRAW;
        assert_eq!(indices as usize, INDICES.len());
        assert_eq!(instances, 1);
        assert_eq!((first_index, vertex_offset, first_instance), (0, 0, 0));
    }

    #[test]
    fn missing_chain_asks_for_a_rebuild() {
        let err = missing_target();
        assert!(err.is_out_of_date());
        assert_eq!(err.status(), Some(vk::Result::ERROR_OUT_OF_DATE_KHR));
    }

    #[test]
    fn mvp_keeps_origin_in_view() {
        let clip = mvp(4.0 / 3.0, 0.0) * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
