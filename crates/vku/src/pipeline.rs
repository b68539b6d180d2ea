// SPDX-License-Identifier: CEPL-1.0
use crate::descriptor::{DescriptorPool, DescriptorSetLayout};
use crate::buffer::Buffer;
use crate::driver::{AshDriver, Driver};
use crate::error::{Error, Result};
use crate::handle::HandleBox;
use ash::vk;
use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SHADER_ENTRY: &CStr = c"main";

/// `<dir>/<name>.vert.spv` and `<dir>/<name>.frag.spv`.
pub fn shader_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{name}.vert.spv")),
        dir.join(format!("{name}.frag.spv")),
    )
}

/// Reads a SPIR-V file and creates a module from it.
pub fn load_shader<D: Driver>(device: &D, path: &Path) -> Result<HandleBox<vk::ShaderModule, D>> {
    let shader_err = |source| Error::Shader {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path).map_err(shader_err)?;
    let code = ash::util::read_spv(&mut Cursor::new(&bytes[..])).map_err(shader_err)?;
    let module = device.create_shader_module(&code)?;
    debug!(path = %path.display(), words = code.len(), "shader module loaded");
    Ok(HandleBox::adopt(module, device))
}

/// Collects vertex bindings and attributes for [`Pipeline::new`].
#[derive(Clone, Debug, Default)]
pub struct VertexInputState {
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(mut self, binding: u32, stride: u32, rate: vk::VertexInputRate) -> Self {
        self.bindings.push(vk::VertexInputBindingDescription {
            binding,
            stride,
            input_rate: rate,
        });
        self
    }

    pub fn attrib(mut self, location: u32, binding: u32, format: vk::Format, offset: u32) -> Self {
        self.attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding,
            format,
            offset,
        });
        self
    }

    pub fn bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.bindings
    }

    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }

    pub fn create_info(&self) -> vk::PipelineVertexInputStateCreateInfo<'_> {
        vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.bindings)
            .vertex_attribute_descriptions(&self.attributes)
    }
}

/// A fixed graphics pipeline: triangle lists, no culling, depth test and
/// write with LESS_OR_EQUAL, opaque colour, dynamic viewport and scissor.
/// Owns its uniform descriptor layout and pipeline layout.
pub struct Pipeline<D: Driver = AshDriver> {
    pipeline: HandleBox<vk::Pipeline, D>,
    layout: HandleBox<vk::PipelineLayout, D>,
    set_layout: DescriptorSetLayout<D>,
    descriptor_set: Option<vk::DescriptorSet>,
}

impl<D: Driver> Pipeline<D> {
    pub fn new(
        device: &D,
        render_pass: vk::RenderPass,
        vertex_input: &VertexInputState,
        shader_dir: &Path,
        shader_name: &str,
        cache: vk::PipelineCache,
    ) -> Result<Self> {
        let set_layout = DescriptorSetLayout::uniform(device)?;
        let set_layouts = [set_layout.raw()];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = HandleBox::adopt(device.create_pipeline_layout(&layout_info)?, device);

        // modules are only needed until the pipeline exists
        let (vert_path, frag_path) = shader_paths(shader_dir, shader_name);
        let vert = load_shader(device, &vert_path)?;
        let frag = load_shader(device, &frag_path)?;
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert.raw())
                .name(SHADER_ENTRY),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag.raw())
                .name(SHADER_ENTRY),
        ];

        let vertex_state = vertex_input.create_info();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let raster = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(std::slice::from_ref(&blend_attachment));
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);
        let stencil_keep = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .front(stencil_keep)
            .back(stencil_keep);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_state)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&raster)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.raw())
            .render_pass(render_pass);
        let pipeline = HandleBox::adopt(device.create_graphics_pipeline(cache, &info)?, device);

        Ok(Self {
            pipeline,
            layout,
            set_layout,
            descriptor_set: None,
        })
    }

    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline.raw()
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.raw()
    }

    pub fn set_layout(&self) -> &DescriptorSetLayout<D> {
        &self.set_layout
    }

    pub fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.descriptor_set
    }

    /// Allocates this pipeline's descriptor set from `pool` and points it at
    /// `uniform`. The set is bound by [`crate::CommandRecorder::bind_pipeline`].
    pub fn bind_uniform(&mut self, pool: &DescriptorPool<D>, uniform: &Buffer<D>) -> Result<()> {
        let set = pool.allocate(&self.set_layout)?;
        pool.write_uniform(set, uniform);
        self.descriptor_set = Some(set);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_file_convention() {
        let (v, f) = shader_paths(Path::new("data/shaders"), "triangle");
        assert_eq!(v, Path::new("data/shaders/triangle.vert.spv"));
        assert_eq!(f, Path::new("data/shaders/triangle.frag.spv"));
    }

    #[test]
    fn vertex_input_builder_accumulates() {
        let vi = VertexInputState::new()
            .binding(0, 24, vk::VertexInputRate::VERTEX)
            .attrib(0, 0, vk::Format::R32G32B32_SFLOAT, 0)
            .attrib(1, 0, vk::Format::R32G32B32_SFLOAT, 12);
        assert_eq!(vi.bindings().len(), 1);
        assert_eq!(vi.bindings()[0].stride, 24);
        assert_eq!(vi.attributes().len(), 2);
        assert_eq!(vi.attributes()[1].offset, 12);

        let info = vi.create_info();
        assert_eq!(info.vertex_binding_description_count, 1);
        assert_eq!(info.vertex_attribute_description_count, 2);
    }
}
