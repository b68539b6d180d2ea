// SPDX-License-Identifier: CEPL-1.0
use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use crate::handle::HandleBox;
use crate::image::DepthBuffer;
use crate::swapchain::Swapchain;
use ash::vk;

/// One subpass writing a colour attachment (0) and a depth attachment (1).
/// Colour ends in COLOR_ATTACHMENT_OPTIMAL; the presentation barrier
/// recorded after the pass moves it on to PRESENT_SRC_KHR.
pub struct RenderPass<D: Driver = AshDriver> {
    raw: HandleBox<vk::RenderPass, D>,
}

impl<D: Driver> RenderPass<D> {
    pub fn new(device: &D, color_format: vk::Format, depth_format: vk::Format) -> Result<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref))
            .depth_stencil_attachment(&depth_ref);

        let info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass));
        let raw = device.create_render_pass(&info)?;
        Ok(Self {
            raw: HandleBox::adopt(raw, device),
        })
    }

    pub fn raw(&self) -> vk::RenderPass {
        self.raw.raw()
    }
}

/// One framebuffer per swapchain view, each sharing the same depth view.
pub struct Framebuffers<D: Driver = AshDriver> {
    framebuffers: Vec<HandleBox<vk::Framebuffer, D>>,
}

impl<D: Driver> Framebuffers<D> {
    pub fn new(
        device: &D,
        render_pass: &RenderPass<D>,
        swapchain: &Swapchain<D>,
        depth: &DepthBuffer<D>,
    ) -> Result<Self> {
        let extent = swapchain.extent();
        let framebuffers = swapchain
            .images()
            .iter()
            .map(|img| -> Result<HandleBox<vk::Framebuffer, D>> {
                let attachments = [img.view(), depth.view()];
                let info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass.raw())
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                Ok(HandleBox::adopt(device.create_framebuffer(&info)?, device))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { framebuffers })
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Panics if `i` is out of range.
    pub fn get(&self, i: usize) -> vk::Framebuffer {
        self.framebuffers[i].raw()
    }
}
