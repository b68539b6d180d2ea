// SPDX-License-Identifier: CEPL-1.0
use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use crate::handle::HandleBox;
use ash::vk;
use std::fmt;

/// The device's single graphics queue. Queues are never destroyed by the
/// application, so the handle is always held non-owning.
pub struct Queue<D: Driver = AshDriver> {
    device: D,
    handle: HandleBox<vk::Queue, D>,
    family_index: u32,
}

impl<D: Driver> Queue<D> {
    pub fn new(device: &D, raw: vk::Queue, family_index: u32) -> Self {
        Self {
            device: device.clone(),
            handle: HandleBox::wrap(raw, device),
            family_index,
        }
    }

    pub fn raw(&self) -> vk::Queue {
        self.handle.raw()
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Submits one command buffer. With `wait`, execution of colour attachment
    /// output waits on that semaphore. No signal semaphore, no fence.
    pub fn submit(&self, wait: Option<vk::Semaphore>, command_buffer: vk::CommandBuffer) -> Result<()> {
        let waits: &[vk::Semaphore] = match wait.as_ref() {
            Some(s) => std::slice::from_ref(s),
            None => &[],
        };
        let stages: &[vk::PipelineStageFlags] = if waits.is_empty() {
            &[]
        } else {
            &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT]
        };

        let info = vk::SubmitInfo::default()
            .wait_semaphores(waits)
            .wait_dst_stage_mask(stages)
            .command_buffers(std::slice::from_ref(&command_buffer));
        self.device.queue_submit(self.raw(), &info)?;
        Ok(())
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.queue_wait_idle(self.raw())?;
        Ok(())
    }
}

impl<D: Driver> fmt::Debug for Queue<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("family_index", &self.family_index)
            .finish()
    }
}
