// SPDX-License-Identifier: CEPL-1.0
//! Single-owner wrapper around raw Vulkan handles.
//!
//! A [`HandleBox`] either owns the object it points at (and destroys it on drop)
//! or merely carries a borrowed handle alongside the device it belongs to.
//! Ownership moves with the value; nothing is reference counted.
//!
//! ```ignore
//! let mut a = HandleBox::<vk::Semaphore, _>::create(&driver)?;
//! let b = a.take();          // `a` is now empty and non-owning
//! drop(b);                   // semaphore destroyed here, exactly once
//! ```

use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::fmt;

/// Handle kinds that can be created from the device alone.
pub trait Create: Handle + Copy {
    fn create<D: Driver>(device: &D) -> VkResult<Self>;
}

impl Create for vk::Semaphore {
    fn create<D: Driver>(device: &D) -> VkResult<Self> {
        device.create_semaphore()
    }
}

impl Create for vk::Fence {
    fn create<D: Driver>(device: &D) -> VkResult<Self> {
        device.create_fence()
    }
}

impl Create for vk::CommandPool {
    fn create<D: Driver>(device: &D) -> VkResult<Self> {
        device.create_command_pool()
    }
}

pub struct HandleBox<T: Handle + Copy, D: Driver = AshDriver> {
    raw: T,
    owns: bool,
    device: Option<D>,
}

pub type Semaphore<D = AshDriver> = HandleBox<vk::Semaphore, D>;
pub type Fence<D = AshDriver> = HandleBox<vk::Fence, D>;
pub type CommandPool<D = AshDriver> = HandleBox<vk::CommandPool, D>;

impl<T: Handle + Copy, D: Driver> HandleBox<T, D> {
    pub fn empty() -> Self {
        Self {
            raw: T::from_raw(0),
            owns: false,
            device: None,
        }
    }

    /// Borrowed handle: never destroyed by this wrapper.
    pub fn wrap(raw: T, device: &D) -> Self {
        Self {
            raw,
            owns: false,
            device: Some(device.clone()),
        }
    }

    /// Takes ownership of a handle created elsewhere on `device`.
    pub fn adopt(raw: T, device: &D) -> Self {
        Self {
            raw,
            owns: true,
            device: Some(device.clone()),
        }
    }

    pub fn create(device: &D) -> Result<Self>
    where
        T: Create,
    {
        let raw = T::create(device)?;
        Ok(Self::adopt(raw, device))
    }

    pub fn raw(&self) -> T {
        self.raw
    }

    pub fn owns(&self) -> bool {
        self.owns
    }

    pub fn is_null(&self) -> bool {
        self.raw.as_raw() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.is_null() && !self.owns
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    /// Moves the contents out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Releases the object now (if owned) and resets to empty. Idempotent.
    pub fn clear(&mut self) {
        self.release();
        self.raw = T::from_raw(0);
        self.owns = false;
        self.device = None;
    }

    fn release(&mut self) {
        if !self.owns || self.is_null() {
            return;
        }
        if let Some(device) = &self.device {
            tracing::debug!(ty = ?T::TYPE, raw = format_args!("{:#x}", self.raw.as_raw()), "destroy");
            device.destroy_object(T::TYPE, self.raw.as_raw());
        }
        self.owns = false;
    }
}

impl<T: Handle + Copy, D: Driver> Default for HandleBox<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Handle + Copy, D: Driver> Drop for HandleBox<T, D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Handle + Copy, D: Driver> fmt::Debug for HandleBox<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleBox")
            .field("type", &T::TYPE)
            .field("raw", &format_args!("{:#x}", self.raw.as_raw()))
            .field("owns", &self.owns)
            .finish()
    }
}
