// SPDX-License-Identifier: CEPL-1.0
use ash::khr::surface;
use ash::vk;
use std::fmt;

/// A presentation surface, destroyed on drop. Must be dropped before the
/// [`crate::Instance`] that created it and after every swapchain built on it.
pub struct Surface {
    raw: vk::SurfaceKHR,
    loader: surface::Instance,
}

impl Surface {
    pub(crate) fn new(raw: vk::SurfaceKHR, loader: surface::Instance) -> Self {
        Self { raw, loader }
    }

    pub fn raw(&self) -> vk::SurfaceKHR {
        self.raw
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        tracing::debug!("destroy surface");
        unsafe { self.loader.destroy_surface(self.raw, None) };
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ash::vk::Handle;
        f.debug_tuple("Surface")
            .field(&format_args!("{:#x}", self.raw.as_raw()))
            .finish()
    }
}
