// SPDX-License-Identifier: CEPL-1.0
//! Instance, device and queue bring-up.
//!
//! One instance, the first physical device that has a graphics queue family,
//! one queue from that family. The logical device lives exactly as long as
//! the [`Instance`]; everything derived from it has to be dropped first.

use crate::device::DeviceContext;
use crate::driver::AshDriver;
use crate::error::{Error, Result};
use crate::queue::Queue;
use crate::surface::Surface;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, CString};
use tracing::{info, warn};

/// Index of the first family that supports graphics work.
pub fn select_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

/// First device, in enumeration order, with a graphics family, and that
/// family's index.
pub fn pick_device(
    devices: &[(vk::PhysicalDevice, Vec<vk::QueueFamilyProperties>)],
) -> Result<(vk::PhysicalDevice, u32)> {
    devices
        .iter()
        .find_map(|(phys, families)| select_graphics_family(families).map(|f| (*phys, f)))
        .ok_or(Error::NoCompatibleDevice)
}

/// VK_KHR_surface plus the surface extension of the platform being built for.
pub fn platform_extensions() -> Vec<*const c_char> {
    let mut exts = vec![surface::NAME.as_ptr()];
    #[cfg(target_os = "windows")]
    exts.push(ash::khr::win32_surface::NAME.as_ptr());
    #[cfg(target_os = "macos")]
    exts.push(ash::ext::metal_surface::NAME.as_ptr());
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    exts.push(ash::khr::xlib_surface::NAME.as_ptr());
    exts
}

pub struct Instance {
    driver: AshDriver,
    physical: vk::PhysicalDevice,
    queue_family: u32,
    queue: vk::Queue,
    device: ash::Device,
    surface_loader: surface::Instance,
    instance: ash::Instance,
    entry: Entry,
}

impl Instance {
    pub fn new(app_name: &str) -> Result<Self> {
        Self::with_extensions(app_name, &platform_extensions())
    }

    /// Like [`Instance::new`], but asks `ash-window` which surface
    /// extensions `display` needs instead of using the build-time choice.
    pub fn with_display(app_name: &str, display: RawDisplayHandle) -> Result<Self> {
        let exts = ash_window::enumerate_required_extensions(display)?;
        Self::with_extensions(app_name, exts)
    }

    fn with_extensions(app_name: &str, extensions: &[*const c_char]) -> Result<Self> {
        let entry = Entry::linked();
        let name = CString::new(app_name)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&name)
            .engine_name(&name)
            .api_version(vk::API_VERSION_1_0);
        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(extensions);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let (physical, queue_family, device) = match open_device(&instance) {
            Ok(picked) => picked,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let driver = AshDriver::new(&instance, &device, &surface_loader, queue_family);

        Ok(Self {
            driver,
            physical,
            queue_family,
            queue,
            device,
            surface_loader,
            instance,
            entry,
        })
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn driver(&self) -> &AshDriver {
        &self.driver
    }

    pub fn device(&self) -> DeviceContext {
        DeviceContext::new(self.driver.clone(), self.physical)
    }

    pub fn queue(&self) -> Queue {
        Queue::new(&self.driver, self.queue, self.queue_family)
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical
    }

    pub fn create_surface(
        &self,
        display: &impl HasDisplayHandle,
        window: &impl HasWindowHandle,
    ) -> Result<Surface> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();
        let raw = unsafe { ash_window::create_surface(&self.entry, &self.instance, dh, wh, None)? };
        let surface = Surface::new(raw, self.surface_loader.clone());

        let supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical,
                self.queue_family,
                raw,
            )?
        };
        if !supported {
            warn!(family = self.queue_family, "graphics queue family cannot present to this surface");
        }
        Ok(surface)
    }
}

/// Picks a device and creates it with one queue and VK_KHR_swapchain.
fn open_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32, ash::Device)> {
    let devices: Vec<_> = unsafe { instance.enumerate_physical_devices()? }
        .into_iter()
        .map(|phys| {
            let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
            (phys, families)
        })
        .collect();
    let (physical, family) = pick_device(&devices)?;

    let props = unsafe { instance.get_physical_device_properties(physical) };
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!(device = %name, family, "using physical device");

    let priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(family)
        .queue_priorities(&priorities);
    let extensions = [swapchain::NAME.as_ptr()];
    let info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_info))
        .enabled_extension_names(&extensions);
    let device = unsafe { instance.create_device(physical, &info, None)? };
    Ok((physical, family, device))
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
