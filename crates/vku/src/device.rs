// SPDX-License-Identifier: CEPL-1.0
use crate::driver::{AshDriver, Driver};
use crate::error::Result;
use ash::vk;

/// Returned by [`DeviceContext::resolve_memory_type`] when nothing matches.
pub const MEMORY_TYPE_NOT_FOUND: u32 = u32::MAX;

/// Depth formats in the order they are tried, highest precision first.
pub const DEPTH_FORMATS: [vk::Format; 5] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
    vk::Format::D16_UNORM,
];

/// A logical device paired with the physical device it was created from.
/// Does not own either; both must outlive everything derived from it.
#[derive(Clone)]
pub struct DeviceContext<D: Driver = AshDriver> {
    driver: D,
    physical: vk::PhysicalDevice,
}

impl<D: Driver> DeviceContext<D> {
    pub fn new(driver: D, physical: vk::PhysicalDevice) -> Self {
        Self { driver, physical }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical
    }

    /// First memory type allowed by `type_bits` whose flags contain `required`.
    /// First match wins; this is not a "best fit" search.
    pub fn resolve_memory_type(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> u32 {
        let props = self.driver.memory_properties(self.physical);
        find_memory_type(&props, type_bits, required)
    }

    /// First entry of [`DEPTH_FORMATS`] usable as an optimally tiled
    /// depth/stencil attachment, or `UNDEFINED` when none is.
    pub fn resolve_depth_format(&self) -> vk::Format {
        DEPTH_FORMATS
            .into_iter()
            .find(|&format| {
                self.driver
                    .format_properties(self.physical, format)
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .unwrap_or(vk::Format::UNDEFINED)
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.driver.device_wait_idle()?;
        Ok(())
    }
}

pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> u32 {
    let count = props.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && props.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .unwrap_or(MEMORY_TYPE_NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = f;
        }
        props
    }

    const DL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HV: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HC: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;

    #[test]
    fn first_satisfying_index_wins() {
        let props = table(&[DL, HV | HC, HV, HV | HC | DL]);
        assert_eq!(find_memory_type(&props, 0b1111, HV), 1);
        assert_eq!(find_memory_type(&props, 0b1111, HV | HC | DL), 3);
        assert_eq!(find_memory_type(&props, 0b1111, DL), 0);
    }

    #[test]
    fn respects_type_bits() {
        let props = table(&[HV | HC, HV | HC, HV]);
        assert_eq!(find_memory_type(&props, 0b100, HV), 2);
        assert_eq!(find_memory_type(&props, 0b110, HV | HC), 1);
    }

    #[test]
    fn empty_requirement_matches_first_allowed_bit() {
        let props = table(&[DL, HV]);
        assert_eq!(find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::empty()), 1);
    }

    #[test]
    fn no_match_returns_sentinel() {
        let props = table(&[DL, HV]);
        assert_eq!(find_memory_type(&props, 0b11, HC), MEMORY_TYPE_NOT_FOUND);
        assert_eq!(find_memory_type(&props, 0, DL), MEMORY_TYPE_NOT_FOUND);
        // bits beyond the reported count are never considered
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::empty()),
            MEMORY_TYPE_NOT_FOUND
        );
    }
}
