//! Chip catalogue query interface (spec.md §3, §6). The real Melexis
//! catalogue is proprietary and out of scope; this module defines the
//! lookup contract the orchestrator depends on plus two small concrete
//! realizations so the rest of the tool has something to query.

use std::collections::HashMap;

use crate::crc::FlashCrcFunc;

/// One addressable, page-erasable memory region on the target.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub start: u32,
    pub length: u32,
    pub writeable: u32,
    pub page: u32,
    pub erase_unit: u32,
    pub erase_time_ms: u32,
    pub write_time_ms: u32,
}

/// Which sessions this chip's bootloader supports beyond the mandatory
/// `Unlock`/`FlashProg`/`FlashCrc`/`ChipReset` quartet.
#[derive(Debug, Clone, Default)]
pub struct PpmLoaderCaps {
    pub prog_keys: Option<Vec<u16>>,
    pub flash_cs_programming_session: bool,
    pub eeprom_verification_session: bool,
}

/// A single target family entry, looked up by the `project_id` an `Unlock`
/// session returns (spec.md §4.3 step 7).
#[derive(Debug, Clone)]
pub struct ChipDescriptor {
    pub flash: MemoryRegion,
    pub flash_cs: MemoryRegion,
    pub nv_memory: MemoryRegion,
    /// `None` means this catalogue entry describes a chip with no PPM
    /// bootloader support at all (spec.md §4.3 step 7: "or its `ppm_loader`
    /// slot is null").
    pub ppm_loader: Option<PpmLoaderCaps>,
    pub flash_crc_func: FlashCrcFunc,
}

pub trait ChipCatalogue {
    fn lookup(&self, project_id: u16) -> Option<&ChipDescriptor>;
}

/// A small built-in table, useful as a default and for tests — includes the
/// `project_id = 0x1234` descriptor spec.md §8's scenarios are built around.
pub struct StaticCatalogue {
    entries: HashMap<u16, ChipDescriptor>,
}

impl StaticCatalogue {
    pub fn with_demo_chip() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            0x1234,
            ChipDescriptor {
                flash: MemoryRegion {
                    start: 0x0000,
                    length: 0x100,
                    writeable: 0x100,
                    page: 0x10,
                    erase_unit: 0x100,
                    erase_time_ms: 20,
                    write_time_ms: 2,
                },
                flash_cs: MemoryRegion {
                    start: 0x0000,
                    length: 0x10,
                    writeable: 0x10,
                    page: 0x10,
                    erase_unit: 0x10,
                    erase_time_ms: 20,
                    write_time_ms: 2,
                },
                nv_memory: MemoryRegion {
                    start: 0x0000,
                    length: 0x40,
                    writeable: 0x40,
                    page: 0x04,
                    erase_unit: 0x04,
                    erase_time_ms: 5,
                    write_time_ms: 5,
                },
                ppm_loader: Some(PpmLoaderCaps {
                    prog_keys: Some(vec![0x1111, 0x2222, 0x3333, 0x4444]),
                    flash_cs_programming_session: true,
                    eeprom_verification_session: true,
                }),
                flash_crc_func: FlashCrcFunc::Amalthea,
            },
        );
        StaticCatalogue { entries }
    }

    pub fn empty() -> Self {
        StaticCatalogue {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, project_id: u16, descriptor: ChipDescriptor) {
        self.entries.insert(project_id, descriptor);
    }
}

impl ChipCatalogue for StaticCatalogue {
    fn lookup(&self, project_id: u16) -> Option<&ChipDescriptor> {
        self.entries.get(&project_id)
    }
}

/// A catalogue populated at runtime, e.g. parsed out of a settings file next
/// to the binary (the TOML shape for that is this project's own invention,
/// see DESIGN.md).
#[derive(Default)]
pub struct MapCatalogue {
    entries: HashMap<u16, ChipDescriptor>,
}

impl MapCatalogue {
    pub fn new() -> Self {
        MapCatalogue::default()
    }

    pub fn insert(&mut self, project_id: u16, descriptor: ChipDescriptor) {
        self.entries.insert(project_id, descriptor);
    }
}

impl ChipCatalogue for MapCatalogue {
    fn lookup(&self, project_id: u16) -> Option<&ChipDescriptor> {
        self.entries.get(&project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_catalogue_finds_demo_chip() {
        let cat = StaticCatalogue::with_demo_chip();
        assert!(cat.lookup(0x1234).is_some());
        assert!(cat.lookup(0xBEEF).is_none());
    }

    #[test]
    fn map_catalogue_is_empty_by_default() {
        let cat = MapCatalogue::new();
        assert!(cat.lookup(0x1234).is_none());
    }
}
