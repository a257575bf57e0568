//! Programming orchestrator (spec.md §4.3), grounded in
//! `examples/original_source/src/ppm_bootloader.c`'s `ppmbtl_enterProgrammingMode`,
//! `ppmbtl_exitProgrammingMode`, `ppmbtl_programFlashMemory`,
//! `ppmbtl_verifyFlashMemory`, `ppmbtl_programFlashCsMemory`,
//! `ppmbtl_verifyFlashCsMemory`, `ppmbtl_programEepromMemory`,
//! `ppmbtl_verifyEepromMemory`, `ppmbtl_checkAndDoProgKeysSession` and
//! `ppmbtl_doAction`.

use crate::chip::{ChipCatalogue, ChipDescriptor, MemoryRegion, PpmLoaderCaps};
use crate::crc::{bytes_to_words, crc16};
use crate::error::PpmError;
use crate::hex::HexImage;
use crate::transport::Transport;
use crate::session::{
    ceil_div, do_chip_reset, do_eeprom_crc, do_eeprom_programming, do_flash_cs_crc,
    do_flash_cs_programming, do_flash_crc, do_flash_programming, do_flash_prog_keys, do_unlock,
    SessionConfig,
};
use crate::session_defaults::SessionTemplate;

/// Which memory region an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Flash,
    FlashCs,
    NvRam,
}

/// Whether an invocation writes or reads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Program,
    Verify,
}

/// Chip power-rail hook, injected at construction (spec.md §9: "weak
/// callouts... no global mutable state"). `NoPower` is the default no-op
/// pair spec.md §6 describes.
pub trait PowerControl {
    fn chip_power(&mut self, enable: bool);
    fn chip_powered(&self) -> bool;
}

pub struct NoPower;

impl PowerControl for NoPower {
    fn chip_power(&mut self, _enable: bool) {}
    fn chip_powered(&self) -> bool {
        false
    }
}

const BLANK_FLASH: u8 = 0xFF;
const BLANK_NVRAM: u8 = 0x00;
const EEPROM_CRC_SEED: u16 = 0x1D0F;

fn ceil_ms(value: f64) -> u16 {
    value.ceil() as u16
}

fn check_overlap(hex: &dyn HexImage, start: u32, length: u32) -> Result<(), PpmError> {
    let (Some(min), Some(max)) = (hex.min_address(), hex.max_address()) else {
        return Err(PpmError::MissingData);
    };
    let end = start.saturating_add(length).saturating_sub(1);
    if max < start || min > end {
        return Err(PpmError::MissingData);
    }
    Ok(())
}

/// Top-level entry point (spec.md §4.3). Always attempts `ChipReset` on the
/// way out, regardless of how the body failed, and swallows its error.
pub fn do_action(
    transport: &mut impl Transport,
    catalogue: &dyn ChipCatalogue,
    power: &mut impl PowerControl,
    manual_power: bool,
    broadcast: bool,
    bitrate: u32,
    memory: Memory,
    action: Action,
    hex_image: &dyn HexImage,
) -> Result<(), PpmError> {
    let result = enter_and_dispatch(
        transport, catalogue, power, manual_power, broadcast, bitrate, memory, action, hex_image,
    );

    let mut reset_cfg = SessionTemplate::ChipReset.default_config();
    reset_cfg.request_ack = !broadcast;
    let _ = do_chip_reset(transport, &reset_cfg);
    if !manual_power {
        power.chip_power(false);
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn enter_and_dispatch(
    transport: &mut impl Transport,
    catalogue: &dyn ChipCatalogue,
    power: &mut impl PowerControl,
    manual_power: bool,
    broadcast: bool,
    bitrate: u32,
    memory: Memory,
    action: Action,
    hex_image: &dyn HexImage,
) -> Result<(), PpmError> {
    if !manual_power && power.chip_powered() {
        power.chip_power(false);
        transport.sleep(100);
    }

    let pattern_us = if manual_power { 100_000 } else { 50_000 };
    transport
        .send_enter_pattern(pattern_us)
        .map_err(PpmError::EnterPpm)?;
    transport.sleep(5);

    transport.set_bitrate(bitrate).map_err(PpmError::SetBaud)?;
    transport.send_calibration().map_err(PpmError::Calibration)?;

    let mut unlock_cfg = SessionTemplate::Unlock.default_config();
    unlock_cfg.request_ack = !broadcast;
    let project_id = do_unlock(transport, &unlock_cfg)
        .map_err(PpmError::Unlock)?
        .unwrap_or(0);

    let chip = catalogue
        .lookup(project_id)
        .ok_or(PpmError::ChipNotSupported { project_id })?;
    let caps = chip
        .ppm_loader
        .as_ref()
        .ok_or(PpmError::ChipNotSupported { project_id })?;

    match (memory, action) {
        (Memory::Flash, Action::Program) => program_flash(transport, hex_image, chip, caps, broadcast),
        (Memory::Flash, Action::Verify) => verify_flash(transport, hex_image, chip, broadcast),
        (Memory::FlashCs, Action::Program) => {
            program_flash_cs(transport, hex_image, chip, caps, broadcast)
        }
        (Memory::FlashCs, Action::Verify) => {
            verify_flash_cs(transport, hex_image, chip, caps, broadcast)
        }
        (Memory::NvRam, Action::Program) => program_nvram(transport, hex_image, chip, caps, broadcast),
        (Memory::NvRam, Action::Verify) => verify_nvram(transport, hex_image, chip, caps, broadcast),
    }
}

fn prog_keys_or_zero(caps: &PpmLoaderCaps) -> Vec<u16> {
    let mut keys = caps.prog_keys.clone().unwrap_or_default();
    keys.resize(8, 0);
    keys
}

fn flash_prog_config(chip: &ChipDescriptor, broadcast: bool) -> SessionConfig {
    let flash_len = chip.flash.length as f64;
    let page0 = ceil_ms((flash_len / chip.flash.erase_unit as f64) * chip.flash.erase_time_ms as f64 * 1.25);
    let pagex = ceil_ms(chip.flash.write_time_ms as f64 * 1.25);
    let session = pagex + ceil_ms(flash_len * 6.25e-5);
    SessionConfig {
        session_id: crate::frame::SessionId::FlashProg,
        page_size_words: (chip.flash.page / 2) as u8,
        request_ack: !broadcast,
        page_retry: 5,
        page0_ack_timeout_ms: page0,
        pagex_ack_timeout_ms: pagex,
        session_ack_timeout_ms: session,
        crc_func: chip.flash_crc_func,
    }
}

fn program_flash(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    caps: &PpmLoaderCaps,
    broadcast: bool,
) -> Result<(), PpmError> {
    let mut keys_cfg = SessionTemplate::ProgKeys.default_config();
    keys_cfg.request_ack = !broadcast;
    do_flash_prog_keys(transport, &keys_cfg, &prog_keys_or_zero(caps))
        .map_err(PpmError::ProgrammingFailed)?;

    check_overlap(hex, chip.flash.start, chip.flash.length)?;
    let buf = hex.get_filled(chip.flash.start, chip.flash.length, BLANK_FLASH);
    let cfg = flash_prog_config(chip, broadcast);
    do_flash_programming(transport, &cfg, &buf).map_err(PpmError::ProgrammingFailed)
}

fn verify_flash(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    broadcast: bool,
) -> Result<(), PpmError> {
    check_overlap(hex, chip.flash.start, chip.flash.length)?;
    let buf = hex.get_filled(chip.flash.start, chip.flash.length, BLANK_FLASH);
    let host_crc = chip.flash_crc_func.compute(&bytes_to_words(&buf), 1);

    let mut cfg = SessionTemplate::FlashCrc.default_config();
    cfg.request_ack = !broadcast;
    let device_crc = do_flash_crc(transport, &cfg, buf.len()).map_err(PpmError::ProgrammingFailed)?;

    match device_crc {
        Some(crc) if crc == host_crc => Ok(()),
        _ => Err(PpmError::VerifyFailed),
    }
}

fn flash_cs_len(hex: &dyn HexImage, region: &MemoryRegion) -> Result<u32, PpmError> {
    check_overlap(hex, region.start, region.length)?;
    let max_addr = hex.max_address().ok_or(PpmError::MissingData)?;
    let raw_len = max_addr.saturating_sub(region.start).saturating_add(1).min(region.writeable);
    let page = region.page.max(1);
    Ok(ceil_div(raw_len, page) * page)
}

fn program_flash_cs(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    caps: &PpmLoaderCaps,
    broadcast: bool,
) -> Result<(), PpmError> {
    if !caps.flash_cs_programming_session {
        return Err(PpmError::ActionNotSupported);
    }
    let len = flash_cs_len(hex, &chip.flash_cs)?;
    let buf = hex.get_filled(chip.flash_cs.start, len, BLANK_FLASH);

    let mut cfg = SessionTemplate::FlashCsProg.default_config();
    cfg.request_ack = !broadcast;
    cfg.page_size_words = (chip.flash_cs.page / 2) as u8;
    do_flash_cs_programming(transport, &cfg, &buf).map_err(PpmError::ProgrammingFailed)
}

fn verify_flash_cs(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    caps: &PpmLoaderCaps,
    broadcast: bool,
) -> Result<(), PpmError> {
    if !caps.flash_cs_programming_session {
        return Err(PpmError::ActionNotSupported);
    }
    let len = flash_cs_len(hex, &chip.flash_cs)?;
    let buf = hex.get_filled(chip.flash_cs.start, len, BLANK_FLASH);
    let host_crc = crc16(&buf, EEPROM_CRC_SEED);

    let mut cfg = SessionTemplate::FlashCsCrc.default_config();
    cfg.request_ack = !broadcast;
    let device_crc = do_flash_cs_crc(transport, &cfg, buf.len()).map_err(PpmError::ProgrammingFailed)?;

    match device_crc {
        Some(crc) if crc == host_crc => Ok(()),
        _ => Err(PpmError::VerifyFailed),
    }
}

/// Walk a memory region in page-sized steps, accumulating consecutive
/// non-empty pages into a run and flushing each run as soon as an empty
/// page (or the region's end) is reached. Each run's buffer and length are
/// reset at the point of flush — the original C inner loop forgets to reset
/// its length between flushes (spec.md §9); this does not reproduce that.
fn walk_runs(
    hex: &dyn HexImage,
    region: &MemoryRegion,
    mut flush: impl FnMut(u32, &[u8]) -> Result<(), PpmError>,
) -> Result<bool, PpmError> {
    let page_bytes = region.page.max(1);
    let end = region.start.saturating_add(region.writeable);
    let mut addr = region.start;
    let mut run_start: Option<u32> = None;
    let mut run_buf: Vec<u8> = Vec::new();
    let mut flushed_any = false;

    while addr < end {
        let this_len = page_bytes.min(end - addr);
        let occupied = hex.count_in_range(addr, this_len) > 0;
        if occupied {
            if run_start.is_none() {
                run_start = Some(addr);
            }
            run_buf.extend_from_slice(&hex.get_filled(addr, this_len, BLANK_NVRAM));
        } else if let Some(start) = run_start.take() {
            flush(start - region.start, &run_buf)?;
            run_buf.clear();
            flushed_any = true;
        }
        addr += this_len;
    }
    if let Some(start) = run_start.take() {
        flush(start - region.start, &run_buf)?;
        flushed_any = true;
    }
    Ok(flushed_any)
}

fn nvram_prog_config(chip: &ChipDescriptor, broadcast: bool) -> SessionConfig {
    let timeout = ceil_ms(chip.nv_memory.write_time_ms as f64 * 1.25);
    SessionConfig {
        session_id: crate::frame::SessionId::EepromProg,
        page_size_words: (chip.nv_memory.page / 2) as u8,
        request_ack: !broadcast,
        page_retry: 5,
        page0_ack_timeout_ms: timeout,
        pagex_ack_timeout_ms: timeout,
        session_ack_timeout_ms: timeout,
        crc_func: crate::crc::FlashCrcFunc::None,
    }
}

fn program_nvram(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    caps: &PpmLoaderCaps,
    broadcast: bool,
) -> Result<(), PpmError> {
    let mut keys_cfg = SessionTemplate::ProgKeys.default_config();
    keys_cfg.request_ack = !broadcast;
    do_flash_prog_keys(transport, &keys_cfg, &prog_keys_or_zero(caps))
        .map_err(PpmError::ProgrammingFailed)?;

    let cfg = nvram_prog_config(chip, broadcast);
    let flushed = walk_runs(hex, &chip.nv_memory, |offset, bytes| {
        do_eeprom_programming(transport, &cfg, offset as u16, bytes).map_err(PpmError::ProgrammingFailed)
    })?;

    if !flushed {
        return Err(PpmError::MissingData);
    }
    Ok(())
}

fn verify_nvram(
    transport: &mut impl Transport,
    hex: &dyn HexImage,
    chip: &ChipDescriptor,
    caps: &PpmLoaderCaps,
    broadcast: bool,
) -> Result<(), PpmError> {
    if !caps.eeprom_verification_session {
        return Err(PpmError::ActionNotSupported);
    }

    let mut cfg = SessionTemplate::EepromCrc.default_config();
    cfg.request_ack = !broadcast;
    cfg.page_size_words = (chip.nv_memory.page / 2) as u8;

    let flushed = walk_runs(hex, &chip.nv_memory, |offset, bytes| {
        let host_crc = crc16(bytes, EEPROM_CRC_SEED);
        let device_crc = do_eeprom_crc(transport, &cfg, offset as u16, bytes.len())
            .map_err(PpmError::ProgrammingFailed)?;
        match device_crc {
            Some(crc) if crc == host_crc => Ok(()),
            _ => Err(PpmError::VerifyFailed),
        }
    })?;

    if !flushed {
        return Err(PpmError::MissingData);
    }
    Ok(())
}
