//! Checksum and CRC primitives used to build and verify PPM frames.
//!
//! The wire protocol calls for three flavors of check value:
//! - an 8-bit page checksum, a plain reducing sum (not a CRC at all — see
//!   [`page_checksum`]);
//! - a 16-bit CCITT-style CRC with a protocol-chosen seed ([`crc16`]);
//! - a 24-bit CRC selected per chip family for flash programming
//!   ([`FlashCrcFunc`]).
//!
//! The exact 24-bit polynomials used by the real Melexis bootloader are not
//! part of this project's source material (see DESIGN.md); three distinct,
//! real 24-bit CRCs from the `crc` crate's catalogue stand in for the three
//! chip-family variants so the flash-programming session has a concrete,
//! swappable checksum for each family.

use crc::{Crc, CRC_16_CCITT_FALSE, CRC_24_FLEXRAY_A, CRC_24_INTERLAKEN, CRC_24_OPENPGP};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_CCITT_FALSE);
const CRC24_AMALTHEA: Crc<u32> = Crc::<u32>::new(&CRC_24_OPENPGP);
const CRC24_GANY_XFE: Crc<u32> = Crc::<u32>::new(&CRC_24_INTERLAKEN);
const CRC24_GANY_KF: Crc<u32> = Crc::<u32>::new(&CRC_24_FLEXRAY_A);

/// Selector for the flash-programming checksum, carried inside
/// `SessionConfig` (spec.md §4.2, "Checksum selection per flash family").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCrcFunc {
    /// No crc: used by sessions whose word 3 is not a flash checksum.
    None,
    Amalthea,
    GanyXfe,
    GanyKf,
}

impl FlashCrcFunc {
    /// Compute the 24-bit flash crc of `words`, masked to 24 bits, using
    /// `seed` as the running CRC's initial value (the protocol always calls
    /// this with `seed = 1`, see spec.md §4.2's FlashProg row).
    pub fn compute(self, words: &[u16], seed: u32) -> u32 {
        let crc = match self {
            FlashCrcFunc::None => return 0,
            FlashCrcFunc::Amalthea => &CRC24_AMALTHEA,
            FlashCrcFunc::GanyXfe => &CRC24_GANY_XFE,
            FlashCrcFunc::GanyKf => &CRC24_GANY_KF,
        };
        let bytes = words_to_le_bytes(words);
        let mut digest = crc.digest_with_initial(seed);
        digest.update(&bytes);
        digest.finalize() & 0x00FF_FFFF
    }
}

/// 8-bit reducing sum over a page of 16-bit words (spec.md §4.1:
/// "a deterministic, memoryless reducing sum"). Grounded in `blri`'s own
/// `send_command` packet checksum (`main.rs`), which folds length and
/// payload bytes with `wrapping_add` the same way.
pub fn page_checksum(words: &[u16]) -> u8 {
    let mut sum: u8 = 0;
    for &word in words {
        let [lo, hi] = word.to_le_bytes();
        sum = sum.wrapping_add(lo).wrapping_add(hi);
    }
    sum
}

/// CCITT-style 16-bit crc with a settable seed (spec.md §4.2: eeprom/flash-cs
/// programming and crc sessions, protocol seed `0x1D0F`).
pub fn crc16(bytes: &[u8], seed: u16) -> u16 {
    let mut digest = CRC16.digest_with_initial(seed);
    digest.update(bytes);
    digest.finalize()
}

fn words_to_le_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for &word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// Reinterpret a byte buffer as little-endian 16-bit words, padding a
/// trailing odd byte with a zero high byte. Shared by the session engine
/// (flash/eeprom payload words) and the orchestrator (host-side CRC
/// recomputation for verify).
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    let mut words = Vec::with_capacity((bytes.len() + 1) / 2);
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        words.push(u16::from_le_bytes([chunk[0], chunk[1]]));
    }
    if let Some(&last) = chunks.remainder().first() {
        words.push(u16::from_le_bytes([last, 0]));
    }
    words
}
