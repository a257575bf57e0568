//! Default session configuration templates (spec.md §6, bit-exact with
//! `examples/original_source/include/ppm_session.h`'s
//! `PPM_SESSION_*_DEFAULT` macros).

use crate::crc::FlashCrcFunc;
use crate::frame::SessionId;
use crate::session::SessionConfig;

/// One of the ten named session kinds a caller can request a default
/// configuration for. `IumProg`/`IumCrc` reuse the `EepromProg`/`EepromCrc`
/// wire session ids with their own timing (spec.md §9: "Treat IUM and
/// EEPROM as the same wire session with different timing defaults, not two
/// tags").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTemplate {
    Unlock,
    ProgKeys,
    FlashProgAmalthea,
    FlashProgGanyXfe,
    FlashProgGanyKf,
    EepromProg,
    IumProg,
    FlashCsProg,
    FlashCrc,
    EepromCrc,
    IumCrc,
    FlashCsCrc,
    ChipReset,
}

impl SessionTemplate {
    pub fn default_config(self) -> SessionConfig {
        use SessionTemplate::*;
        match self {
            Unlock => SessionConfig {
                session_id: SessionId::Unlock,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::None,
            },
            ProgKeys => SessionConfig {
                session_id: SessionId::ProgKeys,
                page_size_words: 8,
                request_ack: true,
                page_retry: 1,
                page0_ack_timeout_ms: 25,
                pagex_ack_timeout_ms: 10,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::None,
            },
            FlashProgAmalthea => SessionConfig {
                session_id: SessionId::FlashProg,
                page_size_words: 64,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 100,
                pagex_ack_timeout_ms: 10,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::Amalthea,
            },
            FlashProgGanyXfe => SessionConfig {
                session_id: SessionId::FlashProg,
                page_size_words: 64,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 100,
                pagex_ack_timeout_ms: 10,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::GanyXfe,
            },
            FlashProgGanyKf => SessionConfig {
                session_id: SessionId::FlashProg,
                page_size_words: 64,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 100,
                pagex_ack_timeout_ms: 10,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::GanyKf,
            },
            EepromProg => SessionConfig {
                session_id: SessionId::EepromProg,
                page_size_words: 4,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 15,
                pagex_ack_timeout_ms: 15,
                session_ack_timeout_ms: 17,
                crc_func: FlashCrcFunc::None,
            },
            IumProg => SessionConfig {
                session_id: SessionId::EepromProg,
                page_size_words: 64,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 8,
                pagex_ack_timeout_ms: 8,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::None,
            },
            FlashCsProg => SessionConfig {
                session_id: SessionId::FlashCsProg,
                page_size_words: 64,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 50,
                pagex_ack_timeout_ms: 7,
                session_ack_timeout_ms: 15,
                crc_func: FlashCrcFunc::None,
            },
            FlashCrc => SessionConfig {
                session_id: SessionId::FlashCrc,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 5,
                crc_func: FlashCrcFunc::None,
            },
            EepromCrc => SessionConfig {
                session_id: SessionId::EepromCrc,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 5,
                crc_func: FlashCrcFunc::None,
            },
            IumCrc => SessionConfig {
                session_id: SessionId::EepromCrc,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 8,
                crc_func: FlashCrcFunc::None,
            },
            FlashCsCrc => SessionConfig {
                session_id: SessionId::FlashCsCrc,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 5,
                crc_func: FlashCrcFunc::None,
            },
            ChipReset => SessionConfig {
                session_id: SessionId::ChipReset,
                page_size_words: 0,
                request_ack: true,
                page_retry: 5,
                page0_ack_timeout_ms: 0,
                pagex_ack_timeout_ms: 0,
                session_ack_timeout_ms: 10,
                crc_func: FlashCrcFunc::None,
            },
        }
    }

    /// All thirteen templates, for `dump-defaults` (SPEC_FULL.md §4).
    pub const ALL: [SessionTemplate; 13] = [
        SessionTemplate::Unlock,
        SessionTemplate::ProgKeys,
        SessionTemplate::FlashProgAmalthea,
        SessionTemplate::FlashProgGanyXfe,
        SessionTemplate::FlashProgGanyKf,
        SessionTemplate::EepromProg,
        SessionTemplate::IumProg,
        SessionTemplate::FlashCsProg,
        SessionTemplate::FlashCrc,
        SessionTemplate::EepromCrc,
        SessionTemplate::IumCrc,
        SessionTemplate::FlashCsCrc,
        SessionTemplate::ChipReset,
    ];

    pub fn name(self) -> &'static str {
        use SessionTemplate::*;
        match self {
            Unlock => "Unlock",
            ProgKeys => "ProgKeys",
            FlashProgAmalthea => "FlashProg (Amalthea)",
            FlashProgGanyXfe => "FlashProg (Ganymede XFE)",
            FlashProgGanyKf => "FlashProg (Ganymede KF)",
            EepromProg => "EepromProg",
            IumProg => "IumProg",
            FlashCsProg => "FlashCsProg",
            FlashCrc => "FlashCrc",
            EepromCrc => "EepromCrc",
            IumCrc => "IumCrc",
            FlashCsCrc => "FlashCsCrc",
            ChipReset => "ChipReset",
        }
    }
}
