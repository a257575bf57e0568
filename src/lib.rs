//! PPM bootloader engine: a host-side driver for the two-pin pulse-position
//! modulation bootloader protocol used to program Melexis microcontrollers.
//!
//! The crate is organized the way `examples/original_source/` splits the
//! original C library: a frame-transport boundary, a session/page state
//! machine, a programming orchestrator that sequences sessions against a
//! chip descriptor, and the supporting chip catalogue, crc and hex-image
//! modules. See DESIGN.md for how each module is grounded.

pub mod chip;
pub mod cli;
pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hex;
pub mod orchestrator;
pub mod session;
pub mod session_defaults;
pub mod transport;

pub use error::{PpmError, Result};
