//! Frame-transport contract (spec.md §2.1, §6) and a concrete serial-port
//! realization.
//!
//! The real PPM peripheral encodes each word as a stream of 2-bit pulse
//! symbols and is vendor hardware — explicitly out of scope for this crate
//! (spec.md §1). [`SerialTransport`] is a placeholder framing over a plain
//! serial link so the CLI has something real to drive; it is not a
//! pulse-accurate implementation of the Melexis PPM encoding.

use std::io::{Read, Write};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::TransportError;
use crate::frame::FrameKind;

/// Blocking, synchronous framed transport (spec.md §2.1). Implementations
/// may realize `recv_frame`'s timeout with a bounded queue, a condition
/// variable, or (as here) a blocking read with a deadline — the only
/// contract is "deliver the next fully-decoded frame or time out".
pub trait Transport {
    fn set_bitrate(&mut self, bps: u32) -> Result<(), TransportError>;
    fn send_enter_pattern(&mut self, us: u32) -> Result<(), TransportError>;
    fn send_calibration(&mut self) -> Result<(), TransportError>;
    fn send_frame(&mut self, kind: FrameKind, words: &[u16]) -> Result<(), TransportError>;
    fn recv_frame(&mut self, timeout_ms: u16) -> Option<(FrameKind, Vec<u16>)>;

    /// Suspension point used in place of a receive when no ack is requested
    /// (spec.md §5, broadcast mode). Default realization just blocks the
    /// calling thread; a test double may override this to skip real time.
    fn sleep(&mut self, ms: u16) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// Placeholder byte framing used by [`SerialTransport`]:
/// `[kind: u8][len: u16 LE][words: len * u16 LE]`, mirroring the way
/// `blri::main::send_command` frames its own ISP packets
/// (command byte, then a length-prefixed payload) over the same
/// `serialport` crate.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, initial_bitrate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, initial_bitrate)
            .timeout(Duration::from_millis(50))
            .open()?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn set_bitrate(&mut self, bps: u32) -> Result<(), TransportError> {
        self.port
            .set_baud_rate(bps)
            .map_err(|_| TransportError::SetBitrate { bps })
    }

    fn send_enter_pattern(&mut self, us: u32) -> Result<(), TransportError> {
        // The real pattern is four specific pulse widths repeated for
        // `us` microseconds (spec.md GLOSSARY); with no pulse peripheral we
        // encode the duration as an EnterPpm frame carrying it as a word
        // pair so a listening simulator can still observe intent.
        let words = [
            (us >> 16) as u16,
            (us & 0xFFFF) as u16,
        ];
        self.send_frame(FrameKind::EnterPpm, &words)
            .map_err(|_| TransportError::EnterPattern)
    }

    fn send_calibration(&mut self) -> Result<(), TransportError> {
        self.send_frame(FrameKind::Calibration, &[])
            .map_err(|_| TransportError::Calibration)
    }

    fn send_frame(&mut self, kind: FrameKind, words: &[u16]) -> Result<(), TransportError> {
        let mut buf = Vec::with_capacity(3 + words.len() * 2);
        buf.push(kind.wire_value());
        let mut len_buf = [0u8; 2];
        LittleEndian::write_u16(&mut len_buf, words.len() as u16);
        buf.extend_from_slice(&len_buf);
        for &word in words {
            let mut word_buf = [0u8; 2];
            LittleEndian::write_u16(&mut word_buf, word);
            buf.extend_from_slice(&word_buf);
        }
        self.port.write_all(&buf).map_err(TransportError::Io)?;
        Ok(())
    }

    fn recv_frame(&mut self, timeout_ms: u16) -> Option<(FrameKind, Vec<u16>)> {
        let _ = self
            .port
            .set_timeout(Duration::from_millis(timeout_ms as u64));

        let mut header = [0u8; 3];
        self.port.read_exact(&mut header).ok()?;
        let kind = FrameKind::from_wire_value(header[0]);
        let len = LittleEndian::read_u16(&header[1..3]) as usize;

        let mut payload = vec![0u8; len * 2];
        self.port.read_exact(&mut payload).ok()?;
        let mut words = Vec::with_capacity(len);
        for chunk in payload.chunks_exact(2) {
            words.push(LittleEndian::read_u16(chunk));
        }
        Some((kind, words))
    }
}
