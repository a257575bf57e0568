//! A faithful-echo simulated target (spec.md §8's round-trip laws), used
//! across the scenario tests in place of real hardware.

use std::collections::HashMap;

use ihex::{create_object_file_representation, Record};
use ppm_prog::error::TransportError;
use ppm_prog::frame::{FrameKind, SessionId};
use ppm_prog::transport::Transport;

/// Build Intel-HEX text out of disjoint byte runs, via `ihex`'s own writer
/// rather than hand-assembled records.
pub fn ihex_from_runs(runs: &[(u32, &[u8])]) -> String {
    let mut records: Vec<Record> = runs
        .iter()
        .map(|(addr, data)| Record::Data {
            offset: *addr as u16,
            value: data.to_vec(),
        })
        .collect();
    records.push(Record::EndOfFile);
    create_object_file_representation(&records).expect("build ihex text")
}

pub fn ihex_fill(base: u32, len: u32, byte: u8) -> String {
    let data = vec![byte; len as usize];
    let runs: Vec<(u32, &[u8])> = data
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| (base + (i * 16) as u32, chunk))
        .collect();
    ihex_from_runs(&runs)
}

/// A target that acks every frame it receives, deriving the session-ack
/// payload from the session header it was just sent — `Unlock` and
/// `ProgKeys` are special-cased since their ack payload is not a plain echo
/// of what the host sent. Callers can install an explicit `ack_overrides`
/// entry (keyed by wire session id) to model a target returning a specific
/// (possibly wrong) crc/checksum pair, and `nack_counts` to make a page
/// refuse to ack for its first N attempts.
pub struct SimulatedTarget {
    pub sent: Vec<(FrameKind, Vec<u16>)>,
    pub recv_calls: usize,
    pub project_id: u16,
    pub ack_overrides: HashMap<u8, (u16, u16)>,
    pub nack_counts: HashMap<u16, u8>,
    pending_page: Option<Vec<u16>>,
    pending_session: Option<[u16; 4]>,
    page_attempts: HashMap<u16, u8>,
}

impl SimulatedTarget {
    pub fn new(project_id: u16) -> Self {
        SimulatedTarget {
            sent: Vec::new(),
            recv_calls: 0,
            project_id,
            ack_overrides: HashMap::new(),
            nack_counts: HashMap::new(),
            pending_page: None,
            pending_session: None,
            page_attempts: HashMap::new(),
        }
    }

    pub fn sessions_of(&self, id: SessionId) -> Vec<&Vec<u16>> {
        self.sent
            .iter()
            .filter(|(kind, words)| {
                *kind == FrameKind::Session && (words[0] >> 8) as u8 & 0x7F == id as u8
            })
            .map(|(_, words)| words)
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sent
            .iter()
            .filter(|(kind, _)| *kind == FrameKind::Session)
            .count()
    }
}

impl Transport for SimulatedTarget {
    fn set_bitrate(&mut self, _bps: u32) -> Result<(), TransportError> {
        Ok(())
    }

    fn send_enter_pattern(&mut self, _us: u32) -> Result<(), TransportError> {
        Ok(())
    }

    fn send_calibration(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn send_frame(&mut self, kind: FrameKind, words: &[u16]) -> Result<(), TransportError> {
        self.sent.push((kind, words.to_vec()));
        match kind {
            FrameKind::Session => {
                let mut header = [0u16; 4];
                header.copy_from_slice(&words[..4]);
                self.pending_session = Some(header);
                self.pending_page = None;
            }
            FrameKind::Page => {
                self.pending_page = Some(words.to_vec());
            }
            _ => {}
        }
        Ok(())
    }

    fn recv_frame(&mut self, _timeout_ms: u16) -> Option<(FrameKind, Vec<u16>)> {
        self.recv_calls += 1;
        if let Some(page) = self.pending_page.take() {
            let seq = page[0] >> 8;
            let attempts = self.page_attempts.entry(seq).or_insert(0);
            *attempts += 1;
            let nacks = self.nack_counts.get(&seq).copied().unwrap_or(0);
            if *attempts <= nacks {
                return None;
            }
            return Some((FrameKind::Page, page));
        }

        let header = self.pending_session.take()?;
        let session_id = (header[0] >> 8) as u8 & 0x7F;
        let mut ack = header;
        ack[0] = header[0].wrapping_add(1);

        if let Some(&(w2, w3)) = self.ack_overrides.get(&session_id) {
            ack[2] = w2;
            ack[3] = w3;
        } else if session_id == SessionId::Unlock as u8 {
            ack[3] = self.project_id;
        } else if session_id == SessionId::ProgKeys as u8 {
            ack[2] = 0xBEBE;
            ack[3] = 0xBEBE;
        }
        Some((FrameKind::Session, ack.to_vec()))
    }
}
