//! Sparse memory-image contract (spec.md §3: "HexImage (external, opaque)")
//! and a concrete Intel-HEX backed realization. Intel-HEX parsing itself is
//! explicitly out of scope for the core (spec.md §1); `IhexImage` is the
//! swappable adapter the CLI uses to hand the orchestrator a real image.

use std::collections::BTreeMap;

use ihex::Record;

use crate::error::PpmError;

/// Sparse `address -> byte` mapping, queried the way the orchestrator needs
/// to slice out page-aligned, blank-filled runs.
pub trait HexImage {
    fn min_address(&self) -> Option<u32>;
    fn max_address(&self) -> Option<u32>;
    fn count_in_range(&self, start: u32, len: u32) -> u32;
    fn get_filled(&self, start: u32, len: u32, blank: u8) -> Vec<u8>;
}

/// An Intel-HEX image materialized into a sparse map, via the `ihex` crate.
pub struct IhexImage {
    data: BTreeMap<u32, u8>,
}

impl IhexImage {
    pub fn parse(text: &str) -> Result<Self, PpmError> {
        let mut data = BTreeMap::new();
        let mut upper = 0u32;

        for record in ihex::Reader::new(text) {
            let record = record.map_err(|_| PpmError::InvHex)?;
            match record {
                Record::Data { offset, value } => {
                    for (i, byte) in value.into_iter().enumerate() {
                        let addr = upper + offset as u32 + i as u32;
                        data.insert(addr, byte);
                    }
                }
                Record::ExtendedSegmentAddress(segment) => {
                    upper = (segment as u32) << 4;
                }
                Record::ExtendedLinearAddress(linear) => {
                    upper = (linear as u32) << 16;
                }
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
                Record::EndOfFile => break,
            }
        }

        Ok(IhexImage { data })
    }
}

impl HexImage for IhexImage {
    fn min_address(&self) -> Option<u32> {
        self.data.keys().next().copied()
    }

    fn max_address(&self) -> Option<u32> {
        self.data.keys().next_back().copied()
    }

    fn count_in_range(&self, start: u32, len: u32) -> u32 {
        self.data.range(start..start.saturating_add(len)).count() as u32
    }

    fn get_filled(&self, start: u32, len: u32, blank: u8) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let addr = start.saturating_add(i);
                self.data.get(&addr).copied().unwrap_or(blank)
            })
            .collect()
    }
}
