//! The target-memory contract.
//!
//! The core never reads a target directly; a [`MemoryReader`] is injected
//! when the program is built. A failed or short read is a [`Error::Fault`]
//! carrying the address, which callers like the pretty-printer may treat as
//! recoverable.

use crate::error::{Error, Result};

pub trait MemoryReader: Send {
    /// Fills `buf` from `address`. `physical` selects the physical address
    /// space for targets that distinguish the two. A short read is an
    /// error, not a signal.
    fn read(&self, buf: &mut [u8], address: u64, physical: bool) -> Result<()>;
}

/// A reader with no mappings; every access faults. Useful as a placeholder
/// for programs whose objects are all values.
pub struct EmptyReader;

impl MemoryReader for EmptyReader {
    fn read(&self, _buf: &mut [u8], address: u64, _physical: bool) -> Result<()> {
        Err(Error::Fault { address })
    }
}

struct Segment {
    address: u64,
    data: Vec<u8>,
}

/// A reader over in-memory segments, one list per address space.
#[derive(Default)]
pub struct SegmentReader {
    virtual_segments: Vec<Segment>,
    physical_segments: Vec<Segment>,
}

impl SegmentReader {
    pub fn new() -> SegmentReader {
        SegmentReader::default()
    }

    pub fn add_segment(&mut self, address: u64, data: Vec<u8>, physical: bool) {
        let segments = if physical {
            &mut self.physical_segments
        } else {
            &mut self.virtual_segments
        };
        segments.push(Segment { address, data });
    }
}

impl MemoryReader for SegmentReader {
    fn read(&self, buf: &mut [u8], address: u64, physical: bool) -> Result<()> {
        let segments = if physical {
            &self.physical_segments
        } else {
            &self.virtual_segments
        };
        let len = buf.len() as u64;
        for segment in segments {
            let segment_len = segment.data.len() as u64;
            if address >= segment.address
                && address.wrapping_sub(segment.address) + len <= segment_len
            {
                let start = (address - segment.address) as usize;
                buf.copy_from_slice(&segment.data[start..start + buf.len()]);
                return Ok(());
            }
        }
        Err(Error::Fault { address })
    }
}
