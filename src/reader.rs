use crate::error::{Error, Result};

/// Bounds-checked cursor over a section's bytes.
///
/// Every multi-byte read goes through the cursor so the byte-swap decision
/// made when the file was opened applies uniformly. Truncation surfaces as
/// [`Error::DwarfEof`]; the ELF reader maps it to its own format error where
/// appropriate.
#[derive(Clone, Copy)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    bswap: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], bswap: bool) -> Self {
        Cursor { data, pos: 0, bswap }
    }

    pub fn at(data: &'a [u8], pos: usize, bswap: bool) -> Self {
        Cursor { data, pos, bswap }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::DwarfEof)?;
        if end > self.data.len() {
            return Err(Error::DwarfEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b: [u8; 2] = self.take(2)?.try_into().map_err(|_| Error::DwarfEof)?;
        let v = u16::from_ne_bytes(b);
        Ok(if self.bswap { v.swap_bytes() } else { v })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b: [u8; 4] = self.take(4)?.try_into().map_err(|_| Error::DwarfEof)?;
        let v = u32::from_ne_bytes(b);
        Ok(if self.bswap { v.swap_bytes() } else { v })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b: [u8; 8] = self.take(8)?.try_into().map_err(|_| Error::DwarfEof)?;
        let v = u64::from_ne_bytes(b);
        Ok(if self.bswap { v.swap_bytes() } else { v })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(|v| v as i64)
    }

    /// DWARF initial-length style read of a word whose width depends on the
    /// unit format.
    pub fn read_word(&mut self, is_64_bit: bool) -> Result<u64> {
        if is_64_bit {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(Error::Overflow(
                    "ULEB128 overflowed unsigned 64-bit integer".into(),
                ));
            }
            value |= u64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    pub fn read_sleb128(&mut self) -> Result<i64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(Error::Overflow(
                    "SLEB128 overflowed signed 64-bit integer".into(),
                ));
            }
            result |= u64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= u64::MAX << shift;
                }
                return Ok(result as i64);
            }
        }
    }

    pub fn read_uleb128_into_usize(&mut self) -> Result<usize> {
        let v = self.read_uleb128()?;
        usize::try_from(v).map_err(|_| Error::DwarfEof)
    }

    pub fn skip_leb128(&mut self) -> Result<()> {
        loop {
            if self.read_u8()? & 0x80 == 0 {
                return Ok(());
            }
        }
    }

    /// Reads a NUL-terminated string, leaving the cursor past the NUL.
    pub fn read_cstr(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let rest = &self.data[start.min(self.data.len())..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::DwarfEof)?;
        self.pos = start + nul + 1;
        Ok(&rest[..nul])
    }

    pub fn skip_cstr(&mut self) -> Result<()> {
        self.read_cstr().map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }
}

/// Reads a NUL-terminated string starting at `offset`, without a cursor.
pub(crate) fn cstr_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    if offset > data.len() {
        return Err(Error::DwarfEof);
    }
    let rest = &data[offset..];
    let nul = rest.iter().position(|&b| b == 0).ok_or(Error::DwarfEof)?;
    Ok(&rest[..nul])
}
