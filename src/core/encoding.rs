//! Nybble-stream encoding/decoding utilities for TAG files
//!
//! TAG files are a stream of 4-bit nybbles. Within a byte the high nybble comes first, and
//! multi-nybble integers are stored most significant nybble first.

/// Number of nybbles in a byte
pub const NYBBLES_PER_BYTE: usize = 2;

/// Largest number of bytes a varint may occupy (21 bits of payload)
pub const MAX_VARINT_BYTES: usize = 3;

/// Reads nybbles from a borrowed byte buffer.
///
/// Every read returns `None` once the configured end is reached, leaving the position unchanged.
#[derive(Debug, Clone)]
pub struct NybbleReader<'a> {
    data: &'a [u8],
    position: usize,
    end: usize,
}

impl<'a> NybbleReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            end: data.len() * NYBBLES_PER_BYTE,
        }
    }

    /// Current position, in nybbles from the start of the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Nybbles left before the end limit
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.position)
    }

    /// Move to the start of the given byte
    pub fn seek_to_byte(&mut self, byte_offset: usize) {
        self.position = (byte_offset * NYBBLES_PER_BYTE).min(self.data.len() * NYBBLES_PER_BYTE);
    }

    /// Limit reads to the bytes before `byte_offset`
    pub fn set_end_byte(&mut self, byte_offset: usize) {
        self.end = (byte_offset * NYBBLES_PER_BYTE).min(self.data.len() * NYBBLES_PER_BYTE);
    }

    fn nybble_at(&self, index: usize) -> u8 {
        let byte = self.data[index / NYBBLES_PER_BYTE];
        if index % NYBBLES_PER_BYTE == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }

    pub fn read_nybble(&mut self) -> Option<u8> {
        if self.position >= self.end {
            return None;
        }
        let nybble = self.nybble_at(self.position);
        self.position += 1;
        Some(nybble)
    }

    /// Read an unsigned integer made of `nybbles` nybbles (at most 16)
    pub fn read_unsigned(&mut self, nybbles: usize) -> Option<u64> {
        debug_assert!(nybbles <= 16);
        if self.remaining() < nybbles {
            return None;
        }
        let mut value = 0u64;
        for _ in 0..nybbles {
            value = (value << 4) | u64::from(self.nybble_at(self.position));
            self.position += 1;
        }
        Some(value)
    }

    /// Read a two's complement signed integer made of `nybbles` nybbles
    pub fn read_signed(&mut self, nybbles: usize) -> Option<i64> {
        let raw = self.read_unsigned(nybbles)?;
        Some(sign_extend(raw, nybbles * 4))
    }

    /// Read a big-endian IEEE-754 double (16 nybbles)
    pub fn read_double(&mut self) -> Option<f64> {
        self.read_unsigned(16).map(f64::from_bits)
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.read_unsigned(NYBBLES_PER_BYTE).map(|b| b as u8)
    }

    /// Read NUL-terminated single-byte characters. Bytes map to Latin-1 code points.
    pub fn read_ansi_string(&mut self) -> Option<String> {
        let start = self.position;
        let mut text = String::new();
        loop {
            match self.read_byte() {
                Some(0) => return Some(text),
                Some(b) => text.push(char::from(b)),
                None => {
                    self.position = start;
                    return None;
                }
            }
        }
    }

    /// Read NUL-terminated UTF-16 code units (4 nybbles each)
    pub fn read_unicode_string(&mut self) -> Option<String> {
        let start = self.position;
        let mut units = Vec::new();
        loop {
            match self.read_unsigned(4) {
                Some(0) => return Some(String::from_utf16_lossy(&units)),
                Some(unit) => units.push(unit as u16),
                None => {
                    self.position = start;
                    return None;
                }
            }
        }
    }

    /// Read a LEB128 varint stored in whole bytes (two nybbles each)
    pub fn read_varint(&mut self) -> Option<u32> {
        let start = self.position;
        let mut value = 0u32;
        for index in 0..MAX_VARINT_BYTES {
            let Some(byte) = self.read_byte() else {
                self.position = start;
                return None;
            };
            value |= u32::from(byte & 0x7F) << (7 * index);
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        // Continuation bit on the final permitted byte
        self.position = start;
        None
    }
}

/// Sign-extend the low `bits` bits of `raw`
pub fn sign_extend(raw: u64, bits: usize) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

/// Writes nybbles into a growable byte buffer.
#[derive(Debug, Default, Clone)]
pub struct NybbleWriter {
    bytes: Vec<u8>,
    nybbles: usize,
}

impl NybbleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_nybble(&mut self, nybble: u8) {
        let nybble = nybble & 0x0F;
        if self.nybbles % NYBBLES_PER_BYTE == 0 {
            self.bytes.push(nybble << 4);
        } else if let Some(last) = self.bytes.last_mut() {
            *last |= nybble;
        }
        self.nybbles += 1;
    }

    /// Write the low `nybbles * 4` bits of `value`, most significant nybble first
    pub fn write_unsigned(&mut self, value: u64, nybbles: usize) {
        for index in (0..nybbles).rev() {
            self.write_nybble(((value >> (index * 4)) & 0x0F) as u8);
        }
    }

    pub fn write_signed(&mut self, value: i64, nybbles: usize) {
        self.write_unsigned(value as u64, nybbles);
    }

    pub fn write_double(&mut self, value: f64) {
        self.write_unsigned(value.to_bits(), 16);
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.write_unsigned(u64::from(byte), NYBBLES_PER_BYTE);
    }

    /// Characters outside Latin-1 are written as `?`
    pub fn write_ansi_string(&mut self, text: &str) {
        for c in text.chars() {
            let byte = u8::try_from(u32::from(c)).ok().filter(|b| *b != 0).unwrap_or(b'?');
            self.write_byte(byte);
        }
        self.write_byte(0);
    }

    pub fn write_unicode_string(&mut self, text: &str) {
        for unit in text.encode_utf16().filter(|u| *u != 0) {
            self.write_unsigned(u64::from(unit), 4);
        }
        self.write_unsigned(0, 4);
    }

    /// Values wider than 21 bits are truncated
    pub fn write_varint(&mut self, value: u32) {
        let mut remaining = value & 0x001F_FFFF;
        loop {
            let mut byte = (remaining & 0x7F) as u8;
            remaining >>= 7;
            if remaining != 0 {
                byte |= 0x80;
            }
            self.write_byte(byte);
            if remaining == 0 {
                break;
            }
        }
    }

    /// Pad with a zero nybble if the stream ends mid-byte
    pub fn align_to_byte(&mut self) {
        if self.nybbles % NYBBLES_PER_BYTE != 0 {
            self.write_nybble(0);
        }
    }

    /// Append raw bytes; the writer must be byte aligned
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.bytes.extend_from_slice(bytes);
        self.nybbles += bytes.len() * NYBBLES_PER_BYTE;
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
