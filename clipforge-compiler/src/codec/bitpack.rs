//! Bit-level packing for range-quantized payloads
//!
//! Values are packed LSB-first into little-endian bytes, matching the
//! runtime's shift-and-mask unpacking.

/// LSB-first bit writer over a growable byte buffer
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Bits used in the last byte (0 = byte boundary)
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`
    pub fn push(&mut self, value: u32, bits: u8) {
        debug_assert!(bits <= 32);
        let mut remaining = bits;
        let mut value = value as u64;
        while remaining > 0 {
            if self.bit_pos == 0 {
                self.bytes.push(0);
            }
            let free = 8 - self.bit_pos;
            let take = free.min(remaining);
            let mask = (1u64 << take) - 1;
            let last = self.bytes.last_mut().unwrap();
            *last |= ((value & mask) as u8) << self.bit_pos;
            value >>= take;
            self.bit_pos = (self.bit_pos + take) % 8;
            remaining -= take;
        }
    }

    /// Pad to the next byte boundary
    pub fn align_byte(&mut self) {
        self.bit_pos = 0;
    }

    pub fn bit_len(&self) -> usize {
        if self.bit_pos == 0 {
            self.bytes.len() * 8
        } else {
            (self.bytes.len() - 1) * 8 + self.bit_pos as usize
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// LSB-first bit reader over a byte slice
#[derive(Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, bit_pos: 0 }
    }

    /// Read `bits` bits; reading past the end yields zero bits
    pub fn read(&mut self, bits: u8) -> u32 {
        debug_assert!(bits <= 32);
        let mut out = 0u64;
        let mut got = 0u8;
        while got < bits {
            let byte_index = self.bit_pos / 8;
            if byte_index >= self.bytes.len() {
                break;
            }
            let offset = (self.bit_pos % 8) as u8;
            let avail = 8 - offset;
            let take = avail.min(bits - got);
            let chunk = (self.bytes[byte_index] >> offset) as u64 & ((1u64 << take) - 1);
            out |= chunk << got;
            got += take;
            self.bit_pos += take as usize;
        }
        out as u32
    }

    /// Skip to the next byte boundary
    pub fn align_byte(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_mixed_widths() {
        let mut w = BitWriter::new();
        w.push(0b101, 3);
        w.push(0x3FF, 10);
        w.push(0, 1);
        w.push(0xABCD, 16);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(3), 0b101);
        assert_eq!(r.read(10), 0x3FF);
        assert_eq!(r.read(1), 0);
        assert_eq!(r.read(16), 0xABCD);
    }

    #[test]
    fn test_byte_alignment() {
        let mut w = BitWriter::new();
        w.push(0b11, 2);
        w.align_byte();
        w.push(0xFF, 8);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[1], 0xFF);

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(2), 0b11);
        r.align_byte();
        assert_eq!(r.read(8), 0xFF);
    }

    #[test]
    fn test_zero_width_fields() {
        let mut w = BitWriter::new();
        w.push(123, 0);
        w.push(0b1, 1);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(0), 0);
        assert_eq!(r.read(1), 1);
    }

    #[test]
    fn test_read_past_end_is_zero() {
        let mut r = BitReader::new(&[0xFF]);
        assert_eq!(r.read(8), 0xFF);
        assert_eq!(r.read(8), 0);
    }

    #[test]
    fn test_bit_len() {
        let mut w = BitWriter::new();
        assert_eq!(w.bit_len(), 0);
        w.push(1, 5);
        assert_eq!(w.bit_len(), 5);
        w.push(1, 5);
        assert_eq!(w.bit_len(), 10);
    }
}
