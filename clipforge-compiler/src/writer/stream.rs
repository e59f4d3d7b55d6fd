//! Relocatable byte stream
//!
//! Sections of a compiled clip reference each other by absolute byte
//! offsets that are not known until the target section is written. The
//! stream hands out [`LinkId`]s for forward-declared u32 offset fields and
//! refuses to finish while any link is unresolved.

use crate::error::{check_u32, ClipError};

/// Handle to one unresolved u32 offset field. Not copyable; resolving
/// consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct LinkId(usize);

/// Growable little-endian byte stream with offset links
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: Vec<u8>,
    unresolved: Vec<usize>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current write position as a serializable offset
    pub fn position(&self) -> Result<u32, ClipError> {
        check_u32("stream offset", self.buf.len() as u64)
    }

    /// Zero-pad up to the next multiple of `align`
    pub fn align_to(&mut self, align: usize) {
        let rem = self.buf.len() % align;
        if rem != 0 {
            self.buf.resize(self.buf.len() + align - rem, 0);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a placeholder u32 and return its link
    pub fn reserve_u32_link(&mut self) -> LinkId {
        let pos = self.buf.len();
        self.write_u32(0);
        self.unresolved.push(pos);
        LinkId(pos)
    }

    /// Declare an already-written u32 field (inside a header blob) a link
    pub fn link_at(&mut self, pos: usize) -> Result<LinkId, ClipError> {
        if pos + 4 > self.buf.len() {
            return Err(ClipError::contract(format!(
                "link at {pos} lies outside the written stream"
            )));
        }
        self.unresolved.push(pos);
        Ok(LinkId(pos))
    }

    /// Patch a link with an absolute offset
    pub fn resolve_link(&mut self, link: LinkId, value: u32) -> Result<(), ClipError> {
        let Some(i) = self.unresolved.iter().position(|&p| p == link.0) else {
            return Err(ClipError::contract(format!(
                "link at {} resolved twice",
                link.0
            )));
        };
        self.unresolved.swap_remove(i);
        self.buf[link.0..link.0 + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Patch a link with the current write position
    pub fn resolve_link_here(&mut self, link: LinkId) -> Result<(), ClipError> {
        let pos = self.position()?;
        self.resolve_link(link, pos)
    }

    /// Take the finished buffer; fails if any link is still dangling
    pub fn finish(self) -> Result<Vec<u8>, ClipError> {
        if let Some(&pos) = self.unresolved.first() {
            return Err(ClipError::contract(format!(
                "{} unresolved links, first at offset {pos}",
                self.unresolved.len()
            )));
        }
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_resolve() {
        let mut w = StreamWriter::new();
        w.write_u32(0xAABBCCDD);
        let link = w.reserve_u32_link();
        w.write_u16(7);
        w.align_to(16);
        let pos = w.position().unwrap();
        w.resolve_link(link, pos).unwrap();

        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 16);
    }

    #[test]
    fn test_unresolved_link_fails_finish() {
        let mut w = StreamWriter::new();
        let _link = w.reserve_u32_link();
        assert!(w.finish().is_err());
    }

    #[test]
    fn test_double_resolution_rejected() {
        let mut w = StreamWriter::new();
        let link = w.reserve_u32_link();
        w.resolve_link(link, 4).unwrap();
        // A second handle to the same position is a programming error
        let stale = LinkId(0);
        assert!(w.resolve_link(stale, 8).is_err());
    }

    #[test]
    fn test_link_inside_header_blob() {
        let mut w = StreamWriter::new();
        w.write_bytes(&[0u8; 32]);
        let link = w.link_at(8).unwrap();
        w.resolve_link(link, 0x1234).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 0x1234);
        assert!(StreamWriter::new().link_at(8).is_err());
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let mut w = StreamWriter::new();
        w.write_u8(1);
        w.align_to(4);
        w.align_to(4);
        assert_eq!(w.len(), 4);
    }
}
