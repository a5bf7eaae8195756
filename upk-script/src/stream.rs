//! Sequential cursor over one object's serialized data.
//!
//! The package loader slices one export's payload out of the package file and
//! hands it to the descriptor builders as an [`ObjectStream`]. Every read is
//! bounds-checked; running off the end is a fatal [`LoadError::UnexpectedEof`]
//! for the whole load.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{LoadError, Result};
use crate::field::ObjectFlags;
use crate::name::{NameRef, NameTable, ObjectRef};

/// Per-object metadata the loader already knows from the export table.
///
/// The object's own name, owning scope and flags are not part of its
/// serialized payload; they come from the package directory entry.
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    pub name: NameRef,
    pub outer: ObjectRef,
    pub flags: ObjectFlags,
}

pub struct ObjectStream {
    data: Bytes,
    pos: usize,
    version: u32,
    names: Arc<NameTable>,
    info: ObjectInfo,
}

impl ObjectStream {
    pub fn new(data: Bytes, version: u32, names: Arc<NameTable>, info: ObjectInfo) -> Self {
        Self {
            data,
            pos: 0,
            version,
            names,
            info,
        }
    }

    /// Package format version; gates which optional fields descriptors read.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    #[inline]
    pub fn object_name(&self) -> NameRef {
        self.info.name
    }

    #[inline]
    pub fn object_outer(&self) -> ObjectRef {
        self.info.outer
    }

    #[inline]
    pub fn object_flags(&self) -> ObjectFlags {
        self.info.flags
    }

    /// An export with no serialized payload at all. Descriptor builders treat
    /// this as "default-construct everything", not as an error.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Errors if any undecoded bytes remain past the declared fields.
    ///
    /// Called by each concrete descriptor after its last field; catches
    /// format drift early instead of letting it corrupt the next object.
    pub fn expect_end(&self) -> Result<()> {
        let remaining = self.data.len() - self.pos;
        if remaining != 0 {
            return Err(LoadError::TrailingBytes {
                remaining,
                position: self.pos,
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.pos + n > self.data.len() {
            return Err(LoadError::UnexpectedEof {
                position: self.pos,
                wanted: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Remainder of the payload as one opaque blob.
    pub fn read_remaining(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }

    /// Reads a compact signed index (1 to 5 bytes).
    ///
    /// Layout: byte 0 carries the sign (bit 7), a continuation bit (bit 6)
    /// and 6 value bits; bytes 1..=3 carry a continuation bit (bit 7) and
    /// 7 value bits; byte 4 carries the last 5 bits with no continuation.
    pub fn read_index(&mut self) -> Result<i32> {
        let b0 = self.read_u8()?;
        let negative = b0 & 0x80 != 0;
        let mut value = (b0 & 0x3F) as i32;
        if b0 & 0x40 != 0 {
            let mut shift = 6;
            for i in 0..4 {
                let b = self.read_u8()?;
                if i == 3 {
                    value |= ((b & 0x1F) as i32) << shift;
                    break;
                }
                value |= ((b & 0x7F) as i32) << shift;
                if b & 0x80 == 0 {
                    break;
                }
                shift += 7;
            }
        }
        // Wrapping keeps the bit-level behavior for the all-bits-set
        // encoding of i32::MIN instead of panicking on it.
        Ok(if negative { value.wrapping_neg() } else { value })
    }

    /// Reads a name-table reference and validates that it resolves.
    pub fn read_name(&mut self) -> Result<NameRef> {
        let name = NameRef(self.read_index()?);
        self.names.get(name)?;
        Ok(name)
    }

    /// Reads an object-table reference. Not resolved here: the referenced
    /// object may not be built yet (forward references are legal).
    pub fn read_object(&mut self) -> Result<ObjectRef> {
        Ok(ObjectRef(self.read_index()?))
    }

    /// Reads a string in the package's native framing: NUL-terminated on
    /// versions below 64, length-prefixed (length includes the NUL) from 64
    /// on. The returned bytes never include the terminator.
    pub fn read_string(&mut self) -> Result<Vec<u8>> {
        if self.version < 64 {
            return self.read_ascii_z();
        }
        let len = self.read_index()?;
        let len = usize::try_from(len).map_err(|_| LoadError::UnexpectedEof {
            position: self.pos,
            wanted: 0,
        })?;
        let mut raw = self.read_bytes(len)?;
        if raw.last() == Some(&0) {
            raw.pop();
        }
        Ok(raw)
    }

    /// Reads a NUL-terminated narrow string (terminator consumed, not kept).
    pub fn read_ascii_z(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                return Ok(out);
            }
            out.push(b);
        }
    }

    /// Reads a NUL-terminated wide string of 2-byte code units.
    pub fn read_unicode_z(&mut self) -> Result<Vec<u16>> {
        let mut out = Vec::new();
        loop {
            let c = self.read_u16()?;
            if c == 0 {
                return Ok(out);
            }
            out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::StreamBuilder;

    #[test]
    fn fixed_width_reads_advance_in_order() {
        let mut s = StreamBuilder::new()
            .u8(0xAB)
            .u16(0x1234)
            .u32(0xDEAD_BEEF)
            .f32(1.5)
            .stream(61);
        assert_eq!(s.read_u8().unwrap(), 0xAB);
        assert_eq!(s.read_u16().unwrap(), 0x1234);
        assert_eq!(s.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(s.read_f32().unwrap(), 1.5);
        s.expect_end().unwrap();
    }

    #[test]
    fn compact_index_roundtrip() {
        for v in [0, 1, -1, 63, 64, -64, 1000, -1000, 1 << 20, i32::MAX / 2] {
            let mut s = StreamBuilder::new().index(v).stream(68);
            assert_eq!(s.read_index().unwrap(), v, "value {v}");
            s.expect_end().unwrap();
        }
    }

    #[test]
    fn compact_index_extreme_value_does_not_panic() {
        // Five bytes, all value bits in the last one: decodes to the
        // i32::MIN bit pattern. Sign application must wrap, not overflow.
        let mut s = StreamBuilder::new()
            .raw(&[0xC0, 0x80, 0x80, 0x80, 0x10])
            .stream(68);
        assert_eq!(s.read_index().unwrap(), i32::MIN);
        s.expect_end().unwrap();
    }

    #[test]
    fn eof_reports_position() {
        let mut s = StreamBuilder::new().u8(1).stream(68);
        s.read_u8().unwrap();
        let err = s.read_u32().unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnexpectedEof {
                position: 1,
                wanted: 4
            }
        ));
    }

    #[test]
    fn trailing_bytes_are_fatal() {
        let s = StreamBuilder::new().u8(0).u8(0).stream(68);
        assert!(matches!(
            s.expect_end(),
            Err(LoadError::TrailingBytes {
                remaining: 2,
                position: 0
            })
        ));
    }

    #[test]
    fn string_framing_depends_on_version() {
        // Pre-64: plain NUL-terminated.
        let mut s = StreamBuilder::new().ascii_z(b"Hello").stream(63);
        assert_eq!(s.read_string().unwrap(), b"Hello");
        s.expect_end().unwrap();

        // 64+: compact-index length prefix including the NUL.
        let mut s = StreamBuilder::new().index(6).ascii_z(b"Hello").stream(64);
        assert_eq!(s.read_string().unwrap(), b"Hello");
        s.expect_end().unwrap();
    }

    #[test]
    fn unicode_z_stops_at_terminator() {
        let mut s = StreamBuilder::new()
            .u16('H' as u16)
            .u16('i' as u16)
            .u16(0)
            .u8(0x7F)
            .stream(68);
        assert_eq!(s.read_unicode_z().unwrap(), vec!['H' as u16, 'i' as u16]);
        assert_eq!(s.read_u8().unwrap(), 0x7F);
    }
}
