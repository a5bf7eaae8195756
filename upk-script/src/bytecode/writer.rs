//! Append-only instruction buffer.
//!
//! The token decoder is the only producer: it re-emits everything it reads,
//! in encounter order, through the typed pushes below. No push validates
//! anything (validation is the decoder's job) and nothing ever rewrites or
//! removes previously appended bytes.

/// Growable byte buffer holding one struct's decoded instruction stream.
#[derive(Debug, Default)]
pub struct BytecodeBuffer {
    bytes: Vec<u8>,
}

impl BytecodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Freezes the buffer. The result is never appended to again.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn push_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn push_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Indices are always 4 bytes in the decoded stream, regardless of how
    /// compactly the package encoded them.
    pub fn push_index(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Narrow string plus its NUL terminator.
    pub fn push_ascii_z(&mut self, s: &[u8]) {
        self.bytes.extend_from_slice(s);
        self.bytes.push(0);
    }

    /// Wide string as 2-byte code units, terminator included.
    pub fn push_unicode_z(&mut self, s: &[u16]) {
        for unit in s {
            self.bytes.extend_from_slice(&unit.to_le_bytes());
        }
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
    }
}
