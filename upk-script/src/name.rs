//! Symbol and object references.
//!
//! Cross-references between descriptors are indices into the package's
//! name/object tables, never live pointers: the referenced object may not be
//! constructed yet when a descriptor is read (forward references are legal).
//! Resolving them is a later loader pass, not this crate's job.

use std::borrow::Cow;

use crate::error::{LoadError, Result};

/// Reserved sentinel symbol marking "no value" / "end of list" on disk.
pub const NAME_NONE: &str = "None";

/// Index into the package name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NameRef(pub i32);

/// Index into the package object table.
///
/// Zero means "no object"; positive indices refer to exports, negative to
/// imports, matching the on-disk convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectRef(pub i32);

impl ObjectRef {
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// The package's ordered symbol table.
///
/// Names are kept as the raw bytes stored in the package. Encoding is
/// effectively Windows-1252 for the packages we care about; decoding is only
/// done when a caller wants to display or compare a name.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<Vec<u8>>,
}

impl NameTable {
    pub fn new(entries: Vec<Vec<u8>>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: NameRef) -> Result<&[u8]> {
        usize::try_from(name.0)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(Vec::as_slice)
            .ok_or(LoadError::BadName { index: name.0 })
    }

    pub fn get_str(&self, name: NameRef) -> Result<Cow<'_, str>> {
        let raw = self.get(name)?;
        let (s, _, _) = encoding_rs::WINDOWS_1252.decode(raw);
        Ok(s)
    }

    /// Whether `name` resolves to the reserved "None" sentinel.
    ///
    /// The original loader compares by string, not by table position, so a
    /// package is free to put "None" anywhere in its table.
    pub fn is_none_name(&self, name: NameRef) -> Result<bool> {
        Ok(self.get(name)? == NAME_NONE.as_bytes())
    }
}
