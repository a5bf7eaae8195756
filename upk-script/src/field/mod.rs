//! The typed descriptor hierarchy read from one package.
//!
//! The on-disk format is a chain of "read this level's fields, then the base
//! level's fields" constructors. Here each level is a record embedding its
//! base as a named sub-record, and each `load` reads exactly the wire fields
//! that level contributes, in declared order. Cross-references stay opaque
//! table indices; resolving them is a later loader pass.

mod property;
mod structs;

pub use property::{
    ArrayPropertyDescriptor, BytePropertyDescriptor, ClassPropertyDescriptor,
    FixedArrayPropertyDescriptor, MapPropertyDescriptor, ObjectPropertyDescriptor,
    PropertyDescriptor, PropertyFlags, StructPropertyDescriptor,
};
pub use structs::{
    ClassDependency, ClassDescriptor, ClassFlags, FunctionDescriptor, FunctionFlags,
    StateDescriptor, StateFlags, StructDescriptor,
};

use std::borrow::Cow;

use crate::error::Result;
use crate::name::{NameRef, ObjectRef};
use crate::stream::ObjectStream;

bitflags::bitflags! {
    /// Per-object flag word from the package directory entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u32 {
        const TRANSACTIONAL = 0x0000_0001;
        const PUBLIC        = 0x0000_0004;
        const TRANSIENT     = 0x0000_4000;
        const STANDALONE    = 0x0008_0000;
        const NATIVE        = 0x0400_0000;
    }
}

/// Base of every metadata node: a named member of some outer scope, with a
/// link to its "superfield" and to the next sibling in the outer's list.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    pub name: NameRef,
    pub outer: ObjectRef,
    pub flags: ObjectFlags,
    pub base_field: ObjectRef,
    pub next: ObjectRef,
}

impl FieldDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        if stream.is_empty() {
            return Ok(Self::default());
        }

        // Name, outer and flags come from the export entry, not the payload.
        let name = stream.object_name();
        let outer = stream.object_outer();
        let flags = stream.object_flags();

        let base_field = stream.read_object()?;
        let next = stream.read_object()?;

        Ok(Self {
            name,
            outer,
            flags,
            base_field,
            next,
        })
    }
}

/// A named compile-time constant; the literal is kept as source text.
#[derive(Debug, Clone, Default)]
pub struct ConstDescriptor {
    pub field: FieldDescriptor,
    /// Raw literal bytes as stored in the package.
    pub value: Vec<u8>,
}

impl ConstDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let field = FieldDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                field,
                ..Self::default()
            });
        }

        let value = stream.read_string()?;
        stream.expect_end()?;

        Ok(Self { field, value })
    }

    pub fn value_str(&self) -> Cow<'_, str> {
        let (s, _, _) = encoding_rs::WINDOWS_1252.decode(&self.value);
        s
    }
}

/// An enumeration: the ordered list of its element names.
#[derive(Debug, Clone, Default)]
pub struct EnumDescriptor {
    pub field: FieldDescriptor,
    pub element_names: Vec<NameRef>,
}

impl EnumDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let field = FieldDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                field,
                ..Self::default()
            });
        }

        // The count is untrusted input; grow on push so a bogus value fails
        // on the first missing entry instead of up-front allocation.
        let count = stream.read_index()?;
        let mut element_names = Vec::new();
        for _ in 0..count {
            element_names.push(stream.read_name()?);
        }
        stream.expect_end()?;

        Ok(Self {
            field,
            element_names,
        })
    }
}
