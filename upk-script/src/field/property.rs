//! Property descriptors.
//!
//! Which concrete variant to build is decided by the caller from the export's
//! class, not by a discriminant byte in the payload; each variant reads one
//! or two extra type-reference indices on top of the common property header.

use super::FieldDescriptor;
use crate::error::Result;
use crate::name::{NameRef, ObjectRef};
use crate::stream::ObjectStream;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PropertyFlags: u32 {
        const EDIT           = 0x0000_0001;
        const CONST          = 0x0000_0002;
        const INPUT          = 0x0000_0004;
        const EXPORT_OBJECT  = 0x0000_0008;
        const OPTIONAL_PARM  = 0x0000_0010;
        const NET            = 0x0000_0020;
        const CONST_REF      = 0x0000_0040;
        const PARM           = 0x0000_0080;
        const OUT_PARM       = 0x0000_0100;
        const SKIP_PARM      = 0x0000_0200;
        const RETURN_PARM    = 0x0000_0400;
        const COERCE_PARM    = 0x0000_0800;
        const NATIVE         = 0x0000_1000;
        const TRANSIENT      = 0x0000_2000;
        const CONFIG         = 0x0000_4000;
        const LOCALIZED      = 0x0000_8000;
        const TRAVEL         = 0x0001_0000;
        const EDIT_CONST     = 0x0002_0000;
        const GLOBAL_CONFIG  = 0x0004_0000;
        const ON_DEMAND      = 0x0010_0000;
        const NEW            = 0x0020_0000;
        const NEED_CTOR_LINK = 0x0040_0000;
    }
}

/// Flag bits that changed meaning after version 61; the original loader
/// clears them when reading older packages.
const LEGACY_FLAG_MASK: u32 = 0x0008_0040;

/// Common header shared by every property variant.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub field: FieldDescriptor,
    pub array_dim: u32,
    pub flags: PropertyFlags,
    pub category: NameRef,
    /// Present iff the NET flag bit is set.
    pub replication_offset: Option<u16>,
}

impl PropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let field = FieldDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                field,
                ..Self::default()
            });
        }

        let array_dim = stream.read_u32()?;
        let mut flags = PropertyFlags::from_bits_retain(stream.read_u32()?);
        let category = stream.read_name()?;
        let replication_offset = if flags.contains(PropertyFlags::NET) {
            Some(stream.read_u16()?)
        } else {
            None
        };
        if stream.version() <= 61 {
            flags.remove(PropertyFlags::from_bits_retain(LEGACY_FLAG_MASK));
        }

        Ok(Self {
            field,
            array_dim,
            flags,
            category,
            replication_offset,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BytePropertyDescriptor {
    pub property: PropertyDescriptor,
    pub enum_type: ObjectRef,
}

impl BytePropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let enum_type = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self {
            property,
            enum_type,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectPropertyDescriptor {
    pub property: PropertyDescriptor,
    pub object_class: ObjectRef,
}

impl ObjectPropertyDescriptor {
    // No end-of-stream check here: the class-property variant continues
    // reading after this level.
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let object_class = stream.read_object()?;

        Ok(Self {
            property,
            object_class,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassPropertyDescriptor {
    pub object_property: ObjectPropertyDescriptor,
    pub meta_class: ObjectRef,
}

impl ClassPropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let object_property = ObjectPropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                object_property,
                ..Self::default()
            });
        }

        let meta_class = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self {
            object_property,
            meta_class,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedArrayPropertyDescriptor {
    pub property: PropertyDescriptor,
    pub inner: ObjectRef,
}

impl FixedArrayPropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let inner = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self { property, inner })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrayPropertyDescriptor {
    pub property: PropertyDescriptor,
    pub inner: ObjectRef,
}

impl ArrayPropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let inner = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self { property, inner })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapPropertyDescriptor {
    pub property: PropertyDescriptor,
    pub key: ObjectRef,
    pub value: ObjectRef,
}

impl MapPropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let key = stream.read_object()?;
        let value = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self {
            property,
            key,
            value,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructPropertyDescriptor {
    pub property: PropertyDescriptor,
    pub struct_type: ObjectRef,
}

impl StructPropertyDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let property = PropertyDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                property,
                ..Self::default()
            });
        }

        let struct_type = stream.read_object()?;
        stream.expect_end()?;

        Ok(Self {
            property,
            struct_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::test::StreamBuilder;

    /// Common prefix: field links, array_dim, flags, category.
    fn header(flags: u32) -> StreamBuilder {
        StreamBuilder::new()
            .index(0) // base_field
            .index(0) // next
            .u32(1) // array_dim
            .u32(flags)
            .name("Engine")
    }

    #[test]
    fn replication_offset_is_gated_on_the_net_flag() {
        let mut s = header(PropertyFlags::NET.bits()).u16(0x44).index(9).stream(68);
        let p = BytePropertyDescriptor::load(&mut s).unwrap();
        assert_eq!(p.property.replication_offset, Some(0x44));
        assert_eq!(p.enum_type, ObjectRef(9));

        let mut s = header(0).index(9).stream(68);
        let p = BytePropertyDescriptor::load(&mut s).unwrap();
        assert_eq!(p.property.replication_offset, None);
    }

    #[test]
    fn legacy_versions_clear_reassigned_flag_bits() {
        let bits = PropertyFlags::EDIT.bits() | LEGACY_FLAG_MASK;

        let mut s = header(bits).index(0).stream(61);
        let p = BytePropertyDescriptor::load(&mut s).unwrap();
        assert_eq!(p.property.flags, PropertyFlags::EDIT);

        let mut s = header(bits).index(0).stream(62);
        let p = BytePropertyDescriptor::load(&mut s).unwrap();
        assert_eq!(p.property.flags.bits(), bits);
    }

    #[test]
    fn map_reads_key_then_value() {
        let mut s = header(0).index(3).index(4).stream(68);
        let p = MapPropertyDescriptor::load(&mut s).unwrap();
        assert_eq!((p.key, p.value), (ObjectRef(3), ObjectRef(4)));
    }

    #[test]
    fn class_property_extends_object_property() {
        let mut s = header(0).index(7).index(8).stream(68);
        let p = ClassPropertyDescriptor::load(&mut s).unwrap();
        assert_eq!(p.object_property.object_class, ObjectRef(7));
        assert_eq!(p.meta_class, ObjectRef(8));
    }

    #[test]
    fn variant_payloads_must_consume_the_stream() {
        let mut s = header(0).index(3).u8(0).stream(68);
        assert!(matches!(
            ArrayPropertyDescriptor::load(&mut s),
            Err(LoadError::TrailingBytes { .. })
        ));
    }
}
