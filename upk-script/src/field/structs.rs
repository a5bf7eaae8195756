//! Struct, function, state and class descriptors.
//!
//! A struct-level descriptor owns one decoded instruction buffer; the decode
//! loop here is the single place where the token decoder's byte-for-byte
//! work is checked against the size recorded in the struct's own header.

use bytes::Bytes;

use super::FieldDescriptor;
use crate::bytecode::ScriptDecoder;
use crate::error::{LoadError, Result};
use crate::name::{NameRef, ObjectRef};
use crate::stream::ObjectStream;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u32 {
        const FINAL        = 0x0000_0001;
        const DEFINED      = 0x0000_0002;
        const ITERATOR     = 0x0000_0004;
        const LATENT       = 0x0000_0008;
        const PRE_OPERATOR = 0x0000_0010;
        const SINGULAR     = 0x0000_0020;
        const NET          = 0x0000_0040;
        const NET_RELIABLE = 0x0000_0080;
        const SIMULATED    = 0x0000_0100;
        const EXEC         = 0x0000_0200;
        const NATIVE       = 0x0000_0400;
        const EVENT        = 0x0000_0800;
        const OPERATOR     = 0x0000_1000;
        const STATIC       = 0x0000_2000;
        const NO_EXPORT    = 0x0000_4000;
        const CONST        = 0x0000_8000;
        const INVARIANT    = 0x0001_0000;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u32 {
        const EDITABLE  = 0x0000_0001;
        const AUTO      = 0x0000_0002;
        const SIMULATED = 0x0000_0004;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClassFlags: u32 {
        const ABSTRACT           = 0x0000_0001;
        const COMPILED           = 0x0000_0002;
        const CONFIG             = 0x0000_0004;
        const TRANSIENT          = 0x0000_0008;
        const PARSED             = 0x0000_0010;
        const LOCALIZED          = 0x0000_0020;
        const SAFE_REPLACE       = 0x0000_0040;
        const RUNTIME_STATIC     = 0x0000_0080;
        const NO_EXPORT          = 0x0000_0100;
        const NO_USER_CREATE     = 0x0000_0200;
        const PER_OBJECT_CONFIG  = 0x0000_0400;
        const NATIVE_REPLICATION = 0x0000_0800;
    }
}

/// A scoped container of fields with a compiled instruction stream.
#[derive(Debug, Clone, Default)]
pub struct StructDescriptor {
    pub field: FieldDescriptor,
    /// Text-buffer object holding the script source, if retained.
    pub script_text: ObjectRef,
    /// Head of this scope's child-field list.
    pub children: ObjectRef,
    pub friendly_name: NameRef,
    pub line: u32,
    pub text_pos: u32,
    /// Decoded instruction stream; frozen once the load returns.
    pub bytecode: Vec<u8>,
}

impl StructDescriptor {
    /// `_is_class` marks the root class variant: its default-property
    /// payload trails the class record instead of following the struct
    /// header, so nothing extra is read at this level either way.
    pub fn load(stream: &mut ObjectStream, _is_class: bool) -> Result<Self> {
        let field = FieldDescriptor::load(stream)?;
        if stream.is_empty() {
            return Ok(Self {
                field,
                ..Self::default()
            });
        }

        let script_text = stream.read_object()?;
        let children = stream.read_object()?;
        let friendly_name = stream.read_name()?;
        if stream.names().is_none_name(friendly_name)? {
            return Err(LoadError::NoFriendlyName);
        }

        let line = stream.read_u32()?;
        let text_pos = stream.read_u32()?;

        // The declared size counts decoded bytes (compact indices at their
        // widened 4-byte form), so it is checked against the decoder's
        // output, not against consumed input.
        let script_size = stream.read_u32()? as usize;
        let mut decoder = ScriptDecoder::new();
        while decoder.len() < script_size {
            decoder.read_token(stream, 0)?;
        }
        if decoder.len() != script_size {
            return Err(LoadError::ScriptSizeMismatch {
                declared: script_size,
                actual: decoder.len(),
            });
        }

        Ok(Self {
            field,
            script_text,
            children,
            friendly_name,
            line,
            text_pos,
            bytecode: decoder.into_bytes(),
        })
    }
}

/// A callable struct: adds native binding and parameter bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct FunctionDescriptor {
    pub struct_: StructDescriptor,
    /// Legacy fields, only serialized up to format version 63; later
    /// versions compute them from the parameter properties instead.
    pub parms_size: Option<i32>,
    pub num_parms: Option<i32>,
    pub return_value_offset: Option<i32>,
    pub native_func_index: u16,
    pub operator_precedence: u8,
    pub flags: FunctionFlags,
    pub replication_offset: Option<u16>,
}

impl FunctionDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let struct_ = StructDescriptor::load(stream, false)?;
        if stream.is_empty() {
            return Ok(Self {
                struct_,
                ..Self::default()
            });
        }

        // Version-gated fields interleave with the stable ones; declaration
        // order on the wire must be preserved exactly.
        let legacy = stream.version() <= 63;

        let parms_size = if legacy { Some(stream.read_index()?) } else { None };
        let native_func_index = stream.read_u16()?;
        let num_parms = if legacy { Some(stream.read_index()?) } else { None };
        let operator_precedence = stream.read_u8()?;
        let return_value_offset = if legacy { Some(stream.read_index()?) } else { None };
        let flags = FunctionFlags::from_bits_retain(stream.read_u32()?);
        let replication_offset = if flags.contains(FunctionFlags::NET) {
            Some(stream.read_u16()?)
        } else {
            None
        };
        stream.expect_end()?;

        Ok(Self {
            struct_,
            parms_size,
            num_parms,
            return_value_offset,
            native_func_index,
            operator_precedence,
            flags,
            replication_offset,
        })
    }
}

/// A state: an event-masking scope with its own label table.
#[derive(Debug, Clone, Default)]
pub struct StateDescriptor {
    pub struct_: StructDescriptor,
    /// Which probe events this state responds to.
    pub probe_mask: u64,
    /// Which probe events this state swallows.
    pub ignore_mask: u64,
    pub label_table_offset: u16,
    pub flags: StateFlags,
}

impl StateDescriptor {
    pub fn load(stream: &mut ObjectStream, is_class: bool) -> Result<Self> {
        let struct_ = StructDescriptor::load(stream, is_class)?;
        if stream.is_empty() {
            return Ok(Self {
                struct_,
                ..Self::default()
            });
        }

        let probe_mask = stream.read_u64()?;
        let ignore_mask = stream.read_u64()?;
        let label_table_offset = stream.read_u16()?;
        let flags = StateFlags::from_bits_retain(stream.read_u32()?);

        Ok(Self {
            struct_,
            probe_mask,
            ignore_mask,
            label_table_offset,
            flags,
        })
    }
}

/// One entry of a class's compile-time dependency list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassDependency {
    pub class: ObjectRef,
    pub deep: u32,
    pub script_text_crc: u32,
}

/// The root concrete type for a loadable class.
#[derive(Debug, Clone, Default)]
pub struct ClassDescriptor {
    pub state: StateDescriptor,
    /// Only serialized up to format version 61.
    pub old_class_record_size: Option<u32>,
    pub class_flags: ClassFlags,
    pub guid: [u8; 16],
    pub dependencies: Vec<ClassDependency>,
    pub package_imports: Vec<ObjectRef>,
    /// From format version 62 on: required outer class and the config
    /// section this class reads its settings from.
    pub class_within: ObjectRef,
    pub config_name: NameRef,
    /// Trailing default-property payload, kept opaque: parsing property
    /// values is the loader's later pass, not this crate's.
    pub default_properties: Bytes,
}

impl ClassDescriptor {
    pub fn load(stream: &mut ObjectStream) -> Result<Self> {
        let mut state = StateDescriptor::load(stream, true)?;
        if stream.is_empty() {
            return Ok(Self {
                state,
                ..Self::default()
            });
        }

        let old_class_record_size = if stream.version() <= 61 {
            let size = stream.read_u32()?;
            // Old packages predate these flags; every class was public.
            state.struct_.field.flags |=
                super::ObjectFlags::PUBLIC | super::ObjectFlags::STANDALONE;
            log::debug!("legacy class record, v{} size {}", stream.version(), size);
            Some(size)
        } else {
            None
        };

        let class_flags = ClassFlags::from_bits_retain(stream.read_u32()?);
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&stream.read_bytes(16)?);

        // Counts come straight from the package; growing on push keeps a
        // bogus count from demanding a huge allocation before the first
        // entry read has a chance to fail.
        let num_dependencies = stream.read_index()?;
        let mut dependencies = Vec::new();
        for _ in 0..num_dependencies {
            dependencies.push(ClassDependency {
                class: stream.read_object()?,
                deep: stream.read_u32()?,
                script_text_crc: stream.read_u32()?,
            });
        }

        let num_imports = stream.read_index()?;
        let mut package_imports = Vec::new();
        for _ in 0..num_imports {
            package_imports.push(stream.read_object()?);
        }

        let (class_within, config_name) = if stream.version() >= 62 {
            (stream.read_object()?, stream.read_name()?)
        } else {
            (ObjectRef::default(), NameRef::default())
        };

        let default_properties = stream.read_remaining();

        Ok(Self {
            state,
            old_class_record_size,
            class_flags,
            guid,
            dependencies,
            package_imports,
            class_within,
            config_name,
            default_properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test::StreamBuilder;

    /// Struct header up to (and excluding) the script size: field links,
    /// script_text, children, friendly name, line, text pos.
    fn struct_header(b: StreamBuilder, friendly: &str) -> StreamBuilder {
        let b = b.index(0).index(0).index(0).index(0);
        let b = b.name(friendly);
        b.u32(10).u32(0)
    }

    #[test]
    fn struct_decodes_bytecode_to_the_declared_size() {
        // IntConst(42): 1 opcode byte + 4 payload bytes.
        let mut s = struct_header(StreamBuilder::new(), "Tick")
            .u32(5)
            .u8(0x1D)
            .u32(42)
            .stream(68);
        let d = StructDescriptor::load(&mut s, false).unwrap();
        assert_eq!(d.bytecode, [0x1D, 42, 0, 0, 0]);
        assert_eq!(d.line, 10);
        s.expect_end().unwrap();
    }

    #[test]
    fn struct_size_mismatch_is_fatal() {
        // Declared 4, but the first token decodes to 5 bytes.
        let mut s = struct_header(StreamBuilder::new(), "Tick")
            .u32(4)
            .u8(0x1D)
            .u32(42)
            .stream(68);
        assert!(matches!(
            StructDescriptor::load(&mut s, false),
            Err(LoadError::ScriptSizeMismatch {
                declared: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn struct_friendly_name_must_not_be_none() {
        let mut s = struct_header(StreamBuilder::new(), "None").u32(0).stream(68);
        assert!(matches!(
            StructDescriptor::load(&mut s, false),
            Err(LoadError::NoFriendlyName)
        ));
    }

    fn function_tail(b: StreamBuilder, legacy: bool) -> StreamBuilder {
        let b = if legacy { b.index(12) } else { b }; // parms_size
        let b = b.u16(0x200); // native_func_index
        let b = if legacy { b.index(3) } else { b }; // num_parms
        let b = b.u8(24); // operator_precedence
        let b = if legacy { b.index(8) } else { b }; // return_value_offset
        b.u32(FunctionFlags::NATIVE.bits())
    }

    #[test]
    fn function_reads_legacy_fields_only_up_to_v63() {
        let b = struct_header(StreamBuilder::new(), "Tick").u32(0);
        let mut s = function_tail(b, true).stream(63);
        let f = FunctionDescriptor::load(&mut s).unwrap();
        assert_eq!(f.parms_size, Some(12));
        assert_eq!(f.num_parms, Some(3));
        assert_eq!(f.return_value_offset, Some(8));
        assert_eq!(f.native_func_index, 0x200);
        assert_eq!(f.operator_precedence, 24);

        let b = struct_header(StreamBuilder::new(), "Tick").u32(0);
        let mut s = function_tail(b, false).stream(64);
        let f = FunctionDescriptor::load(&mut s).unwrap();
        assert_eq!(f.parms_size, None);
        assert_eq!(f.num_parms, None);
        assert_eq!(f.return_value_offset, None);
        assert_eq!(f.native_func_index, 0x200);
    }

    #[test]
    fn function_net_flag_gates_replication_offset() {
        let b = struct_header(StreamBuilder::new(), "Tick").u32(0);
        let b = b.u16(0).u8(0).u32(FunctionFlags::NET.bits()).u16(0x77);
        let mut s = b.stream(68);
        let f = FunctionDescriptor::load(&mut s).unwrap();
        assert_eq!(f.replication_offset, Some(0x77));
    }

    #[test]
    fn function_rejects_trailing_bytes() {
        let b = struct_header(StreamBuilder::new(), "Tick").u32(0);
        let mut s = function_tail(b, false).u8(0xCC).stream(68);
        assert!(matches!(
            FunctionDescriptor::load(&mut s),
            Err(LoadError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn class_with_bogus_dependency_count_fails_on_the_missing_entry() {
        // Dependency/import counts are untrusted; a huge one with no
        // payload behind it must truncate-fail, not allocate gigabytes.
        let b = struct_header(StreamBuilder::new(), "Idle")
            .u32(0) // script size
            .u64(0)
            .u64(0)
            .u16(0)
            .u32(0) // state flags
            .u32(0) // class flags
            .raw(&[0u8; 16])
            .index(0x7FFF_FFF0);
        let mut s = b.stream(68);
        assert!(matches!(
            ClassDescriptor::load(&mut s),
            Err(LoadError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn state_reads_masks_and_label_offset() {
        let b = struct_header(StreamBuilder::new(), "Idle").u32(0);
        let mut s = b
            .u64(0xFFFF_0000_FFFF_0000)
            .u64(0x0000_0001)
            .u16(0x30)
            .u32(StateFlags::AUTO.bits())
            .stream(68);
        let st = StateDescriptor::load(&mut s, false).unwrap();
        assert_eq!(st.probe_mask, 0xFFFF_0000_FFFF_0000);
        assert_eq!(st.ignore_mask, 1);
        assert_eq!(st.label_table_offset, 0x30);
        assert_eq!(st.flags, StateFlags::AUTO);
        s.expect_end().unwrap();
    }
}
