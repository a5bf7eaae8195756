//! upk-script
//!
//! Loader core for a legacy binary game-package format: turns one object's
//! flat byte stream into typed class/field/function descriptors, and walks
//! the proprietary stack-machine instruction encoding token-by-token into a
//! validated, replayable instruction buffer.
//!
//! This crate only decodes and structurally validates. Executing the decoded
//! bytecode, resolving object references and reading default-property values
//! are the surrounding loader's and engine's jobs.

pub mod bytecode;
pub mod error;
pub mod field;
pub mod name;
pub mod stream;


pub use bytecode::{BytecodeBuffer, ExprToken, ScriptDecoder, MAX_NEST_DEPTH};
pub use error::LoadError;
pub use field::{
    ClassDescriptor, ConstDescriptor, EnumDescriptor, FieldDescriptor, FunctionDescriptor,
    PropertyDescriptor, StateDescriptor, StructDescriptor,
};
pub use name::{NameRef, NameTable, ObjectRef, NAME_NONE};
pub use stream::{ObjectInfo, ObjectStream};
