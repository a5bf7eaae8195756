//! Compiled-script instruction decoding.

mod opcode;
mod reader;
mod writer;

pub use opcode::ExprToken;
pub use reader::{ScriptDecoder, MAX_NEST_DEPTH};
pub use writer::BytecodeBuffer;
