/// Errors raised while deserializing one object's stream.
///
/// Every variant is fatal for the package load in progress: there is no
/// retry or partial-load path. Stream-primitive failures surface as
/// [`LoadError::UnexpectedEof`] / [`LoadError::BadName`] and propagate
/// through the descriptor builders unchanged.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("unknown script bytecode token 0x{opcode:02X} at offset 0x{position:X}")]
    UnknownOpcode { opcode: u8, position: usize },

    #[error("script bytecode is too deeply nested at offset 0x{position:X}")]
    TooDeeplyNested { position: usize },

    #[error("{remaining} undecoded byte(s) left at offset 0x{position:X}")]
    TrailingBytes { remaining: usize, position: usize },

    #[error("bytecode load failed: declared size {declared}, decoded {actual}")]
    ScriptSizeMismatch { declared: usize, actual: usize },

    #[error("struct friendly name must not be None")]
    NoFriendlyName,

    #[error("unexpected end of stream: wanted {wanted} byte(s) at offset 0x{position:X}")]
    UnexpectedEof { position: usize, wanted: usize },

    #[error("name index {index} is not in the package name table")]
    BadName { index: i32 },
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;
