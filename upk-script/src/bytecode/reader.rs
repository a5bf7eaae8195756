//! Recursive-descent reader over one struct's compiled instruction stream.
//!
//! The decoder is simultaneously a parser and a re-serializer: every opcode
//! byte, raw operand and nested sub-expression it reads is appended to the
//! owned [`BytecodeBuffer`] in encounter order. Compact indices are the one
//! place where the output differs from the wire: they are widened to their
//! in-memory 4-byte form (the declared script size counts that form).

use num_traits::FromPrimitive;

use crate::bytecode::opcode::ExprToken;
use crate::bytecode::writer::BytecodeBuffer;
use crate::error::{LoadError, Result};
use crate::name::NameRef;
use crate::stream::ObjectStream;

/// The format has no nesting-depth field, so malformed or adversarial input
/// could recurse without bound. Sixteen levels is the cap the original
/// loader enforces; real compiled code stays well under it.
pub const MAX_NEST_DEPTH: usize = 16;

/// Token decoder plus the instruction buffer it is filling.
#[derive(Debug, Default)]
pub struct ScriptDecoder {
    code: BytecodeBuffer,
}

impl ScriptDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.code.as_slice()
    }

    /// Freezes and returns the decoded instruction buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.code.into_bytes()
    }

    /// Decodes one token (opcode plus all of its operands, recursively) and
    /// returns the opcode byte so callers can loop until a terminator.
    ///
    /// `depth` is the current nesting level; pass 0 at statement level.
    pub fn read_token(&mut self, stream: &mut ObjectStream, depth: usize) -> Result<u8> {
        if depth == MAX_NEST_DEPTH {
            return Err(LoadError::TooDeeplyNested {
                position: stream.position(),
            });
        }
        let depth = depth + 1;

        let position = stream.position();
        let token = stream.read_u8()?;
        self.code.push_u8(token);

        if (ExprToken::MIN_CONVERSION..=ExprToken::MAX_CONVERSION).contains(&token) {
            // Every type conversion wraps exactly one sub-expression.
            self.read_token(stream, depth)?;
        } else if token >= ExprToken::FIRST_NATIVE {
            // Single-byte native index; arguments follow.
            self.read_call_args(stream, depth)?;
        } else if token >= ExprToken::EXTENDED_NATIVE {
            // Two-byte native index: (token - 0x60) << 8 | part2.
            let part2 = stream.read_u8()?;
            self.code.push_u8(part2);
            self.read_call_args(stream, depth)?;
        } else {
            let Some(op) = ExprToken::from_u8(token) else {
                return Err(LoadError::UnknownOpcode {
                    opcode: token,
                    position,
                });
            };
            self.read_structured(stream, depth, op)?;
        }

        Ok(token)
    }

    /// Consumes argument sub-expressions until one of them decodes to
    /// EndFunctionParms. The terminator belongs to the call, not to the
    /// argument list.
    fn read_call_args(&mut self, stream: &mut ObjectStream, depth: usize) -> Result<()> {
        while self.read_token(stream, depth)? != ExprToken::EndFunctionParms.byte() {}
        Ok(())
    }

    fn read_structured(
        &mut self,
        stream: &mut ObjectStream,
        depth: usize,
        op: ExprToken,
    ) -> Result<()> {
        use ExprToken::*;

        match op {
            LocalVariable | InstanceVariable | DefaultVariable | ObjectConst | NameConst
            | NativeParm => {
                let idx = stream.read_index()?;
                self.code.push_index(idx);
            }

            // Named dispatch: one symbol/object index, then the argument loop.
            VirtualFunction | GlobalFunction | FinalFunction => {
                let idx = stream.read_index()?;
                self.code.push_index(idx);
                self.read_call_args(stream, depth)?;
            }

            Return | GotoLabel | EatString | Unknown0x15 => {
                self.read_token(stream, depth)?;
            }

            Switch => {
                self.code.push_u8(stream.read_u8()?);
                self.read_token(stream, depth)?;
            }

            Jump => self.code.push_u16(stream.read_u16()?),

            JumpIfNot | Assert | Skip => {
                self.code.push_u16(stream.read_u16()?);
                self.read_token(stream, depth)?;
            }

            Case => {
                // 0xFFFF marks the default case, which has no match expression.
                let next_offset = stream.read_u16()?;
                self.code.push_u16(next_offset);
                if next_offset != 0xFFFF {
                    self.read_token(stream, depth)?;
                }
            }

            LabelTable => loop {
                // Self-terminating scan: there is no count field. The "None"
                // entry still carries its offset and is part of the table.
                let name = stream.read_index()?;
                self.code.push_index(name);
                self.code.push_u32(stream.read_u32()?);
                if stream.names().is_none_name(NameRef(name))? {
                    break;
                }
            },

            Let | LetBool | DynArrayElement | ArrayElement => {
                self.read_token(stream, depth)?;
                self.read_token(stream, depth)?;
            }

            New => {
                for _ in 0..4 {
                    self.read_token(stream, depth)?;
                }
            }

            ClassContext | Context => {
                self.read_token(stream, depth)?;
                self.code.push_u16(stream.read_u16()?);
                self.code.push_u8(stream.read_u8()?);
                self.read_token(stream, depth)?;
            }

            MetaCast | DynamicCast | StructMember => {
                let idx = stream.read_index()?;
                self.code.push_index(idx);
                self.read_token(stream, depth)?;
            }

            Unknown0x2B => {
                self.code.push_u8(stream.read_u8()?);
                self.read_token(stream, depth)?;
            }

            IntConst => self.code.push_u32(stream.read_u32()?),
            FloatConst => self.code.push_f32(stream.read_f32()?),
            StringConst => {
                let s = stream.read_ascii_z()?;
                self.code.push_ascii_z(&s);
            }
            UnicodeStringConst => {
                let s = stream.read_unicode_z()?;
                self.code.push_unicode_z(&s);
            }
            RotationConst => {
                for _ in 0..3 {
                    self.code.push_u32(stream.read_u32()?);
                }
            }
            VectorConst => {
                for _ in 0..3 {
                    self.code.push_f32(stream.read_f32()?);
                }
            }
            ByteConst | IntConstByte => self.code.push_u8(stream.read_u8()?),

            Iterator => {
                self.read_token(stream, depth)?;
                self.code.push_u16(stream.read_u16()?);
            }

            StructCmpEq | StructCmpNe => {
                let idx = stream.read_index()?;
                self.code.push_index(idx);
                self.read_token(stream, depth)?;
                self.read_token(stream, depth)?;
            }

            Stop | Nothing | EndFunctionParms | SelfRef | IntZero | IntOne | True | False
            | NoObject | BoolVariable | IteratorPop | IteratorNext => {}
        }

        Ok(())
    }
}
