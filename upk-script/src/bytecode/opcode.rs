//! The legacy stack-machine opcode set.
//!
//! Values are the on-disk token bytes and must never be renumbered; the
//! decoded instruction buffer is replayed by an execution engine that
//! expects exactly this encoding.

use num_derive::FromPrimitive;

/// One structured opcode of the compiled-script encoding.
///
/// Only tokens with an individual decode shape are named here. Three numeric
/// ranges are handled by comparison instead (see the associated constants):
/// type conversions, extended native calls and plain native calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ExprToken {
    LocalVariable = 0x00,
    InstanceVariable = 0x01,
    DefaultVariable = 0x02,
    Return = 0x04,
    Switch = 0x05,
    Jump = 0x06,
    JumpIfNot = 0x07,
    Stop = 0x08,
    Assert = 0x09,
    Case = 0x0A,
    Nothing = 0x0B,
    LabelTable = 0x0C,
    GotoLabel = 0x0D,
    EatString = 0x0E,
    Let = 0x0F,
    DynArrayElement = 0x10,
    New = 0x11,
    ClassContext = 0x12,
    MetaCast = 0x13,
    LetBool = 0x14,
    /// Undocumented control-flow token; decoded like a one-operand wrapper
    /// (same shape the original loader uses).
    Unknown0x15 = 0x15,
    EndFunctionParms = 0x16,
    SelfRef = 0x17,
    Skip = 0x18,
    Context = 0x19,
    ArrayElement = 0x1A,
    VirtualFunction = 0x1B,
    FinalFunction = 0x1C,
    IntConst = 0x1D,
    FloatConst = 0x1E,
    StringConst = 0x1F,
    ObjectConst = 0x20,
    NameConst = 0x21,
    RotationConst = 0x22,
    VectorConst = 0x23,
    ByteConst = 0x24,
    IntZero = 0x25,
    IntOne = 0x26,
    True = 0x27,
    False = 0x28,
    NativeParm = 0x29,
    NoObject = 0x2A,
    /// Undocumented token; one raw byte then one nested expression.
    Unknown0x2B = 0x2B,
    IntConstByte = 0x2C,
    BoolVariable = 0x2D,
    DynamicCast = 0x2E,
    Iterator = 0x2F,
    IteratorPop = 0x30,
    IteratorNext = 0x31,
    StructCmpEq = 0x32,
    StructCmpNe = 0x33,
    UnicodeStringConst = 0x34,
    StructMember = 0x36,
    GlobalFunction = 0x38,
}

impl ExprToken {
    /// First type-conversion token (RotatorToVector).
    pub const MIN_CONVERSION: u8 = 0x39;
    /// Last type-conversion token (StringToName). Every token in the range
    /// decodes as exactly one nested sub-expression.
    pub const MAX_CONVERSION: u8 = 0x59;
    /// First token of the two-byte extended native call encoding.
    pub const EXTENDED_NATIVE: u8 = 0x60;
    /// Tokens at or above this are single-byte native call indices.
    pub const FIRST_NATIVE: u8 = 0x70;

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn numbering_matches_the_wire_format() {
        assert_eq!(ExprToken::EndFunctionParms.byte(), 0x16);
        assert_eq!(ExprToken::LabelTable.byte(), 0x0C);
        assert_eq!(ExprToken::GlobalFunction.byte(), 0x38);
        assert_eq!(ExprToken::from_u8(0x1D), Some(ExprToken::IntConst));
        // Gaps in the table stay unassigned.
        assert_eq!(ExprToken::from_u8(0x03), None);
        assert_eq!(ExprToken::from_u8(0x35), None);
        assert_eq!(ExprToken::from_u8(0x37), None);
    }

    #[test]
    fn ranges_do_not_overlap_named_tokens() {
        assert!(ExprToken::MIN_CONVERSION > ExprToken::GlobalFunction.byte());
        assert!(ExprToken::MAX_CONVERSION < ExprToken::EXTENDED_NATIVE);
        assert!(ExprToken::EXTENDED_NATIVE < ExprToken::FIRST_NATIVE);
    }
}
