//! Serialized widths of the values the VM stores.
//!
//! The evaluation stack and the instruction codec both size their slots and
//! records from this table.

use crate::types::encoding::{Decode, Encode};
use crate::virtual_machine::registers::MemoryAddress;
use crate::virtual_machine::stack::StackAddress;
use std::fmt;

/// Every value type with a fixed serialized width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I8,
    I16,
    I32,
    I64,
    /// Offset into the evaluation stack.
    StackAddress,
    /// Address in host memory held by an `m` register.
    MemoryAddress,
    /// Instruction tag.
    Opcode,
    /// Register operand.
    Register,
    /// Scope identifier operand.
    ScopeId,
}

impl ValueType {
    /// Serialized width in bytes.
    pub const fn width(self) -> usize {
        match self {
            ValueType::I8 => 1,
            ValueType::I16 => 2,
            ValueType::I32 => 4,
            ValueType::I64 => 8,
            ValueType::StackAddress => 8,
            ValueType::MemoryAddress => 8,
            ValueType::Opcode => 1,
            ValueType::Register => 1,
            ValueType::ScopeId => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::StackAddress => "stack_address",
            ValueType::MemoryAddress => "memory_address",
            ValueType::Opcode => "opcode",
            ValueType::Register => "register",
            ValueType::ScopeId => "scope_id",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can live in an evaluation stack slot.
///
/// The stack carries no type tags, so every access names its type and reads
/// exactly `WIDTH` bytes.
pub trait EngineType: Encode + Decode + Copy {
    const TYPE: ValueType;
    const WIDTH: usize = Self::TYPE.width();
}

impl EngineType for i8 {
    const TYPE: ValueType = ValueType::I8;
}

impl EngineType for i16 {
    const TYPE: ValueType = ValueType::I16;
}

impl EngineType for i32 {
    const TYPE: ValueType = ValueType::I32;
}

impl EngineType for i64 {
    const TYPE: ValueType = ValueType::I64;
}

impl EngineType for StackAddress {
    const TYPE: ValueType = ValueType::StackAddress;
}

impl EngineType for MemoryAddress {
    const TYPE: ValueType = ValueType::MemoryAddress;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_width_matches_encoding<T: EngineType + Default>() {
        assert_eq!(T::default().encoded_len(), T::WIDTH, "{}", T::TYPE);
    }

    #[test]
    fn widths_match_encoded_lengths() {
        assert_width_matches_encoding::<i8>();
        assert_width_matches_encoding::<i16>();
        assert_width_matches_encoding::<i32>();
        assert_width_matches_encoding::<i64>();
        assert_width_matches_encoding::<StackAddress>();
        assert_width_matches_encoding::<MemoryAddress>();
    }

    #[test]
    fn operand_widths() {
        assert_eq!(ValueType::Opcode.width(), 1);
        assert_eq!(ValueType::Register.width(), 1);
        assert_eq!(ValueType::ScopeId.width(), 4);
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(ValueType::I32.to_string(), "i32");
        assert_eq!(ValueType::StackAddress.to_string(), "stack_address");
    }
}
