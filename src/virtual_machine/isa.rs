//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_instruction!`](crate::for_each_instruction) macro holds
//! the canonical instruction definitions and invokes a callback macro for code
//! generation. Every layer that needs to know an instruction's layout (the
//! writer, the typed reader, record sizing and the decoded [`Operation`](super::assembly::Operation))
//! is generated from this one table, so they cannot drift apart.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - Per-instruction record sizes used to step from one instruction to the next
//!
//! See [`assembly`](super::assembly) for the writer, reader and disassembler.
//!
//! # Bytecode Format
//!
//! Each instruction is a packed record with no padding:
//! - Opcode: 1 byte
//! - Register operand: 1 byte (register id, see [`Register`](super::registers::Register))
//! - Constant i32: 4 bytes (little-endian)
//! - Scope id: 4 bytes (little-endian)

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::value_type::ValueType;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each entry reads `Name = opcode, method, "mnemonic" => [operands]`, where
/// `method` names the generated writer and reader methods.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// NOP ; no effect
            Nop = 0x00, nop, "nop" => [],
            /// PUSH_I4_CONST value ; push the 32-bit constant
            PushI4Const = 0x01, push_i4_const, "push_i4_const" => [value: I32],
            /// PUSH_I4_REG r ; push the low 32 bits of general-purpose register r
            PushI4Reg = 0x02, push_i4_reg, "push_i4_reg" => [register: Reg],
            /// SET_I4_REG r ; pop a 32-bit value into general-purpose register r, sign-extended
            SetI4Reg = 0x03, set_i4_reg, "set_i4_reg" => [register: Reg],
            /// ADD_I4 ; pop a, pop b, push a + b (wrapping)
            AddI4 = 0x04, add_i4, "add_i4" => [],
            /// CALL scope ; run internal scope to completion, then resume
            Call = 0x05, call, "call" => [scope: Scope],
            /// XCALL scope ; invoke external scope's callback with the stack, then resume
            XCall = 0x06, xcall, "xcall" => [scope: Scope],
            /// RET ; leave the current scope
            Ret = 0x07, ret, "ret" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $method:ident, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::UnsupportedInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name ),* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Size of the whole record in bytes: tag plus operands.
            pub const fn encoded_len(&self) -> usize {
                match self {
                    $(
                        Instruction::$name => {
                            ValueType::Opcode.width() $( + define_instructions!(@size $kind) )*
                        }
                    )*
                }
            }

            /// Operand types in record order.
            pub const fn operands(&self) -> &'static [ValueType] {
                match self {
                    $(
                        Instruction::$name => &[ $( define_instructions!(@value_type $kind) ),* ],
                    )*
                }
            }
        }
    };

    // ---------- types ----------
    (@ty I32)   => { i32 };
    (@ty Reg)   => { $crate::virtual_machine::registers::Register };
    (@ty Scope) => { $crate::virtual_machine::scope::ScopeId };

    // ---------- operand widths ----------
    (@value_type I32)   => { $crate::virtual_machine::value_type::ValueType::I32 };
    (@value_type Reg)   => { $crate::virtual_machine::value_type::ValueType::Register };
    (@value_type Scope) => { $crate::virtual_machine::value_type::ValueType::ScopeId };

    (@size $kind:ident) => { define_instructions!(@value_type $kind).width() };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Decodes an opcode tag found at `offset`.
    pub fn from_opcode(opcode: u8, offset: usize) -> Result<Self, VMError> {
        Instruction::try_from(opcode)
            .map_err(|_| VMError::UnsupportedInstruction { opcode, offset })
    }

    pub const fn opcode(&self) -> u8 {
        *self as u8
    }
}
