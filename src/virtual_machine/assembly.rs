//! Instruction codec.
//!
//! Uses [`for_each_instruction!`](crate::for_each_instruction) to generate:
//! - [`AssemblyWriter`] methods that append one record per call
//! - typed [`AssemblyReader`] methods that validate the tag and decode operands
//! - the [`Operation`] enum, the decoded form of a single instruction
//!
//! A record is read without advancing the cursor; stepping to the next
//! record is a separate [`AssemblyReader::go_next_instruction`] call driven by
//! the opcode's record size.

use crate::for_each_instruction;
use crate::types::buffer::{ByteBuffer, Cursor};
use crate::types::encoding::{Decode, Encode};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::registers::Register;
use crate::virtual_machine::value_type::ValueType;
use std::fmt;

/// Appends encoded instructions to a buffer. Stateless; calls chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyWriter;

/// Decodes instructions at a cursor. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyReader;

impl AssemblyWriter {
    pub fn new() -> Self {
        Self
    }
}

impl AssemblyReader {
    pub fn new() -> Self {
        Self
    }

    /// Returns the instruction whose record starts at the cursor, without
    /// consuming anything.
    pub fn peek_instruction(&self, cursor: &Cursor<'_>) -> Result<Instruction, VMError> {
        let width = ValueType::Opcode.width();
        let tag = cursor
            .peek(width)
            .ok_or(VMError::UnexpectedEndOfBytecode {
                offset: cursor.offset(),
                requested: width,
                available: cursor.remaining(),
            })?;
        Instruction::from_opcode(tag[0], cursor.offset())
    }

    /// Advances the cursor past the record at its offset.
    ///
    /// Only the tag is inspected; the step is the opcode's full record size.
    pub fn go_next_instruction(&self, cursor: &mut Cursor<'_>) -> Result<(), VMError> {
        let instruction = self.peek_instruction(cursor)?;
        let size = instruction.encoded_len();
        if cursor.remaining() < size {
            return Err(VMError::UnexpectedEndOfBytecode {
                offset: cursor.offset(),
                requested: size,
                available: cursor.remaining(),
            });
        }
        cursor.skip(size);
        Ok(())
    }

    /// Copies the full record of `expected` at the cursor into `record`.
    fn read_record(
        &self,
        cursor: &Cursor<'_>,
        expected: Instruction,
        record: &mut [u8],
    ) -> Result<(), VMError> {
        let offset = cursor.offset();
        let tag = cursor
            .peek(ValueType::Opcode.width())
            .ok_or(VMError::UnexpectedEndOfBytecode {
                offset,
                requested: record.len(),
                available: cursor.remaining(),
            })?[0];
        if tag != expected.opcode() {
            return Err(VMError::InstructionMismatch {
                expected: expected.mnemonic(),
                actual: tag,
                offset,
            });
        }
        cursor
            .read_into(record)
            .ok_or(VMError::UnexpectedEndOfBytecode {
                offset,
                requested: record.len(),
                available: cursor.remaining(),
            })
    }
}

/// An [`AssemblyReader`] bound to one cursor.
#[derive(Debug, Clone, Copy)]
pub struct InstructionReader<'a> {
    reader: AssemblyReader,
    cursor: Cursor<'a>,
}

impl<'a> InstructionReader<'a> {
    pub fn new(cursor: Cursor<'a>) -> Self {
        Self {
            reader: AssemblyReader,
            cursor,
        }
    }

    pub fn has_data(&self) -> bool {
        self.cursor.has_data()
    }

    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    pub fn cursor(&self) -> &Cursor<'a> {
        &self.cursor
    }

    pub fn peek_instruction(&self) -> Result<Instruction, VMError> {
        self.reader.peek_instruction(&self.cursor)
    }

    pub fn go_next_instruction(&mut self) -> Result<(), VMError> {
        self.reader.go_next_instruction(&mut self.cursor)
    }

    /// Decodes the record at the cursor without advancing.
    pub fn operation(&self) -> Result<Operation, VMError> {
        Operation::read(&self.reader, &self.cursor)
    }
}

/// Decodes one operand of the given kind from the record at `$offset`.
macro_rules! decode_operand {
    (Reg, $input:expr, $offset:expr) => {
        decode_register($input, $offset)
    };
    ($kind:ident, $input:expr, $offset:expr) => {
        <$crate::define_instructions!(@ty $kind)>::decode($input).map_err(VMError::from)
    };
}

fn decode_register(input: &mut &[u8], offset: usize) -> Result<Register, VMError> {
    let id = u8::decode(input)?;
    Register::from_id(id).ok_or(VMError::UnknownRegister { id, offset })
}

macro_rules! define_assembly {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $method:ident, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        impl AssemblyWriter {
            $(
                $(#[$doc])*
                pub fn $method(
                    &self,
                    buffer: &mut ByteBuffer
                    $(, $field: $crate::define_instructions!(@ty $kind) )*
                ) -> &Self {
                    let mut record = Vec::with_capacity(Instruction::$name.encoded_len());
                    record.push(Instruction::$name.opcode());
                    $( $field.encode(&mut record); )*
                    buffer.append(&record);
                    self
                }
            )*
        }

        impl AssemblyReader {
            $(
                $(#[$doc])*
                ///
                /// Fails with `InstructionMismatch` if the cursor is at a different
                /// instruction. The cursor is not advanced.
                pub fn $method(
                    &self,
                    cursor: &Cursor<'_>,
                ) -> Result<( $( $crate::define_instructions!(@ty $kind), )* ), VMError> {
                    let mut record = [0u8; Instruction::$name.encoded_len()];
                    self.read_record(cursor, Instruction::$name, &mut record)?;
                    let operands = &mut &record[ValueType::Opcode.width()..];
                    $(
                        let $field = decode_operand!($kind, operands, cursor.offset())?;
                    )*
                    debug_assert!(operands.is_empty());
                    Ok(( $( $field, )* ))
                }
            )*
        }

        impl InstructionReader<'_> {
            $(
                $(#[$doc])*
                pub fn $method(
                    &self,
                ) -> Result<( $( $crate::define_instructions!(@ty $kind), )* ), VMError> {
                    self.reader.$method(&self.cursor)
                }
            )*
        }

        /// One decoded instruction with its operands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Operation {
            $(
                $(#[$doc])*
                $name { $( $field: $crate::define_instructions!(@ty $kind) ),* },
            )*
        }

        impl Operation {
            /// Decodes the record at the cursor without advancing.
            pub fn read(reader: &AssemblyReader, cursor: &Cursor<'_>) -> Result<Self, VMError> {
                match reader.peek_instruction(cursor)? {
                    $(
                        Instruction::$name => {
                            let ( $( $field, )* ) = reader.$method(cursor)?;
                            Ok(Operation::$name { $( $field ),* })
                        }
                    )*
                }
            }

            /// Appends this operation's record to `buffer`.
            pub fn write(&self, writer: &AssemblyWriter, buffer: &mut ByteBuffer) {
                match self {
                    $(
                        Operation::$name { $( $field ),* } => {
                            writer.$method(buffer $(, *$field )*);
                        }
                    )*
                }
            }

            pub fn instruction(&self) -> Instruction {
                match self {
                    $( Operation::$name { .. } => Instruction::$name, )*
                }
            }
        }

        impl fmt::Display for Operation {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(
                        Operation::$name { $( $field ),* } => {
                            write_operation(f, $mnemonic, &[ $( $field as &dyn fmt::Display ),* ])
                        }
                    )*
                }
            }
        }
    };
}

for_each_instruction!(define_assembly);

fn write_operation(
    f: &mut fmt::Formatter<'_>,
    mnemonic: &str,
    operands: &[&dyn fmt::Display],
) -> fmt::Result {
    f.write_str(mnemonic)?;
    for (i, operand) in operands.iter().enumerate() {
        let separator = if i == 0 { " " } else { ", " };
        write!(f, "{separator}{operand}")?;
    }
    Ok(())
}

/// Decodes every record in `code`, paired with its byte offset.
pub fn disassemble(code: &[u8]) -> Result<Vec<(usize, Operation)>, VMError> {
    let mut reader = InstructionReader::new(Cursor::new(code));
    let mut operations = Vec::new();
    while reader.has_data() {
        operations.push((reader.offset(), reader.operation()?));
        reader.go_next_instruction()?;
    }
    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::errors::ErrorKind;
    use crate::virtual_machine::registers::Register;
    use crate::virtual_machine::scope::ScopeId;

    fn assemble(build: impl FnOnce(&AssemblyWriter, &mut ByteBuffer)) -> ByteBuffer {
        let mut buffer = ByteBuffer::new();
        build(&AssemblyWriter::new(), &mut buffer);
        buffer
    }

    #[test]
    fn record_layout() {
        let code = assemble(|w, b| {
            w.push_i4_const(b, 0x0102_0304).call(b, ScopeId::new(7));
        });
        assert_eq!(
            code.as_slice(),
            &[0x01, 0x04, 0x03, 0x02, 0x01, 0x05, 0x07, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn writer_and_reader_agree_for_every_opcode() {
        let operations = [
            Operation::Nop {},
            Operation::PushI4Const { value: -123_456 },
            Operation::PushI4Reg {
                register: Register::R5,
            },
            Operation::SetI4Reg {
                register: Register::R0,
            },
            Operation::AddI4 {},
            Operation::Call {
                scope: ScopeId::new(2),
            },
            Operation::XCall {
                scope: ScopeId::new(0x0A0B_0C0D),
            },
            Operation::Ret {},
        ];

        let writer = AssemblyWriter::new();
        let reader = AssemblyReader::new();
        for operation in operations {
            let mut code = ByteBuffer::new();
            operation.write(&writer, &mut code);
            assert_eq!(code.len(), operation.instruction().encoded_len());

            let mut cursor = code.cursor();
            assert_eq!(Operation::read(&reader, &cursor).unwrap(), operation);
            assert_eq!(cursor.offset(), 0);

            reader.go_next_instruction(&mut cursor).unwrap();
            assert_eq!(cursor.offset(), code.len());
            assert!(!cursor.has_data());
        }
    }

    #[test]
    fn typed_reads_return_operands() {
        let code = assemble(|w, b| {
            w.push_i4_const(b, 42)
                .set_i4_reg(b, Register::R3)
                .xcall(b, ScopeId::new(1))
                .ret(b);
        });
        let mut reader = InstructionReader::new(code.cursor());

        let (value,) = reader.push_i4_const().unwrap();
        assert_eq!(value, 42);
        reader.go_next_instruction().unwrap();

        let (register,) = reader.set_i4_reg().unwrap();
        assert_eq!(register, Register::R3);
        reader.go_next_instruction().unwrap();

        let (scope,) = reader.xcall().unwrap();
        assert_eq!(scope, ScopeId::new(1));
        reader.go_next_instruction().unwrap();

        let () = reader.ret().unwrap();
        reader.go_next_instruction().unwrap();
        assert!(!reader.has_data());
    }

    #[test]
    fn typed_read_rejects_other_opcode() {
        let code = assemble(|w, b| {
            w.add_i4(b);
        });
        let reader = AssemblyReader::new();

        let err = reader.push_i4_const(&code.cursor()).unwrap_err();
        assert!(matches!(
            err,
            VMError::InstructionMismatch {
                expected: "push_i4_const",
                actual: 0x04,
                offset: 0
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let code = ByteBuffer::from([0x00u8, 0x2A]);
        let reader = AssemblyReader::new();
        let mut cursor = code.cursor();
        reader.go_next_instruction(&mut cursor).unwrap();

        let err = reader.go_next_instruction(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            VMError::UnsupportedInstruction {
                opcode: 0x2A,
                offset: 1
            }
        ));
        assert_eq!(cursor.offset(), 1);
    }

    #[test]
    fn truncated_record() {
        let code = ByteBuffer::from([0x01u8, 0x01, 0x00]);
        let reader = AssemblyReader::new();
        let mut cursor = code.cursor();

        assert!(matches!(
            reader.push_i4_const(&cursor),
            Err(VMError::UnexpectedEndOfBytecode {
                offset: 0,
                requested: 5,
                available: 3
            })
        ));
        assert_eq!(
            reader.go_next_instruction(&mut cursor).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn unknown_register_operand_is_invalid_argument() {
        let code = ByteBuffer::from([0x02u8, 0xFF]);
        let err = AssemblyReader::new().push_i4_reg(&code.cursor()).unwrap_err();
        assert!(matches!(err, VMError::UnknownRegister { id: 0xFF, offset: 0 }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(disassemble(code.as_slice()).is_err());
    }

    #[test]
    fn disassemble_lists_offsets() {
        let code = assemble(|w, b| {
            w.push_i4_const(b, 4)
                .push_i4_const(b, 2)
                .add_i4(b)
                .xcall(b, ScopeId::new(0))
                .ret(b);
        });

        let listing: Vec<String> = disassemble(&code)
            .unwrap()
            .into_iter()
            .map(|(offset, op)| format!("{offset}: {op}"))
            .collect();
        assert_eq!(
            listing,
            [
                "0: push_i4_const 4",
                "5: push_i4_const 2",
                "10: add_i4",
                "11: xcall 0",
                "16: ret"
            ]
        );
    }

    #[test]
    fn display_register_operand() {
        let op = Operation::PushI4Reg {
            register: Register::R6,
        };
        assert_eq!(op.to_string(), "push_i4_reg r6");
    }

    #[test]
    fn empty_code_disassembles_to_nothing() {
        assert!(disassemble(&[]).unwrap().is_empty());
    }
}
