use crate::types::encoding::DecodeError;
use crate::virtual_machine::registers::{Register, RegisterKind};
use crate::virtual_machine::scope::ScopeId;
use stackvm_derive::Error;

/// Broad category of a [`VMError`], for callers that react to the kind of
/// failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic runtime failure.
    Runtime,
    /// An argument (address, opcode tag, register) is not valid for the operation.
    InvalidArgument,
    /// An identifier or offset lies outside the issued range.
    OutOfRange,
    /// A declared operation has no implementation attached.
    NotImplemented,
    /// A push would exceed the stack's capacity.
    Capacity,
    /// A pop or peek found fewer live bytes than requested.
    Size,
    /// An opcode outside the instruction set.
    UnsupportedInstruction,
}

/// Errors that can occur while encoding, decoding or executing bytecode.
#[derive(Debug, Error)]
pub enum VMError {
    /// Push would move the stack top past its end.
    #[error("stack overflow: requested {requested} bytes, {available} available")]
    #[kind(Capacity)]
    StackOverflow { requested: usize, available: usize },
    /// Pop or top with fewer live bytes than the value's width.
    #[error("stack underflow: requested {requested} bytes, {available} live")]
    #[kind(Size)]
    StackUnderflow { requested: usize, available: usize },
    /// Address-based access outside the live region `[base, top)`.
    #[error(
        "invalid stack address {address} for a {width}-byte value (live region {base}..{top})"
    )]
    #[kind(InvalidArgument)]
    InvalidStackAddress {
        address: usize,
        width: usize,
        base: usize,
        top: usize,
    },
    /// Typed decode called on a record with a different opcode tag.
    #[error(
        "{actual:#04x} at offset {offset} is not valid for this instruction, expected {expected}"
    )]
    #[kind(InvalidArgument)]
    InstructionMismatch {
        expected: &'static str,
        actual: u8,
        offset: usize,
    },
    /// Register operand from the wrong partition.
    #[error("register {register} is not a {expected} register")]
    #[kind(InvalidArgument)]
    InvalidRegister {
        register: Register,
        expected: RegisterKind,
    },
    /// Operand byte that names no register.
    #[error("unknown register id {id:#04x} in record at offset {offset}")]
    #[kind(InvalidArgument)]
    UnknownRegister { id: u8, offset: usize },
    /// Every id of one scope kind has been issued.
    #[error("scope table full after {issued} scopes")]
    #[kind(Capacity)]
    ScopeTableFull { issued: usize },
    /// Internal scope id never issued by the scope table.
    #[error("unknown scope {scope}")]
    #[kind(OutOfRange)]
    UnknownScope { scope: ScopeId },
    /// External scope id never issued by the scope table.
    #[error("unknown external scope {scope}")]
    #[kind(OutOfRange)]
    UnknownExternalScope { scope: ScopeId },
    /// A record extends past the end of its buffer.
    #[error(
        "unexpected end of bytecode at offset {offset}: needed {requested} bytes, {available} left"
    )]
    #[kind(OutOfRange)]
    UnexpectedEndOfBytecode {
        offset: usize,
        requested: usize,
        available: usize,
    },
    /// External scope invoked before a callback was attached.
    #[error("external scope {scope} has no callback")]
    #[kind(NotImplemented)]
    MissingCallback { scope: ScopeId },
    /// Opcode tag outside the instruction set.
    #[error("unsupported instruction {opcode:#04x} at offset {offset}")]
    #[kind(UnsupportedInstruction)]
    UnsupportedInstruction { opcode: u8, offset: usize },
    /// Malformed operands or program file.
    #[error("decoding error: {reason}")]
    #[kind(Runtime)]
    DecodeError { reason: String },
    /// Program file I/O failure.
    #[error("io error: {reason}")]
    #[kind(Runtime)]
    IoError { reason: String },
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        VMError::DecodeError {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::IoError {
            reason: err.to_string(),
        }
    }
}
