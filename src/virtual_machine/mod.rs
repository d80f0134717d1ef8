//! Stack-based bytecode virtual machine.
//!
//! Bytecode is organized in scopes: internal scopes hold encoded instructions,
//! external scopes are native callbacks. A [`runtime::RuntimeContext`] runs a
//! start scope against its evaluation stack and register file, recursing into
//! other scopes on `call` and `xcall`.
//!
//! # Architecture
//!
//! - **Evaluation stack**: fixed-capacity byte region with untyped, width-sized slots
//! - **Registers**: `r0..r7` integers, `sp0..sp5` stack addresses, `m0..m3`
//!   memory addresses and the `cp` flag
//! - **Instruction format**: packed records of a one-byte opcode followed by
//!   fixed-width little-endian operands
//! - **Execution model**: decode in place, dispatch, step to the next record;
//!   `ret` or the end of the code leaves the scope
//!
//! # Modules
//!
//! - [`assembly`]: Instruction writer, reader and disassembler
//! - [`errors`]: Error type and error kinds
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`program`]: Serialized program format
//! - [`registers`]: Register identifiers and the register file
//! - [`runtime`]: Runtime context and the execution engine
//! - [`scope`]: Scope identifiers and the scope table
//! - [`stack`]: Evaluation stack
//! - [`value_type`]: Serialized widths of stored values

pub mod assembly;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod program;
pub mod registers;
pub mod runtime;
pub mod scope;
pub mod stack;
pub mod value_type;
