//! Stack bytecode virtual machine library.
//!
//! Provides the byte-level codec, the evaluation stack, registers, scopes and
//! the execution engine, plus the logging used by the binaries.

pub mod types;
pub mod utils;
pub mod virtual_machine;
