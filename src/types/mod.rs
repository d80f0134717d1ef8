//! Byte-level building blocks shared by the virtual machine.
//!
//! - `buffer`: growable bytecode buffer and its read cursor
//! - `encoding`: little-endian `Encode`/`Decode` traits used for instruction
//!   operands, stack slots and serialized programs

pub mod buffer;
pub mod encoding;
