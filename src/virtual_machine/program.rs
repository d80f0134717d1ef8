//! Serialized program container.
//!
//! A [`Program`] bundles the code of several internal scopes with the index of
//! the scope to start from. `call` operands inside the code are scope ids, and
//! ids are issued in install order, so a program is meant to be installed into
//! a table that has no internal scopes yet.

use crate::types::buffer::ByteBuffer;
use crate::types::encoding::{Decode, Encode};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::scope::{ScopeId, ScopeTable};
use stackvm_derive::BinaryCodec;

/// Magic bytes identifying a serialized program.
const MAGIC: &[u8; 4] = b"SVMP";

/// Current program format version.
const CURRENT_VERSION: Version = Version::new(0, 3, 0);

/// Semantic version for program format compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Internal scope code plus an entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, BinaryCodec)]
pub struct Program {
    /// Encoded instructions, one buffer per internal scope.
    pub scopes: Vec<Vec<u8>>,
    /// Index into `scopes` of the scope `run` starts with.
    pub start: u32,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scope and returns the id it will have once installed.
    pub fn add_scope(&mut self, code: &ByteBuffer) -> ScopeId {
        self.scopes.push(code.to_vec());
        ScopeId::new(self.scopes.len() as u32 - 1)
    }

    /// Captures every internal scope of `table`.
    pub fn from_table(table: &ScopeTable, start: ScopeId) -> Self {
        Self {
            scopes: table.scopes().map(|scope| scope.code().to_vec()).collect(),
            start: start.raw(),
        }
    }

    /// Creates one internal scope per code buffer, in order, and returns the
    /// id of the start scope.
    pub fn install(&self, table: &mut ScopeTable) -> Result<ScopeId, VMError> {
        if self.start as usize >= self.scopes.len() {
            return Err(VMError::UnknownScope {
                scope: ScopeId::new(self.start),
            });
        }

        let mut start = ScopeId::INVALID;
        for (index, code) in self.scopes.iter().enumerate() {
            let scope = table.create_scope()?;
            scope.set_code(code.clone());
            if index == self.start as usize {
                start = scope.id();
            }
        }
        Ok(start)
    }

    /// Serializes the program with its magic header and format version.
    pub fn to_bytes(&self) -> ByteBuffer {
        let mut out = ByteBuffer::with_capacity(MAGIC.len() + 3 + self.encoded_len());
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.encode(&mut out);
        out
    }

    /// Deserializes a program, rejecting foreign files, newer format versions,
    /// truncated input and trailing bytes.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, VMError> {
        if input.len() < MAGIC.len() {
            return Err(VMError::DecodeError {
                reason: "truncated".to_string(),
            });
        }

        if &<[u8; 4]>::decode(&mut input)? != MAGIC {
            return Err(VMError::DecodeError {
                reason: "bad magic".to_string(),
            });
        }

        let version = Version::decode(&mut input)?;
        if version > CURRENT_VERSION {
            return Err(VMError::DecodeError {
                reason: format!(
                    "unsupported version {}.{}.{}",
                    version.major, version.minor, version.patch
                ),
            });
        }

        let program = Program::decode(&mut input)?;
        if !input.is_empty() {
            return Err(VMError::DecodeError {
                reason: "trailing bytes".to_string(),
            });
        }
        Ok(program)
    }

    /// Reads and decodes a program file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, VMError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Writes the serialized program to a file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), VMError> {
        std::fs::write(path, self.to_bytes().as_slice())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::assembly::AssemblyWriter;
    use crate::virtual_machine::errors::ErrorKind;

    fn sample() -> Program {
        let writer = AssemblyWriter::new();
        let mut helper = ByteBuffer::new();
        writer.push_i4_const(&mut helper, 2).ret(&mut helper);

        let mut program = Program::new();
        let helper_id = program.add_scope(&helper);

        let mut main = ByteBuffer::new();
        writer
            .push_i4_const(&mut main, 4)
            .call(&mut main, helper_id)
            .add_i4(&mut main);
        program.start = program.add_scope(&main).raw();
        program
    }

    #[test]
    fn serialized_layout_starts_with_header() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[..4], b"SVMP");
        assert_eq!(&bytes[4..7], &[0, 3, 0]);
    }

    #[test]
    fn round_trip() {
        let program = sample();
        assert_eq!(Program::from_bytes(&program.to_bytes()).unwrap(), program);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes[0] = b'X';
        let err = Program::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, VMError::DecodeError { ref reason } if reason == "bad magic"));
    }

    #[test]
    fn rejects_newer_version() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes[4] = 1;
        assert!(matches!(
            Program::from_bytes(&bytes),
            Err(VMError::DecodeError { reason }) if reason.starts_with("unsupported version")
        ));
    }

    #[test]
    fn accepts_older_version() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes[5] = 2;
        assert_eq!(Program::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = sample().to_bytes();
        assert!(Program::from_bytes(&bytes[..2]).is_err());
        assert!(Program::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes.push(0);
        let err = Program::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn install_creates_scopes_in_order() {
        let program = sample();
        let mut table = ScopeTable::new();
        let start = program.install(&mut table).unwrap();

        assert_eq!(start, ScopeId::new(1));
        assert_eq!(table.scope_count(), 2);
        assert_eq!(
            table.scope(ScopeId::new(0)).unwrap().code().as_slice(),
            program.scopes[0].as_slice()
        );
        assert_eq!(Program::from_table(&table, start), program);
    }

    #[test]
    fn install_rejects_missing_start() {
        let program = Program {
            scopes: vec![vec![]],
            start: 1,
        };
        let err = program.install(&mut ScopeTable::new()).unwrap_err();
        assert!(matches!(err, VMError::UnknownScope { .. }));
    }
}
