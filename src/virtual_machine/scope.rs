//! Scopes and the table that owns them.
//!
//! An internal scope is a buffer of encoded instructions; an external scope is
//! a native callback that operates on the evaluation stack. Ids are issued
//! sequentially per kind and never reused by a table.

use crate::types::buffer::ByteBuffer;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::stack::RuntimeStack;
use stackvm_derive::BinaryCodec;
use std::fmt;

/// Opaque scope identifier, encoded as a little-endian `u32` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BinaryCodec)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Never issued by a table; resolving it always fails.
    pub const INVALID: ScopeId = ScopeId(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("<invalid>")
        }
    }
}

/// Native code invoked by `xcall`.
///
/// The callback may push and pop freely; errors it returns abort the run.
pub type ExternalCallback = Box<dyn FnMut(&mut RuntimeStack) -> Result<(), VMError>>;

/// A callable block of bytecode.
#[derive(Debug, Clone)]
pub struct RuntimeScope {
    id: ScopeId,
    code: ByteBuffer,
}

impl RuntimeScope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The scope's encoded instructions.
    pub fn code(&self) -> &ByteBuffer {
        &self.code
    }

    /// Mutable access for assembling instructions into the scope.
    pub fn code_mut(&mut self) -> &mut ByteBuffer {
        &mut self.code
    }

    /// Replaces the scope's instructions.
    pub fn set_code(&mut self, code: impl Into<ByteBuffer>) {
        self.code = code.into();
    }
}

/// A scope backed by a native callback.
pub struct ExternalScope {
    id: ScopeId,
    callback: Option<ExternalCallback>,
}

impl ExternalScope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Attaches the callback, replacing any previous one.
    pub fn set_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut RuntimeStack) -> Result<(), VMError> + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Runs the callback against `stack`.
    pub fn invoke(&mut self, stack: &mut RuntimeStack) -> Result<(), VMError> {
        match self.callback.as_mut() {
            Some(callback) => callback(stack),
            None => Err(VMError::MissingCallback { scope: self.id }),
        }
    }
}

impl fmt::Debug for ExternalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalScope")
            .field("id", &self.id)
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

/// Owns every scope available to a runtime context.
#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<RuntimeScope>,
    external: Vec<ExternalScope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an internal scope with an empty instruction buffer.
    pub fn create_scope(&mut self) -> Result<&mut RuntimeScope, VMError> {
        let id = next_scope_id(self.scopes.len())?;
        self.scopes.push(RuntimeScope {
            id,
            code: ByteBuffer::new(),
        });
        Ok(&mut self.scopes[id.index()])
    }

    /// Allocates an external scope with no callback attached.
    pub fn create_external_scope(&mut self) -> Result<&mut ExternalScope, VMError> {
        let id = next_scope_id(self.external.len())?;
        self.external.push(ExternalScope { id, callback: None });
        Ok(&mut self.external[id.index()])
    }

    pub fn scope(&self, id: ScopeId) -> Result<&RuntimeScope, VMError> {
        self.scopes
            .get(id.index())
            .ok_or(VMError::UnknownScope { scope: id })
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> Result<&mut RuntimeScope, VMError> {
        self.scopes
            .get_mut(id.index())
            .ok_or(VMError::UnknownScope { scope: id })
    }

    pub fn external_scope(&self, id: ScopeId) -> Result<&ExternalScope, VMError> {
        self.external
            .get(id.index())
            .ok_or(VMError::UnknownExternalScope { scope: id })
    }

    pub fn external_scope_mut(&mut self, id: ScopeId) -> Result<&mut ExternalScope, VMError> {
        self.external
            .get_mut(id.index())
            .ok_or(VMError::UnknownExternalScope { scope: id })
    }

    /// Internal scopes in id order.
    pub fn scopes(&self) -> impl Iterator<Item = &RuntimeScope> {
        self.scopes.iter()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn external_scope_count(&self) -> usize {
        self.external.len()
    }
}

/// Id for the scope allocated after `issued` others of the same kind.
/// [`ScopeId::INVALID`] is never handed out.
fn next_scope_id(issued: usize) -> Result<ScopeId, VMError> {
    u32::try_from(issued)
        .ok()
        .filter(|&raw| raw != ScopeId::INVALID.raw())
        .map(ScopeId)
        .ok_or(VMError::ScopeTableFull { issued })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::errors::ErrorKind;

    #[test]
    fn ids_are_sequential_per_kind() {
        let mut table = ScopeTable::new();
        assert_eq!(table.create_scope().unwrap().id(), ScopeId::new(0));
        assert_eq!(table.create_external_scope().unwrap().id(), ScopeId::new(0));
        assert_eq!(table.create_scope().unwrap().id(), ScopeId::new(1));
        assert_eq!(table.scope_count(), 2);
        assert_eq!(table.external_scope_count(), 1);
    }

    #[test]
    fn invalid_id_is_never_issued() {
        let last = ScopeId::INVALID.raw() as usize - 1;
        assert_eq!(next_scope_id(last).unwrap(), ScopeId::new(u32::MAX - 1));

        let err = next_scope_id(last + 1).unwrap_err();
        assert!(matches!(err, VMError::ScopeTableFull { .. }));
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn resolves_issued_ids() {
        let mut table = ScopeTable::new();
        let id = table.create_scope().unwrap().id();
        table.scope_mut(id).unwrap().code_mut().append(&[0x00]);

        assert_eq!(table.scope(id).unwrap().code().as_slice(), &[0x00]);
    }

    #[test]
    fn unknown_ids_are_out_of_range() {
        let mut table = ScopeTable::new();
        table.create_scope().unwrap();

        let err = table.scope(ScopeId::new(1)).unwrap_err();
        assert!(matches!(err, VMError::UnknownScope { .. }));
        assert_eq!(err.kind(), ErrorKind::OutOfRange);

        let err = table.external_scope(ScopeId::new(0)).unwrap_err();
        assert!(matches!(err, VMError::UnknownExternalScope { .. }));
        assert!(table.scope(ScopeId::INVALID).is_err());
    }

    #[test]
    fn external_callback_sees_stack() {
        let mut table = ScopeTable::new();
        let scope = table.create_external_scope().unwrap();
        scope.set_callback(|stack| stack.push(11i32));

        let mut stack = RuntimeStack::new(8);
        scope.invoke(&mut stack).unwrap();
        assert_eq!(stack.pop::<i32>().unwrap(), 11);
    }

    #[test]
    fn missing_callback_is_not_implemented() {
        let mut table = ScopeTable::new();
        let scope = table.create_external_scope().unwrap();
        assert!(!scope.has_callback());

        let err = scope.invoke(&mut RuntimeStack::new(8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn invalid_id_display() {
        assert_eq!(ScopeId::new(4).to_string(), "4");
        assert_eq!(ScopeId::INVALID.to_string(), "<invalid>");
        assert_eq!(ScopeId::default(), ScopeId::INVALID);
    }
}
