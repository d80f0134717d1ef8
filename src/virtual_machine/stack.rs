//! Fixed-capacity evaluation stack.
//!
//! The stack is a flat byte region `[base, end)` with a moving `top`. Values
//! are stored untagged at their [`ValueType`](super::value_type::ValueType)
//! width, so every access names the type it expects. Reading a slot back as a
//! different type than it was written with yields reinterpreted bytes, not an
//! error.

use crate::types::encoding::{Decode, Encode, SliceSink};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::value_type::EngineType;
use stackvm_derive::BinaryCodec;
use std::fmt;

/// Default evaluation stack capacity in bytes.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Offset of a slot in the evaluation stack, relative to its base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BinaryCodec)]
pub struct StackAddress(pub usize);

impl StackAddress {
    pub const fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for StackAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The VM's working memory for intermediate values.
#[derive(Debug, Clone)]
pub struct RuntimeStack {
    data: Box<[u8]>,
    top: usize,
}

impl RuntimeStack {
    /// Creates an empty stack holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            top: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Live bytes between base and top.
    pub fn len(&self) -> usize {
        self.top
    }

    /// Free bytes between top and end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    pub fn base_address(&self) -> StackAddress {
        StackAddress(0)
    }

    /// Address the next push will write to.
    pub fn current_address(&self) -> StackAddress {
        StackAddress(self.top)
    }

    /// Writes `value` at the top and advances the top by its width.
    ///
    /// Fails without writing anything if the value does not fit.
    pub fn push<T: EngineType>(&mut self, value: T) -> Result<(), VMError> {
        if self.remaining() < T::WIDTH {
            return Err(VMError::StackOverflow {
                requested: T::WIDTH,
                available: self.remaining(),
            });
        }
        let end = self.top + T::WIDTH;
        value.encode(&mut SliceSink::new(&mut self.data[self.top..end]));
        self.top = end;
        Ok(())
    }

    /// Removes and returns the topmost `T`.
    pub fn pop<T: EngineType>(&mut self) -> Result<T, VMError> {
        let value = self.top::<T>()?;
        self.top -= T::WIDTH;
        Ok(value)
    }

    /// Returns the topmost `T` without removing it.
    pub fn top<T: EngineType>(&self) -> Result<T, VMError> {
        if self.top < T::WIDTH {
            return Err(VMError::StackUnderflow {
                requested: T::WIDTH,
                available: self.top,
            });
        }
        self.read_at(self.top - T::WIDTH)
    }

    /// Reads the `T` stored at `address`.
    ///
    /// The whole value must lie in the live region, so the address of a slot
    /// that has since been popped is rejected.
    pub fn get<T: EngineType>(&self, address: StackAddress) -> Result<T, VMError> {
        let start = self.check_live::<T>(address)?;
        self.read_at(start)
    }

    /// Overwrites the `T` stored at `address` in place. The top does not move.
    pub fn set<T: EngineType>(&mut self, address: StackAddress, value: T) -> Result<(), VMError> {
        let start = self.check_live::<T>(address)?;
        value.encode(&mut SliceSink::new(&mut self.data[start..start + T::WIDTH]));
        Ok(())
    }

    fn check_live<T: EngineType>(&self, address: StackAddress) -> Result<usize, VMError> {
        let start = address.offset();
        match start.checked_add(T::WIDTH) {
            Some(end) if end <= self.top => Ok(start),
            _ => Err(VMError::InvalidStackAddress {
                address: start,
                width: T::WIDTH,
                base: 0,
                top: self.top,
            }),
        }
    }

    fn read_at<T: EngineType>(&self, start: usize) -> Result<T, VMError> {
        let mut slot = &self.data[start..start + T::WIDTH];
        Ok(T::decode(&mut slot)?)
    }
}

impl Default for RuntimeStack {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_SIZE)
    }
}
