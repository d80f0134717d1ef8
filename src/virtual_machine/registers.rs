//! Register file.
//!
//! Registers sit outside the evaluation stack and are partitioned by kind:
//! eight general-purpose integers (`r0..r7`), six stack-frame addresses
//! (`sp0..sp5`), four memory addresses (`m0..m3`) and the comparison flag
//! `cp`. Each accessor only accepts registers of its own partition.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::stack::StackAddress;
use stackvm_derive::BinaryCodec;
use std::fmt;

/// Address in host memory held by an `m` register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BinaryCodec)]
pub struct MemoryAddress(pub u64);

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    General,
    StackFrame,
    Memory,
    Flag,
}

impl RegisterKind {
    /// First register of the partition.
    pub const fn first(self) -> Register {
        match self {
            RegisterKind::General => Register::R0,
            RegisterKind::StackFrame => Register::Sp0,
            RegisterKind::Memory => Register::M0,
            RegisterKind::Flag => Register::Cp,
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegisterKind::General => "general-purpose",
            RegisterKind::StackFrame => "stack-frame",
            RegisterKind::Memory => "memory",
            RegisterKind::Flag => "flag",
        })
    }
}

/// Register identifier as encoded in instruction operands (one byte).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    Sp0 = 8,
    Sp1 = 9,
    Sp2 = 10,
    Sp3 = 11,
    Sp4 = 12,
    Sp5 = 13,
    M0 = 14,
    M1 = 15,
    M2 = 16,
    M3 = 17,
    Cp = 18,
}

impl Register {
    pub const ALL: [Register; 19] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::Sp0,
        Register::Sp1,
        Register::Sp2,
        Register::Sp3,
        Register::Sp4,
        Register::Sp5,
        Register::M0,
        Register::M1,
        Register::M2,
        Register::M3,
        Register::Cp,
    ];

    pub const fn kind(self) -> RegisterKind {
        match self as u8 {
            0..=7 => RegisterKind::General,
            8..=13 => RegisterKind::StackFrame,
            14..=17 => RegisterKind::Memory,
            _ => RegisterKind::Flag,
        }
    }

    /// Position of the register within its partition.
    pub const fn index(self) -> usize {
        (self as u8 - self.kind().first() as u8) as usize
    }

    /// Looks a register up by its encoded id.
    pub fn from_id(id: u8) -> Option<Register> {
        Register::ALL.get(id as usize).copied()
    }

    fn expect(self, kind: RegisterKind) -> Result<usize, VMError> {
        if self.kind() == kind {
            Ok(self.index())
        } else {
            Err(VMError::InvalidRegister {
                register: self,
                expected: kind,
            })
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            RegisterKind::General => write!(f, "r{}", self.index()),
            RegisterKind::StackFrame => write!(f, "sp{}", self.index()),
            RegisterKind::Memory => write!(f, "m{}", self.index()),
            RegisterKind::Flag => f.write_str("cp"),
        }
    }
}

/// Storage for every register. All slots start zeroed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet {
    r: [i64; 8],
    sp: [StackAddress; 6],
    m: [MemoryAddress; 4],
    cp: bool,
}

impl RegisterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn r(&self, register: Register) -> Result<i64, VMError> {
        Ok(self.r[register.expect(RegisterKind::General)?])
    }

    pub fn set_r(&mut self, register: Register, value: i64) -> Result<(), VMError> {
        self.r[register.expect(RegisterKind::General)?] = value;
        Ok(())
    }

    pub fn sp(&self, register: Register) -> Result<StackAddress, VMError> {
        Ok(self.sp[register.expect(RegisterKind::StackFrame)?])
    }

    pub fn set_sp(&mut self, register: Register, value: StackAddress) -> Result<(), VMError> {
        self.sp[register.expect(RegisterKind::StackFrame)?] = value;
        Ok(())
    }

    pub fn m(&self, register: Register) -> Result<MemoryAddress, VMError> {
        Ok(self.m[register.expect(RegisterKind::Memory)?])
    }

    pub fn set_m(&mut self, register: Register, value: MemoryAddress) -> Result<(), VMError> {
        self.m[register.expect(RegisterKind::Memory)?] = value;
        Ok(())
    }

    pub fn cp(&self) -> bool {
        self.cp
    }

    pub fn set_cp(&mut self, value: bool) {
        self.cp = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, DecodeError, Encode};
    use crate::virtual_machine::errors::ErrorKind;

    #[test]
    fn partitions() {
        assert_eq!(Register::R7.kind(), RegisterKind::General);
        assert_eq!(Register::Sp0.kind(), RegisterKind::StackFrame);
        assert_eq!(Register::M3.kind(), RegisterKind::Memory);
        assert_eq!(Register::Cp.kind(), RegisterKind::Flag);
        assert_eq!(Register::Sp5.index(), 5);
        assert_eq!(Register::M0.index(), 0);
    }

    #[test]
    fn ids_match_table_order() {
        for (id, register) in Register::ALL.iter().enumerate() {
            assert_eq!(*register as u8 as usize, id);
            assert_eq!(Register::from_id(id as u8), Some(*register));
        }
        assert_eq!(Register::from_id(19), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(Register::R3.to_string(), "r3");
        assert_eq!(Register::Sp2.to_string(), "sp2");
        assert_eq!(Register::M1.to_string(), "m1");
        assert_eq!(Register::Cp.to_string(), "cp");
    }

    #[test]
    fn general_registers_store_values() {
        let mut regs = RegisterSet::new();
        regs.set_r(Register::R2, -42).unwrap();
        assert_eq!(regs.r(Register::R2).unwrap(), -42);
        assert_eq!(regs.r(Register::R1).unwrap(), 0);
    }

    #[test]
    fn memory_registers_store_values() {
        let mut regs = RegisterSet::new();
        regs.set_m(Register::M2, MemoryAddress(0x1000)).unwrap();
        assert_eq!(regs.m(Register::M2).unwrap(), MemoryAddress(0x1000));
        assert_eq!(regs.m(Register::M3).unwrap(), MemoryAddress(0));
    }

    #[test]
    fn stack_frame_registers_store_values() {
        let mut regs = RegisterSet::new();
        regs.set_sp(Register::Sp5, StackAddress(24)).unwrap();
        assert_eq!(regs.sp(Register::Sp5).unwrap(), StackAddress(24));
    }

    #[test]
    fn flag() {
        let mut regs = RegisterSet::new();
        assert!(!regs.cp());
        regs.set_cp(true);
        assert!(regs.cp());
    }

    #[test]
    fn wrong_partition_rejected() {
        let mut regs = RegisterSet::new();

        let err = regs.set_r(Register::Sp0, 1).unwrap_err();
        assert!(matches!(
            err,
            VMError::InvalidRegister {
                register: Register::Sp0,
                expected: RegisterKind::General
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(regs.m(Register::R0).is_err());
        assert!(regs.sp(Register::Cp).is_err());
        assert_eq!(regs, RegisterSet::new());
    }

    #[test]
    fn register_encodes_as_one_byte() {
        let bytes = Register::M1.to_bytes();
        assert_eq!(bytes.as_slice(), &[15]);
        assert_eq!(Register::from_bytes(&bytes).unwrap(), Register::M1);
        assert_eq!(Register::from_bytes(&[0xFF]), Err(DecodeError::InvalidValue));
    }
}
