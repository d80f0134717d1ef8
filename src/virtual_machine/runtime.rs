//! Execution engine.
//!
//! A [`RuntimeContext`] owns the evaluation stack, the register file and the
//! scope table, and runs bytecode starting from its start scope. Each
//! instruction is decoded in place, dispatched to its handler, and the cursor
//! then steps over the record. `ret` or the end of the buffer leaves the scope.
//!
//! `call` recurses on the host stack, one frame per nested scope. Recursion
//! depth is not tracked, so a scope that calls itself without bound exhausts
//! the host stack and aborts the process.

use crate::debug;
use crate::types::buffer::ByteBuffer;
use crate::virtual_machine::assembly::InstructionReader;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::registers::{Register, RegisterSet};
use crate::virtual_machine::scope::{ScopeId, ScopeTable};
use crate::virtual_machine::stack::{DEFAULT_STACK_SIZE, RuntimeStack};

/// What the engine does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Return,
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        reader = $reader:ident,
        instr = $instr:ident,
        { $( $variant:ident => $decode:ident => $handler:ident ( $( $field:ident ),* ) ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    let ( $( $field, )* ) = $reader.$decode()?;
                    $vm.$handler($( $field ),*)
                }
            ),*
        }
    }};
}

/// Owns everything one execution needs.
#[derive(Debug)]
pub struct RuntimeContext {
    stack: RuntimeStack,
    registers: RegisterSet,
    scopes: ScopeTable,
    start_scope: ScopeId,
}

impl RuntimeContext {
    pub fn new(
        stack: RuntimeStack,
        registers: RegisterSet,
        scopes: ScopeTable,
        start_scope: ScopeId,
    ) -> Self {
        Self {
            stack,
            registers,
            scopes,
            start_scope,
        }
    }

    pub fn builder() -> RuntimeContextBuilder {
        RuntimeContextBuilder::new()
    }

    pub fn stack(&self) -> &RuntimeStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut RuntimeStack {
        &mut self.stack
    }

    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterSet {
        &mut self.registers
    }

    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTable {
        &mut self.scopes
    }

    pub fn start_scope(&self) -> ScopeId {
        self.start_scope
    }

    pub fn set_start_scope(&mut self, scope: ScopeId) {
        self.start_scope = scope;
    }

    /// Executes the start scope to completion.
    ///
    /// The first error aborts the whole run; the stack and registers are left
    /// as they were when it occurred.
    pub fn run(&mut self) -> Result<(), VMError> {
        debug!("run: start scope {}", self.start_scope);
        self.execute_scope(self.start_scope)
    }

    /// Executes one internal scope until `ret` or the end of its code.
    pub fn execute_scope(&mut self, scope: ScopeId) -> Result<(), VMError> {
        // Shares the buffer so handlers can borrow the context mutably.
        let code: ByteBuffer = self.scopes.scope(scope)?.code().clone();
        let mut reader = InstructionReader::new(code.cursor());
        debug!("enter scope {scope} ({} bytes)", code.len());

        while reader.has_data() {
            let instruction = reader.peek_instruction()?;
            debug!("  {:>6}: {}", reader.offset(), instruction.mnemonic());
            match self.execute_instruction(instruction, &reader)? {
                Flow::Next => reader.go_next_instruction()?,
                Flow::Return => break,
            }
        }

        debug!("leave scope {scope}");
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        instruction: Instruction,
        reader: &InstructionReader<'_>,
    ) -> Result<Flow, VMError> {
        exec_vm! {
            vm = self,
            reader = reader,
            instr = instruction,
            {
                Nop => nop => op_nop(),
                PushI4Const => push_i4_const => op_push_i4_const(value),
                PushI4Reg => push_i4_reg => op_push_i4_reg(register),
                SetI4Reg => set_i4_reg => op_set_i4_reg(register),
                AddI4 => add_i4 => op_add_i4(),
                Call => call => op_call(scope),
                XCall => xcall => op_xcall(scope),
                Ret => ret => op_ret(),
            }
        }
    }

    fn op_nop(&mut self) -> Result<Flow, VMError> {
        Ok(Flow::Next)
    }

    fn op_push_i4_const(&mut self, value: i32) -> Result<Flow, VMError> {
        self.stack.push(value)?;
        Ok(Flow::Next)
    }

    fn op_push_i4_reg(&mut self, register: Register) -> Result<Flow, VMError> {
        // Low 32 bits.
        let value = self.registers.r(register)? as i32;
        self.stack.push(value)?;
        Ok(Flow::Next)
    }

    fn op_set_i4_reg(&mut self, register: Register) -> Result<Flow, VMError> {
        let value = self.stack.pop::<i32>()?;
        self.registers.set_r(register, i64::from(value))?;
        Ok(Flow::Next)
    }

    fn op_add_i4(&mut self) -> Result<Flow, VMError> {
        let a = self.stack.pop::<i32>()?;
        let b = self.stack.pop::<i32>()?;
        self.stack.push(a.wrapping_add(b))?;
        Ok(Flow::Next)
    }

    fn op_call(&mut self, scope: ScopeId) -> Result<Flow, VMError> {
        self.execute_scope(scope)?;
        Ok(Flow::Next)
    }

    fn op_xcall(&mut self, scope: ScopeId) -> Result<Flow, VMError> {
        debug!("xcall external scope {scope}");
        self.scopes
            .external_scope_mut(scope)?
            .invoke(&mut self.stack)?;
        Ok(Flow::Next)
    }

    fn op_ret(&mut self) -> Result<Flow, VMError> {
        Ok(Flow::Return)
    }
}

/// Fluent construction of a [`RuntimeContext`].
///
/// Unset parts default to an empty stack of [`DEFAULT_STACK_SIZE`] bytes, zeroed
/// registers, an empty scope table and [`ScopeId::INVALID`] as start scope.
#[derive(Debug, Default)]
pub struct RuntimeContextBuilder {
    stack: Option<RuntimeStack>,
    registers: Option<RegisterSet>,
    scopes: Option<ScopeTable>,
    start_scope: Option<ScopeId>,
}

impl RuntimeContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(mut self, stack: RuntimeStack) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Shorthand for an empty stack of `capacity` bytes.
    pub fn stack_size(self, capacity: usize) -> Self {
        self.stack(RuntimeStack::new(capacity))
    }

    pub fn registers(mut self, registers: RegisterSet) -> Self {
        self.registers = Some(registers);
        self
    }

    pub fn scopes(mut self, scopes: ScopeTable) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn start_scope(mut self, scope: ScopeId) -> Self {
        self.start_scope = Some(scope);
        self
    }

    pub fn build(self) -> RuntimeContext {
        RuntimeContext::new(
            self.stack.unwrap_or_else(|| RuntimeStack::new(DEFAULT_STACK_SIZE)),
            self.registers.unwrap_or_default(),
            self.scopes.unwrap_or_default(),
            self.start_scope.unwrap_or(ScopeId::INVALID),
        )
    }
}
