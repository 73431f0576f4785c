//! Builder for emitting bytecode during compilation.
//!
//! `CodeBuilder` encodes opcodes and inline operands, manages forward jumps
//! that need patching, tracks source lines for diagnostics, and performs the
//! cell-promotion rewrite over already-emitted instructions.

use std::{collections::HashSet, sync::Arc};

use super::{code::Code, op::Opcode};
use crate::value::Value;

/// A forward jump awaiting its target. `operand_pos` is the byte position of
/// the i16 offset; `end_pos` is the position just past the instruction's
/// operands, which relative offsets are measured from.
#[derive(Debug, Clone, Copy)]
pub struct JumpPatch {
    operand_pos: usize,
    end_pos: usize,
}

#[derive(Debug, Default)]
pub struct CodeBuilder {
    bytecode: Vec<u8>,
    constants: Vec<Value>,
    /// Instruction start offsets in emission order, used by the cell-slot
    /// rewrite pass to step over operands safely.
    instruction_offsets: Vec<usize>,
    /// `(instruction offset, one-based line)` entries, offset-ascending.
    lines: Vec<(u32, u32)>,
    current_line: u32,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_line: 1,
            ..Self::default()
        }
    }

    /// Sets the source line recorded for subsequently emitted instructions.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    /// The current bytecode length, used as a jump target for backward jumps.
    #[must_use]
    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    fn start_instruction(&mut self, op: Opcode) {
        let offset = self.bytecode.len();
        self.instruction_offsets.push(offset);
        match self.lines.last() {
            Some((_, line)) if *line == self.current_line => {}
            _ => self.lines.push((offset as u32, self.current_line)),
        }
        self.bytecode.push(op as u8);
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Opcode) {
        self.start_instruction(op);
    }

    /// Emits an instruction with a u8 operand.
    pub fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.start_instruction(op);
        self.bytecode.push(operand);
    }

    /// Emits an instruction with a u16 operand (little-endian).
    pub fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.start_instruction(op);
        self.bytecode.extend_from_slice(&operand.to_le_bytes());
    }

    /// Emits an instruction with a u16 operand followed by a u8 operand
    /// (`MakeFunction`: prototype constant + captured cell count).
    pub fn emit_u16_u8(&mut self, op: Opcode, operand1: u16, operand2: u8) {
        self.start_instruction(op);
        self.bytecode.extend_from_slice(&operand1.to_le_bytes());
        self.bytecode.push(operand2);
    }

    /// Emits a forward jump with a placeholder offset; patch it once the
    /// target is known.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpPatch {
        self.start_instruction(op);
        let operand_pos = self.bytecode.len();
        self.bytecode.extend_from_slice(&0i16.to_le_bytes());
        JumpPatch {
            operand_pos,
            end_pos: self.bytecode.len(),
        }
    }

    /// Emits `IterNext` with a placeholder exhaustion jump.
    pub fn emit_iter_next(&mut self, nvars: u8) -> JumpPatch {
        self.start_instruction(Opcode::IterNext);
        let operand_pos = self.bytecode.len();
        self.bytecode.extend_from_slice(&0i16.to_le_bytes());
        self.bytecode.push(nvars);
        JumpPatch {
            operand_pos,
            end_pos: self.bytecode.len(),
        }
    }

    /// Points a pending forward jump at the current position.
    pub fn patch_jump(&mut self, patch: JumpPatch) {
        let offset = self.bytecode.len() as i64 - patch.end_pos as i64;
        let offset = i16::try_from(offset).expect("jump offset exceeds i16 range");
        self.bytecode[patch.operand_pos..patch.operand_pos + 2]
            .copy_from_slice(&offset.to_le_bytes());
    }

    /// Emits an unconditional backward jump to `target`.
    pub fn emit_loop(&mut self, target: usize) {
        self.start_instruction(Opcode::Jump);
        let end_pos = self.bytecode.len() + 2;
        let offset = target as i64 - end_pos as i64;
        let offset = i16::try_from(offset).expect("jump offset exceeds i16 range");
        self.bytecode.extend_from_slice(&offset.to_le_bytes());
    }

    /// Interns a constant, reusing an existing equal entry where possible.
    pub fn add_constant(&mut self, value: Value) -> u16 {
        if matches!(
            value,
            Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Byte(_)
        ) {
            if let Some(i) = self.constants.iter().position(|c| constants_identical(c, &value)) {
                return i as u16;
            }
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    /// Rewrites `LoadFast`/`StoreFast` on promoted slots to their
    /// cell-indirect forms. Promotion is discovered when an inner function
    /// captures a variable, which can be after accesses were emitted; both
    /// encodings are the same width, so the rewrite is in place.
    pub fn rewrite_promoted_slots(&mut self, promoted: &HashSet<u8>) {
        if promoted.is_empty() {
            return;
        }
        for &offset in &self.instruction_offsets {
            let Some(op) = Opcode::from_repr(self.bytecode[offset]) else {
                continue;
            };
            let replacement = match op {
                Opcode::LoadFast => Opcode::LoadCell,
                Opcode::StoreFast => Opcode::StoreCell,
                _ => continue,
            };
            let slot = self.bytecode[offset + 1];
            if promoted.contains(&slot) {
                self.bytecode[offset] = replacement as u8;
            }
        }
    }

    /// Finalizes the builder into a [`Code`] object.
    pub fn build(
        self,
        name: String,
        local_names: Vec<String>,
        free_names: Vec<String>,
        cell_slots: Vec<u8>,
        global_names: Vec<String>,
        source: Arc<str>,
    ) -> Code {
        Code::new(
            name,
            self.bytecode,
            self.constants,
            local_names,
            free_names,
            cell_slots,
            global_names,
            source,
            self.lines,
        )
    }
}

/// Strict identity for constant interning: int/float/byte by exact bits,
/// strings by content. Value equality is too loose here (1 == 1.0).
fn constants_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Byte(x), Value::Byte(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_forward_jumps() {
        let mut builder = CodeBuilder::new();
        builder.emit(Opcode::True);
        let jump = builder.emit_jump(Opcode::JumpIfFalse);
        builder.emit(Opcode::Nil);
        builder.patch_jump(jump);
        // offset from after the operand (position 4) to the end (position 5)
        let code = builder.build(
            "test".into(),
            vec![],
            vec![],
            vec![],
            vec![],
            Arc::from(""),
        );
        assert_eq!(code.bytecode()[2..4], 1i16.to_le_bytes());
    }

    #[test]
    fn interns_equal_constants() {
        let mut builder = CodeBuilder::new();
        let a = builder.add_constant(Value::Int(7));
        let b = builder.add_constant(Value::Int(7));
        let c = builder.add_constant(Value::Float(7.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rewrites_promoted_slots() {
        let mut builder = CodeBuilder::new();
        builder.emit_u8(Opcode::LoadFast, 0);
        builder.emit_u8(Opcode::StoreFast, 1);
        builder.emit_u8(Opcode::LoadFast, 1);
        let mut promoted = HashSet::new();
        promoted.insert(1u8);
        builder.rewrite_promoted_slots(&promoted);
        let code = builder.build(
            "test".into(),
            vec![],
            vec![],
            vec![],
            vec![],
            Arc::from(""),
        );
        assert_eq!(
            code.bytecode(),
            &[
                Opcode::LoadFast as u8,
                0,
                Opcode::StoreCell as u8,
                1,
                Opcode::LoadCell as u8,
                1,
            ]
        );
    }
}
