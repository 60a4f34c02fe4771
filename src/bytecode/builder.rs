//! Instruction-emitting builder with a forward-jump-then-patch idiom.
//!
//! Keeps the teacher's `CodeBuilder` architecture (typed `emit_*` helpers,
//! `JumpLabel` + `patch_jump`, inline `#[cfg(test)]` unit tests) but emits
//! big-endian bytes with absolute jump targets instead of the teacher's
//! little-endian relative offsets, per this crate's instruction set. Unlike
//! the teacher's version, this builder does not own a constant pool: the
//! compiler keeps one shared pool across all nested function scopes (see
//! `bytecode/compiler.rs`), since a `Closure` instruction needs to find its
//! function constant regardless of which scope it was compiled in.

use crate::bytecode::op::{byte_from_opcode, encode, Opcode};

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Marks a not-yet-patched forward jump's operand location.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel(usize);

#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<u8>,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    pub fn emit(&mut self, op: Opcode, operands: &[u32]) -> usize {
        let position = encode(&mut self.instructions, op, operands);
        self.previous = self.last;
        self.last = Some(EmittedInstruction { opcode: op, position });
        position
    }

    /// Emits a jump with a placeholder target, returning a label to patch
    /// once the real target offset is known.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        let position = self.emit(op, &[0]);
        JumpLabel(position)
    }

    /// Patches a previously emitted forward jump to target the given
    /// absolute instruction offset.
    pub fn patch_jump(&mut self, label: JumpLabel, target: usize) {
        let operand_start = label.0 + 1;
        let bytes = (target as u16).to_be_bytes();
        self.instructions[operand_start] = bytes[0];
        self.instructions[operand_start + 1] = bytes[1];
    }

    pub fn patch_jump_here(&mut self, label: JumpLabel) {
        let here = self.current_offset();
        self.patch_jump(label, here);
    }

    pub fn last_is(&self, op: Opcode) -> bool {
        self.last.is_some_and(|i| i.opcode == op)
    }

    /// Removes a trailing `Pop`, used by `if`/function-body compilation so
    /// the final expression's value is left on the stack instead of
    /// discarded.
    pub fn remove_last_pop(&mut self) {
        if let Some(last) = self.last {
            if last.opcode == Opcode::Pop {
                self.instructions.truncate(last.position);
                self.last = self.previous;
            }
        }
    }

    /// Overwrites the last emitted instruction's opcode byte in place,
    /// used to turn a trailing `Pop` into `ReturnValue` at function-body end.
    pub fn replace_last_pop_with_return_value(&mut self) {
        if let Some(last) = self.last {
            if last.opcode == Opcode::Pop {
                self.instructions[last.position] = byte_from_opcode(Opcode::ReturnValue);
                self.last = Some(EmittedInstruction { opcode: Opcode::ReturnValue, position: last.position });
            }
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_records_position() {
        let mut b = CodeBuilder::new();
        let pos = b.emit(Opcode::Add, &[]);
        assert_eq!(pos, 0);
        assert!(b.last_is(Opcode::Add));
    }

    #[test]
    fn forward_jump_patches_absolute_target() {
        let mut b = CodeBuilder::new();
        let label = b.emit_jump(Opcode::JumpNotTrue);
        b.emit(Opcode::True, &[]);
        let target = b.current_offset();
        b.patch_jump(label, target);
        let instructions = b.build();
        assert_eq!(&instructions[1..3], &(target as u16).to_be_bytes());
    }

    #[test]
    fn remove_last_pop_truncates() {
        let mut b = CodeBuilder::new();
        b.emit(Opcode::True, &[]);
        b.emit(Opcode::Pop, &[]);
        b.remove_last_pop();
        assert_eq!(b.build().len(), 1);
    }

    #[test]
    fn replace_last_pop_with_return_value() {
        let mut b = CodeBuilder::new();
        b.emit(Opcode::True, &[]);
        b.emit(Opcode::Pop, &[]);
        b.replace_last_pop_with_return_value();
        let instructions = b.build();
        assert_eq!(instructions[1], byte_from_opcode(Opcode::ReturnValue));
    }
}
