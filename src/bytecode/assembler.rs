use super::opcodes::{Inst, Label};
use crate::compiler::expr::Literal;

/// Forward branch waiting for its target. Consumed by [Assembler::bind].
#[must_use]
#[derive(Debug)]
pub struct Patch(usize);

/// Emits one block of code.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<Inst<Label>>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the next instruction, relative to the start of the block.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, inst: Inst<Label>) {
        self.code.push(inst);
    }

    pub fn emit_constant(&mut self, lit: Literal) {
        self.emit(Inst::Constant(lit));
    }

    pub fn emit_argument(&mut self) {
        self.emit(Inst::Argument);
    }

    pub fn emit_apply(&mut self) {
        self.emit(Inst::Apply);
    }

    pub fn emit_close(&mut self, nfree: usize, body: Label) {
        self.emit(Inst::Close(nfree, body));
    }

    pub fn emit_shift(&mut self, n: usize, m: usize) {
        self.emit(Inst::Shift(n, m));
    }

    pub fn emit_pop(&mut self, n: usize) {
        if n != 0 {
            self.emit(Inst::Pop(n));
        }
    }

    pub fn emit_return(&mut self, n: usize) {
        self.emit(Inst::Return(n));
    }

    pub fn emit_halt(&mut self) {
        self.emit(Inst::Halt);
    }

    pub fn emit_test(&mut self) -> Patch {
        self.emit_branch(Inst::Test(0))
    }

    pub fn emit_jmp(&mut self) -> Patch {
        self.emit_branch(Inst::Jmp(0))
    }

    pub fn emit_frame(&mut self) -> Patch {
        self.emit_branch(Inst::Frame(0))
    }

    fn emit_branch(&mut self, inst: Inst<Label>) -> Patch {
        let at = self.here();
        self.emit(inst);
        Patch(at)
    }

    /// Point `patch` at the next instruction to be emitted.
    pub fn bind(&mut self, patch: Patch) {
        let offset = self.here() - patch.0;

        match &mut self.code[patch.0] {
            Inst::Test(off) | Inst::Jmp(off) | Inst::Frame(off) => *off = offset,
            _ => unreachable!("patch does not refer to a branch"),
        }
    }

    pub fn finish(self) -> Vec<Inst<Label>> {
        self.code
    }
}
