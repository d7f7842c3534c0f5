use std::fmt;

use crate::compiler::expr::{Literal, Tag};
use crate::compiler::primitives::Primitive;

/// Symbolic address of a lambda body block. The number is the tag of the lambda (or of the `fix`
/// binding) the block was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub Tag);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// One instruction. `A` is the type of code addresses: [Label] before resolution and `usize`
/// after it. Branch offsets are relative to the branching instruction and never need resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst<A> {
    Halt,
    Constant(Literal),
    /// Load primitive number `n` into the accumulator.
    ReferGlobal(usize),
    /// Load parameter `n`, counted downwards from the frame pointer.
    ReferLocal(usize),
    /// Load the temporary at slot `n` above the frame pointer.
    ReferTemp(usize),
    /// Load captured value `n` of the active closure.
    ReferFree(usize),
    /// Build a closure over the body at `A` sharing the captured values of the active closure.
    /// Used for references to members of the `fix` group the active closure belongs to.
    ReferRec(A),
    /// Pop `n` values and build a closure capturing them, in push order.
    Close(usize, A),
    /// Branch forward by the offset if the accumulator is `#f`.
    Test(usize),
    Jmp(usize),
    /// Push the call footer. The return address is the instruction at the offset.
    Frame(usize),
    /// Push the accumulator.
    Argument,
    Apply,
    /// Slide the top `n` values down over the `m` values below them.
    Shift(usize, usize),
    Pop(usize),
    /// Drop `n` values and return to the caller.
    Return(usize),
}

impl<A> Inst<A> {
    /// Rewrite the code address (if any) of this instruction.
    pub fn map_addr<B, E>(self, f: impl FnOnce(A) -> Result<B, E>) -> Result<Inst<B>, E> {
        Ok(match self {
            Inst::ReferRec(addr) => Inst::ReferRec(f(addr)?),
            Inst::Close(n, addr) => Inst::Close(n, f(addr)?),
            Inst::Halt => Inst::Halt,
            Inst::Constant(lit) => Inst::Constant(lit),
            Inst::ReferGlobal(n) => Inst::ReferGlobal(n),
            Inst::ReferLocal(n) => Inst::ReferLocal(n),
            Inst::ReferTemp(n) => Inst::ReferTemp(n),
            Inst::ReferFree(n) => Inst::ReferFree(n),
            Inst::Test(off) => Inst::Test(off),
            Inst::Jmp(off) => Inst::Jmp(off),
            Inst::Frame(off) => Inst::Frame(off),
            Inst::Argument => Inst::Argument,
            Inst::Apply => Inst::Apply,
            Inst::Shift(n, m) => Inst::Shift(n, m),
            Inst::Pop(n) => Inst::Pop(n),
            Inst::Return(n) => Inst::Return(n),
        })
    }

    /// Offset of a relative branch, if this is one.
    pub fn branch_offset(&self) -> Option<usize> {
        match self {
            Inst::Test(off) | Inst::Jmp(off) | Inst::Frame(off) => Some(*off),
            _ => None,
        }
    }
}

impl<A: fmt::Display> fmt::Display for Inst<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Halt => write!(f, "halt"),
            Inst::Constant(lit) => write!(f, "const {}", lit),
            Inst::ReferGlobal(n) => match Primitive::from_index(*n) {
                Some(prim) => write!(f, "gref {}", prim.name()),
                None => write!(f, "gref #{}", n),
            },
            Inst::ReferLocal(n) => write!(f, "lref {}", n),
            Inst::ReferTemp(n) => write!(f, "tref {}", n),
            Inst::ReferFree(n) => write!(f, "fref {}", n),
            Inst::ReferRec(addr) => write!(f, "rec {}", addr),
            Inst::Close(n, addr) => write!(f, "close {} {}", n, addr),
            Inst::Test(off) => write!(f, "test +{}", off),
            Inst::Jmp(off) => write!(f, "jmp +{}", off),
            Inst::Frame(off) => write!(f, "frame +{}", off),
            Inst::Argument => write!(f, "arg"),
            Inst::Apply => write!(f, "apply"),
            Inst::Shift(n, m) => write!(f, "shift {} {}", n, m),
            Inst::Pop(n) => write!(f, "pop {}", n),
            Inst::Return(n) => write!(f, "ret {}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_only_touches_code_addresses() {
        let close: Inst<Label> = Inst::Close(2, Label(7));
        assert_eq!(close.map_addr(|Label(n)| Ok::<_, ()>(n * 10)), Ok(Inst::Close(2, 70)));

        let test: Inst<Label> = Inst::Test(4);
        assert_eq!(test.map_addr(|_| Err::<usize, _>("unused")), Ok(Inst::Test(4)));
    }

    #[test]
    fn display() {
        assert_eq!(Inst::<Label>::ReferGlobal(3).to_string(), "gref =");
        assert_eq!(Inst::ReferRec(Label(4)).to_string(), "rec L4");
        assert_eq!(Inst::<usize>::Constant(Literal::Bool(false)).to_string(), "const #f");
    }
}
