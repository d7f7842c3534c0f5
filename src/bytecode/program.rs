use std::fmt;

use indexmap::IndexMap;

use super::disassembler::disassemble;
use super::opcodes::{Inst, Label};
use crate::{Error, Result};

/// Output of code generation: the main block and one block per lambda body, still referring to
/// bodies by label.
#[derive(Debug, Clone, Default)]
pub struct Unresolved {
    pub main: Vec<Inst<Label>>,
    pub blocks: IndexMap<Label, Vec<Inst<Label>>>,
}

impl Unresolved {
    /// Lay out the main block followed by every other block in the order they were added, then
    /// rewrite labels into absolute addresses.
    pub fn resolve(self) -> Result<Program> {
        let mut entries = IndexMap::with_capacity(self.blocks.len());
        let mut addr = self.main.len();

        for (label, block) in self.blocks.iter() {
            entries.insert(*label, addr);
            addr += block.len();
        }

        let mut code = Vec::with_capacity(addr);
        let blocks = std::iter::once(self.main).chain(self.blocks.into_values());

        for block in blocks {
            for inst in block {
                code.push(inst.map_addr(|label| {
                    entries
                        .get(&label)
                        .copied()
                        .ok_or(Error::UnresolvedLabel(label))
                })?);
            }
        }

        Ok(Program { code, entries })
    }
}

/// Flat, absolutely addressed program. Execution starts at address 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub code: Vec<Inst<usize>>,
    /// Start address of every lambda body block.
    pub entries: IndexMap<Label, usize>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        disassemble(self, f)
    }
}
