use std::collections::HashMap;

use super::opcodes::Inst;
use super::program::Program;

pub fn disassemble<T: std::fmt::Write>(program: &Program, f: &mut T) -> std::fmt::Result {
    let labels = program
        .entries
        .iter()
        .map(|(label, addr)| (*addr, *label))
        .collect::<HashMap<_, _>>();

    for (pc, inst) in program.code.iter().enumerate() {
        if let Some(label) = labels.get(&pc) {
            writeln!(f, "{}:", label)?;
        }

        write!(f, "{:04}: {}", pc, inst)?;

        match inst {
            Inst::Close(_, addr) | Inst::ReferRec(addr) => {
                if let Some(label) = labels.get(addr) {
                    write!(f, " ({})", label)?;
                }
            }
            _ => {
                if let Some(offset) = inst.branch_offset() {
                    write!(f, " (=>{})", pc + offset)?;
                }
            }
        }

        writeln!(f)?;
    }

    Ok(())
}
