//! Stack machine bytecode.
//!
//! Code is produced in two phases. The compiler emits one main block plus one block per lambda
//! body, referring to bodies through symbolic [opcodes::Label]s. [program::Unresolved::resolve]
//! then lays the blocks out one after another and rewrites every label into an absolute address.

pub mod assembler;
pub mod disassembler;
pub mod opcodes;
pub mod program;
