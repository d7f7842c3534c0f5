//! MBL: a small Scheme-like language compiled to a stack machine.
//!
//! The crate takes an untagged expression tree (usually produced by [reader::read]) and turns it
//! into a verified bytecode program which is then executed by [runtime::vm::Vm].
//!
//! # Compilation Passes
//!
//! 1. Alphatize: every bound name gets a globally unique name, see [compiler::alphatize].
//! 2. Let recovery: `((lambda (x ...) body) arg ...)` becomes `(let ((x arg) ...) body)`.
//! 3. Fixing letrec: `letrec` over lambdas becomes a single `fix` node.
//! 4. Tagging: every node gets an integer identity used as a key into side tables.
//! 5. Type inference: annotate, collect constraints, unify.
//! 6. Analyses: tail calls and escaping closures.
//! 7. Bytecode generation: closure conversion, tail calls via `shift`, two-phase label resolution.
//!
//! Invoke [compiler::compile] to run all of the passes, or [run] to also execute the result.

pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod reader;
pub mod runtime;
pub mod simple_eval;

pub use error::{Error, Result};

use runtime::{value::Value, vm::Vm};

/// Compile `source` and run it to completion, returning the final accumulator.
pub fn run(source: &str) -> Result<Value> {
    let compilation = compiler::compile(source)?;
    let mut vm = Vm::new(compilation.program);
    vm.run()
}
