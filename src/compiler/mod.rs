pub mod alphatize;
pub mod compile_bytecode;
pub mod escape;
pub mod expr;
pub mod fix_letrec;
pub mod free_vars;
pub mod primitives;
pub mod recover_let;
pub mod tag;
pub mod tail_calls;
pub mod types;

use indexmap::IndexSet;

use self::{
    expr::{Expr, Tag, MAX_DEPTH},
    tail_calls::TailCall,
    types::{Type, TypeTable},
};
use crate::{bytecode::program::Program, reader, Error, Result};

/// Switches for [compile_with].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Turn immediately applied lambdas into `let`.
    pub recover_let: bool,
    /// Run type inference and escape analysis before generating code.
    pub typecheck: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            recover_let: true,
            typecheck: true,
        }
    }
}

/// Everything the pipeline learned about a program.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Renamed, normalized and tagged tree the program was generated from.
    pub expr: Expr<Tag>,
    /// Type of the whole program, `None` if type checking was disabled.
    pub ty: Option<Type>,
    pub types: TypeTable,
    pub tail_calls: Vec<TailCall>,
    pub escaping: IndexSet<Tag>,
    pub program: Program,
}

pub fn compile(source: &str) -> Result<Compilation> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_with(source: &str, options: CompileOptions) -> Result<Compilation> {
    let expr = reader::read(source)?;
    compile_expr(&expr, options)
}

/// Run every pass over an untagged tree.
pub fn compile_expr(expr: &Expr<()>, options: CompileOptions) -> Result<Compilation> {
    if expr.deeper_than(MAX_DEPTH) {
        return Err(Error::TooDeep(MAX_DEPTH));
    }

    let renamed = alphatize::alphatize(expr);
    log::debug!(target: "mbl::compiler", "alphatized: {}", renamed);

    let renamed = if options.recover_let {
        recover_let::pass_let(&renamed)
    } else {
        renamed
    };

    let fixed = fix_letrec::pass_letrec(&renamed)?;
    let tagged = tag::tag(&fixed);
    log::debug!(target: "mbl::compiler", "normalized: {}", tagged);

    let (ty, types, escaping) = if options.typecheck {
        let typing = types::infer(&tagged)?;
        log::debug!(target: "mbl::compiler", "inferred type: {}", typing.root);

        let escaping = escape::find_escaping_closures(&tagged, &typing.types);
        (Some(typing.root), typing.types, escaping)
    } else {
        (None, TypeTable::new(), IndexSet::new())
    };

    let tail_calls = tail_calls::find_tail_calls(&tagged);
    let program = compile_bytecode::compile_bytecode(&tagged, &tail_calls)?.resolve()?;

    log::debug!(
        target: "mbl::compiler",
        "{} tail calls, {} escaping closures, {} instructions",
        tail_calls.len(),
        escaping.len(),
        program.len()
    );
    log::trace!(target: "mbl::compiler", "program:\n{}", program);

    Ok(Compilation {
        expr: tagged,
        ty,
        types,
        tail_calls,
        escaping,
        program,
    })
}
