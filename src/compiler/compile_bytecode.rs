//! Bytecode generation.
//!
//! Closure converting code generator for normalized, tagged trees. Every lambda body is compiled
//! into its own block labelled with the lambda's tag; creating a closure pushes the current values
//! of the lambda's free variables and emits `close`. Calls in tail position reuse the caller's
//! footer: the arguments are slid over the current frame with `shift` instead of pushing a new
//! footer.
//!
//! Every lambda is closed on the heap with `close`, whether or not it escapes. The escaping set
//! computed by [super::escape] is informational and not consulted here.
//!
//! Invoke [compile_bytecode] to produce an [Unresolved] program.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use super::expr::*;
use super::primitives::Primitive;
use super::tail_calls::TailCall;
use crate::bytecode::assembler::Assembler;
use crate::bytecode::opcodes::{Inst, Label};
use crate::bytecode::program::Unresolved;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    /// Leave the value in the accumulator and fall through.
    Value,
    /// Return the value. The payload is the number of cells between the footer and the top of
    /// the stack: parameters plus live temporaries.
    Tail(usize),
}

impl Context {
    fn deeper(self, by: usize) -> Self {
        match self {
            Context::Value => Context::Value,
            Context::Tail(depth) => Context::Tail(depth + by),
        }
    }
}

/// Addressing environment of the frame being compiled.
#[derive(Default, Debug)]
struct Env {
    /// Parameters, `locals[i]` is at `fp - i - 1`.
    locals: Vec<Variable>,
    /// `let` and `fix` bindings with their slot above the frame pointer.
    temps: Vec<(Variable, usize)>,
    /// Captured values of the active closure.
    free: IndexSet<Variable>,
    /// Members of the `fix` group the frame belongs to.
    constants: HashMap<Variable, Label>,
    /// Number of cells above the frame pointer at the current point of the code.
    height: usize,
}

impl Env {
    fn for_lambda(
        vars: &[Variable],
        free: IndexSet<Variable>,
        constants: HashMap<Variable, Label>,
    ) -> Self {
        Self {
            locals: vars.to_vec(),
            temps: Vec::new(),
            free,
            constants,
            height: 0,
        }
    }
}

struct State<'a> {
    tail_calls: HashMap<Tag, &'a TailCall>,
    globals: HashSet<Variable>,
    blocks: IndexMap<Label, Vec<Inst<Label>>>,
}

pub fn compile_bytecode(expr: &Expr<Tag>, tail_calls: &[TailCall]) -> Result<Unresolved> {
    let mut state = State {
        tail_calls: tail_calls.iter().map(|call| (call.app, call)).collect(),
        globals: Primitive::ALL
            .iter()
            .map(|prim| prim.name().to_string())
            .collect(),
        blocks: IndexMap::new(),
    };

    let mut asm = Assembler::new();
    let mut env = Env::default();
    for_context(&mut asm, Context::Value, expr, &mut env, &mut state)?;
    asm.emit_halt();

    Ok(Unresolved {
        main: asm.finish(),
        blocks: state.blocks,
    })
}

fn leave(asm: &mut Assembler, ctx: Context) {
    if let Context::Tail(depth) = ctx {
        asm.emit_return(depth);
    }
}

fn push(asm: &mut Assembler, env: &mut Env) {
    asm.emit_argument();
    env.height += 1;
}

fn for_value(asm: &mut Assembler, exp: &Expr<Tag>, env: &mut Env, state: &mut State) -> Result<()> {
    for_context(asm, Context::Value, exp, env, state)
}

fn for_context(
    asm: &mut Assembler,
    ctx: Context,
    exp: &Expr<Tag>,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    match exp {
        Expr::Lit(lit, _) => {
            asm.emit_constant(*lit);
            leave(asm, ctx);
        }
        Expr::Var(name, _) => {
            visit_ref(asm, name, env, state)?;
            leave(asm, ctx);
        }
        Expr::Cond(test, then, else_, _) => visit_if(asm, ctx, test, then, else_, env, state)?,
        Expr::Abs(lam, tag) => {
            visit_lambda(asm, lam, *tag, env, state)?;
            leave(asm, ctx);
        }
        Expr::App(func, args, tag) => visit_app(asm, ctx, func, args, *tag, env, state)?,
        Expr::Let(vars, bindings, body, _) => visit_let(asm, ctx, vars, bindings, body, env, state)?,
        Expr::Fix(names, tags, lambdas, body, _) => {
            visit_fix(asm, ctx, names, tags, lambdas, body, env, state)?
        }
        Expr::Seq(exprs, _) => visit_seq(asm, ctx, exprs, env, state)?,
        Expr::Set(..) => return Err(Error::Unsupported("set!")),
        Expr::Letrec(..) => return Err(Error::Unsupported("letrec")),
    }

    Ok(())
}

fn visit_ref(asm: &mut Assembler, name: &Variable, env: &Env, state: &State) -> Result<()> {
    let inst = if let Some(i) = env.locals.iter().position(|var| var == name) {
        Inst::ReferLocal(i)
    } else if let Some((_, slot)) = env.temps.iter().rev().find(|(var, _)| var == name) {
        Inst::ReferTemp(*slot)
    } else if let Some(i) = env.free.get_index_of(name) {
        Inst::ReferFree(i)
    } else if let Some(prim) = Primitive::lookup(name) {
        Inst::ReferGlobal(prim.index())
    } else if let Some(label) = env.constants.get(name) {
        Inst::ReferRec(*label)
    } else {
        return Err(Error::UnboundVariable(name.clone()));
    };

    debug_assert!(
        !matches!(inst, Inst::ReferGlobal(_)) || state.globals.contains(name),
        "global table out of sync"
    );

    asm.emit(inst);
    Ok(())
}

fn visit_if(
    asm: &mut Assembler,
    ctx: Context,
    test: &Expr<Tag>,
    then: &Expr<Tag>,
    else_: &Expr<Tag>,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    for_value(asm, test, env, state)?;
    let je = asm.emit_test();
    for_context(asm, ctx, then, env, state)?;

    match ctx {
        // both branches leave the frame, nothing falls through
        Context::Tail(_) => {
            asm.bind(je);
            for_context(asm, ctx, else_, env, state)?;
        }

        Context::Value => {
            let jexit = asm.emit_jmp();
            asm.bind(je);
            for_context(asm, ctx, else_, env, state)?;
            asm.bind(jexit);
        }
    }

    Ok(())
}

fn visit_seq(
    asm: &mut Assembler,
    ctx: Context,
    exprs: &[Expr<Tag>],
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    let (last, init) = exprs.split_last().ok_or(Error::EmptySequence)?;

    for exp in init {
        for_value(asm, exp, env, state)?;
    }

    for_context(asm, ctx, last, env, state)
}

fn visit_let(
    asm: &mut Assembler,
    ctx: Context,
    vars: &[Variable],
    bindings: &[Expr<Tag>],
    body: &Expr<Tag>,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    let mark = env.temps.len();

    for (var, init) in vars.iter().zip(bindings.iter()) {
        for_value(asm, init, env, state)?;
        let slot = env.height;
        push(asm, env);
        env.temps.push((var.clone(), slot));
    }

    for_context(asm, ctx.deeper(vars.len()), body, env, state)?;

    env.temps.truncate(mark);
    env.height -= vars.len();
    if ctx == Context::Value {
        asm.emit_pop(vars.len());
    }

    Ok(())
}

fn visit_app(
    asm: &mut Assembler,
    ctx: Context,
    func: &Expr<Tag>,
    args: &[Expr<Tag>],
    tag: Tag,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    if let Some(call) = state.tail_calls.get(&tag).copied() {
        debug_assert_eq!(ctx, Context::Tail(call.stack), "tail call outside of tail context");

        for arg in args.iter().rev() {
            for_value(asm, arg, env, state)?;
            push(asm, env);
        }

        for_value(asm, func, env, state)?;
        asm.emit_shift(args.len(), call.stack);
        asm.emit_apply();
        env.height -= args.len();
        return Ok(());
    }

    let jret = asm.emit_frame();
    env.height += 3;

    for arg in args.iter().rev() {
        for_value(asm, arg, env, state)?;
        push(asm, env);
    }

    for_value(asm, func, env, state)?;
    asm.emit_apply();
    asm.bind(jret);
    env.height -= 3 + args.len();

    leave(asm, ctx);
    Ok(())
}

/// Compile `lam` into its own block labelled `label`.
fn compile_block(
    lam: &Lambda<Tag>,
    label: Label,
    free: IndexSet<Variable>,
    constants: HashMap<Variable, Label>,
    state: &mut State,
) -> Result<()> {
    let mut asm = Assembler::new();
    let mut env = Env::for_lambda(&lam.vars, free, constants);
    for_context(&mut asm, Context::Tail(lam.arity()), &lam.body, &mut env, state)?;

    let code = asm.finish();
    log::trace!(target: "mbl::compiler", "compiled block {} ({} instructions)", label, code.len());
    state.blocks.insert(label, code);
    Ok(())
}

fn push_free_vars(
    asm: &mut Assembler,
    free: &IndexSet<Variable>,
    env: &mut Env,
    state: &State,
) -> Result<()> {
    for var in free.iter() {
        visit_ref(asm, var, env, state)?;
        push(asm, env);
    }

    Ok(())
}

fn visit_lambda(
    asm: &mut Assembler,
    lam: &Lambda<Tag>,
    tag: Tag,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    let label = Label(tag);
    let free = lam.find_free(&state.globals);

    push_free_vars(asm, &free, env, state)?;
    asm.emit_close(free.len(), label);
    env.height -= free.len();

    compile_block(lam, label, free, HashMap::new(), state)
}

#[allow(clippy::too_many_arguments)]
fn visit_fix(
    asm: &mut Assembler,
    ctx: Context,
    names: &[Variable],
    tags: &[Tag],
    lambdas: &[Lambda<Tag>],
    body: &Expr<Tag>,
    env: &mut Env,
    state: &mut State,
) -> Result<()> {
    let mut bound = state.globals.clone();
    bound.extend(names.iter().cloned());

    // all members share one captured vector
    let mut shared = IndexSet::new();
    for lam in lambdas {
        shared.extend(lam.find_free(&bound));
    }

    let labels = tags.iter().map(|tag| Label(*tag)).collect::<Vec<_>>();
    let constants = names
        .iter()
        .cloned()
        .zip(labels.iter().copied())
        .collect::<HashMap<_, _>>();

    for (lam, label) in lambdas.iter().zip(labels.iter()) {
        compile_block(lam, *label, shared.clone(), constants.clone(), state)?;
    }

    let mark = env.temps.len();
    for (name, label) in names.iter().zip(labels.iter()) {
        push_free_vars(asm, &shared, env, state)?;
        asm.emit_close(shared.len(), *label);
        env.height -= shared.len();

        let slot = env.height;
        push(asm, env);
        env.temps.push((name.clone(), slot));
    }

    for_context(asm, ctx.deeper(names.len()), body, env, state)?;

    env.temps.truncate(mark);
    env.height -= names.len();
    if ctx == Context::Value {
        asm.emit_pop(names.len());
    }

    Ok(())
}
