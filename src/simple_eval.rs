//! Simple tree-walking evaluator.
//!
//! Evaluates normalized trees directly, with lexical environments instead of closure conversion.
//! It serves as the reference semantics the compiled code is checked against. It is not tail
//! recursive: every call nests on the host stack, so calls deeper than [MAX_CALL_DEPTH] are
//! reported as a trap. `time` always reports `0`.

use std::fmt;
use std::rc::Rc;

use crate::compiler::expr::*;
use crate::compiler::primitives::Primitive;
use crate::{Error, Result};

pub const MAX_CALL_DEPTH: usize = 128;

enum Slot<'a, T> {
    Value(Datum<'a, T>),
    /// Member of a `fix` group, closed over the frame it is found in.
    Rec(&'a Lambda<T>),
}

/// Bindings introduced by one `lambda` call, `let` or `fix` group.
pub struct Frame<'a, T> {
    vars: Vec<&'a str>,
    slots: Vec<Slot<'a, T>>,
    parent: Env<'a, T>,
}

/// Lexical environment captured by closures. `None` is the global environment.
pub type Env<'a, T> = Option<Rc<Frame<'a, T>>>;

pub enum Datum<'a, T> {
    Int(i64),
    Bool(bool),
    Closure(&'a Lambda<T>, Env<'a, T>),
    Primitive(Primitive),
}

impl<'a, T> Clone for Datum<'a, T> {
    fn clone(&self) -> Self {
        match self {
            Datum::Int(n) => Datum::Int(*n),
            Datum::Bool(b) => Datum::Bool(*b),
            Datum::Closure(lam, env) => Datum::Closure(*lam, env.clone()),
            Datum::Primitive(prim) => Datum::Primitive(*prim),
        }
    }
}

impl<'a, T> Datum<'a, T> {
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Datum::Int(n) => Some(Literal::Int(*n)),
            Datum::Bool(b) => Some(Literal::Bool(*b)),
            _ => None,
        }
    }
}

impl<'a, T> From<Literal> for Datum<'a, T> {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Int(n) => Datum::Int(n),
            Literal::Bool(b) => Datum::Bool(b),
        }
    }
}

impl<'a, T> fmt::Display for Datum<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Int(n) => write!(f, "{}", n),
            Datum::Bool(b) => write!(f, "{}", Literal::Bool(*b)),
            Datum::Closure(lam, _) => write!(f, "#<procedure ({})>", lam.vars.join(" ")),
            Datum::Primitive(prim) => write!(f, "#<primitive {}>", prim.name()),
        }
    }
}

impl<'a, T> fmt::Debug for Datum<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn lookup<'a, T>(env: &Env<'a, T>, name: &str) -> Result<Datum<'a, T>> {
    let mut current = env;

    while let Some(frame) = current {
        if let Some(i) = frame.vars.iter().rposition(|var| *var == name) {
            return Ok(match &frame.slots[i] {
                Slot::Value(datum) => datum.clone(),
                Slot::Rec(lam) => Datum::Closure(*lam, Some(frame.clone())),
            });
        }

        current = &frame.parent;
    }

    Primitive::lookup(name)
        .map(Datum::Primitive)
        .ok_or_else(|| Error::UnboundVariable(name.to_string()))
}

fn extend<'a, T>(env: &Env<'a, T>, vars: &'a [Variable], values: Vec<Datum<'a, T>>) -> Env<'a, T> {
    Some(Rc::new(Frame {
        vars: vars.iter().map(String::as_str).collect(),
        slots: values.into_iter().map(Slot::Value).collect(),
        parent: env.clone(),
    }))
}

fn apply<'a, T>(
    func: Datum<'a, T>,
    args: Vec<Datum<'a, T>>,
    depth: usize,
) -> Result<Datum<'a, T>> {
    match func {
        Datum::Closure(lam, env) => {
            if depth >= MAX_CALL_DEPTH {
                return Err(Error::trap(format!("calls nested deeper than {}", MAX_CALL_DEPTH)));
            }

            if lam.arity() != args.len() {
                return Err(Error::trap(format!(
                    "procedure expects {} arguments, got {}",
                    lam.arity(),
                    args.len()
                )));
            }

            let env = extend(&env, &lam.vars, args);
            eval_in(&lam.body, &env, depth + 1)
        }

        Datum::Primitive(prim) => {
            let lits = args
                .iter()
                .map(|arg| {
                    arg.as_literal().ok_or_else(|| {
                        Error::trap(format!("`{}` applied to {}", prim.name(), arg))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(prim.apply(&lits, 0)?.into())
        }

        other => Err(Error::trap(format!("{} is not a procedure", other))),
    }
}

/// `depth` counts the closure calls in progress.
fn eval_in<'a, T>(expr: &'a Expr<T>, env: &Env<'a, T>, depth: usize) -> Result<Datum<'a, T>> {
    match expr {
        Expr::Lit(lit, _) => Ok((*lit).into()),
        Expr::Var(name, _) => lookup(env, name),
        Expr::Cond(test, then, else_, _) => match eval_in(test, env, depth)? {
            Datum::Bool(false) => eval_in(else_, env, depth),
            _ => eval_in(then, env, depth),
        },
        Expr::Abs(lam, _) => Ok(Datum::Closure(lam, env.clone())),
        Expr::App(func, args, _) => {
            let func = eval_in(func, env, depth)?;
            let args = args
                .iter()
                .map(|arg| eval_in(arg, env, depth))
                .collect::<Result<Vec<_>>>()?;
            apply(func, args, depth)
        }
        Expr::Let(vars, bindings, body, _) => {
            let values = bindings
                .iter()
                .map(|binding| eval_in(binding, env, depth))
                .collect::<Result<Vec<_>>>()?;
            eval_in(body, &extend(env, vars, values), depth)
        }
        Expr::Fix(names, _, lambdas, body, _) => {
            let env = Some(Rc::new(Frame {
                vars: names.iter().map(String::as_str).collect(),
                slots: lambdas.iter().map(Slot::Rec).collect(),
                parent: env.clone(),
            }));
            eval_in(body, &env, depth)
        }
        Expr::Seq(exprs, _) => {
            let (last, init) = exprs.split_last().ok_or(Error::EmptySequence)?;
            for expr in init {
                eval_in(expr, env, depth)?;
            }
            eval_in(last, env, depth)
        }
        Expr::Set(..) => Err(Error::Unsupported("set!")),
        Expr::Letrec(..) => Err(Error::Unsupported("letrec")),
    }
}

/// Evaluate a normalized tree in the global environment.
pub fn eval<T>(expr: &Expr<T>) -> Result<Datum<'_, T>> {
    eval_in(expr, &None, 0)
}
