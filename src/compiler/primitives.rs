//! Builtin primitive procedures
//!
//! The global table is fixed: every primitive has a name, an arity, a polymorphic type scheme and a
//! native implementation. Primitives are called exactly like closures but never get a frame.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::expr::Literal;
use super::types::{Scheme, Type, TypeVar};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Add,
    Sub,
    Mul,
    Eq,
    /// Number of steps the machine has executed so far.
    Time,
}

impl Primitive {
    /// Global table order, a primitive's index is its global slot.
    pub const ALL: [Primitive; 5] = [
        Primitive::Add,
        Primitive::Sub,
        Primitive::Mul,
        Primitive::Eq,
        Primitive::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Add => "+",
            Primitive::Sub => "-",
            Primitive::Mul => "*",
            Primitive::Eq => "=",
            Primitive::Time => "time",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Primitive::Time => 0,
            _ => 2,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Primitive> {
        Self::ALL.get(index).copied()
    }

    pub fn lookup(name: &str) -> Option<Primitive> {
        PRIMITIVES.get(name).copied()
    }

    pub fn scheme(self) -> Scheme {
        match self {
            Primitive::Add | Primitive::Sub | Primitive::Mul => {
                Scheme::mono(Type::Arrow(vec![Type::Int, Type::Int, Type::Int]))
            }
            Primitive::Eq => {
                let a = TypeVar(0);
                Scheme {
                    generics: vec![a],
                    ty: Type::Arrow(vec![Type::Var(a), Type::Var(a), Type::Bool]),
                }
            }
            Primitive::Time => Scheme::mono(Type::Arrow(vec![Type::Int])),
        }
    }

    /// Compute the result. `steps` is what `time` reports.
    pub fn apply(self, args: &[Literal], steps: u64) -> Result<Literal> {
        if args.len() != self.arity() {
            return Err(Error::trap(format!(
                "`{}` expects {} arguments, got {}",
                self.name(),
                self.arity(),
                args.len()
            )));
        }

        let result = match (self, args) {
            (Primitive::Add, [Literal::Int(a), Literal::Int(b)]) => Literal::Int(a.wrapping_add(*b)),
            (Primitive::Sub, [Literal::Int(a), Literal::Int(b)]) => Literal::Int(a.wrapping_sub(*b)),
            (Primitive::Mul, [Literal::Int(a), Literal::Int(b)]) => Literal::Int(a.wrapping_mul(*b)),
            (Primitive::Eq, [Literal::Int(a), Literal::Int(b)]) => Literal::Bool(a == b),
            (Primitive::Eq, [Literal::Bool(a), Literal::Bool(b)]) => Literal::Bool(a == b),
            (Primitive::Time, []) => Literal::Int(steps as i64),
            _ => {
                return Err(Error::trap(format!(
                    "bad operands for `{}`: {:?}",
                    self.name(),
                    args
                )))
            }
        };

        Ok(result)
    }
}

static PRIMITIVES: Lazy<HashMap<&'static str, Primitive>> = Lazy::new(|| {
    let mut map = HashMap::new();

    for prim in Primitive::ALL {
        map.insert(prim.name(), prim);
    }

    map
});
