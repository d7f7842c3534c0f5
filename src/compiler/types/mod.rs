//! Hindley-Milner type inference.
//!
//! Inference runs in three steps: every node is annotated with a type (a fresh variable or a
//! constructed type), a second traversal collects equality constraints between those annotations
//! and finally the constraints are solved by unification.

mod infer;
mod ty;
mod unify;

pub use infer::{infer, TypeTable, Typing};
pub use ty::{Scheme, Type, TypeError, TypeVar};
pub use unify::{unify, unify_one, Substitution};
