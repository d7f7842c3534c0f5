//! Error handling.
//!
//! Every stage of the pipeline either fully succeeds or aborts with one of these errors.
//! There are no warnings and no partial results.

use std::fmt;

use crate::bytecode::opcodes::Label;
use crate::compiler::expr::Variable;
use crate::compiler::types::TypeError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Source text could not be read into an expression tree.
    Read { message: String, offset: usize },
    /// `letrec` binding whose right-hand side is not a lambda.
    NonFunctionBinding(Variable),
    /// Construct that this compiler rejects (`set!`, `letrec` that was never fixed).
    Unsupported(&'static str),
    EmptySequence,
    /// Tree nested deeper than the passes accept, see [crate::compiler::expr::MAX_DEPTH].
    TooDeep(usize),
    UnboundVariable(Variable),
    Type(TypeError),
    UnresolvedLabel(Label),
    /// The VM hit an invariant violation while executing a program.
    Trap(String),
}

impl Error {
    pub fn read(message: impl Into<String>, offset: usize) -> Self {
        Error::Read {
            message: message.into(),
            offset,
        }
    }

    pub fn trap(message: impl Into<String>) -> Self {
        Error::Trap(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Read { message, offset } => write!(f, "read error at {}: {}", offset, message),
            Error::NonFunctionBinding(name) => {
                write!(f, "letrec binding `{}` is not a lambda", name)
            }
            Error::Unsupported(what) => write!(f, "unsupported construct: {}", what),
            Error::EmptySequence => write!(f, "empty sequence"),
            Error::TooDeep(limit) => write!(f, "expression nested deeper than {} levels", limit),
            Error::UnboundVariable(name) => write!(f, "unbound variable `{}`", name),
            Error::Type(err) => write!(f, "type error: {}", err),
            Error::UnresolvedLabel(label) => write!(f, "unresolved label {}", label),
            Error::Trap(message) => write!(f, "vm trap: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::Type;

    #[test]
    fn messages_name_the_offending_parts() {
        let err = Error::from(TypeError::Mismatch(Type::Int, Type::Bool));
        assert_eq!(err.to_string(), "type error: cannot unify int with bool");

        let err = Error::NonFunctionBinding("x.0".to_string());
        assert_eq!(err.to_string(), "letrec binding `x.0` is not a lambda");

        assert_eq!(
            Error::read("unexpected `)`", 3).to_string(),
            "read error at 3: unexpected `)`"
        );
    }
}
