use std::fmt;
use std::rc::Rc;

use crate::compiler::expr::Literal;
use crate::compiler::primitives::Primitive;

/// Code address plus the values captured when the closure was created. Captured values are a
/// snapshot, there are no shared mutable upvalues.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub body: usize,
    pub values: Vec<Value>,
}

/// Runtime value held in the accumulator, on the stack and in captured vectors.
///
/// The machine's step counter is not a value of its own: it lives in the VM and is read through
/// the `time` primitive ([Primitive::Time]), which returns it as a [Value::Int].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Saved frame pointer, only ever found in call footers.
    StackAddr(usize),
    /// Saved return address, only ever found in call footers.
    CodeAddr(usize),
    Int(i64),
    Bool(bool),
    Closure(Rc<Closure>),
    Primitive(Primitive),
}

impl Value {
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Int(n) => Some(Literal::Int(*n)),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            _ => None,
        }
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Primitive(_))
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Int(n) => Value::Int(n),
            Literal::Bool(b) => Value::Bool(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::StackAddr(addr) => write!(f, "#<stack {}>", addr),
            Value::CodeAddr(addr) => write!(f, "#<code {}>", addr),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Closure(closure) => write!(
                f,
                "#<closure {} ({} captured)>",
                closure.body,
                closure.values.len()
            ),
            Value::Primitive(prim) => write!(f, "#<primitive {}>", prim.name()),
        }
    }
}
