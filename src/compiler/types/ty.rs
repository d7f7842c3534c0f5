use std::collections::HashMap;
use std::fmt;

/// Unification variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Var(TypeVar),
    Int,
    Bool,
    /// Parameter types followed by the return type. Never curried, `Arrow([r])` is a thunk.
    Arrow(Vec<Type>),
}

impl Type {
    pub fn is_arrow(&self) -> bool {
        matches!(self, Type::Arrow(_))
    }

    /// Does `var` appear anywhere inside of `self`?
    pub fn occurs(&self, var: TypeVar) -> bool {
        match self {
            Type::Var(v) => *v == var,
            Type::Int | Type::Bool => false,
            Type::Arrow(tys) => tys.iter().any(|ty| ty.occurs(var)),
        }
    }

    /// Replace every occurrence of `var` with `with`.
    pub fn subst(&self, var: TypeVar, with: &Type) -> Type {
        match self {
            Type::Var(v) if *v == var => with.clone(),
            Type::Var(_) | Type::Int | Type::Bool => self.clone(),
            Type::Arrow(tys) => Type::Arrow(tys.iter().map(|ty| ty.subst(var, with)).collect()),
        }
    }

    /// Replace all variables in `map` at once.
    pub fn subst_all(&self, map: &HashMap<TypeVar, Type>) -> Type {
        match self {
            Type::Var(v) => map.get(v).cloned().unwrap_or_else(|| self.clone()),
            Type::Int | Type::Bool => self.clone(),
            Type::Arrow(tys) => Type::Arrow(tys.iter().map(|ty| ty.subst_all(map)).collect()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "{}", v),
            Type::Int => f.write_str("int"),
            Type::Bool => f.write_str("bool"),
            Type::Arrow(tys) => {
                if tys.len() == 1 {
                    f.write_str("() -> ")?;
                }

                for (i, ty) in tys.iter().enumerate() {
                    if i != 0 {
                        f.write_str(" -> ")?;
                    }

                    if ty.is_arrow() {
                        write!(f, "({})", ty)?;
                    } else {
                        write!(f, "{}", ty)?;
                    }
                }

                Ok(())
            }
        }
    }
}

/// Polymorphic type of a global. Every use gets its own copy of `generics`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub generics: Vec<TypeVar>,
    pub ty: Type,
}

impl Scheme {
    pub fn mono(ty: Type) -> Self {
        Self {
            generics: Vec::new(),
            ty,
        }
    }

    pub fn instantiate(&self, mut fresh: impl FnMut() -> TypeVar) -> Type {
        if self.generics.is_empty() {
            return self.ty.clone();
        }

        let map = self
            .generics
            .iter()
            .map(|generic| (*generic, Type::Var(fresh())))
            .collect();
        self.ty.subst_all(&map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    Mismatch(Type, Type),
    /// Binding the variable would create an infinite type.
    Occurs(TypeVar, Type),
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch(a, b) => write!(f, "cannot unify {} with {}", a, b),
            TypeError::Occurs(v, ty) => write!(f, "infinite type: {} occurs in {}", v, ty),
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let ty = Type::Arrow(vec![
            Type::Arrow(vec![Type::Int, Type::Bool]),
            Type::Var(TypeVar(3)),
            Type::Int,
        ]);
        assert_eq!(ty.to_string(), "(int -> bool) -> t3 -> int");
        assert_eq!(Type::Arrow(vec![Type::Int]).to_string(), "() -> int");
    }

    #[test]
    fn instantiation_is_simultaneous() {
        let scheme = Scheme {
            generics: vec![TypeVar(0), TypeVar(1)],
            ty: Type::Arrow(vec![Type::Var(TypeVar(0)), Type::Var(TypeVar(1))]),
        };

        // first fresh variable collides with the second generic
        let mut next = 1;
        let ty = scheme.instantiate(|| {
            let v = TypeVar(next);
            next += 1;
            v
        });

        assert_eq!(
            ty,
            Type::Arrow(vec![Type::Var(TypeVar(1)), Type::Var(TypeVar(2))])
        );
    }
}
