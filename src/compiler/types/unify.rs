use super::ty::{Type, TypeError, TypeVar};

/// Ordered list of bindings. No variable bound by a pair occurs in any pair before it, so a
/// substitution is applied by replacing from the last pair towards the first and two
/// substitutions compose by prepending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution(Vec<(TypeVar, Type)>);

impl Substitution {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TypeVar, Type)> {
        self.0.iter()
    }

    pub fn apply(&self, ty: &Type) -> Type {
        self.0
            .iter()
            .rev()
            .fold(ty.clone(), |ty, (var, with)| ty.subst(*var, with))
    }

    /// `self` becomes `front ++ self`.
    fn prepend(&mut self, mut front: Substitution) {
        front.0.append(&mut self.0);
        *self = front;
    }
}

fn bind(var: TypeVar, ty: &Type) -> Result<Substitution, TypeError> {
    if ty.occurs(var) {
        return Err(TypeError::Occurs(var, ty.clone()));
    }

    Ok(Substitution(vec![(var, ty.clone())]))
}

pub fn unify_one(a: &Type, b: &Type) -> Result<Substitution, TypeError> {
    match (a, b) {
        (Type::Var(x), Type::Var(y)) if x == y => Ok(Substitution::new()),
        (Type::Var(x), other) | (other, Type::Var(x)) => bind(*x, other),
        (Type::Arrow(xs), Type::Arrow(ys)) => {
            if xs.len() != ys.len() {
                return Err(TypeError::Mismatch(a.clone(), b.clone()));
            }

            let pairs = xs
                .iter()
                .cloned()
                .zip(ys.iter().cloned())
                .collect::<Vec<_>>();
            unify(&pairs)
        }
        (Type::Int, Type::Int) | (Type::Bool, Type::Bool) => Ok(Substitution::new()),
        _ => Err(TypeError::Mismatch(a.clone(), b.clone())),
    }
}

/// Solve `constraints`. Earlier constraints are solved first and every later pair is resolved
/// against the substitution accumulated so far before it is unified.
pub fn unify(constraints: &[(Type, Type)]) -> Result<Substitution, TypeError> {
    let mut subst = Substitution::new();

    for (a, b) in constraints {
        let a = subst.apply(a);
        let b = subst.apply(b);
        let step = unify_one(&a, &b)?;
        subst.prepend(step);
    }

    Ok(subst)
}
