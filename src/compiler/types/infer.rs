use std::collections::HashMap;

use super::ty::{Type, TypeVar};
use super::unify::unify;
use crate::compiler::expr::*;
use crate::compiler::primitives::Primitive;
use crate::{Error, Result};

/// Final type of every tagged node. `fix` bindings are keyed by their reserved tags.
pub type TypeTable = HashMap<Tag, Type>;

#[derive(Debug, Clone)]
pub struct Typing {
    pub root: Type,
    pub types: TypeTable,
}

#[derive(Default)]
struct Inferencer {
    next: u32,
    annotations: HashMap<Tag, Type>,
    /// Free names that are not primitives. Monomorphic, one variable shared by all uses.
    unknown: HashMap<Variable, Type>,
    /// Arrow built from each `fix` binding's lambda, keyed by the binding tag.
    fix_arrows: HashMap<Tag, Type>,
    constraints: Vec<(Type, Type)>,
}

type Scope = Vec<(Variable, Type)>;

impl Inferencer {
    fn fresh_var(&mut self) -> TypeVar {
        let var = TypeVar(self.next);
        self.next += 1;
        var
    }

    fn fresh(&mut self) -> Type {
        Type::Var(self.fresh_var())
    }

    fn record(&mut self, tag: Tag, ty: Type) -> Type {
        self.annotations.insert(tag, ty.clone());
        ty
    }

    fn type_of(&self, tag: Tag) -> Type {
        self.annotations[&tag].clone()
    }

    fn lookup(&mut self, name: &str, scope: &Scope) -> Type {
        // innermost binding wins even if renaming did not run
        if let Some((_, ty)) = scope.iter().rev().find(|(var, _)| var == name) {
            return ty.clone();
        }

        if let Some(prim) = Primitive::lookup(name) {
            let scheme = prim.scheme();
            return scheme.instantiate(|| self.fresh_var());
        }

        if let Some(ty) = self.unknown.get(name) {
            return ty.clone();
        }

        let ty = self.fresh();
        self.unknown.insert(name.to_string(), ty.clone());
        ty
    }

    fn annotate_lambda(&mut self, lam: &Lambda<Tag>, scope: &mut Scope) -> Result<Type> {
        let mark = scope.len();
        let mut tys = Vec::with_capacity(lam.arity() + 1);

        for var in lam.vars.iter() {
            let ty = self.fresh();
            scope.push((var.clone(), ty.clone()));
            tys.push(ty);
        }

        let body = self.annotate(&lam.body, scope);
        scope.truncate(mark);
        tys.push(body?);

        Ok(Type::Arrow(tys))
    }

    fn annotate(&mut self, expr: &Expr<Tag>, scope: &mut Scope) -> Result<Type> {
        let ty = match expr {
            Expr::Lit(Literal::Int(_), _) => Type::Int,
            Expr::Lit(Literal::Bool(_), _) => Type::Bool,
            Expr::Var(name, _) => self.lookup(name, scope),
            Expr::Cond(test, then, else_, _) => {
                self.annotate(test, scope)?;
                self.annotate(then, scope)?;
                self.annotate(else_, scope)?;
                self.fresh()
            }
            Expr::Abs(lam, _) => self.annotate_lambda(lam, scope)?,
            Expr::App(func, args, _) => {
                self.annotate(func, scope)?;
                for arg in args {
                    self.annotate(arg, scope)?;
                }
                self.fresh()
            }
            Expr::Let(vars, bindings, body, _) => {
                let mut bound = Vec::with_capacity(vars.len());
                for (var, binding) in vars.iter().zip(bindings.iter()) {
                    bound.push((var.clone(), self.annotate(binding, scope)?));
                }

                let mark = scope.len();
                scope.extend(bound);
                let body = self.annotate(body, scope);
                scope.truncate(mark);
                body?;

                self.fresh()
            }
            Expr::Fix(names, tags, lambdas, body, _) => {
                let mark = scope.len();
                for (name, tag) in names.iter().zip(tags.iter()) {
                    let ty = self.fresh();
                    self.record(*tag, ty.clone());
                    scope.push((name.clone(), ty));
                }

                let result = self.annotate_fix(tags, lambdas, body, scope);
                scope.truncate(mark);
                result?;

                self.fresh()
            }
            Expr::Seq(exprs, _) => {
                let mut last = None;
                for expr in exprs {
                    last = Some(self.annotate(expr, scope)?);
                }
                last.ok_or(Error::EmptySequence)?
            }
            Expr::Set(..) => return Err(Error::Unsupported("set!")),
            Expr::Letrec(..) => return Err(Error::Unsupported("letrec")),
        };

        Ok(self.record(*expr.tag(), ty))
    }

    fn annotate_fix(
        &mut self,
        tags: &[Tag],
        lambdas: &[Lambda<Tag>],
        body: &Expr<Tag>,
        scope: &mut Scope,
    ) -> Result<()> {
        for (tag, lam) in tags.iter().zip(lambdas.iter()) {
            let arrow = self.annotate_lambda(lam, scope)?;
            self.fix_arrows.insert(*tag, arrow);
        }

        self.annotate(body, scope)?;
        Ok(())
    }

    fn constrain(&mut self, a: Type, b: Type) {
        self.constraints.push((a, b));
    }

    fn collect(&mut self, expr: &Expr<Tag>) {
        match expr {
            Expr::Lit(..) | Expr::Var(..) | Expr::Set(..) | Expr::Letrec(..) => {}
            Expr::Cond(test, then, else_, tag) => {
                self.collect(test);
                self.collect(then);
                self.collect(else_);

                self.constrain(self.type_of(*test.tag()), Type::Bool);
                self.constrain(self.type_of(*then.tag()), self.type_of(*else_.tag()));
                self.constrain(self.type_of(*then.tag()), self.type_of(*tag));
            }
            Expr::Abs(lam, _) => self.collect(&lam.body),
            Expr::App(func, args, tag) => {
                self.collect(func);
                for arg in args {
                    self.collect(arg);
                }

                let mut arrow = args
                    .iter()
                    .map(|arg| self.type_of(*arg.tag()))
                    .collect::<Vec<_>>();
                arrow.push(self.type_of(*tag));
                self.constrain(self.type_of(*func.tag()), Type::Arrow(arrow));
            }
            Expr::Let(_, bindings, body, tag) => {
                for binding in bindings {
                    self.collect(binding);
                }
                self.collect(body);

                self.constrain(self.type_of(*tag), self.type_of(*body.tag()));
            }
            Expr::Fix(_, tags, lambdas, body, tag) => {
                for binding in tags {
                    let arrow = self.fix_arrows[binding].clone();
                    self.constrain(self.type_of(*binding), arrow);
                }
                for lam in lambdas {
                    self.collect(&lam.body);
                }
                self.collect(body);

                self.constrain(self.type_of(*tag), self.type_of(*body.tag()));
            }
            Expr::Seq(exprs, _) => {
                for expr in exprs {
                    self.collect(expr);
                }
            }
        }
    }
}

/// Infer the type of every node in `expr`.
pub fn infer(expr: &Expr<Tag>) -> Result<Typing> {
    let mut inferencer = Inferencer::default();
    let mut scope = Vec::new();

    inferencer.annotate(expr, &mut scope)?;
    inferencer.collect(expr);

    log::trace!(
        target: "mbl::compiler",
        "solving {} constraints over {} type variables",
        inferencer.constraints.len(),
        inferencer.next
    );

    let subst = unify(&inferencer.constraints)?;

    let types = inferencer
        .annotations
        .iter()
        .map(|(tag, ty)| (*tag, subst.apply(ty)))
        .collect::<TypeTable>();
    let root = subst.apply(&inferencer.type_of(*expr.tag()));

    Ok(Typing { root, types })
}
