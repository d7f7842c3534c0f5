//! Free variable analysis.
//!
//! The result is ordered by first occurrence (left to right). Closure conversion relies on this
//! order: captured value `i` of a closure is its `i`-th free variable.

use std::collections::HashSet;

use indexmap::IndexSet;

use super::expr::*;

fn extend(bound: &HashSet<Variable>, vars: &[Variable]) -> HashSet<Variable> {
    let mut bound = bound.clone();
    bound.extend(vars.iter().cloned());
    bound
}

impl<T> Expr<T> {
    /// Variables referenced in `self` that are not in `bound` and not bound inside `self`.
    pub fn find_free(&self, bound: &HashSet<Variable>) -> IndexSet<Variable> {
        let mut free = IndexSet::new();
        self.collect_free(bound, &mut free);
        free
    }

    fn collect_free(&self, bound: &HashSet<Variable>, free: &mut IndexSet<Variable>) {
        match self {
            Expr::Lit(..) => {}
            Expr::Var(name, _) => {
                if !bound.contains(name) {
                    free.insert(name.clone());
                }
            }
            Expr::Cond(test, then, else_, _) => {
                test.collect_free(bound, free);
                then.collect_free(bound, free);
                else_.collect_free(bound, free);
            }
            Expr::Abs(lam, _) => lam.collect_free(bound, free),
            Expr::Set(name, value, _) => {
                if !bound.contains(name) {
                    free.insert(name.clone());
                }
                value.collect_free(bound, free);
            }
            Expr::App(func, args, _) => {
                func.collect_free(bound, free);
                for arg in args {
                    arg.collect_free(bound, free);
                }
            }
            Expr::Let(vars, bindings, body, _) => {
                for binding in bindings {
                    binding.collect_free(bound, free);
                }
                body.collect_free(&extend(bound, vars), free);
            }
            Expr::Letrec(vars, bindings, body, _) => {
                let inner = extend(bound, vars);
                for binding in bindings {
                    binding.collect_free(&inner, free);
                }
                body.collect_free(&inner, free);
            }
            Expr::Fix(names, _, lambdas, body, _) => {
                let inner = extend(bound, names);
                for lam in lambdas {
                    lam.collect_free(&inner, free);
                }
                body.collect_free(&inner, free);
            }
            Expr::Seq(exprs, _) => {
                for expr in exprs {
                    expr.collect_free(bound, free);
                }
            }
        }
    }
}

impl<T> Lambda<T> {
    pub fn find_free(&self, bound: &HashSet<Variable>) -> IndexSet<Variable> {
        let mut free = IndexSet::new();
        self.collect_free(bound, &mut free);
        free
    }

    fn collect_free(&self, bound: &HashSet<Variable>, free: &mut IndexSet<Variable>) {
        self.body.collect_free(&extend(bound, &self.vars), free);
    }
}
