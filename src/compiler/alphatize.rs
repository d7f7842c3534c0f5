//! Alphatize phase
//!
//! This phase is responsible for assigning a unique name to each bound variable. Every binder
//! (`lambda` parameters, `let`, `letrec` and `fix` names) gets a fresh name of the form
//! `<name>.<n>` where `n` is taken from a counter shared by the whole program. References that
//! are not bound anywhere are left as is, they refer to globals.
//!
//! After this pass no two binders share a name, which is what later passes rely on when they use
//! flat scope lists.

use std::collections::HashMap;

use super::expr::*;

pub fn alphatize_name(orig: &str, counter: &mut usize) -> Variable {
    let name = format!("{}.{}", orig, *counter);
    *counter += 1;
    name
}

struct Renamer {
    counter: usize,
    frames: Vec<HashMap<Variable, Variable>>,
}

impl Renamer {
    fn lookup(&self, name: &str) -> Variable {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Push a frame binding every name in `vars`, returning the renamed list.
    fn enter(&mut self, vars: &[Variable]) -> Vec<Variable> {
        let mut frame = HashMap::with_capacity(vars.len());
        let renamed = vars
            .iter()
            .map(|var| {
                let new_var = alphatize_name(var, &mut self.counter);
                frame.insert(var.clone(), new_var.clone());
                new_var
            })
            .collect();
        self.frames.push(frame);
        renamed
    }

    fn leave(&mut self) {
        self.frames.pop();
    }

    fn lambda<T: Clone>(&mut self, lam: &Lambda<T>) -> Lambda<T> {
        let vars = self.enter(&lam.vars);
        let body = self.expr(&lam.body);
        self.leave();
        Lambda::new(vars, body)
    }

    fn expr<T: Clone>(&mut self, expr: &Expr<T>) -> Expr<T> {
        match expr {
            Expr::Lit(lit, t) => Expr::Lit(*lit, t.clone()),
            Expr::Var(name, t) => Expr::Var(self.lookup(name), t.clone()),
            Expr::Cond(test, then, else_, t) => Expr::Cond(
                Box::new(self.expr(test)),
                Box::new(self.expr(then)),
                Box::new(self.expr(else_)),
                t.clone(),
            ),
            Expr::Abs(lam, t) => Expr::Abs(self.lambda(lam), t.clone()),
            Expr::Set(name, value, t) => {
                Expr::Set(self.lookup(name), Box::new(self.expr(value)), t.clone())
            }
            Expr::App(func, args, t) => Expr::App(
                Box::new(self.expr(func)),
                args.iter().map(|arg| self.expr(arg)).collect(),
                t.clone(),
            ),
            Expr::Let(vars, bindings, body, t) => {
                // bindings are evaluated outside of the new scope
                let bindings = bindings.iter().map(|b| self.expr(b)).collect();
                let vars = self.enter(vars);
                let body = self.expr(body);
                self.leave();
                Expr::Let(vars, bindings, Box::new(body), t.clone())
            }
            Expr::Letrec(vars, bindings, body, t) => {
                let vars = self.enter(vars);
                let bindings = bindings.iter().map(|b| self.expr(b)).collect();
                let body = self.expr(body);
                self.leave();
                Expr::Letrec(vars, bindings, Box::new(body), t.clone())
            }
            Expr::Fix(names, tags, lambdas, body, t) => {
                let names = self.enter(names);
                let lambdas = lambdas.iter().map(|lam| self.lambda(lam)).collect();
                let body = self.expr(body);
                self.leave();
                Expr::Fix(names, tags.clone(), lambdas, Box::new(body), t.clone())
            }
            Expr::Seq(exprs, t) => {
                Expr::Seq(exprs.iter().map(|e| self.expr(e)).collect(), t.clone())
            }
        }
    }
}

/// Rename every bound variable in `expr`.
pub fn alphatize<T: Clone>(expr: &Expr<T>) -> Expr<T> {
    let mut renamer = Renamer {
        counter: 0,
        frames: Vec::new(),
    };

    renamer.expr(expr)
}
