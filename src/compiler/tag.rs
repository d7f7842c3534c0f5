//! Tagging pass
//!
//! Assigns a unique integer to every node. Children are stamped before their parent, so for simple
//! nodes a parent's tag is greater than the tags of all of its descendants. A `fix` node reserves one
//! tag per bound name before anything below it is tagged; those tags identify the recursive bindings
//! independently of the lambda bodies.
//!
//! Invoke [tag] to tag a whole program starting from zero.

use super::expr::*;

pub fn tag(expr: &Expr<()>) -> Expr<Tag> {
    let mut counter = 0;
    tag_with(expr, &mut counter)
}

/// Tag `expr` using `counter` as the next free tag. On return `counter` is one past the largest
/// tag handed out.
pub fn tag_with(expr: &Expr<()>, counter: &mut Tag) -> Expr<Tag> {
    fn next(counter: &mut Tag) -> Tag {
        let tag = *counter;
        *counter += 1;
        tag
    }

    fn lambda(lam: &Lambda<()>, counter: &mut Tag) -> Lambda<Tag> {
        Lambda::new(lam.vars.clone(), tag_with(&lam.body, counter))
    }

    match expr {
        Expr::Lit(lit, _) => Expr::Lit(*lit, next(counter)),
        Expr::Var(name, _) => Expr::Var(name.clone(), next(counter)),
        Expr::Cond(test, then, else_, _) => {
            let test = tag_with(test, counter);
            let then = tag_with(then, counter);
            let else_ = tag_with(else_, counter);
            Expr::Cond(
                Box::new(test),
                Box::new(then),
                Box::new(else_),
                next(counter),
            )
        }
        Expr::Abs(lam, _) => {
            let lam = lambda(lam, counter);
            Expr::Abs(lam, next(counter))
        }
        Expr::Set(name, value, _) => {
            let value = tag_with(value, counter);
            Expr::Set(name.clone(), Box::new(value), next(counter))
        }
        Expr::App(func, args, _) => {
            let func = tag_with(func, counter);
            let args = args.iter().map(|arg| tag_with(arg, counter)).collect();
            Expr::App(Box::new(func), args, next(counter))
        }
        Expr::Let(vars, bindings, body, _) => {
            let bindings = bindings.iter().map(|b| tag_with(b, counter)).collect();
            let body = tag_with(body, counter);
            Expr::Let(vars.clone(), bindings, Box::new(body), next(counter))
        }
        Expr::Letrec(vars, bindings, body, _) => {
            let bindings = bindings.iter().map(|b| tag_with(b, counter)).collect();
            let body = tag_with(body, counter);
            Expr::Letrec(vars.clone(), bindings, Box::new(body), next(counter))
        }
        Expr::Fix(names, _, lambdas, body, _) => {
            let tags = names.iter().map(|_| next(counter)).collect();
            let lambdas = lambdas.iter().map(|lam| lambda(lam, counter)).collect();
            let body = tag_with(body, counter);
            Expr::Fix(names.clone(), tags, lambdas, Box::new(body), next(counter))
        }
        Expr::Seq(exprs, _) => {
            let exprs = exprs.iter().map(|e| tag_with(e, counter)).collect();
            Expr::Seq(exprs, next(counter))
        }
    }
}
