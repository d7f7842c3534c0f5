//! Fixing letrec
//!
//! Every `letrec` whose bindings are all lambdas is turned into a single `fix` node holding the
//! group of mutually recursive functions:
//!
//! ```text
//! (letrec ((f (lambda (x) ...)) (g (lambda (y) ...))) body)
//!
//! ; after fixing
//! (fix ((f (x) ...) (g (y) ...)) body)
//! ```
//!
//! `letrec` over anything other than lambdas would require mutable cells and is rejected with
//! [Error::NonFunctionBinding].
//!
//! Invoke [pass_letrec] to fix all letrecs.

use super::expr::*;
use crate::{Error, Result};

fn pass_lambda<T: Clone>(lam: &Lambda<T>) -> Result<Lambda<T>> {
    Ok(Lambda::new(lam.vars.clone(), pass_letrec(&lam.body)?))
}

fn pass_all<T: Clone>(exprs: &[Expr<T>]) -> Result<Vec<Expr<T>>> {
    exprs.iter().map(pass_letrec).collect()
}

pub fn pass_letrec<T: Clone>(x: &Expr<T>) -> Result<Expr<T>> {
    Ok(match x {
        Expr::Lit(..) | Expr::Var(..) => x.clone(),
        Expr::Cond(test, then, else_, t) => Expr::Cond(
            Box::new(pass_letrec(test)?),
            Box::new(pass_letrec(then)?),
            Box::new(pass_letrec(else_)?),
            t.clone(),
        ),
        Expr::Abs(lam, t) => Expr::Abs(pass_lambda(lam)?, t.clone()),
        Expr::Set(name, value, t) => {
            Expr::Set(name.clone(), Box::new(pass_letrec(value)?), t.clone())
        }
        Expr::App(func, args, t) => {
            Expr::App(Box::new(pass_letrec(func)?), pass_all(args)?, t.clone())
        }
        Expr::Let(vars, bindings, body, t) => Expr::Let(
            vars.clone(),
            pass_all(bindings)?,
            Box::new(pass_letrec(body)?),
            t.clone(),
        ),

        Expr::Letrec(vars, bindings, body, t) => {
            let mut tags = Vec::with_capacity(vars.len());
            let mut lambdas = Vec::with_capacity(vars.len());

            for (var, binding) in vars.iter().zip(bindings.iter()) {
                match binding {
                    Expr::Abs(lam, tag) => {
                        tags.push(tag.clone());
                        lambdas.push(pass_lambda(lam)?);
                    }
                    _ => return Err(Error::NonFunctionBinding(var.clone())),
                }
            }

            log::trace!(target: "mbl::compiler", "fixing letrec group {:?}", vars);

            Expr::Fix(
                vars.clone(),
                tags,
                lambdas,
                Box::new(pass_letrec(body)?),
                t.clone(),
            )
        }

        Expr::Fix(names, tags, lambdas, body, t) => Expr::Fix(
            names.clone(),
            tags.clone(),
            lambdas.iter().map(pass_lambda).collect::<Result<_>>()?,
            Box::new(pass_letrec(body)?),
            t.clone(),
        ),
        Expr::Seq(exprs, t) => Expr::Seq(pass_all(exprs)?, t.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letrec_of_lambdas_becomes_fix() {
        let expr = make_letrec(
            vec!["even".to_string(), "odd".to_string()],
            vec![
                make_abs(vec!["n".to_string()], make_app(make_var("odd"), vec![make_var("n")])),
                make_abs(vec!["n".to_string()], make_app(make_var("even"), vec![make_var("n")])),
            ],
            make_app(make_var("even"), vec![make_int(4)]),
        );

        let fixed = pass_letrec(&expr).unwrap();
        let Expr::Fix(names, tags, lambdas, _, _) = &fixed else {
            panic!("expected a fix node, got {}", fixed);
        };
        assert_eq!(names, &vec!["even".to_string(), "odd".to_string()]);
        assert_eq!(tags.len(), 2);
        assert_eq!(lambdas[1].vars, vec!["n".to_string()]);
    }

    #[test]
    fn nested_letrec_inside_let_binding() {
        let expr = make_let(
            vec!["x".to_string()],
            vec![make_letrec(
                vec!["f".to_string()],
                vec![make_abs(vec![], make_int(1))],
                make_app(make_var("f"), vec![]),
            )],
            make_var("x"),
        );

        assert_eq!(
            pass_letrec(&expr).unwrap().to_string(),
            "(let ((x (fix ((f () 1)) (f)))) x)"
        );
    }

    #[test]
    fn non_function_binding_is_rejected() {
        let expr = make_letrec(vec!["x".to_string()], vec![make_int(3)], make_var("x"));
        assert_eq!(
            pass_letrec(&expr),
            Err(Error::NonFunctionBinding("x".to_string()))
        );
    }
}
