//! Recover let expressions. Looks for `((lambda (v ...) body) arg ...)` where the number of
//! operands matches the number of formals. If so, the application is replaced with
//! `(let ((v arg) ...) body)`.
//!
//! Invoke [pass_let] to recover let expressions.

use super::expr::*;

fn pass_lambda<T: Clone>(lam: &Lambda<T>) -> Lambda<T> {
    Lambda::new(lam.vars.clone(), pass_let(&lam.body))
}

pub fn pass_let<T: Clone>(x: &Expr<T>) -> Expr<T> {
    match x {
        Expr::Lit(..) | Expr::Var(..) => x.clone(),
        Expr::Cond(test, then, else_, t) => Expr::Cond(
            Box::new(pass_let(test)),
            Box::new(pass_let(then)),
            Box::new(pass_let(else_)),
            t.clone(),
        ),
        Expr::Abs(lam, t) => Expr::Abs(pass_lambda(lam), t.clone()),
        Expr::Set(name, value, t) => Expr::Set(name.clone(), Box::new(pass_let(value)), t.clone()),

        Expr::App(func, args, t) => {
            let args = args.iter().map(pass_let).collect::<Vec<_>>();

            match &**func {
                Expr::Abs(lam, _) if lam.arity() == args.len() => {
                    Expr::Let(lam.vars.clone(), args, Box::new(pass_let(&lam.body)), t.clone())
                }
                _ => Expr::App(Box::new(pass_let(func)), args, t.clone()),
            }
        }

        Expr::Let(vars, bindings, body, t) => Expr::Let(
            vars.clone(),
            bindings.iter().map(pass_let).collect(),
            Box::new(pass_let(body)),
            t.clone(),
        ),
        Expr::Letrec(vars, bindings, body, t) => Expr::Letrec(
            vars.clone(),
            bindings.iter().map(pass_let).collect(),
            Box::new(pass_let(body)),
            t.clone(),
        ),
        Expr::Fix(names, tags, lambdas, body, t) => Expr::Fix(
            names.clone(),
            tags.clone(),
            lambdas.iter().map(pass_lambda).collect(),
            Box::new(pass_let(body)),
            t.clone(),
        ),
        Expr::Seq(exprs, t) => Expr::Seq(exprs.iter().map(pass_let).collect(), t.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_lambda_becomes_let() {
        let expr = make_app(
            make_abs(
                vec!["n".to_string(), "m".to_string()],
                make_app(make_var("-"), vec![make_var("n"), make_var("m")]),
            ),
            vec![make_int(5), make_int(3)],
        );

        assert_eq!(pass_let(&expr).to_string(), "(let ((n 5) (m 3)) (- n m))");
    }

    #[test]
    fn nested_applications_are_rewritten() {
        // ((lambda (y) ((lambda (x) (- x y)) 5)) 3)
        let inner = make_app(
            make_abs(
                vec!["x".to_string()],
                make_app(make_var("-"), vec![make_var("x"), make_var("y")]),
            ),
            vec![make_int(5)],
        );
        let expr = make_app(make_abs(vec!["y".to_string()], inner), vec![make_int(3)]);

        assert_eq!(
            pass_let(&expr).to_string(),
            "(let ((y 3)) (let ((x 5)) (- x y)))"
        );
    }

    #[test]
    fn arity_mismatch_is_left_alone() {
        let expr = make_app(make_abs(vec!["x".to_string()], make_var("x")), vec![]);
        assert_eq!(pass_let(&expr), expr);
    }
}
