//! Escaping closure analysis.
//!
//! A node escapes when its inferred type is a function type: the value it produces is a closure
//! that may be stored, passed or returned, so it has to exist at runtime as a real closure.
//! Variable references and literals never create closures and are never flagged. Bindings of a
//! `fix` group are flagged under their reserved tags.

use indexmap::IndexSet;

use super::expr::*;
use super::types::{Type, TypeTable};

pub fn find_escaping_closures(expr: &Expr<Tag>, types: &TypeTable) -> IndexSet<Tag> {
    let mut escaping = IndexSet::new();
    visit(expr, types, &mut escaping);
    escaping
}

fn flag(tag: Tag, types: &TypeTable, escaping: &mut IndexSet<Tag>) {
    if types.get(&tag).map_or(false, Type::is_arrow) {
        escaping.insert(tag);
    }
}

fn visit(expr: &Expr<Tag>, types: &TypeTable, escaping: &mut IndexSet<Tag>) {
    if matches!(expr, Expr::Lit(..) | Expr::Var(..)) {
        return;
    }

    flag(*expr.tag(), types, escaping);

    match expr {
        Expr::Lit(..) | Expr::Var(..) => {}
        Expr::Cond(test, then, else_, _) => {
            visit(test, types, escaping);
            visit(then, types, escaping);
            visit(else_, types, escaping);
        }
        Expr::Abs(lam, _) => visit(&lam.body, types, escaping),
        Expr::Set(_, value, _) => visit(value, types, escaping),
        Expr::App(func, args, _) => {
            visit(func, types, escaping);
            for arg in args {
                visit(arg, types, escaping);
            }
        }
        Expr::Let(_, bindings, body, _) | Expr::Letrec(_, bindings, body, _) => {
            for binding in bindings {
                visit(binding, types, escaping);
            }
            visit(body, types, escaping);
        }
        Expr::Fix(_, tags, lambdas, body, _) => {
            for (tag, lam) in tags.iter().zip(lambdas.iter()) {
                flag(*tag, types, escaping);
                visit(&lam.body, types, escaping);
            }
            visit(body, types, escaping);
        }
        Expr::Seq(exprs, _) => {
            for expr in exprs {
                visit(expr, types, escaping);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{fix_letrec::pass_letrec, recover_let::pass_let, tag::tag, types::infer};
    use crate::reader::read;

    fn escaping(source: &str) -> (Expr<Tag>, IndexSet<Tag>) {
        let expr = pass_letrec(&pass_let(&read(source).unwrap())).unwrap();
        let expr = tag(&expr);
        let typing = infer(&expr).unwrap();
        let escaping = find_escaping_closures(&expr, &typing.types);
        (expr, escaping)
    }

    #[test]
    fn first_order_program_has_no_escaping_closures() {
        let (_, escaping) = escaping("(let ((x 3) (y 7)) (- y x))");
        assert!(escaping.is_empty());
    }

    #[test]
    fn lambda_passed_as_argument_escapes() {
        let (expr, escaping) = escaping("((lambda (f) (f 3)) (lambda (x) x))");

        // the applied lambda became a let, its binding is the escaping closure
        let Expr::Let(_, bindings, _, _) = &expr else {
            panic!("expected a let, got {}", expr);
        };
        assert!(bindings[0].is_abs());
        assert_eq!(escaping.iter().copied().collect::<Vec<_>>(), vec![*bindings[0].tag()]);
    }

    #[test]
    fn fix_bindings_are_analyzed() {
        let (expr, escaping) = escaping(
            "(letrec ((make (lambda (n) (lambda (m) (+ n m))))) ((make 1) 2))",
        );

        let Expr::Fix(_, tags, lambdas, _, _) = &expr else {
            panic!("expected a fix node, got {}", expr);
        };
        assert!(escaping.contains(&tags[0]));
        assert!(escaping.contains(lambdas[0].body.tag()));
    }
}
