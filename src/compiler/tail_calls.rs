//! Tail call detection.
//!
//! Walks the tree carrying the current tail target: the lambda whose frame a call in tail
//! position would reuse, together with the number of stack cells between that frame's footer and
//! the outgoing arguments. The target is lost in test positions, operator and operand positions
//! and in every non-last element of a sequence.

use super::expr::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TailCall {
    /// Tag of the application in tail position.
    pub app: Tag,
    /// Tag of the lambda (or `fix` binding) whose frame is reused.
    pub abs: Tag,
    /// Cells to slide the arguments over: parameters plus live temporaries.
    pub stack: usize,
}

type Target = Option<(Tag, usize)>;

pub fn find_tail_calls(expr: &Expr<Tag>) -> Vec<TailCall> {
    let mut calls = Vec::new();
    visit(expr, None, &mut calls);
    calls
}

fn deeper(target: Target, by: usize) -> Target {
    target.map(|(abs, stack)| (abs, stack + by))
}

fn visit(expr: &Expr<Tag>, target: Target, calls: &mut Vec<TailCall>) {
    match expr {
        Expr::Lit(..) | Expr::Var(..) => {}
        Expr::Cond(test, then, else_, _) => {
            visit(test, None, calls);
            visit(then, target, calls);
            visit(else_, target, calls);
        }
        Expr::Abs(lam, tag) => visit(&lam.body, Some((*tag, lam.arity())), calls),
        Expr::Set(_, value, _) => visit(value, None, calls),
        Expr::App(func, args, tag) => {
            visit(func, None, calls);
            for arg in args {
                visit(arg, None, calls);
            }

            if let Some((abs, stack)) = target {
                calls.push(TailCall {
                    app: *tag,
                    abs,
                    stack,
                });
            }
        }
        Expr::Let(vars, bindings, body, _) | Expr::Letrec(vars, bindings, body, _) => {
            for binding in bindings {
                visit(binding, None, calls);
            }
            visit(body, deeper(target, vars.len()), calls);
        }
        Expr::Fix(names, tags, lambdas, body, _) => {
            for (tag, lam) in tags.iter().zip(lambdas.iter()) {
                visit(&lam.body, Some((*tag, lam.arity())), calls);
            }
            visit(body, deeper(target, names.len()), calls);
        }
        Expr::Seq(exprs, _) => {
            if let Some((last, init)) = exprs.split_last() {
                for expr in init {
                    visit(expr, None, calls);
                }
                visit(last, target, calls);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tag::tag;

    #[test]
    fn top_level_calls_are_not_tail_calls() {
        let expr = tag(&make_app(make_var("f"), vec![make_int(1)]));
        assert!(find_tail_calls(&expr).is_empty());
    }

    #[test]
    fn branches_are_tail_positions_but_not_the_test() {
        // (lambda (n) (if (f n) (g n) (begin (h n) (k n))))
        let expr = tag(&make_abs(
            vec!["n".to_string()],
            make_cond(
                make_app(make_var("f"), vec![make_var("n")]),
                make_app(make_var("g"), vec![make_var("n")]),
                make_seq(vec![
                    make_app(make_var("h"), vec![make_var("n")]),
                    make_app(make_var("k"), vec![make_var("n")]),
                ]),
            ),
        ));

        let Expr::Abs(lam, abs) = &expr else {
            panic!("expected a lambda");
        };
        let Expr::Cond(test, then, else_, _) = &*lam.body else {
            panic!("expected a conditional");
        };
        let Expr::Seq(seq, _) = &**else_ else {
            panic!("expected a sequence");
        };

        let calls = find_tail_calls(&expr);
        let apps: Vec<Tag> = calls.iter().map(|call| call.app).collect();

        assert_eq!(apps, vec![*then.tag(), *seq[1].tag()]);
        assert!(!apps.contains(test.tag()));
        assert!(!apps.contains(seq[0].tag()));
        assert!(calls.iter().all(|call| call.abs == *abs && call.stack == 1));
    }

    #[test]
    fn arguments_are_not_tail_positions() {
        // (lambda (x) (f (g x)))
        let expr = tag(&make_abs(
            vec!["x".to_string()],
            make_app(make_var("f"), vec![make_app(make_var("g"), vec![make_var("x")])]),
        ));

        let calls = find_tail_calls(&expr);
        assert_eq!(calls.len(), 1);

        let Expr::Abs(lam, _) = &expr else {
            panic!("expected a lambda");
        };
        assert_eq!(calls[0].app, *lam.body.tag());
    }

    #[test]
    fn let_and_fix_bodies_grow_the_frame() {
        // (fix ((loop (n) (let ((m n)) (loop m)))) (loop 1))
        let expr = tag(&make_fix(
            vec!["loop".to_string()],
            vec![Lambda::new(
                vec!["n".to_string()],
                make_let(
                    vec!["m".to_string()],
                    vec![make_var("n")],
                    make_app(make_var("loop"), vec![make_var("m")]),
                ),
            )],
            make_app(make_var("loop"), vec![make_int(1)]),
        ));

        let Expr::Fix(_, tags, _, _, _) = &expr else {
            panic!("expected a fix node");
        };

        let calls = find_tail_calls(&expr);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].abs, tags[0]);
        assert_eq!(calls[0].stack, 2);
    }
}
