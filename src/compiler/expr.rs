//! Expression IR.
//!
//! Programs are represented as an owned tree. Every node carries exactly one tag: `()` before
//! tagging and a [Tag] afterwards. Passes never mutate a tree, they produce a brand new one, and
//! facts computed about nodes (types, tail calls, escaping closures) live in side tables keyed by
//! tag.

use std::fmt;

use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use termcolor::{Color, ColorSpec, WriteColor};

pub type Variable = String;

/// Node identity, unique within a tagged tree.
pub type Tag = usize;

/// Deepest tree the passes accept. Every pass recurses on the host stack, one or more frames per
/// level.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Bool(true) => f.write_str("#t"),
            Literal::Bool(false) => f.write_str("#f"),
        }
    }
}

/// Arity of a lambda is the number of its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda<T> {
    pub vars: Vec<Variable>,
    pub body: Box<Expr<T>>,
}

impl<T> Lambda<T> {
    pub fn new(vars: Vec<Variable>, body: Expr<T>) -> Self {
        Self {
            vars,
            body: Box::new(body),
        }
    }

    pub fn arity(&self) -> usize {
        self.vars.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<T> {
    Lit(Literal, T),
    Var(Variable, T),
    Cond(Box<Expr<T>>, Box<Expr<T>>, Box<Expr<T>>, T),
    Abs(Lambda<T>, T),
    /// Parsed but rejected by inference and bytecode generation.
    Set(Variable, Box<Expr<T>>, T),
    App(Box<Expr<T>>, Vec<Expr<T>>, T),
    Let(Vec<Variable>, Vec<Expr<T>>, Box<Expr<T>>, T),
    /// Only present before the "fixing letrec" pass.
    Letrec(Vec<Variable>, Vec<Expr<T>>, Box<Expr<T>>, T),
    /// Introduced by the "fixing letrec" pass. A group of mutually recursive functions:
    /// names, one tag per binding, the lambdas and the body the names are visible in.
    Fix(Vec<Variable>, Vec<T>, Vec<Lambda<T>>, Box<Expr<T>>, T),
    Seq(Vec<Expr<T>>, T),
}

impl<T> Expr<T> {
    pub fn tag(&self) -> &T {
        match self {
            Expr::Lit(_, t)
            | Expr::Var(_, t)
            | Expr::Cond(_, _, _, t)
            | Expr::Abs(_, t)
            | Expr::Set(_, _, t)
            | Expr::App(_, _, t)
            | Expr::Let(_, _, _, t)
            | Expr::Letrec(_, _, _, t)
            | Expr::Fix(_, _, _, _, t)
            | Expr::Seq(_, t) => t,
        }
    }

    pub fn is_abs(&self) -> bool {
        matches!(self, Expr::Abs(_, _))
    }

    /// Whether the tree has more than `limit` nested compound nodes. Literals and variables do
    /// not count. The walk never goes further than `limit` levels down.
    pub fn deeper_than(&self, limit: usize) -> bool {
        let Some(limit) = limit.checked_sub(1) else {
            return !matches!(self, Expr::Lit(..) | Expr::Var(..));
        };

        match self {
            Expr::Lit(..) | Expr::Var(..) => false,
            Expr::Cond(test, then, else_, _) => {
                test.deeper_than(limit) || then.deeper_than(limit) || else_.deeper_than(limit)
            }
            Expr::Abs(lam, _) => lam.body.deeper_than(limit),
            Expr::Set(_, value, _) => value.deeper_than(limit),
            Expr::App(func, args, _) => {
                func.deeper_than(limit) || args.iter().any(|arg| arg.deeper_than(limit))
            }
            Expr::Let(_, bindings, body, _) | Expr::Letrec(_, bindings, body, _) => {
                bindings.iter().any(|binding| binding.deeper_than(limit)) || body.deeper_than(limit)
            }
            Expr::Fix(_, _, lambdas, body, _) => {
                lambdas.iter().any(|lam| lam.body.deeper_than(limit)) || body.deeper_than(limit)
            }
            Expr::Seq(exprs, _) => exprs.iter().any(|expr| expr.deeper_than(limit)),
        }
    }

    /// Forget all tags.
    pub fn untag(&self) -> Expr<()> {
        match self {
            Expr::Lit(lit, _) => Expr::Lit(*lit, ()),
            Expr::Var(name, _) => Expr::Var(name.clone(), ()),
            Expr::Cond(test, then, else_, _) => make_cond(test.untag(), then.untag(), else_.untag()),
            Expr::Abs(lam, _) => make_abs(lam.vars.clone(), lam.body.untag()),
            Expr::Set(name, value, _) => make_set(name, value.untag()),
            Expr::App(func, args, _) => {
                make_app(func.untag(), args.iter().map(Expr::untag).collect())
            }
            Expr::Let(vars, bindings, body, _) => make_let(
                vars.clone(),
                bindings.iter().map(Expr::untag).collect(),
                body.untag(),
            ),
            Expr::Letrec(vars, bindings, body, _) => make_letrec(
                vars.clone(),
                bindings.iter().map(Expr::untag).collect(),
                body.untag(),
            ),
            Expr::Fix(names, _, lambdas, body, _) => make_fix(
                names.clone(),
                lambdas
                    .iter()
                    .map(|lam| Lambda::new(lam.vars.clone(), lam.body.untag()))
                    .collect(),
                body.untag(),
            ),
            Expr::Seq(exprs, _) => make_seq(exprs.iter().map(Expr::untag).collect()),
        }
    }
}

pub fn make_int(n: i64) -> Expr<()> {
    Expr::Lit(Literal::Int(n), ())
}

pub fn make_bool(b: bool) -> Expr<()> {
    Expr::Lit(Literal::Bool(b), ())
}

pub fn make_var(name: &str) -> Expr<()> {
    Expr::Var(name.to_string(), ())
}

pub fn make_cond(test: Expr<()>, then: Expr<()>, else_: Expr<()>) -> Expr<()> {
    Expr::Cond(Box::new(test), Box::new(then), Box::new(else_), ())
}

pub fn make_abs(vars: Vec<Variable>, body: Expr<()>) -> Expr<()> {
    Expr::Abs(Lambda::new(vars, body), ())
}

pub fn make_set(name: &str, value: Expr<()>) -> Expr<()> {
    Expr::Set(name.to_string(), Box::new(value), ())
}

pub fn make_app(func: Expr<()>, args: Vec<Expr<()>>) -> Expr<()> {
    Expr::App(Box::new(func), args, ())
}

pub fn make_let(vars: Vec<Variable>, bindings: Vec<Expr<()>>, body: Expr<()>) -> Expr<()> {
    Expr::Let(vars, bindings, Box::new(body), ())
}

pub fn make_letrec(vars: Vec<Variable>, bindings: Vec<Expr<()>>, body: Expr<()>) -> Expr<()> {
    Expr::Letrec(vars, bindings, Box::new(body), ())
}

pub fn make_fix(names: Vec<Variable>, lambdas: Vec<Lambda<()>>, body: Expr<()>) -> Expr<()> {
    let tags = vec![(); names.len()];
    Expr::Fix(names, tags, lambdas, Box::new(body), ())
}

pub fn make_seq(exprs: Vec<Expr<()>>) -> Expr<()> {
    Expr::Seq(exprs, ())
}

/// How a node tag shows up in printed trees.
pub trait Annotation {
    fn annotation(&self) -> Option<Tag>;
}

impl Annotation for () {
    fn annotation(&self) -> Option<Tag> {
        None
    }
}

impl Annotation for Tag {
    fn annotation(&self) -> Option<Tag> {
        Some(*self)
    }
}

fn fg(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

fn kw(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec.set_bold(true);
    spec
}

impl<T: Annotation> Expr<T> {
    pub fn pretty<'a, D>(&self, allocator: &'a D) -> DocBuilder<'a, D, ColorSpec>
    where
        D: DocAllocator<'a, ColorSpec>,
        D::Doc: Clone,
    {
        let doc = match self {
            Expr::Lit(lit, _) => allocator.text(lit.to_string()).annotate(fg(Color::Cyan)),
            Expr::Var(name, _) => allocator.text(name.clone()),

            Expr::Cond(test, then, else_, _) => allocator
                .text("if")
                .annotate(kw(Color::Green))
                .append(allocator.space())
                .append(test.pretty(allocator))
                .append(allocator.line())
                .append(then.pretty(allocator))
                .append(allocator.line())
                .append(else_.pretty(allocator))
                .nest(1)
                .group()
                .parens(),

            Expr::Abs(lam, _) => allocator
                .text("lambda")
                .annotate(kw(Color::Green))
                .append(allocator.space())
                .append(formals(allocator, &lam.vars))
                .append(allocator.line())
                .append(lam.body.pretty(allocator))
                .nest(1)
                .group()
                .parens(),

            Expr::Set(name, value, _) => allocator
                .text("set!")
                .annotate(kw(Color::Green))
                .append(allocator.space())
                .append(allocator.text(name.clone()))
                .append(allocator.line())
                .append(value.pretty(allocator))
                .nest(1)
                .group()
                .parens(),

            Expr::App(func, args, _) if args.is_empty() => func.pretty(allocator).parens(),

            Expr::App(func, args, _) => func
                .pretty(allocator)
                .append(allocator.line())
                .append(allocator.intersperse(
                    args.iter().map(|arg| arg.pretty(allocator)),
                    allocator.line(),
                ))
                .nest(1)
                .group()
                .parens(),

            Expr::Let(vars, bindings, body, _) => {
                binding_form(allocator, "let", vars, bindings, body)
            }

            Expr::Letrec(vars, bindings, body, _) => {
                binding_form(allocator, "letrec", vars, bindings, body)
            }

            Expr::Fix(names, _, lambdas, body, _) => {
                let bindings = allocator.intersperse(
                    names.iter().zip(lambdas.iter()).map(|(name, lam)| {
                        allocator
                            .text(name.clone())
                            .append(allocator.space())
                            .append(formals(allocator, &lam.vars))
                            .append(allocator.line())
                            .append(lam.body.pretty(allocator))
                            .nest(1)
                            .group()
                            .parens()
                    }),
                    allocator.line(),
                );

                allocator
                    .text("fix")
                    .annotate(kw(Color::Green))
                    .append(allocator.space())
                    .append(bindings.align().parens())
                    .append(allocator.line())
                    .append(body.pretty(allocator))
                    .nest(1)
                    .group()
                    .parens()
            }

            Expr::Seq(exprs, _) => allocator
                .text("begin")
                .annotate(kw(Color::Green))
                .append(allocator.line())
                .append(allocator.intersperse(
                    exprs.iter().map(|expr| expr.pretty(allocator)),
                    allocator.line(),
                ))
                .nest(1)
                .group()
                .parens(),
        };

        match self.tag().annotation() {
            Some(tag) => doc.append(
                allocator
                    .text(format!("@{}", tag))
                    .annotate(fg(Color::Yellow)),
            ),
            None => doc,
        }
    }

    pub fn pretty_print(&self, out: impl WriteColor) -> std::io::Result<()> {
        let allocator = BoxAllocator;
        self.pretty(&allocator).1.render_colored(70, out)?;

        Ok(())
    }
}

fn formals<'a, D>(allocator: &'a D, vars: &[Variable]) -> DocBuilder<'a, D, ColorSpec>
where
    D: DocAllocator<'a, ColorSpec>,
    D::Doc: Clone,
{
    allocator
        .intersperse(
            vars.iter().map(|var| allocator.text(var.clone())),
            allocator.space(),
        )
        .parens()
}

fn binding_form<'a, D, T: Annotation>(
    allocator: &'a D,
    keyword: &'static str,
    vars: &[Variable],
    bindings: &[Expr<T>],
    body: &Expr<T>,
) -> DocBuilder<'a, D, ColorSpec>
where
    D: DocAllocator<'a, ColorSpec>,
    D::Doc: Clone,
{
    let bindings = allocator.intersperse(
        vars.iter().zip(bindings.iter()).map(|(var, init)| {
            allocator
                .text(var.clone())
                .append(allocator.space())
                .append(init.pretty(allocator))
                .group()
                .parens()
        }),
        allocator.line(),
    );

    allocator
        .text(keyword)
        .annotate(kw(Color::Green))
        .append(allocator.space())
        .append(bindings.align().parens())
        .append(allocator.line())
        .append(body.pretty(allocator))
        .nest(1)
        .group()
        .parens()
}

impl<T: Annotation> fmt::Display for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut vec = Vec::new();
        let out = termcolor::NoColor::new(&mut vec);
        self.pretty_print(out).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(names: &[&str]) -> Vec<Variable> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn nested(depth: usize) -> Expr<()> {
        (0..depth).fold(make_int(1), |inner, _| {
            make_app(make_var("+"), vec![make_int(1), inner])
        })
    }

    #[test]
    fn depth_counts_compound_nodes() {
        assert!(!make_int(1).deeper_than(0));
        assert!(nested(1).deeper_than(0));
        assert!(!nested(1).deeper_than(1));
        assert!(!nested(40).deeper_than(40));
        assert!(nested(41).deeper_than(40));

        let body = make_seq(vec![make_int(1), nested(2)]);
        assert!(!make_abs(vec![], body.clone()).deeper_than(4));
        assert!(make_abs(vec![], body).deeper_than(3));
    }

    #[test]
    fn prints_surface_syntax() {
        let expr = make_let(
            vars(&["x"]),
            vec![make_int(3)],
            make_cond(
                make_app(make_var("="), vec![make_var("x"), make_int(3)]),
                make_bool(true),
                make_app(make_abs(vec![], make_bool(false)), vec![]),
            ),
        );

        assert_eq!(
            expr.to_string(),
            "(let ((x 3)) (if (= x 3) #t ((lambda () #f))))"
        );
    }

    #[test]
    fn prints_fix_groups() {
        let expr = make_fix(
            vars(&["f"]),
            vec![Lambda::new(vars(&["n"]), make_app(make_var("f"), vec![make_var("n")]))],
            make_app(make_var("f"), vec![make_int(1)]),
        );

        assert_eq!(expr.to_string(), "(fix ((f (n) (f n))) (f 1))");
    }

    #[test]
    fn tagged_trees_show_tags() {
        let expr: Expr<Tag> = Expr::Seq(
            vec![Expr::Lit(Literal::Int(3), 0), Expr::Var("x".to_string(), 1)],
            2,
        );

        assert_eq!(expr.to_string(), "(begin 3@0 x@1)@2");
        assert_eq!(expr.untag(), make_seq(vec![make_int(3), make_var("x")]));
    }
}
