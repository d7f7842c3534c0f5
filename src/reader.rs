//! Reader for the surface syntax.
//!
//! Source text is first read into S-expressions and then converted to an untagged [Expr]. The
//! special forms are `lambda`, `let`, `letrec`, `fix`, `if`, `begin` and `set!`; every other list
//! is an application. Bodies with more than one expression become a `begin`.
//!
//! ```text
//! (letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1)))))))
//!   (fact 10))
//! ```

use crate::compiler::expr::*;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Int(i64),
    Bool(bool),
    Ident(String),
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == ';'
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' => {
                chars.next();
                tokens.push((Token::Open, start));
            }
            ')' | ']' => {
                chars.next();
                tokens.push((Token::Close, start));
            }
            _ => {
                let mut end = source.len();
                while let Some(&(at, c)) = chars.peek() {
                    if is_delimiter(c) || c == '[' || c == ']' {
                        end = at;
                        break;
                    }
                    chars.next();
                }

                tokens.push((atom(&source[start..end], start)?, start));
            }
        }
    }

    Ok(tokens)
}

fn atom(text: &str, offset: usize) -> Result<Token> {
    match text {
        "#t" | "#true" => return Ok(Token::Bool(true)),
        "#f" | "#false" => return Ok(Token::Bool(false)),
        _ if text.starts_with('#') => {
            return Err(Error::read(format!("unknown literal `{}`", text), offset))
        }
        _ => {}
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return text
            .parse()
            .map(Token::Int)
            .map_err(|_| Error::read(format!("integer `{}` out of range", text), offset));
    }

    Ok(Token::Ident(text.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
enum Sexpr {
    Int(i64),
    Bool(bool),
    Symbol(String),
    List(Vec<(Sexpr, usize)>),
}

/// Deepest list nesting the reader accepts. A body with several expressions adds a `begin` below
/// its list, so the resulting tree stays within [MAX_DEPTH].
pub const MAX_NESTING: usize = MAX_DEPTH / 2;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    len: usize,
    depth: usize,
}

impl Parser {
    fn datum(&mut self) -> Result<(Sexpr, usize)> {
        let Some((token, offset)) = self.tokens.get(self.pos).cloned() else {
            return Err(Error::read("unexpected end of input", self.len));
        };
        self.pos += 1;

        let datum = match token {
            Token::Int(n) => Sexpr::Int(n),
            Token::Bool(b) => Sexpr::Bool(b),
            Token::Ident(name) => Sexpr::Symbol(name),
            Token::Close => return Err(Error::read("unexpected `)`", offset)),
            Token::Open => {
                if self.depth == MAX_NESTING {
                    return Err(Error::read("nesting too deep", offset));
                }

                self.depth += 1;
                let items = self.items(offset)?;
                self.depth -= 1;
                Sexpr::List(items)
            }
        };

        Ok((datum, offset))
    }

    /// Elements of a list up to and including its `)`.
    fn items(&mut self, offset: usize) -> Result<Vec<(Sexpr, usize)>> {
        let mut items = Vec::new();
        loop {
            match self.tokens.get(self.pos) {
                Some((Token::Close, _)) => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.datum()?),
                None => return Err(Error::read("unclosed `(`", offset)),
            }
        }
    }
}

type Datum = (Sexpr, usize);

fn symbol(datum: &Datum) -> Result<Variable> {
    match datum {
        (Sexpr::Symbol(name), _) => Ok(name.clone()),
        (_, offset) => Err(Error::read("expected an identifier", *offset)),
    }
}

fn list(datum: &Datum) -> Result<&[Datum]> {
    match datum {
        (Sexpr::List(items), _) => Ok(items),
        (_, offset) => Err(Error::read("expected a list", *offset)),
    }
}

fn formals(datum: &Datum) -> Result<Vec<Variable>> {
    list(datum)?.iter().map(symbol).collect()
}

fn exprs(items: &[Datum]) -> Result<Vec<Expr<()>>> {
    items.iter().map(expr).collect()
}

/// `body...` of a binding form, at least one expression.
fn body(items: &[Datum], offset: usize) -> Result<Expr<()>> {
    match items {
        [] => Err(Error::read("empty body", offset)),
        [single] => expr(single),
        _ => Ok(make_seq(exprs(items)?)),
    }
}

/// `((name init) ...)`
fn bindings(datum: &Datum) -> Result<(Vec<Variable>, Vec<Expr<()>>)> {
    let mut vars = Vec::new();
    let mut inits = Vec::new();

    for binding in list(datum)? {
        match list(binding)? {
            [name, init] => {
                vars.push(symbol(name)?);
                inits.push(expr(init)?);
            }
            _ => return Err(Error::read("malformed binding", binding.1)),
        }
    }

    Ok((vars, inits))
}

/// `(lambda (formals...) body...)`
fn lambda(params: &Datum, items: &[Datum], offset: usize) -> Result<Expr<()>> {
    Ok(make_abs(formals(params)?, body(items, offset)?))
}

/// `(let ((name init) ...) body...)` and the same shape for `letrec`.
fn binding_form(
    recursive: bool,
    binds: &Datum,
    items: &[Datum],
    offset: usize,
) -> Result<Expr<()>> {
    let (vars, inits) = bindings(binds)?;
    let body = body(items, offset)?;

    Ok(if recursive {
        make_letrec(vars, inits, body)
    } else {
        make_let(vars, inits, body)
    })
}

/// `(fix ((name (formals...) body...) ...) body...)`
fn fix(binds: &Datum, items: &[Datum], offset: usize) -> Result<Expr<()>> {
    let mut names = Vec::new();
    let mut lambdas = Vec::new();

    for binding in list(binds)? {
        match list(binding)? {
            [name, params, lambda_body @ ..] => {
                names.push(symbol(name)?);
                lambdas.push(Lambda::new(formals(params)?, body(lambda_body, binding.1)?));
            }
            _ => return Err(Error::read("malformed fix binding", binding.1)),
        }
    }

    Ok(make_fix(names, lambdas, body(items, offset)?))
}

fn conditional(test: &Datum, then: &Datum, else_: &Datum) -> Result<Expr<()>> {
    Ok(make_cond(expr(test)?, expr(then)?, expr(else_)?))
}

fn application(func: &Datum, args: &[Datum]) -> Result<Expr<()>> {
    Ok(make_app(expr(func)?, exprs(args)?))
}

fn expr(datum: &Datum) -> Result<Expr<()>> {
    let (sexpr, offset) = datum;
    let offset = *offset;

    let items = match sexpr {
        Sexpr::Int(n) => return Ok(make_int(*n)),
        Sexpr::Bool(b) => return Ok(make_bool(*b)),
        Sexpr::Symbol(name) => return Ok(make_var(name)),
        Sexpr::List(items) => items,
    };

    let Some((head, rest)) = items.split_first() else {
        return Err(Error::read("empty application", offset));
    };

    let keyword = match head {
        (Sexpr::Symbol(name), _) => name.as_str(),
        _ => "",
    };

    match (keyword, rest) {
        ("lambda", [params, items @ ..]) => lambda(params, items, offset),
        ("let", [binds, items @ ..]) => binding_form(false, binds, items, offset),
        ("letrec", [binds, items @ ..]) => binding_form(true, binds, items, offset),
        ("fix", [binds, items @ ..]) => fix(binds, items, offset),
        ("if", [test, then, else_]) => conditional(test, then, else_),
        ("if", _) => Err(Error::read("`if` takes exactly three operands", offset)),
        ("begin", []) => Err(Error::read("empty `begin`", offset)),
        ("begin", items) => Ok(make_seq(exprs(items)?)),
        ("set!", [name, value]) => Ok(make_set(&symbol(name)?, expr(value)?)),
        ("set!", _) => Err(Error::read("malformed `set!`", offset)),
        ("lambda" | "let" | "letrec" | "fix", _) => {
            Err(Error::read(format!("malformed `{}`", keyword), offset))
        }
        _ => application(head, rest),
    }
}

/// Read exactly one expression from `source`.
pub fn read(source: &str) -> Result<Expr<()>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        len: source.len(),
        depth: 0,
    };

    let datum = parser.datum()?;
    if let Some((_, offset)) = parser.tokens.get(parser.pos) {
        return Err(Error::read("unexpected trailing input", *offset));
    }

    expr(&datum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms() {
        assert_eq!(read("4"), Ok(make_int(4)));
        assert_eq!(read("  -17 "), Ok(make_int(-17)));
        assert_eq!(read("#f"), Ok(make_bool(false)));
        assert_eq!(read("-"), Ok(make_var("-")));
        assert_eq!(read("fact"), Ok(make_var("fact")));
    }

    #[test]
    fn special_forms() {
        let source = "(letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1)))))))
                        (fact 10)) ; factorial";
        let Ok(Expr::Letrec(vars, inits, body, ())) = read(source) else {
            panic!("expected a letrec");
        };
        assert_eq!(vars, vec!["fact".to_string()]);
        assert!(inits[0].is_abs());
        assert_eq!(*body, make_app(make_var("fact"), vec![make_int(10)]));

        assert_eq!(
            read("(let ((x 3) (y 7)) (- y x))").unwrap(),
            make_let(
                vec!["x".to_string(), "y".to_string()],
                vec![make_int(3), make_int(7)],
                make_app(make_var("-"), vec![make_var("y"), make_var("x")]),
            )
        );
    }

    #[test]
    fn fix_and_bodies() {
        let expr = read("(fix ((f (x) x) (g () 1 2)) (f 1))").unwrap();
        assert_eq!(
            expr,
            make_fix(
                vec!["f".to_string(), "g".to_string()],
                vec![
                    Lambda::new(vec!["x".to_string()], make_var("x")),
                    Lambda::new(vec![], make_seq(vec![make_int(1), make_int(2)])),
                ],
                make_app(make_var("f"), vec![make_int(1)]),
            )
        );
    }

    fn nested(depth: usize) -> String {
        let mut source = String::new();
        for _ in 0..depth {
            source.push_str("(+ 1 ");
        }
        source.push('1');
        for _ in 0..depth {
            source.push(')');
        }
        source
    }

    #[test]
    fn nesting_is_bounded() {
        assert!(read(&nested(MAX_NESTING)).is_ok());

        let too_deep = nested(MAX_NESTING + 1);
        let offset = MAX_NESTING * "(+ 1 ".len();
        assert_eq!(read(&too_deep), Err(Error::read("nesting too deep", offset)));
        assert!(matches!(read(&nested(5_000)), Err(Error::Read { .. })));
    }

    #[test]
    fn errors_carry_offsets() {
        assert_eq!(read("(f 1"), Err(Error::read("unclosed `(`", 0)));
        assert_eq!(read("1 )"), Err(Error::read("unexpected trailing input", 2)));
        assert_eq!(read(")"), Err(Error::read("unexpected `)`", 0)));
        assert_eq!(read(""), Err(Error::read("unexpected end of input", 0)));
        assert_eq!(read("(if 1 2)"), Err(Error::read("`if` takes exactly three operands", 0)));
        assert_eq!(read("(begin)"), Err(Error::read("empty `begin`", 0)));
        assert!(matches!(read("()"), Err(Error::Read { .. })));
        assert!(matches!(read("#x"), Err(Error::Read { .. })));
    }
}
