use mbl::compiler::{compile, compile_with, CompileOptions};
use mbl::compiler::expr::{Expr, Literal, MAX_DEPTH};
use mbl::compiler::types::{Type, TypeError};
use mbl::runtime::{value::Value, vm::Vm};
use mbl::reader::MAX_NESTING;
use mbl::simple_eval::MAX_CALL_DEPTH;
use mbl::{reader, simple_eval, Error};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const SAMPLES: &[(&str, Literal)] = &[
    ("4", Literal::Int(4)),
    ("#t", Literal::Bool(true)),
    ("((lambda (n m) (- n m)) 5 3)", Literal::Int(2)),
    ("(let ((x 3) (y 7)) (- y x))", Literal::Int(4)),
    ("((lambda (y) ((lambda (x) (- x y)) 5)) 3)", Literal::Int(2)),
    ("(= (= 2 2) (= #t #t))", Literal::Bool(true)),
    (
        "(letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))) (fact 10))",
        Literal::Int(3628800),
    ),
    ("(if (= 1 2) 10 20)", Literal::Int(20)),
    ("(begin 1 2 3)", Literal::Int(3)),
    ("((lambda () 42))", Literal::Int(42)),
    ("(+ 1 (let ((x 2)) (* x 3)))", Literal::Int(7)),
    (
        "(let ((add (lambda (x) (lambda (y) (+ x y))))) ((add 3) 4))",
        Literal::Int(7),
    ),
    (
        "(letrec ((even (lambda (n) (if (= n 0) #t (odd (- n 1)))))
                  (odd (lambda (n) (if (= n 0) #f (even (- n 1))))))
           (even 10))",
        Literal::Bool(true),
    ),
    (
        "(let ((k 5))
           (letrec ((f (lambda (n) (if (= n 0) k (f (- n 1))))))
             (f 3)))",
        Literal::Int(5),
    ),
    (
        "(fix ((twice (f x) (f (f x)))) (twice (lambda (n) (* n 2)) 5))",
        Literal::Int(20),
    ),
    (
        "(let ((x 1)) (let ((f (lambda (y) (+ x y)))) (let ((x 100)) (f x))))",
        Literal::Int(101),
    ),
];

fn run(source: &str) -> Result<Value, Error> {
    mbl::run(source)
}

#[test]
fn samples_run_to_expected_values() {
    init_logger();

    for (source, expected) in SAMPLES {
        assert_eq!(run(source), Ok(Value::from(*expected)), "{}", source);
    }
}

#[test]
fn compiled_code_agrees_with_direct_evaluation() {
    init_logger();

    for (source, _) in SAMPLES {
        let compilation = compile(source).unwrap();
        let direct = simple_eval::eval(&compilation.expr).unwrap();

        let mut vm = Vm::new(compilation.program);
        let compiled = vm.run().unwrap();

        assert_eq!(compiled.as_literal(), direct.as_literal(), "{}", source);
    }
}

#[test]
fn inferred_types_of_samples() {
    let ty = |source: &str| compile(source).unwrap().ty.unwrap();

    assert_eq!(ty("4"), Type::Int);
    assert_eq!(ty("(= (= 2 2) (= #t #t))"), Type::Bool);
    assert_eq!(ty("(lambda (x) (+ x 1))"), Type::Arrow(vec![Type::Int, Type::Int]));
    assert!(ty("(lambda (f) (f 1))").is_arrow());
}

#[test]
fn time_reports_executed_steps() {
    assert_eq!(run("(time)"), Ok(Value::Int(2)));
}

#[test]
fn tail_recursion_runs_in_constant_stack() {
    init_logger();

    let source = "(letrec ((loop (lambda (n acc)
                                   (if (= n 0) acc (loop (- n 1) (+ acc 1))))))
                    (loop 100000 0))";
    let compilation = compile(source).unwrap();
    assert!(!compilation.tail_calls.is_empty());

    let mut vm = Vm::new(compilation.program);
    assert_eq!(vm.run(), Ok(Value::Int(100000)));
    assert!(
        vm.stack().high_water() < 16,
        "stack grew to {}",
        vm.stack().high_water()
    );
}

#[test]
fn mutual_tail_recursion_runs_in_constant_stack() {
    let source = "(letrec ((even (lambda (n) (if (= n 0) #t (odd (- n 1)))))
                           (odd (lambda (n) (if (= n 0) #f (even (- n 1))))))
                    (odd 100001))";
    let compilation = compile(source).unwrap();

    let mut vm = Vm::new(compilation.program);
    assert_eq!(vm.run(), Ok(Value::Bool(true)));
    assert!(vm.stack().high_water() < 16);
}

#[test]
fn returned_closures_escape() {
    let compilation = compile("(lambda (x) (lambda (y) (+ x y)))").unwrap();
    let Expr::Abs(outer, outer_tag) = &compilation.expr else {
        panic!("expected a lambda");
    };

    assert!(compilation.escaping.contains(outer_tag));
    assert!(compilation.escaping.contains(outer.body.tag()));

    let value = run("(lambda (x) x)").unwrap();
    assert!(value.is_procedure());

    let compilation = compile("(let ((k 1)) (lambda (x) (+ x k)))").unwrap();
    let closure = simple_eval::eval(&compilation.expr).unwrap();
    assert!(matches!(closure, simple_eval::Datum::Closure(_, Some(_))));
    assert_eq!(closure.as_literal(), None);
    assert!(closure.to_string().starts_with("#<procedure ("));
}

#[test]
fn pipeline_without_type_checking() {
    let options = CompileOptions {
        typecheck: false,
        ..Default::default()
    };
    let compilation = compile_with("((lambda (x) (if x 1 2)) #f)", options).unwrap();
    assert!(compilation.escaping.is_empty());

    let mut vm = Vm::new(compilation.program);
    assert_eq!(vm.run(), Ok(Value::Int(2)));
}

#[test]
fn rejected_programs() {
    init_logger();

    assert!(matches!(
        compile("(lambda (f) (f f))"),
        Err(Error::Type(TypeError::Occurs(..)))
    ));
    assert!(matches!(
        compile("(if 1 2 3)"),
        Err(Error::Type(TypeError::Mismatch(..)))
    ));
    assert!(matches!(
        compile("(lambda (x) (set! x 1))"),
        Err(Error::Unsupported("set!"))
    ));
    assert!(matches!(
        compile("(letrec ((x 1)) x)"),
        Err(Error::NonFunctionBinding(name)) if name.starts_with("x.")
    ));
    assert_eq!(
        compile("(g 1)").map(|_| ()),
        Err(Error::UnboundVariable("g".to_string()))
    );
    assert!(matches!(compile("(+ 1"), Err(Error::Read { .. })));
}

#[test]
fn runtime_traps_are_reported() {
    let options = CompileOptions {
        typecheck: false,
        ..Default::default()
    };

    let compilation = compile_with("(1 2)", options).unwrap();
    let mut vm = Vm::new(compilation.program);
    assert!(matches!(vm.run(), Err(Error::Trap(_))));

    let compilation = compile_with("(+ 1 #t)", options).unwrap();
    let mut vm = Vm::new(compilation.program);
    assert!(matches!(vm.run(), Err(Error::Trap(_))));
}

#[test]
fn disassembly_lists_every_block() {
    let compilation = compile("(let ((f (lambda (x) x)) (g (lambda (y) y))) (f g))").unwrap();
    let listing = compilation.program.to_string();

    assert!(listing.starts_with("0000:"));
    assert_eq!(listing.lines().filter(|line| line.ends_with(':')).count(), 2);
    assert!(listing.contains("halt"));
}

#[test]
fn reader_output_matches_hand_built_tree() {
    let expr = reader::read("(let ((x 3)) x)").unwrap();
    assert_eq!(expr.to_string(), "(let ((x 3)) x)");
}

fn nested_sums(depth: usize) -> String {
    format!("{}1{}", "(+ 1 ".repeat(depth), ")".repeat(depth))
}

#[test]
fn nesting_limit_is_an_error_not_a_crash() {
    init_logger();

    assert_eq!(run(&nested_sums(MAX_NESTING)), Ok(Value::Int(MAX_NESTING as i64 + 1)));

    match compile(&nested_sums(MAX_NESTING + 1)) {
        Err(Error::Read { message, .. }) => assert_eq!(message, "nesting too deep"),
        other => panic!("expected a read error, got {:?}", other.map(|_| ())),
    }

    // every multi-expression body adds a `begin` below its list
    let mut source = String::from("0");
    for _ in 0..MAX_NESTING - 1 {
        source = format!("(lambda () 0 {})", source);
    }
    let expr = compile(&source).unwrap().expr;
    assert!(expr.deeper_than(MAX_NESTING));
    assert!(!expr.deeper_than(MAX_DEPTH));
}

#[test]
fn deep_non_tail_recursion() {
    let source = "(letrec ((f (lambda (n) (if (= n 0) 0 (+ 1 (f (- n 1))))))) (f 1000))";
    let compilation = compile(source).unwrap();

    assert!(matches!(
        simple_eval::eval(&compilation.expr),
        Err(Error::Trap(_))
    ));

    let mut vm = Vm::new(compilation.program);
    assert_eq!(vm.run(), Ok(Value::Int(1000)));

    let shallow = format!(
        "(letrec ((f (lambda (n) (if (= n 0) 0 (+ 1 (f (- n 1))))))) (f {}))",
        MAX_CALL_DEPTH - 1
    );
    let compilation = compile(&shallow).unwrap();
    let direct = simple_eval::eval(&compilation.expr).unwrap();
    assert_eq!(direct.as_literal(), Some(Literal::Int(MAX_CALL_DEPTH as i64 - 1)));
}
