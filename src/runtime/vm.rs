//! Virtual machine.
//!
//! Registers: program counter, frame pointer, active closure and the accumulator which holds the
//! value of the last evaluated expression. Calling convention is described in [super::stack].
//!
//! The machine trusts its program: it performs no validation up front and reports violated
//! invariants (bad addressing, applying a non procedure) as [Error::Trap] when they happen.

use std::rc::Rc;

use super::stack::Stack;
use super::value::{Closure, Value};
use crate::bytecode::opcodes::Inst;
use crate::bytecode::program::Program;
use crate::compiler::primitives::Primitive;
use crate::{Error, Result};

pub struct Vm {
    program: Program,
    stack: Stack,
    acc: Value,
    pc: usize,
    fp: usize,
    cl: Rc<Closure>,
    steps: u64,
    step_limit: Option<u64>,
    halted: bool,
}

impl Vm {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            stack: Stack::new(),
            acc: Value::Int(0),
            pc: 0,
            fp: 0,
            cl: Rc::new(Closure {
                body: 0,
                values: Vec::new(),
            }),
            steps: 0,
            step_limit: None,
            halted: false,
        }
    }

    /// Like [Vm::new] but trap once `limit` instructions have been executed.
    pub fn with_step_limit(program: Program, limit: u64) -> Self {
        let mut vm = Self::new(program);
        vm.step_limit = Some(limit);
        vm
    }

    /// Accumulator. Holds the result of the program once [Vm::step] returned `false`.
    pub fn acc(&self) -> &Value {
        &self.acc
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Execute a single instruction. Returns `false` once the machine halted.
    pub fn step(&mut self) -> Result<bool> {
        if self.halted {
            return Ok(false);
        }

        if let Some(limit) = self.step_limit {
            if self.steps >= limit {
                return Err(Error::trap(format!("step limit of {} exceeded", limit)));
            }
        }

        let at = self.pc;
        let inst = *self
            .program
            .code
            .get(at)
            .ok_or_else(|| Error::trap(format!("pc {} out of bounds", at)))?;

        log::trace!(
            target: "mbl::vm",
            "{:04} fp={} sp={} {}",
            at,
            self.fp,
            self.stack.len(),
            inst
        );

        self.pc += 1;

        match inst {
            Inst::Halt => {
                self.pc = at;
                self.halted = true;
            }
            Inst::Constant(lit) => self.acc = lit.into(),
            Inst::ReferGlobal(n) => {
                let prim = Primitive::from_index(n)
                    .ok_or_else(|| Error::trap(format!("no global {}", n)))?;
                self.acc = Value::Primitive(prim);
            }
            Inst::ReferLocal(n) => self.acc = self.stack.local(self.fp, n)?.clone(),
            Inst::ReferTemp(slot) => self.acc = self.stack.temp(self.fp, slot)?.clone(),
            Inst::ReferFree(n) => {
                self.acc = self
                    .cl
                    .values
                    .get(n)
                    .cloned()
                    .ok_or_else(|| Error::trap(format!("no captured value {}", n)))?;
            }
            Inst::ReferRec(body) => {
                self.acc = Value::Closure(Rc::new(Closure {
                    body,
                    values: self.cl.values.clone(),
                }));
            }
            Inst::Close(n, body) => {
                let values = self.stack.take_top(n)?;
                self.acc = Value::Closure(Rc::new(Closure { body, values }));
            }
            Inst::Test(off) => {
                if self.acc.is_false() {
                    self.pc = at + off;
                }
            }
            Inst::Jmp(off) => self.pc = at + off,
            Inst::Frame(off) => {
                self.stack.push(Value::Closure(self.cl.clone()));
                self.stack.push(Value::StackAddr(self.fp));
                self.stack.push(Value::CodeAddr(at + off));
            }
            Inst::Argument => self.stack.push(self.acc.clone()),
            Inst::Apply => self.apply()?,
            Inst::Shift(n, m) => self.stack.shift(n, m)?,
            Inst::Pop(n) => self.stack.pop_n(n)?,
            Inst::Return(n) => {
                self.stack.pop_n(n)?;
                self.return_to_caller()?;
            }
        }

        self.steps += 1;
        Ok(!self.halted)
    }

    fn apply(&mut self) -> Result<()> {
        match self.acc.clone() {
            Value::Closure(closure) => {
                self.pc = closure.body;
                self.fp = self.stack.len();
                self.cl = closure;
                Ok(())
            }

            Value::Primitive(prim) => {
                let mut args = Vec::with_capacity(prim.arity());
                for i in 0..prim.arity() {
                    let arg = self.stack.peek(i)?;
                    args.push(arg.as_literal().ok_or_else(|| {
                        Error::trap(format!("`{}` applied to {}", prim.name(), arg))
                    })?);
                }

                self.acc = prim.apply(&args, self.steps)?.into();
                self.stack.pop_n(prim.arity())?;
                self.return_to_caller()
            }

            other => Err(Error::trap(format!("{} is not a procedure", other))),
        }
    }

    /// Pop the call footer and restore the caller's registers.
    fn return_to_caller(&mut self) -> Result<()> {
        match self.stack.pop()? {
            Value::CodeAddr(addr) => self.pc = addr,
            other => return Err(Error::trap(format!("expected return address, got {}", other))),
        }

        match self.stack.pop()? {
            Value::StackAddr(fp) => self.fp = fp,
            other => return Err(Error::trap(format!("expected frame pointer, got {}", other))),
        }

        match self.stack.pop()? {
            Value::Closure(cl) => self.cl = cl,
            other => return Err(Error::trap(format!("expected closure, got {}", other))),
        }

        Ok(())
    }

    /// Step until the machine halts and return the accumulator.
    pub fn run(&mut self) -> Result<Value> {
        while self.step()? {}

        log::debug!(
            target: "mbl::vm",
            "halted after {} steps, stack high water {}",
            self.steps,
            self.stack.high_water()
        );

        Ok(self.acc.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expr::Literal;
    use indexmap::IndexMap;

    fn program(code: Vec<Inst<usize>>) -> Program {
        Program {
            code,
            entries: IndexMap::new(),
        }
    }

    #[test]
    fn halt_keeps_accumulator() {
        let mut vm = Vm::new(program(vec![Inst::Constant(Literal::Int(4)), Inst::Halt]));
        assert_eq!(vm.step(), Ok(true));
        assert_eq!(vm.step(), Ok(false));
        assert_eq!(vm.step(), Ok(false));
        assert!(vm.is_halted());
        assert_eq!(vm.acc(), &Value::Int(4));
    }

    #[test]
    fn primitive_call_returns_immediately() {
        // (- 7 2)
        let code = vec![
            Inst::Frame(7),
            Inst::Constant(Literal::Int(2)),
            Inst::Argument,
            Inst::Constant(Literal::Int(7)),
            Inst::Argument,
            Inst::ReferGlobal(Primitive::Sub.index()),
            Inst::Apply,
            Inst::Halt,
        ];

        let mut vm = Vm::new(program(code));
        assert_eq!(vm.run(), Ok(Value::Int(5)));
        assert!(vm.stack().is_empty());
        assert_eq!(vm.stack().high_water(), 5);
    }

    #[test]
    fn time_reads_the_step_counter() {
        let code = vec![
            Inst::Frame(3),
            Inst::ReferGlobal(Primitive::Time.index()),
            Inst::Apply,
            Inst::Halt,
        ];

        let mut vm = Vm::new(program(code));
        assert_eq!(vm.run(), Ok(Value::Int(2)));
        assert_eq!(vm.steps(), 4);
    }

    #[test]
    fn closure_call_and_return() {
        // ((lambda (x) x) 9), body at 7
        let code = vec![
            Inst::Frame(5),
            Inst::Constant(Literal::Int(9)),
            Inst::Argument,
            Inst::Close(0, 7),
            Inst::Apply,
            Inst::Halt,
            Inst::Halt,
            Inst::ReferLocal(0),
            Inst::Return(1),
        ];

        let mut vm = Vm::new(program(code));
        assert_eq!(vm.run(), Ok(Value::Int(9)));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn traps() {
        let mut vm = Vm::new(program(vec![Inst::Constant(Literal::Int(1)), Inst::Apply]));
        assert!(matches!(vm.run(), Err(Error::Trap(_))));

        let mut vm = Vm::new(program(vec![Inst::ReferLocal(0), Inst::Halt]));
        assert!(matches!(vm.run(), Err(Error::Trap(_))));

        let mut vm = Vm::with_step_limit(program(vec![Inst::Jmp(0)]), 100);
        assert!(matches!(vm.run(), Err(Error::Trap(_))));
        assert_eq!(vm.steps(), 100);
    }
}
