use super::value::Value;
use crate::{Error, Result};

/// Value stack.
///
/// Frame layout (the stack grows up):
///
/// ```text
/// | ...                            |
/// +================================+
/// | Caller closure                 |    pushed by `frame`, absent for tail calls
/// +--------------------------------+
/// | Caller frame pointer           |
/// +--------------------------------+
/// | Return address                 |
/// +================================+
/// | Argument N - 1                 |    arguments are pushed last to first
/// +--------------------------------+
/// | ...                            |
/// +--------------------------------+
/// | Argument 0                     |    local 0 = values[fp - 1]
/// +================================+ <- fp
/// | Temporary slot 0               |    values[fp + 0]
/// +--------------------------------+
/// | ...                            |
/// ```
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
    high_water: usize,
}

fn underflow(what: &str) -> Error {
    Error::trap(format!("stack underflow ({})", what))
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest height the stack ever reached.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
        self.high_water = self.high_water.max(self.values.len());
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or_else(|| underflow("pop"))
    }

    /// Drop the top `n` values.
    pub fn pop_n(&mut self, n: usize) -> Result<()> {
        let len = self.len().checked_sub(n).ok_or_else(|| underflow("pop"))?;
        self.values.truncate(len);
        Ok(())
    }

    /// Remove the top `n` values and return them in push order.
    pub fn take_top(&mut self, n: usize) -> Result<Vec<Value>> {
        let at = self.len().checked_sub(n).ok_or_else(|| underflow("close"))?;
        Ok(self.values.split_off(at))
    }

    /// `i`-th value from the top, `0` being the top.
    pub fn peek(&self, i: usize) -> Result<&Value> {
        self.len()
            .checked_sub(i + 1)
            .and_then(|at| self.values.get(at))
            .ok_or_else(|| underflow("peek"))
    }

    pub fn local(&self, fp: usize, i: usize) -> Result<&Value> {
        fp.checked_sub(i + 1)
            .and_then(|at| self.values.get(at))
            .ok_or_else(|| Error::trap(format!("no local {} below frame {}", i, fp)))
    }

    pub fn temp(&self, fp: usize, slot: usize) -> Result<&Value> {
        self.values
            .get(fp + slot)
            .ok_or_else(|| Error::trap(format!("no temporary {} above frame {}", slot, fp)))
    }

    /// Move the top `n` values down by `m` cells, discarding the `m` values they land on.
    pub fn shift(&mut self, n: usize, m: usize) -> Result<()> {
        let len = self.len();
        if n + m > len {
            return Err(underflow("shift"));
        }

        self.values.drain(len - n - m..len - n);
        Ok(())
    }
}
