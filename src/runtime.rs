//! Runtime: values, the value stack and the virtual machine executing resolved programs.

pub mod stack;
pub mod value;
pub mod vm;
