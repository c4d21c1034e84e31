//! vr4300: o núcleo de execução da CPU principal do N64.
//!
//! The core is a library; `main.rs` is only a small CLI on top of it.
//! Everything lives in the `emulator` module.

pub mod emulator;

pub use emulator::{Config, Cpu, Exception, Instruction, Interrupt, Memory, Ram, Snapshot, Width};
