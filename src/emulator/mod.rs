//! Esse módulo encapsula o core do emulador: a CPU VR4300 do console.
//!
//! Leaf-first: `regs` and `context` hold the architectural state, `tlb` and
//! `mmu` translate addresses, `instr` decodes, `pipeline` and `cpu` step
//! instructions, and `exception` vectors faults and interrupts.

pub mod context;
pub mod cop0;
pub mod cpu;
pub mod exception;
pub mod instr;
pub mod memory;
pub mod mmu;
pub mod pipeline;
pub mod regs;
pub mod reporter;
pub mod snapshot;
pub mod stats;
pub mod tlb;

use serde::{Deserialize, Serialize};

// Re-exports pra ficar melhor de usar ao longo do código
pub use context::{Context, Mode, Segment};
pub use cop0::Cop0;
pub use cpu::{Config, Cpu};
pub use exception::{Exception, Interrupt, PendingFault};
pub use instr::Instruction;
pub use memory::{Memory, Ram, Width};
pub use snapshot::Snapshot;
pub use tlb::{Tlb, TlbEntry};

/// Mais uma vez usamos o `newtype`. Essa struct não é um registrador em si
/// (vide `regs.rs`), mas um *índice* para um registrador.
///
/// Esse idiom é útil aqui para podermos implementar os aliases dos
/// registradores para o disassemble.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register(pub u32);

impl Register {
    pub const ZERO: Register = Register(0);
    pub const RA: Register = Register(31);

    /// Extracts a 5-bit register field starting at `shift`.
    pub fn field(word: u32, shift: u32) -> Register {
        Register((word >> shift) & 31)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "$zero"),
            1 => write!(f, "$at"),
            2..=3 => write!(f, "$v{}", self.0 - 2),
            4..=7 => write!(f, "$a{}", self.0 - 4),
            8..=15 => write!(f, "$t{}", self.0 - 8),
            16..=23 => write!(f, "$s{}", self.0 - 16),
            24..=25 => write!(f, "$t{}", self.0 - 24 + 8),
            26..=27 => write!(f, "$k{}", self.0 - 26),
            28 => write!(f, "$gp"),
            29 => write!(f, "$sp"),
            30 => write!(f, "$fp"),
            31 => write!(f, "$ra"),
            _ => write!(f, "$!!!"),
        }
    }
}

/// Um índice para um registrador de ponto flutuante.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatRegister(pub u32);

impl std::convert::From<Register> for FloatRegister {
    fn from(reg: Register) -> Self {
        FloatRegister(reg.0)
    }
}

impl std::fmt::Display for FloatRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$f{}", self.0)
    }
}
