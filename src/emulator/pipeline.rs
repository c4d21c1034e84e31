//! Control-flow and timing state carried between steps.
//!
//! The core isn't a five-stage model. What survives from one instruction
//! to the next is the PC, whether the next instruction sits in a branch
//! delay slot, and the result of a load that hasn't been written back yet.

use serde::{Deserialize, Serialize};

use super::instr::Instruction;
use super::Register;

/// Cycles charged for taking an exception or interrupt.
pub const EXCEPTION_COST: u32 = 2;

/// Extra cycle when an instruction reads a register a load hasn't
/// written yet.
pub const LOAD_USE_STALL: u32 = 1;

/// Delay-slot bookkeeping for the instruction at `pc`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branch {
    None,
    /// The instruction at `pc` is a delay slot; the branch before it
    /// was taken to this target.
    Delay(u32),
}

/// How an instruction wants the PC to move.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Next {
    Sequential,
    /// Taken branch: run the delay slot, then go to the target.
    Branch(u32),
    /// Branch-likely not taken: the delay slot is skipped.
    Nullify,
    /// Immediate transfer with no delay slot (ERET).
    Jump(u32),
}

/// A load result waiting for write back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadShadow {
    pub reg: Register,
    pub value: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pc: u32,
    branch: Branch,
    load: Option<LoadShadow>,
}

impl Pipeline {
    pub fn new(pc: u32) -> Pipeline {
        Pipeline {
            pc,
            branch: Branch::None,
            load: None,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    pub fn in_delay_slot(&self) -> bool {
        matches!(self.branch, Branch::Delay(_))
    }

    /// The PC an exception taken now must return to: the branch when the
    /// current instruction is a delay slot.
    pub fn epc(&self) -> u32 {
        if self.in_delay_slot() {
            self.pc.wrapping_sub(4)
        } else {
            self.pc
        }
    }

    /// Moves past the instruction at `pc`.
    pub fn retire(&mut self, next: Next) {
        let (pc, branch) = match (next, self.branch) {
            (Next::Sequential, Branch::Delay(target)) => (target, Branch::None),
            (Next::Sequential, Branch::None) => (self.pc.wrapping_add(4), Branch::None),
            // a branch in a delay slot is undefined; the newer one wins
            (Next::Branch(target), _) => (self.pc.wrapping_add(4), Branch::Delay(target)),
            (Next::Nullify, _) => (self.pc.wrapping_add(8), Branch::None),
            (Next::Jump(target), _) => (target, Branch::None),
        };

        self.pc = pc;
        self.branch = branch;
    }

    /// Abandons any branch in flight and continues at `pc`.
    pub fn redirect(&mut self, pc: u32) {
        self.pc = pc;
        self.branch = Branch::None;
    }

    pub fn load(&self) -> Option<&LoadShadow> {
        self.load.as_ref()
    }

    pub fn take_load(&mut self) -> Option<LoadShadow> {
        self.load.take()
    }

    pub fn set_load(&mut self, reg: Register, value: u64) {
        // loads into $zero leave nothing to write back
        self.load = if reg == Register::ZERO {
            None
        } else {
            Some(LoadShadow { reg, value })
        };
    }

    /// Restores latches from a snapshot.
    pub(crate) fn restore(pc: u32, branch: Branch, load: Option<LoadShadow>) -> Pipeline {
        Pipeline { pc, branch, load }
    }
}

/// Advisory cycle cost of an instruction, stalls and exceptions excluded.
pub fn cost(instr: &Instruction) -> u32 {
    use super::instr::Format;
    use Instruction::*;

    if instr.memory_width().is_some() {
        return 2;
    }

    let double = |a: &super::instr::FRArgs| a.fmt == Format::D;

    match instr {
        MULT(_) | MULTU(_) => 5,
        DMULT(_) | DMULTU(_) => 8,
        DIV(_) | DIVU(_) => 37,
        DDIV(_) | DDIVU(_) => 69,

        FADD(_) | FSUB(_) => 3,
        FMUL(a) => {
            if double(a) {
                8
            } else {
                5
            }
        }
        FDIV(a) | FSQRT(a) => {
            if double(a) {
                58
            } else {
                29
            }
        }
        ROUND_L(_) | TRUNC_L(_) | CEIL_L(_) | FLOOR_L(_) | ROUND_W(_) | TRUNC_W(_)
        | CEIL_W(_) | FLOOR_W(_) | CVT_W(_) | CVT_L(_) => 5,
        CVT_S(a) | CVT_D(a) => match a.fmt {
            Format::W | Format::L => 5,
            _ => 2,
        },
        _ => 1,
    }
}
