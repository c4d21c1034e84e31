//! Exceptions, interrupts and the controller that vectors them.
//!
//! A fault detected while executing an instruction is latched as a
//! `PendingFault`; the instruction is abandoned. At the top of the next
//! step the controller consumes it: Cause, EPC, BadVAddr and Status.EXL are
//! updated and the PC jumps to the vector. Interrupts are checked at the
//! same point, after faults, and are coalesced into a single exception.

use log::trace;
use serde::{Deserialize, Serialize};

use super::cop0::{Cop0, CAUSE_BD, STATUS_BEV, STATUS_ERL, STATUS_EXL};
use super::instr::sign_extend;

pub const RESET_VECTOR: u32 = 0xbfc0_0000;
const VECTOR_BASE: u32 = 0x8000_0000;
const VECTOR_BASE_BEV: u32 = 0xbfc0_0200;
const GENERAL_OFFSET: u32 = 0x180;

/// Architectural exceptions. None of these is an error of the emulator:
/// they are how the guest is told something happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exception {
    Interrupt,
    /// Store to a page whose dirty bit is clear.
    TlbModified(u32),
    /// No TLB entry matched. Uses the refill vector.
    TlbMiss { vaddr: u32, store: bool },
    /// The matching entry's page is not valid.
    TlbInvalid { vaddr: u32, store: bool },
    /// Misaligned access, or a segment the current mode can't use.
    AddressError { vaddr: u32, store: bool },
    Syscall,
    Breakpoint,
    ReservedInstruction,
    CoprocessorUnusable(u8),
    Overflow,
    Trap,
    Reset,
}

impl Exception {
    /// Cause.ExcCode.
    pub fn code(&self) -> u32 {
        match self {
            Exception::Interrupt => 0,
            Exception::TlbModified(_) => 1,
            Exception::TlbMiss { store: false, .. } | Exception::TlbInvalid { store: false, .. } => 2,
            Exception::TlbMiss { store: true, .. } | Exception::TlbInvalid { store: true, .. } => 3,
            Exception::AddressError { store: false, .. } => 4,
            Exception::AddressError { store: true, .. } => 5,
            Exception::Syscall => 8,
            Exception::Breakpoint => 9,
            Exception::ReservedInstruction => 10,
            Exception::CoprocessorUnusable(_) => 11,
            Exception::Overflow => 12,
            Exception::Trap => 13,
            // Reset has no code of its own; it never goes through Cause
            Exception::Reset => 0,
        }
    }

    /// The address that goes to BadVAddr, if any.
    pub fn bad_vaddr(&self) -> Option<u32> {
        match *self {
            Exception::TlbModified(vaddr)
            | Exception::TlbMiss { vaddr, .. }
            | Exception::TlbInvalid { vaddr, .. }
            | Exception::AddressError { vaddr, .. } => Some(vaddr),
            _ => None,
        }
    }

    pub fn is_tlb(&self) -> bool {
        matches!(
            self,
            Exception::TlbModified(_) | Exception::TlbMiss { .. } | Exception::TlbInvalid { .. }
        )
    }

    pub fn coprocessor(&self) -> u8 {
        match self {
            Exception::CoprocessorUnusable(unit) => *unit,
            _ => 0,
        }
    }
}

/// The 8 interrupt lines, in Cause.IP order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Interrupt {
    Software0 = 0,
    Software1 = 1,
    /// The RCP, through the MIPS interface.
    Rcp = 2,
    Cartridge = 3,
    /// The reset button (pre-NMI).
    Reset = 4,
    ReadRdb = 5,
    WriteRdb = 6,
    /// Count == Compare.
    Timer = 7,
}

impl Interrupt {
    pub fn line(self) -> u8 {
        self as u8
    }
}

/// A fault waiting to be serviced at the top of the next step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFault {
    pub exception: Exception,
    /// Address of the faulting instruction, or of the branch before it
    /// when `delay_slot` is set.
    pub pc: u32,
    pub delay_slot: bool,
}

/// Where the controller stands between two steps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Normal,
    ExceptionPending,
    /// Status.EXL or Status.ERL is set.
    InHandler,
}

/// Vector for `exception` given the Status value at the time it is taken.
pub fn vector(exception: &Exception, status: u32) -> u32 {
    if let Exception::Reset = exception {
        return RESET_VECTOR;
    }

    let base = if status & STATUS_BEV != 0 {
        VECTOR_BASE_BEV
    } else {
        VECTOR_BASE
    };

    // Refill has its own vector only when not already handling an exception
    let refill = matches!(exception, Exception::TlbMiss { .. }) && status & STATUS_EXL == 0;
    if refill {
        base
    } else {
        base + GENERAL_OFFSET
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pending: Option<PendingFault>,
}

impl Controller {
    pub fn new() -> Controller {
        Controller { pending: None }
    }

    /// Latches a fault. At most one fault exists per step, since the
    /// faulting instruction is abandoned as soon as it raises one.
    pub fn raise(&mut self, fault: PendingFault) {
        assert!(
            self.pending.is_none(),
            "fault {:?} raised while {:?} is still pending",
            fault,
            self.pending
        );
        self.pending = Some(fault);
    }

    pub fn pending(&self) -> Option<&PendingFault> {
        self.pending.as_ref()
    }

    pub fn state(&self, cop0: &Cop0) -> State {
        if self.pending.is_some() {
            State::ExceptionPending
        } else if cop0.status & (STATUS_EXL | STATUS_ERL) != 0 {
            State::InHandler
        } else {
            State::Normal
        }
    }

    /// Consumes the pending fault, if any, and returns the PC to resume at.
    pub fn service(&mut self, cop0: &mut Cop0) -> Option<u32> {
        let fault = self.pending.take()?;
        Some(enter(cop0, &fault))
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// Takes `fault`: updates COP0 and returns the vector. The caller
/// recomputes the operating context, since EXL is now set.
pub fn enter(cop0: &mut Cop0, fault: &PendingFault) -> u32 {
    let exception = &fault.exception;
    let target = vector(exception, cop0.status);

    if let Exception::Reset = exception {
        cop0.error_epc = sign_extend(fault.pc as u64, 32);
        cop0.status = (cop0.status | STATUS_ERL | STATUS_BEV) & !(STATUS_EXL);
        return target;
    }

    cop0.set_exception_code(exception.code(), exception.coprocessor());

    if exception.is_tlb() {
        if let Some(vaddr) = exception.bad_vaddr() {
            cop0.record_tlb_fault(vaddr);
        }
    } else if let Some(vaddr) = exception.bad_vaddr() {
        cop0.bad_vaddr = sign_extend(vaddr as u64, 32);
    }

    // A nested exception keeps the first EPC and BD
    if cop0.status & STATUS_EXL == 0 {
        cop0.epc = sign_extend(fault.pc as u64, 32);
        if fault.delay_slot {
            cop0.cause |= CAUSE_BD;
        } else {
            cop0.cause &= !CAUSE_BD;
        }
    }
    cop0.status |= STATUS_EXL;

    trace!(
        "exception {:?} (code {}) at {:#010x}{}, vector {:#010x}",
        exception,
        exception.code(),
        fault.pc,
        if fault.delay_slot { " (delay slot)" } else { "" },
        target
    );

    target
}
