//! Coprocessor 0: exception and interrupt handling, memory
//! management settings and the Count/Compare timer.
//!
//! Instead of hardcoding the coprocessor registers in the CPU struct,
//! everything lives here. The TLB is owned by COP0 too, since the
//! Index/Random/Wired/EntryHi/EntryLo/PageMask registers are its only
//! interface.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::context::Mode;
use super::instr::sign_extend;
use super::tlb::{Tlb, PAGE_MASK_BITS};

pub const STATUS_IE: u32 = 1 << 0;
pub const STATUS_EXL: u32 = 1 << 1;
pub const STATUS_ERL: u32 = 1 << 2;
pub const STATUS_KSU_SHIFT: u32 = 3;
pub const STATUS_KSU_MASK: u32 = 0b11;
pub const STATUS_IM_SHIFT: u32 = 8;
pub const STATUS_BEV: u32 = 1 << 22;
pub const STATUS_FR: u32 = 1 << 26;
pub const STATUS_CU0: u32 = 1 << 28;
pub const STATUS_CU1: u32 = 1 << 29;

pub const CAUSE_BD: u32 = 1 << 31;
pub const CAUSE_CE_SHIFT: u32 = 28;
pub const CAUSE_IP_SHIFT: u32 = 8;
pub const CAUSE_EXC_SHIFT: u32 = 2;
const CAUSE_EXC_MASK: u32 = 0x1f << CAUSE_EXC_SHIFT;
/// Only the two software interrupt bits are writable by MTC0.
const CAUSE_WRITABLE: u32 = 0b11 << CAUSE_IP_SHIFT;

/// Index.P, set by TLBP when no entry matches.
pub const INDEX_PROBE_FAILURE: u32 = 1 << 31;

const ENTRY_HI_MASK: u64 = 0xc000_00ff_ffff_e0ff;
const ENTRY_LO_MASK: u64 = 0x3fff_ffff;
const CONFIG_WRITABLE: u32 = 0x0f00_800f;
/// Bits 23 and 19 read as zero, TS (bit 21) is set only by a TLB shutdown.
const STATUS_WRITABLE: u32 = 0xff57_ffff;

/// Implementation 0x0b (VR4300), revision 2.2.
pub const PRID: u32 = 0x0000_0b22;
const CONFIG_RESET: u32 = 0x7006_e463;

/// Register numbers, as used by MFC0/MTC0.
pub mod reg {
    pub const INDEX: u32 = 0;
    pub const RANDOM: u32 = 1;
    pub const ENTRY_LO0: u32 = 2;
    pub const ENTRY_LO1: u32 = 3;
    pub const CONTEXT: u32 = 4;
    pub const PAGE_MASK: u32 = 5;
    pub const WIRED: u32 = 6;
    pub const BAD_VADDR: u32 = 8;
    pub const COUNT: u32 = 9;
    pub const ENTRY_HI: u32 = 10;
    pub const COMPARE: u32 = 11;
    pub const STATUS: u32 = 12;
    pub const CAUSE: u32 = 13;
    pub const EPC: u32 = 14;
    pub const PRID: u32 = 15;
    pub const CONFIG: u32 = 16;
    pub const LL_ADDR: u32 = 17;
    pub const WATCH_LO: u32 = 18;
    pub const WATCH_HI: u32 = 19;
    pub const X_CONTEXT: u32 = 20;
    pub const PARITY_ERROR: u32 = 26;
    pub const CACHE_ERROR: u32 = 27;
    pub const TAG_LO: u32 = 28;
    pub const TAG_HI: u32 = 29;
    pub const ERROR_EPC: u32 = 30;
}

/// Coprocessor 0.
///
/// The register names and descriptions are from the VR4300 user's manual.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cop0 {
    /// Index into the TLB array, plus the probe failure bit.
    /// (n) = (0)
    pub index: u32,
    /// Low-order portion of the TLB entry for even-numbered
    /// virtual pages.
    /// (n) = (2)
    pub entry_lo0: u64,
    /// Low-order portion of the TLB entry for odd-numbered
    /// virtual pages.
    /// (n) = (3)
    pub entry_lo1: u64,
    /// Pointer to page table entry in memory.
    /// (n) = (4)
    pub context: u64,
    /// Control for variable page sizes in TLB entries.
    /// (n) = (5)
    pub page_mask: u32,
    /// Reports the address for the most recent address-related
    /// exception.
    /// (n) = (8)
    pub bad_vaddr: u64,
    /// Processor cycle count, incremented every other cycle.
    /// (n) = (9)
    pub count: u32,
    /// High-order portion of the TLB entry.
    /// (n) = (10)
    pub entry_hi: u64,
    /// Timer interrupt control.
    /// (n) = (11)
    pub compare: u32,
    /// Processor status and control.
    /// (n) = (12)
    pub status: u32,
    /// Cause of last general exception, and the interrupt lines.
    /// (n) = (13)
    pub cause: u32,
    /// Program counter at last exception.
    /// (n) = (14)
    pub epc: u64,
    /// Configuration register.
    /// (n) = (16)
    pub config: u32,
    /// Load linked address.
    /// (n) = (17)
    pub ll_addr: u32,
    /// Watchpoint address.
    /// (n) = (18)
    pub watch_lo: u32,
    /// Watchpoint control.
    /// (n) = (19)
    pub watch_hi: u32,
    /// Pointer to page table entry, 64-bit addressing.
    /// (n) = (20)
    pub x_context: u64,
    /// Parity error register.
    /// (n) = (26)
    pub parity_error: u32,
    /// Low-order portion of cache tag interface.
    /// (n) = (28)
    pub tag_lo: u32,
    /// High-order portion of cache tag interface.
    /// (n) = (29)
    pub tag_hi: u32,
    /// Program counter at last error.
    /// (n) = (30)
    pub error_epc: u64,

    /// Random (n = 1) and Wired (n = 6) live here.
    pub tlb: Tlb,

    /// Count runs at half the pipeline clock; this is the odd cycle.
    count_phase: bool,
}

impl Cop0 {
    pub fn new() -> Cop0 {
        Cop0 {
            index: 0,
            entry_lo0: 0,
            entry_lo1: 0,
            context: 0,
            page_mask: 0,
            bad_vaddr: 0,
            count: 0,
            entry_hi: 0,
            compare: 0,
            status: STATUS_ERL | STATUS_BEV,
            cause: 0,
            epc: 0,
            config: CONFIG_RESET,
            ll_addr: 0,
            watch_lo: 0,
            watch_hi: 0,
            x_context: 0,
            parity_error: 0,
            tag_lo: 0,
            tag_hi: 0,
            error_epc: 0,
            tlb: Tlb::new(),
            count_phase: false,
        }
    }

    /// DMFC0. MFC0 uses the low 32 bits, sign extended.
    pub fn read_reg(&self, n: u32) -> u64 {
        debug!("read reg {}", n);

        match n {
            reg::INDEX => self.index as u64,
            reg::RANDOM => self.tlb.random() as u64,
            reg::ENTRY_LO0 => self.entry_lo0,
            reg::ENTRY_LO1 => self.entry_lo1,
            reg::CONTEXT => self.context,
            reg::PAGE_MASK => self.page_mask as u64,
            reg::WIRED => self.tlb.wired() as u64,
            reg::BAD_VADDR => self.bad_vaddr,
            reg::COUNT => self.count as u64,
            reg::ENTRY_HI => self.entry_hi,
            reg::COMPARE => self.compare as u64,
            reg::STATUS => self.status as u64,
            reg::CAUSE => self.cause as u64,
            reg::EPC => self.epc,
            reg::PRID => PRID as u64,
            reg::CONFIG => self.config as u64,
            reg::LL_ADDR => self.ll_addr as u64,
            reg::WATCH_LO => self.watch_lo as u64,
            reg::WATCH_HI => self.watch_hi as u64,
            reg::X_CONTEXT => self.x_context,
            reg::PARITY_ERROR => self.parity_error as u64,
            reg::CACHE_ERROR => 0,
            reg::TAG_LO => self.tag_lo as u64,
            reg::TAG_HI => self.tag_hi as u64,
            reg::ERROR_EPC => self.error_epc,
            _ => {
                debug!("read of unimplemented reg {}", n);
                0
            }
        }
    }

    /// DMTC0. MTC0 passes the sign-extended 32-bit value.
    pub fn write_reg(&mut self, n: u32, val: u64) {
        debug!("write {:#x} to reg {}", val, n);

        match n {
            reg::INDEX => self.index = val as u32 & 0x8000_003f,
            reg::RANDOM => warn!("write to read-only Random ignored"),
            reg::ENTRY_LO0 => self.entry_lo0 = val & ENTRY_LO_MASK,
            reg::ENTRY_LO1 => self.entry_lo1 = val & ENTRY_LO_MASK,
            // BadVPN2 is read-only, only PTEBase is written
            reg::CONTEXT => {
                self.context = (self.context & 0x007f_fff0) | (val & !0x007f_ffff);
            }
            reg::PAGE_MASK => self.page_mask = val as u32 & PAGE_MASK_BITS,
            reg::WIRED => self.tlb.set_wired(val as u32),
            reg::BAD_VADDR => warn!("write to read-only BadVAddr ignored"),
            reg::COUNT => self.count = val as u32,
            reg::ENTRY_HI => self.entry_hi = val & ENTRY_HI_MASK,
            reg::COMPARE => {
                self.compare = val as u32;
                self.set_line(7, false);
            }
            reg::STATUS => self.status = val as u32 & STATUS_WRITABLE,
            reg::CAUSE => {
                self.cause = (self.cause & !CAUSE_WRITABLE) | (val as u32 & CAUSE_WRITABLE);
            }
            reg::EPC => self.epc = val,
            reg::PRID => warn!("write to read-only PRId ignored"),
            reg::CONFIG => {
                self.config = (self.config & !CONFIG_WRITABLE) | (val as u32 & CONFIG_WRITABLE);
            }
            reg::LL_ADDR => self.ll_addr = val as u32,
            reg::WATCH_LO => self.watch_lo = val as u32,
            reg::WATCH_HI => self.watch_hi = val as u32,
            reg::X_CONTEXT => {
                self.x_context = (self.x_context & 0x1_ffff_fff0) | (val & !0x1_ffff_ffff);
            }
            reg::PARITY_ERROR => self.parity_error = val as u32 & 0xff,
            reg::CACHE_ERROR => {}
            reg::TAG_LO => self.tag_lo = val as u32 & 0x0fff_ffc0,
            reg::TAG_HI => self.tag_hi = val as u32,
            reg::ERROR_EPC => self.error_epc = val,
            _ => debug!("write to unimplemented reg {} ignored", n),
        }
    }

    /// Effective operating mode.
    pub fn mode(&self) -> Mode {
        Mode::from_status(self.status)
    }

    /// Current address space ID, from EntryHi.
    pub fn asid(&self) -> u8 {
        self.entry_hi as u8
    }

    pub fn fr(&self) -> bool {
        self.status & STATUS_FR != 0
    }

    /// Whether coprocessor `unit` may be used in the current mode. COP0 is
    /// always usable in kernel mode.
    pub fn usable(&self, unit: u8) -> bool {
        let cu = self.status & (1 << (28 + unit as u32)) != 0;
        cu || (unit == 0 && self.mode() == Mode::Kernel)
    }

    /// Asserts or clears interrupt line `line` (Cause.IP bit).
    pub fn set_line(&mut self, line: u8, asserted: bool) {
        let bit = 1 << (CAUSE_IP_SHIFT + line as u32);
        if asserted {
            self.cause |= bit;
        } else {
            self.cause &= !bit;
        }
    }

    /// Cause.IP, one bit per asserted line.
    pub fn lines(&self) -> u8 {
        (self.cause >> CAUSE_IP_SHIFT) as u8
    }

    /// Whether the asserted, unmasked lines would interrupt right now.
    /// Needs IE set and both EXL and ERL clear.
    pub fn interrupt_pending(&self) -> bool {
        let enabled = self.status & (STATUS_IE | STATUS_EXL | STATUS_ERL) == STATUS_IE;
        let mask = (self.status >> STATUS_IM_SHIFT) as u8;
        enabled && self.lines() & mask != 0
    }

    /// Records the exception code and coprocessor number in Cause.
    pub fn set_exception_code(&mut self, code: u32, coprocessor: u8) {
        self.cause &= !(CAUSE_EXC_MASK | (0b11 << CAUSE_CE_SHIFT));
        self.cause |= (code << CAUSE_EXC_SHIFT) & CAUSE_EXC_MASK;
        self.cause |= (coprocessor as u32 & 0b11) << CAUSE_CE_SHIFT;
    }

    pub fn exception_code(&self) -> u32 {
        (self.cause & CAUSE_EXC_MASK) >> CAUSE_EXC_SHIFT
    }

    /// Loads BadVAddr, Context.BadVPN2, XContext.BadVPN2 and EntryHi.VPN2
    /// after a TLB fault on `vaddr`.
    pub fn record_tlb_fault(&mut self, vaddr: u32) {
        let vaddr64 = sign_extend(vaddr as u64, 32);
        let vpn2 = (vaddr >> 13) as u64;

        self.bad_vaddr = vaddr64;
        self.context = (self.context & !0x007f_fff0) | ((vpn2 << 4) & 0x007f_fff0);
        self.x_context = (self.x_context & !0x1_ffff_fff0) | ((vpn2 << 4) & 0x7_ffff_fff0);
        self.entry_hi = (vaddr64 & 0xffff_ffff_ffff_e000) & ENTRY_HI_MASK | self.asid() as u64;
    }

    /// Advances Count by `cycles` pipeline cycles, raising the timer line
    /// when Count reaches Compare.
    pub fn advance_count(&mut self, cycles: u32) {
        let total = cycles as u64 + self.count_phase as u64;
        let ticks = (total / 2) as u32;
        self.count_phase = total % 2 == 1;

        if ticks == 0 {
            return;
        }

        let old = self.count;
        self.count = self.count.wrapping_add(ticks);

        let distance = self.compare.wrapping_sub(old);
        if distance != 0 && distance <= ticks {
            debug!("timer: count reached compare {:#x}", self.compare);
            self.set_line(7, true);
        }
    }
}

impl Default for Cop0 {
    fn default() -> Self {
        Cop0::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_state() {
        let cop0 = Cop0::new();
        assert_eq!(cop0.status, STATUS_ERL | STATUS_BEV);
        assert_eq!(cop0.mode(), Mode::Kernel);
        assert_eq!(cop0.read_reg(reg::RANDOM), 31);
        assert_eq!(cop0.read_reg(reg::PRID), PRID as u64);
    }

    #[test]
    fn status_drops_hardwired_bits() {
        let mut cop0 = Cop0::new();
        cop0.write_reg(reg::STATUS, 0xffff_ffff);

        assert_eq!(cop0.read_reg(reg::STATUS), 0xff57_ffff);
        assert_eq!(cop0.status & (1 << 23 | 1 << 21 | 1 << 19), 0);
        assert!(cop0.fr());
    }

    #[test]
    fn only_software_lines_are_writable_in_cause() {
        let mut cop0 = Cop0::new();
        cop0.set_line(2, true);
        cop0.write_reg(reg::CAUSE, 0xffff_ffff);

        assert_eq!(cop0.lines(), 0b0000_0111);
        assert_eq!(cop0.exception_code(), 0);

        cop0.write_reg(reg::CAUSE, 0);
        assert_eq!(cop0.lines(), 0b0000_0100);
    }

    #[test]
    fn wired_write_resets_random() {
        let mut cop0 = Cop0::new();
        cop0.tlb.tick();
        cop0.tlb.tick();
        assert_eq!(cop0.read_reg(reg::RANDOM), 29);

        cop0.write_reg(reg::WIRED, 10);
        assert_eq!(cop0.read_reg(reg::WIRED), 10);
        assert_eq!(cop0.read_reg(reg::RANDOM), 31);
    }

    #[test]
    fn interrupt_needs_ie_and_no_exception_level() {
        let mut cop0 = Cop0::new();
        cop0.set_line(3, true);
        cop0.status = 1 << (STATUS_IM_SHIFT + 3);
        assert!(!cop0.interrupt_pending());

        cop0.status |= STATUS_IE;
        assert!(cop0.interrupt_pending());

        cop0.status |= STATUS_EXL;
        assert!(!cop0.interrupt_pending());

        cop0.status &= !STATUS_EXL;
        cop0.status &= !(1 << (STATUS_IM_SHIFT + 3));
        assert!(!cop0.interrupt_pending());
    }

    #[test]
    fn count_runs_at_half_speed_and_fires_timer() {
        let mut cop0 = Cop0::new();
        cop0.write_reg(reg::COMPARE, 10);

        cop0.advance_count(3);
        assert_eq!(cop0.count, 1);
        cop0.advance_count(1);
        assert_eq!(cop0.count, 2);
        assert_eq!(cop0.lines() & 0x80, 0);

        cop0.advance_count(16);
        assert_eq!(cop0.count, 10);
        assert_eq!(cop0.lines() & 0x80, 0x80);

        cop0.write_reg(reg::COMPARE, 100);
        assert_eq!(cop0.lines() & 0x80, 0);
    }

    #[test]
    fn tlb_fault_fills_context_registers() {
        let mut cop0 = Cop0::new();
        cop0.entry_hi = 0x17;
        cop0.write_reg(reg::CONTEXT, 0xffff_ffff_ff80_0000);
        cop0.record_tlb_fault(0x0040_2abc);

        assert_eq!(cop0.bad_vaddr, 0x0040_2abc);
        assert_eq!(cop0.entry_hi, 0x0040_2017);
        assert_eq!(cop0.context, 0xffff_ffff_ff80_0000 | (0x0040_2abc >> 13) << 4);
    }

    #[test]
    fn coprocessor_usability() {
        let mut cop0 = Cop0::new();
        assert!(cop0.usable(0));
        assert!(!cop0.usable(1));

        cop0.status = 2 << STATUS_KSU_SHIFT;
        assert!(!cop0.usable(0));

        cop0.status |= STATUS_CU0 | STATUS_CU1;
        assert!(cop0.usable(0));
        assert!(cop0.usable(1));
    }
}
