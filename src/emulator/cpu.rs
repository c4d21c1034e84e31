//! Implementação da própria CPU: o VR4300.
//!
//! One `step` runs one instruction: pending fault, then interrupts, then
//! fetch, decode and execute. Architectural faults never escape as Rust
//! errors; they are latched and vectored at the top of the next step.

use std::sync::mpsc::Sender;

use color_eyre::eyre::Result;
use log::{debug, trace};

use super::context::Context;
use super::cop0::{Cop0, INDEX_PROBE_FAILURE, STATUS_ERL, STATUS_EXL};
use super::exception::{self, Controller, Exception, Interrupt, PendingFault, State, RESET_VECTOR};
use super::instr::{sign_extend, FRArgs, Format, IArgs, Instruction};
use super::memory::{Memory, Width};
use super::mmu::{self, Access};
use super::pipeline::{self, Next, Pipeline};
use super::regs::{self, Fpu, Registers, Rounding};
use super::reporter::TraceEvent;
use super::snapshot::Snapshot;
use super::stats::Stats;
use super::tlb::TlbEntry;
use super::{FloatRegister, Register};

/// Host-side knobs. None of this is architectural state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Emulate the one-instruction load delay.
    pub load_delay: bool,
    /// Where `new` and `reset` start fetching.
    pub reset_pc: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            load_delay: true,
            reset_pc: RESET_VECTOR,
        }
    }
}

fn sext32(val: u32) -> u64 {
    val as i32 as i64 as u64
}

/// Essa struct encapsula o estado da CPU, assim como a instância da memória.
pub struct Cpu<M: Memory> {
    regs: Registers,
    hi: u64,
    lo: u64,
    fpu: Fpu,
    cop0: Cop0,
    /// Always `Context::from_status(cop0.status)`.
    context: Context,
    pipeline: Pipeline,
    exceptions: Controller,
    /// Set by LL/LLD, cleared by ERET.
    ll_bit: bool,

    config: Config,
    /// A instância da memória ligada a CPU atual.
    mem: M,
    cycles: u64,
    stats: Stats,
    reporter: Option<Sender<TraceEvent>>,
}

impl<M: Memory> Cpu<M> {
    pub fn new(mem: M, config: Config) -> Cpu<M> {
        let cop0 = Cop0::new();
        let context = Context::from_status(cop0.status);

        Cpu {
            regs: Registers::new(),
            hi: 0,
            lo: 0,
            fpu: Fpu::new(),
            cop0,
            context,
            pipeline: Pipeline::new(config.reset_pc),
            exceptions: Controller::new(),
            ll_bit: false,
            config,
            mem,
            cycles: 0,
            stats: Stats::new(),
            reporter: None,
        }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pc(&self) -> u32 {
        self.pipeline.pc()
    }

    /// Continues execution at `pc`, dropping any branch in flight.
    pub fn set_pc(&mut self, pc: u32) {
        self.pipeline.redirect(pc);
    }

    pub fn reg(&self, reg: Register) -> u64 {
        self.regs[reg]
    }

    pub fn set_reg(&mut self, reg: Register, val: u64) {
        self.regs.set(reg, val);
    }

    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn hi(&self) -> u64 {
        self.hi
    }

    pub fn lo(&self) -> u64 {
        self.lo
    }

    pub fn fpu(&self) -> &Fpu {
        &self.fpu
    }

    pub fn cop0(&self) -> &Cop0 {
        &self.cop0
    }

    /// Writes a COP0 register the way MTC0/DMTC0 do, keeping the operating
    /// context in sync with Status.
    pub fn write_cop0(&mut self, n: u32, val: u64) {
        self.cop0.write_reg(n, val);
        self.update_context();
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn exception_state(&self) -> State {
        self.exceptions.state(&self.cop0)
    }

    pub fn pending_fault(&self) -> Option<&PendingFault> {
        self.exceptions.pending()
    }

    pub fn ll_bit(&self) -> bool {
        self.ll_bit
    }

    /// Total cycles charged since power-on.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Sends every retired instruction and taken exception to `tx`.
    pub fn attach_reporter(&mut self, tx: Sender<TraceEvent>) {
        self.reporter = Some(tx);
    }

    /// Asserts an interrupt line. It stays asserted until `lower`.
    pub fn raise(&mut self, line: Interrupt) {
        debug!("interrupt line {:?} raised", line);
        self.cop0.set_line(line.line(), true);
    }

    pub fn lower(&mut self, line: Interrupt) {
        debug!("interrupt line {:?} lowered", line);
        self.cop0.set_line(line.line(), false);
    }

    /// Cold reset. Lines owned by the peripherals stay as they are.
    pub fn reset(&mut self) {
        let pc = self.pipeline.pc();
        let lines = self.cop0.lines();

        self.regs = Registers::new();
        self.hi = 0;
        self.lo = 0;
        self.fpu = Fpu::new();
        self.cop0 = Cop0::new();
        for line in Interrupt::Rcp.line()..Interrupt::Timer.line() {
            self.cop0.set_line(line, lines & (1 << line) != 0);
        }
        self.exceptions.clear();
        self.ll_bit = false;

        let reset = PendingFault {
            exception: Exception::Reset,
            pc,
            delay_slot: false,
        };
        exception::enter(&mut self.cop0, &reset);

        self.pipeline = Pipeline::new(self.config.reset_pc);
        self.update_context();
    }

    /// Runs one instruction and returns the cycles it cost.
    pub fn step(&mut self) -> u32 {
        let mut cycles = 0;

        if let Some(vector) = self.exceptions.service(&mut self.cop0) {
            cycles += self.vector_to(vector);
        } else if self.cop0.interrupt_pending() {
            let fault = PendingFault {
                exception: Exception::Interrupt,
                pc: self.pipeline.epc(),
                delay_slot: self.pipeline.in_delay_slot(),
            };
            let vector = exception::enter(&mut self.cop0, &fault);
            cycles += self.vector_to(vector);
        }

        cycles += self.execute_next();

        self.cop0.advance_count(cycles);
        self.cycles += cycles as u64;
        self.stats.add_cycles(cycles as u64);

        cycles
    }

    /// Steps until at least `budget` cycles are spent. Returns the cycles
    /// actually spent, which may overshoot by one instruction.
    pub fn run(&mut self, budget: u64) -> u64 {
        let mut spent = 0;
        while spent < budget {
            spent += self.step() as u64;
        }
        spent
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: Snapshot::VERSION,
            regs: self.regs.clone(),
            hi: self.hi,
            lo: self.lo,
            pc: self.pipeline.pc(),
            branch: self.pipeline.branch(),
            load: self.pipeline.load().copied(),
            fpu: self.fpu.clone(),
            cop0: self.cop0.clone(),
            mode: self.context.mode(),
            ll_bit: self.ll_bit,
            exceptions: self.exceptions.clone(),
            cycles: self.cycles,
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.regs = snapshot.regs;
        self.hi = snapshot.hi;
        self.lo = snapshot.lo;
        self.pipeline = Pipeline::restore(snapshot.pc, snapshot.branch, snapshot.load);
        self.fpu = snapshot.fpu;
        self.cop0 = snapshot.cop0;
        self.context = Context::new(snapshot.mode);
        self.ll_bit = snapshot.ll_bit;
        self.exceptions = snapshot.exceptions;
        self.cycles = snapshot.cycles;
    }

    pub fn save_state(&self) -> Result<Vec<u8>> {
        self.snapshot().to_bytes()
    }

    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let snapshot = Snapshot::from_bytes(data)?;
        self.restore(snapshot);
        Ok(())
    }

    fn update_context(&mut self) {
        self.context = Context::from_status(self.cop0.status);
    }

    fn report(&self, event: TraceEvent) {
        if let Some(tx) = &self.reporter {
            if tx.send(event).is_err() {
                debug!("trace reporter hung up");
            }
        }
    }

    /// Jumps to an exception vector. COP0 has already been updated.
    fn vector_to(&mut self, vector: u32) -> u32 {
        if let Some(shadow) = self.pipeline.take_load() {
            self.regs.set(shadow.reg, shadow.value);
        }
        self.pipeline.redirect(vector);
        self.update_context();

        self.stats.add_exception(self.cop0.exception_code());
        self.report(TraceEvent::Exception {
            code: self.cop0.exception_code(),
            epc: self.cop0.epc as u32,
            vector,
        });

        pipeline::EXCEPTION_COST
    }

    fn fault(&mut self, exception: Exception) {
        let fault = PendingFault {
            exception,
            pc: self.pipeline.epc(),
            delay_slot: self.pipeline.in_delay_slot(),
        };
        trace!("fault {:?} at {:#010x}", exception, self.pipeline.pc());
        self.exceptions.raise(fault);
    }

    fn execute_next(&mut self) -> u32 {
        let pc = self.pipeline.pc();

        let word = match self.fetch(pc) {
            Ok(word) => word,
            Err(e) => {
                if let Some(shadow) = self.pipeline.take_load() {
                    self.regs.set(shadow.reg, shadow.value);
                }
                self.fault(e);
                return 1;
            }
        };
        let instr = Instruction::decode(word);

        let shadow = self.pipeline.take_load();
        let mut cycles = pipeline::cost(&instr);

        if let Some(shadow) = shadow {
            if instr.reads().contains(shadow.reg) {
                cycles += pipeline::LOAD_USE_STALL;
                self.stats.add_stall(pipeline::LOAD_USE_STALL as u64);
            }
            // partial loads merge with the value still in flight
            let partial = matches!(
                instr,
                Instruction::LWL(_) | Instruction::LWR(_) | Instruction::LDL(_) | Instruction::LDR(_)
            );
            if partial {
                self.regs.set(shadow.reg, shadow.value);
            }
        }

        match self.execute(&instr, pc) {
            Ok(next) => {
                if let Some(shadow) = shadow {
                    // a later write to the same register wins
                    if !instr.writes().contains(shadow.reg) {
                        self.regs.set(shadow.reg, shadow.value);
                    }
                }
                self.pipeline.retire(next);
                self.cop0.tlb.tick();
                self.stats.retire(&instr);
                self.report(TraceEvent::Retire { pc, word });
            }
            Err(e) => {
                if let Some(shadow) = shadow {
                    self.regs.set(shadow.reg, shadow.value);
                }
                self.fault(e);
            }
        }

        cycles
    }

    fn translate(&self, vaddr: u32, access: Access) -> Result<u32, Exception> {
        mmu::translate(&self.context, &self.cop0.tlb, self.cop0.asid(), vaddr, access)
    }

    /// Alignment check, then translation.
    fn physical(&self, vaddr: u32, width: Width, access: Access) -> Result<u32, Exception> {
        mmu::check_alignment(vaddr, width.bytes(), access)?;
        self.translate(vaddr, access)
    }

    fn read_bus(&mut self, paddr: u32, width: Width) -> u64 {
        match self.mem.peek(paddr, width) {
            Some(val) => val,
            None => {
                trace!("open bus read at {:#010x}", paddr);
                0
            }
        }
    }

    fn write_bus(&mut self, paddr: u32, width: Width, val: u64) {
        if !self.mem.poke(paddr, width, val) {
            trace!("write to {:#010x} ignored by the bus", paddr);
        }
    }

    fn fetch(&mut self, pc: u32) -> Result<u32, Exception> {
        let paddr = self.physical(pc, Width::Word, Access::Fetch)?;
        Ok(self.read_bus(paddr, Width::Word) as u32)
    }

    fn load(&mut self, vaddr: u32, width: Width) -> Result<u64, Exception> {
        let paddr = self.physical(vaddr, width, Access::Load)?;
        Ok(self.read_bus(paddr, width))
    }

    fn store(&mut self, vaddr: u32, width: Width, val: u64) -> Result<(), Exception> {
        let paddr = self.physical(vaddr, width, Access::Store)?;
        self.write_bus(paddr, width, val);
        Ok(())
    }

    /// Read-modify-write of the aligned unit around `vaddr`, for the
    /// partial stores.
    fn store_merge(
        &mut self,
        vaddr: u32,
        width: Width,
        merge: impl FnOnce(u64) -> u64,
    ) -> Result<(), Exception> {
        let aligned = vaddr & !(width.bytes() - 1);
        let paddr = self.physical(aligned, width, Access::Store)?;
        let old = self.read_bus(paddr, width);
        self.write_bus(paddr, width, merge(old));
        Ok(())
    }

    fn r(&self, reg: Register) -> u64 {
        self.regs[reg]
    }

    fn set(&mut self, reg: Register, val: u64) {
        self.regs.set(reg, val);
    }

    /// Writes a load result, through the load delay when enabled.
    fn write_load(&mut self, reg: Register, val: u64) {
        if self.config.load_delay {
            self.pipeline.set_load(reg, val);
        } else {
            self.regs.set(reg, val);
        }
    }

    fn address(&self, base: Register, imm: u64) -> u32 {
        self.r(base).wrapping_add(imm) as u32
    }

    fn require_cop(&self, unit: u8) -> Result<(), Exception> {
        if self.cop0.usable(unit) {
            Ok(())
        } else {
            Err(Exception::CoprocessorUnusable(unit))
        }
    }

    fn branch_if(taken: bool, pc: u32, a: &IArgs, likely: bool) -> Next {
        if taken {
            Next::Branch(pc.wrapping_add(4).wrapping_add(a.offset()))
        } else if likely {
            Next::Nullify
        } else {
            Next::Sequential
        }
    }

    fn link(&mut self, pc: u32) {
        self.set(Register::RA, sext32(pc.wrapping_add(8)));
    }

    fn execute(&mut self, instr: &Instruction, pc: u32) -> Result<Next, Exception> {
        use Instruction::*;

        match *instr {
            NOP | SYNC => {}

            SLL(a) => self.set(a.rd, sext32((self.r(a.rt) as u32) << a.shamt)),
            SRL(a) => self.set(a.rd, sext32((self.r(a.rt) as u32) >> a.shamt)),
            SRA(a) => self.set(a.rd, sext32(((self.r(a.rt) as i64) >> a.shamt) as u32)),
            SLLV(a) => {
                let s = self.r(a.rs) & 31;
                self.set(a.rd, sext32((self.r(a.rt) as u32) << s));
            }
            SRLV(a) => {
                let s = self.r(a.rs) & 31;
                self.set(a.rd, sext32((self.r(a.rt) as u32) >> s));
            }
            SRAV(a) => {
                let s = self.r(a.rs) & 31;
                self.set(a.rd, sext32(((self.r(a.rt) as i64) >> s) as u32));
            }
            DSLLV(a) => {
                let s = self.r(a.rs) & 63;
                self.set(a.rd, self.r(a.rt) << s);
            }
            DSRLV(a) => {
                let s = self.r(a.rs) & 63;
                self.set(a.rd, self.r(a.rt) >> s);
            }
            DSRAV(a) => {
                let s = self.r(a.rs) & 63;
                self.set(a.rd, ((self.r(a.rt) as i64) >> s) as u64);
            }
            DSLL(a) => self.set(a.rd, self.r(a.rt) << a.shamt),
            DSRL(a) => self.set(a.rd, self.r(a.rt) >> a.shamt),
            DSRA(a) => self.set(a.rd, ((self.r(a.rt) as i64) >> a.shamt) as u64),
            DSLL32(a) => self.set(a.rd, self.r(a.rt) << (a.shamt + 32)),
            DSRL32(a) => self.set(a.rd, self.r(a.rt) >> (a.shamt + 32)),
            DSRA32(a) => self.set(a.rd, ((self.r(a.rt) as i64) >> (a.shamt + 32)) as u64),

            JR(a) => return Ok(Next::Branch(self.r(a.rs) as u32)),
            JALR(a) => {
                let target = self.r(a.rs) as u32;
                self.set(a.rd, sext32(pc.wrapping_add(8)));
                return Ok(Next::Branch(target));
            }
            SYSCALL => return Err(Exception::Syscall),
            BREAK => return Err(Exception::Breakpoint),

            MFHI(a) => self.set(a.rd, self.hi),
            MTHI(a) => self.hi = self.r(a.rs),
            MFLO(a) => self.set(a.rd, self.lo),
            MTLO(a) => self.lo = self.r(a.rs),

            MULT(a) => {
                let p = (self.r(a.rs) as i32 as i64) * (self.r(a.rt) as i32 as i64);
                self.lo = sext32(p as u32);
                self.hi = sext32((p >> 32) as u32);
            }
            MULTU(a) => {
                let p = (self.r(a.rs) as u32 as u64) * (self.r(a.rt) as u32 as u64);
                self.lo = sext32(p as u32);
                self.hi = sext32((p >> 32) as u32);
            }
            DIV(a) => {
                let n = self.r(a.rs) as i32;
                let d = self.r(a.rt) as i32;
                if d == 0 {
                    self.lo = if n >= 0 { u64::MAX } else { 1 };
                    self.hi = sext32(n as u32);
                } else {
                    self.lo = sext32(n.wrapping_div(d) as u32);
                    self.hi = sext32(n.wrapping_rem(d) as u32);
                }
            }
            DIVU(a) => {
                let n = self.r(a.rs) as u32;
                let d = self.r(a.rt) as u32;
                if d == 0 {
                    self.lo = u64::MAX;
                    self.hi = sext32(n);
                } else {
                    self.lo = sext32(n / d);
                    self.hi = sext32(n % d);
                }
            }
            DMULT(a) => {
                let p = (self.r(a.rs) as i64 as i128) * (self.r(a.rt) as i64 as i128);
                self.lo = p as u64;
                self.hi = (p >> 64) as u64;
            }
            DMULTU(a) => {
                let p = (self.r(a.rs) as u128) * (self.r(a.rt) as u128);
                self.lo = p as u64;
                self.hi = (p >> 64) as u64;
            }
            DDIV(a) => {
                let n = self.r(a.rs) as i64;
                let d = self.r(a.rt) as i64;
                if d == 0 {
                    self.lo = if n >= 0 { u64::MAX } else { 1 };
                    self.hi = n as u64;
                } else {
                    self.lo = n.wrapping_div(d) as u64;
                    self.hi = n.wrapping_rem(d) as u64;
                }
            }
            DDIVU(a) => {
                let n = self.r(a.rs);
                let d = self.r(a.rt);
                if d == 0 {
                    self.lo = u64::MAX;
                    self.hi = n;
                } else {
                    self.lo = n / d;
                    self.hi = n % d;
                }
            }

            ADD(a) => {
                let sum = (self.r(a.rs) as i32)
                    .checked_add(self.r(a.rt) as i32)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rd, sext32(sum as u32));
            }
            ADDU(a) => {
                let sum = (self.r(a.rs) as u32).wrapping_add(self.r(a.rt) as u32);
                self.set(a.rd, sext32(sum));
            }
            SUB(a) => {
                let diff = (self.r(a.rs) as i32)
                    .checked_sub(self.r(a.rt) as i32)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rd, sext32(diff as u32));
            }
            SUBU(a) => {
                let diff = (self.r(a.rs) as u32).wrapping_sub(self.r(a.rt) as u32);
                self.set(a.rd, sext32(diff));
            }
            AND(a) => self.set(a.rd, self.r(a.rs) & self.r(a.rt)),
            OR(a) => self.set(a.rd, self.r(a.rs) | self.r(a.rt)),
            XOR(a) => self.set(a.rd, self.r(a.rs) ^ self.r(a.rt)),
            NOR(a) => self.set(a.rd, !(self.r(a.rs) | self.r(a.rt))),
            SLT(a) => self.set(a.rd, ((self.r(a.rs) as i64) < (self.r(a.rt) as i64)) as u64),
            SLTU(a) => self.set(a.rd, (self.r(a.rs) < self.r(a.rt)) as u64),
            DADD(a) => {
                let sum = (self.r(a.rs) as i64)
                    .checked_add(self.r(a.rt) as i64)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rd, sum as u64);
            }
            DADDU(a) => self.set(a.rd, self.r(a.rs).wrapping_add(self.r(a.rt))),
            DSUB(a) => {
                let diff = (self.r(a.rs) as i64)
                    .checked_sub(self.r(a.rt) as i64)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rd, diff as u64);
            }
            DSUBU(a) => self.set(a.rd, self.r(a.rs).wrapping_sub(self.r(a.rt))),

            TGE(a) => self.trap_if((self.r(a.rs) as i64) >= (self.r(a.rt) as i64))?,
            TGEU(a) => self.trap_if(self.r(a.rs) >= self.r(a.rt))?,
            TLT(a) => self.trap_if((self.r(a.rs) as i64) < (self.r(a.rt) as i64))?,
            TLTU(a) => self.trap_if(self.r(a.rs) < self.r(a.rt))?,
            TEQ(a) => self.trap_if(self.r(a.rs) == self.r(a.rt))?,
            TNE(a) => self.trap_if(self.r(a.rs) != self.r(a.rt))?,
            TGEI(a) => self.trap_if((self.r(a.rs) as i64) >= (a.simm() as i64))?,
            TGEIU(a) => self.trap_if(self.r(a.rs) >= a.simm())?,
            TLTI(a) => self.trap_if((self.r(a.rs) as i64) < (a.simm() as i64))?,
            TLTIU(a) => self.trap_if(self.r(a.rs) < a.simm())?,
            TEQI(a) => self.trap_if(self.r(a.rs) == a.simm())?,
            TNEI(a) => self.trap_if(self.r(a.rs) != a.simm())?,

            BLTZ(a) => return Ok(Self::branch_if((self.r(a.rs) as i64) < 0, pc, &a, false)),
            BGEZ(a) => return Ok(Self::branch_if((self.r(a.rs) as i64) >= 0, pc, &a, false)),
            BLTZL(a) => return Ok(Self::branch_if((self.r(a.rs) as i64) < 0, pc, &a, true)),
            BGEZL(a) => return Ok(Self::branch_if((self.r(a.rs) as i64) >= 0, pc, &a, true)),
            BLTZAL(a) | BLTZALL(a) => {
                let taken = (self.r(a.rs) as i64) < 0;
                self.link(pc);
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            BGEZAL(a) | BGEZALL(a) => {
                let taken = (self.r(a.rs) as i64) >= 0;
                self.link(pc);
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }

            J(a) => {
                let target = (pc.wrapping_add(4) & 0xf000_0000) | (a.target << 2);
                return Ok(Next::Branch(target));
            }
            JAL(a) => {
                let target = (pc.wrapping_add(4) & 0xf000_0000) | (a.target << 2);
                self.link(pc);
                return Ok(Next::Branch(target));
            }

            BEQ(a) | BEQL(a) => {
                let taken = self.r(a.rs) == self.r(a.rt);
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            BNE(a) | BNEL(a) => {
                let taken = self.r(a.rs) != self.r(a.rt);
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            BLEZ(a) | BLEZL(a) => {
                let taken = (self.r(a.rs) as i64) <= 0;
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            BGTZ(a) | BGTZL(a) => {
                let taken = (self.r(a.rs) as i64) > 0;
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }

            ADDI(a) => {
                let sum = (self.r(a.rs) as i32)
                    .checked_add(a.simm() as i32)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rt, sext32(sum as u32));
            }
            ADDIU(a) => {
                let sum = (self.r(a.rs) as u32).wrapping_add(a.simm() as u32);
                self.set(a.rt, sext32(sum));
            }
            SLTI(a) => self.set(a.rt, ((self.r(a.rs) as i64) < (a.simm() as i64)) as u64),
            SLTIU(a) => self.set(a.rt, (self.r(a.rs) < a.simm()) as u64),
            ANDI(a) => self.set(a.rt, self.r(a.rs) & a.imm as u64),
            ORI(a) => self.set(a.rt, self.r(a.rs) | a.imm as u64),
            XORI(a) => self.set(a.rt, self.r(a.rs) ^ a.imm as u64),
            LUI(a) => self.set(a.rt, sext32((a.imm as u32) << 16)),
            DADDI(a) => {
                let sum = (self.r(a.rs) as i64)
                    .checked_add(a.simm() as i64)
                    .ok_or(Exception::Overflow)?;
                self.set(a.rt, sum as u64);
            }
            DADDIU(a) => self.set(a.rt, self.r(a.rs).wrapping_add(a.simm())),

            LB(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Byte)?;
                self.write_load(a.rt, sign_extend(v, 8));
            }
            LBU(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Byte)?;
                self.write_load(a.rt, v);
            }
            LH(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Half)?;
                self.write_load(a.rt, sign_extend(v, 16));
            }
            LHU(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Half)?;
                self.write_load(a.rt, v);
            }
            LW(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Word)?;
                self.write_load(a.rt, sext32(v as u32));
            }
            LWU(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Word)?;
                self.write_load(a.rt, v);
            }
            LD(a) => {
                let v = self.load(self.address(a.rs, a.simm()), Width::Double)?;
                self.write_load(a.rt, v);
            }
            LWL(a) => {
                let addr = self.address(a.rs, a.simm());
                let data = self.load(addr & !3, Width::Word)? as u32;
                let shift = 8 * (addr & 3);
                let mask = u32::MAX << shift;
                let old = self.r(a.rt) as u32;
                self.write_load(a.rt, sext32((old & !mask) | (data << shift)));
            }
            LWR(a) => {
                let addr = self.address(a.rs, a.simm());
                let data = self.load(addr & !3, Width::Word)? as u32;
                let shift = 8 * (3 - (addr & 3));
                let mask = u32::MAX >> shift;
                let old = self.r(a.rt);
                let merged = (old as u32 & !mask) | (data >> shift);
                // only a full word sign extends; otherwise the upper half stays
                let val = if addr & 3 == 3 {
                    sext32(merged)
                } else {
                    (old & 0xffff_ffff_0000_0000) | merged as u64
                };
                self.write_load(a.rt, val);
            }
            LDL(a) => {
                let addr = self.address(a.rs, a.simm());
                let data = self.load(addr & !7, Width::Double)?;
                let shift = 8 * (addr & 7);
                let mask = u64::MAX << shift;
                let old = self.r(a.rt);
                self.write_load(a.rt, (old & !mask) | (data << shift));
            }
            LDR(a) => {
                let addr = self.address(a.rs, a.simm());
                let data = self.load(addr & !7, Width::Double)?;
                let shift = 8 * (7 - (addr & 7));
                let mask = u64::MAX >> shift;
                let old = self.r(a.rt);
                self.write_load(a.rt, (old & !mask) | (data >> shift));
            }
            LL(a) => {
                let vaddr = self.address(a.rs, a.simm());
                let paddr = self.physical(vaddr, Width::Word, Access::Load)?;
                let v = self.read_bus(paddr, Width::Word);
                self.write_load(a.rt, sext32(v as u32));
                self.ll_bit = true;
                self.cop0.ll_addr = paddr >> 4;
            }
            LLD(a) => {
                let vaddr = self.address(a.rs, a.simm());
                let paddr = self.physical(vaddr, Width::Double, Access::Load)?;
                let v = self.read_bus(paddr, Width::Double);
                self.write_load(a.rt, v);
                self.ll_bit = true;
                self.cop0.ll_addr = paddr >> 4;
            }

            SB(a) => self.store(self.address(a.rs, a.simm()), Width::Byte, self.r(a.rt))?,
            SH(a) => self.store(self.address(a.rs, a.simm()), Width::Half, self.r(a.rt))?,
            SW(a) => self.store(self.address(a.rs, a.simm()), Width::Word, self.r(a.rt))?,
            SD(a) => self.store(self.address(a.rs, a.simm()), Width::Double, self.r(a.rt))?,
            SWL(a) => {
                let addr = self.address(a.rs, a.simm());
                let rt = self.r(a.rt) as u32;
                let shift = 8 * (addr & 3);
                let mask = u32::MAX >> shift;
                self.store_merge(addr, Width::Word, |old| {
                    ((old as u32 & !mask) | (rt >> shift)) as u64
                })?;
            }
            SWR(a) => {
                let addr = self.address(a.rs, a.simm());
                let rt = self.r(a.rt) as u32;
                let shift = 8 * (3 - (addr & 3));
                let mask = u32::MAX << shift;
                self.store_merge(addr, Width::Word, |old| {
                    ((old as u32 & !mask) | (rt << shift)) as u64
                })?;
            }
            SDL(a) => {
                let addr = self.address(a.rs, a.simm());
                let rt = self.r(a.rt);
                let shift = 8 * (addr & 7);
                let mask = u64::MAX >> shift;
                self.store_merge(addr, Width::Double, |old| (old & !mask) | (rt >> shift))?;
            }
            SDR(a) => {
                let addr = self.address(a.rs, a.simm());
                let rt = self.r(a.rt);
                let shift = 8 * (7 - (addr & 7));
                let mask = u64::MAX << shift;
                self.store_merge(addr, Width::Double, |old| (old & !mask) | (rt << shift))?;
            }
            SC(a) | SCD(a) => {
                let width = if let SC(_) = *instr { Width::Word } else { Width::Double };
                if self.ll_bit {
                    self.store(self.address(a.rs, a.simm()), width, self.r(a.rt))?;
                    self.set(a.rt, 1);
                } else {
                    self.set(a.rt, 0);
                }
            }
            CACHE(a) => {
                self.require_cop(0)?;
                trace!("cache op {:#x} at {:#010x} ignored", a.rt.0, self.address(a.rs, a.simm()));
            }

            MFC0(a) => {
                self.require_cop(0)?;
                self.set(a.rt, sext32(self.cop0.read_reg(a.rd) as u32));
            }
            DMFC0(a) => {
                self.require_cop(0)?;
                self.set(a.rt, self.cop0.read_reg(a.rd));
            }
            MTC0(a) => {
                self.require_cop(0)?;
                self.write_cop0(a.rd, sext32(self.r(a.rt) as u32));
            }
            DMTC0(a) => {
                self.require_cop(0)?;
                self.write_cop0(a.rd, self.r(a.rt));
            }
            TLBR => {
                self.require_cop(0)?;
                let entry = *self.cop0.tlb.entry(self.cop0.index as usize & 0x1f);
                self.cop0.page_mask = entry.page_mask;
                self.cop0.entry_hi = entry.entry_hi();
                self.cop0.entry_lo0 = entry.entry_lo0();
                self.cop0.entry_lo1 = entry.entry_lo1();
            }
            TLBWI | TLBWR => {
                self.require_cop(0)?;
                let entry = TlbEntry::from_cop0(
                    self.cop0.page_mask,
                    self.cop0.entry_hi,
                    self.cop0.entry_lo0,
                    self.cop0.entry_lo1,
                );
                if let TLBWI = *instr {
                    let index = self.cop0.index as usize & 0x1f;
                    self.cop0.tlb.write(index, entry);
                } else {
                    self.cop0.tlb.write_random(entry);
                }
            }
            TLBP => {
                self.require_cop(0)?;
                self.cop0.index = match self.cop0.tlb.probe(self.cop0.entry_hi) {
                    Some(index) => index as u32,
                    None => INDEX_PROBE_FAILURE,
                };
            }
            ERET => {
                self.require_cop(0)?;
                let target = if self.cop0.status & STATUS_ERL != 0 {
                    self.cop0.status &= !STATUS_ERL;
                    self.cop0.error_epc
                } else {
                    self.cop0.status &= !STATUS_EXL;
                    self.cop0.epc
                };
                self.ll_bit = false;
                self.update_context();
                return Ok(Next::Jump(target as u32));
            }

            MFC1(a) => {
                self.require_cop(1)?;
                let v = self.fpu.read_u32(FloatRegister(a.rd), self.cop0.fr());
                self.set(a.rt, sext32(v));
            }
            DMFC1(a) => {
                self.require_cop(1)?;
                let v = self.fpu.read_u64(FloatRegister(a.rd), self.cop0.fr());
                self.set(a.rt, v);
            }
            CFC1(a) => {
                self.require_cop(1)?;
                self.set(a.rt, sext32(self.fpu.read_control(a.rd)));
            }
            MTC1(a) => {
                self.require_cop(1)?;
                let fr = self.cop0.fr();
                self.fpu.write_u32(FloatRegister(a.rd), fr, self.r(a.rt) as u32);
            }
            DMTC1(a) => {
                self.require_cop(1)?;
                let fr = self.cop0.fr();
                self.fpu.write_u64(FloatRegister(a.rd), fr, self.r(a.rt));
            }
            CTC1(a) => {
                self.require_cop(1)?;
                self.fpu.write_control(a.rd, self.r(a.rt) as u32);
            }
            BC1F(a) | BC1FL(a) => {
                self.require_cop(1)?;
                let taken = !self.fpu.condition();
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            BC1T(a) | BC1TL(a) => {
                self.require_cop(1)?;
                let taken = self.fpu.condition();
                return Ok(Self::branch_if(taken, pc, &a, instr.is_likely()));
            }
            LWC1(a) => {
                self.require_cop(1)?;
                let v = self.load(self.address(a.base, a.simm()), Width::Word)?;
                let fr = self.cop0.fr();
                self.fpu.write_u32(a.ft, fr, v as u32);
            }
            LDC1(a) => {
                self.require_cop(1)?;
                let v = self.load(self.address(a.base, a.simm()), Width::Double)?;
                let fr = self.cop0.fr();
                self.fpu.write_u64(a.ft, fr, v);
            }
            SWC1(a) => {
                self.require_cop(1)?;
                let v = self.fpu.read_u32(a.ft, self.cop0.fr());
                self.store(self.address(a.base, a.simm()), Width::Word, v as u64)?;
            }
            SDC1(a) => {
                self.require_cop(1)?;
                let v = self.fpu.read_u64(a.ft, self.cop0.fr());
                self.store(self.address(a.base, a.simm()), Width::Double, v)?;
            }

            FADD(a) => self.fp_binary(a, |x, y| x + y)?,
            FSUB(a) => self.fp_binary(a, |x, y| x - y)?,
            FMUL(a) => self.fp_binary(a, |x, y| x * y)?,
            FDIV(a) => self.fp_binary(a, |x, y| x / y)?,
            FSQRT(a) => self.fp_unary(a, f64::sqrt)?,
            FABS(a) => self.fp_unary(a, f64::abs)?,
            FNEG(a) => self.fp_unary(a, |x| -x)?,
            FMOV(a) => {
                self.require_cop(1)?;
                let fr = self.cop0.fr();
                if a.fmt == Format::S {
                    let v = self.fpu.read_u32(a.fs, fr);
                    self.fpu.write_u32(a.fd, fr, v);
                } else {
                    let v = self.fpu.read_u64(a.fs, fr);
                    self.fpu.write_u64(a.fd, fr, v);
                }
            }
            ROUND_L(a) => self.fp_to_long(a, Some(Rounding::Nearest))?,
            TRUNC_L(a) => self.fp_to_long(a, Some(Rounding::Zero))?,
            CEIL_L(a) => self.fp_to_long(a, Some(Rounding::Up))?,
            FLOOR_L(a) => self.fp_to_long(a, Some(Rounding::Down))?,
            CVT_L(a) => self.fp_to_long(a, None)?,
            ROUND_W(a) => self.fp_to_word(a, Some(Rounding::Nearest))?,
            TRUNC_W(a) => self.fp_to_word(a, Some(Rounding::Zero))?,
            CEIL_W(a) => self.fp_to_word(a, Some(Rounding::Up))?,
            FLOOR_W(a) => self.fp_to_word(a, Some(Rounding::Down))?,
            CVT_W(a) => self.fp_to_word(a, None)?,
            CVT_S(a) => {
                self.require_cop(1)?;
                let v = self.fp_source(&a);
                let fr = self.cop0.fr();
                self.fpu.write_s(a.fd, fr, v as f32);
            }
            CVT_D(a) => {
                self.require_cop(1)?;
                let v = self.fp_source(&a);
                let fr = self.cop0.fr();
                self.fpu.write_d(a.fd, fr, v);
            }
            C(a, cond) => {
                self.require_cop(1)?;
                let fr = self.cop0.fr();
                let (x, y) = match a.fmt {
                    Format::S => (self.fpu.read_s(a.fs, fr) as f64, self.fpu.read_s(a.ft, fr) as f64),
                    _ => (self.fpu.read_d(a.fs, fr), self.fpu.read_d(a.ft, fr)),
                };
                let unordered = x.is_nan() || y.is_nan();
                let result = (cond & 4 != 0 && x < y)
                    || (cond & 2 != 0 && x == y)
                    || (cond & 1 != 0 && unordered);
                self.fpu.set_condition(result);
            }

            COP { unit, word } => {
                self.require_cop(unit)?;
                debug!("unassigned COP{} encoding {:#010x} at {:#010x}", unit, word, pc);
                return Err(Exception::ReservedInstruction);
            }
            RESERVED(word) => {
                debug!("reserved instruction {:#010x} at {:#010x}", word, pc);
                return Err(Exception::ReservedInstruction);
            }
        }

        Ok(Next::Sequential)
    }

    fn trap_if(&self, cond: bool) -> Result<(), Exception> {
        if cond {
            Err(Exception::Trap)
        } else {
            Ok(())
        }
    }

    /// The source operand of a conversion, as a double.
    fn fp_source(&self, a: &FRArgs) -> f64 {
        let fr = self.cop0.fr();
        match a.fmt {
            Format::S => self.fpu.read_s(a.fs, fr) as f64,
            Format::D => self.fpu.read_d(a.fs, fr),
            Format::W => self.fpu.read_u32(a.fs, fr) as i32 as f64,
            Format::L => self.fpu.read_u64(a.fs, fr) as i64 as f64,
        }
    }

    fn fp_binary(&mut self, a: FRArgs, op: impl Fn(f64, f64) -> f64) -> Result<(), Exception> {
        self.require_cop(1)?;
        let fr = self.cop0.fr();

        if a.fmt == Format::S {
            let x = self.fpu.read_s(a.fs, fr) as f64;
            let y = self.fpu.read_s(a.ft, fr) as f64;
            self.fpu.write_s(a.fd, fr, op(x, y) as f32);
        } else {
            let x = self.fpu.read_d(a.fs, fr);
            let y = self.fpu.read_d(a.ft, fr);
            self.fpu.write_d(a.fd, fr, op(x, y));
        }
        Ok(())
    }

    fn fp_unary(&mut self, a: FRArgs, op: impl Fn(f64) -> f64) -> Result<(), Exception> {
        self.require_cop(1)?;
        let fr = self.cop0.fr();

        if a.fmt == Format::S {
            let x = self.fpu.read_s(a.fs, fr) as f64;
            self.fpu.write_s(a.fd, fr, op(x) as f32);
        } else {
            let x = self.fpu.read_d(a.fs, fr);
            self.fpu.write_d(a.fd, fr, op(x));
        }
        Ok(())
    }

    /// `None` rounds with the FCR31 mode. Out of range values saturate.
    fn fp_to_long(&mut self, a: FRArgs, mode: Option<Rounding>) -> Result<(), Exception> {
        self.require_cop(1)?;
        let mode = mode.unwrap_or_else(|| self.fpu.rounding());
        let v = regs::round(self.fp_source(&a), mode) as i64;
        let fr = self.cop0.fr();
        self.fpu.write_u64(a.fd, fr, v as u64);
        Ok(())
    }

    fn fp_to_word(&mut self, a: FRArgs, mode: Option<Rounding>) -> Result<(), Exception> {
        self.require_cop(1)?;
        let mode = mode.unwrap_or_else(|| self.fpu.rounding());
        let v = regs::round(self.fp_source(&a), mode) as i32;
        let fr = self.cop0.fr();
        self.fpu.write_u32(a.fd, fr, v as u32);
        Ok(())
    }
}
