//! Estatísticas de execução do núcleo.

use std::fmt;
use std::time::{Duration, Instant};

use crate::emulator::Instruction;

/// Pipeline clock of the console's CPU.
const CLOCK_MHZ: f64 = 93.75;

/// Contadores alimentados pela CPU a cada passo.
#[derive(Debug, Default)]
pub struct Stats {
    instructions: u64,
    loads: u64,
    stores: u64,
    branches: u64,
    fpu_ops: u64,
    /// Cycles charged by the timing model, stalls included.
    cycles: u64,
    /// Cycles lost to load-use interlocks.
    stalls: u64,
    interrupts: u64,
    faults: u64,
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    /// Começa a medir o tempo de host.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = None;
    }

    /// Para a medição iniciada por `start`. Sem `start`, não faz nada.
    pub fn stop(&mut self) {
        self.elapsed = self.started.take().map(|t| t.elapsed());
    }

    /// Conta uma instrução que chegou ao fim do pipeline.
    pub fn retire(&mut self, instr: &Instruction) {
        self.instructions += 1;
        if instr.is_load() {
            self.loads += 1;
        } else if instr.is_store() {
            self.stores += 1;
        }
        if instr.is_branch() {
            self.branches += 1;
        }
        if instr.fpu_args().is_some() {
            self.fpu_ops += 1;
        }
    }

    pub fn add_cycles(&mut self, cycles: u64) {
        self.cycles += cycles;
    }

    pub fn add_stall(&mut self, cycles: u64) {
        self.stalls += cycles;
    }

    /// Exception code 0 is an interrupt, anything else a fault.
    pub fn add_exception(&mut self, code: u32) {
        if code == 0 {
            self.interrupts += 1;
        } else {
            self.faults += 1;
        }
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    pub fn interrupts(&self) -> u64 {
        self.interrupts
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Interrupts and faults together.
    pub fn exceptions(&self) -> u64 {
        self.interrupts + self.faults
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Guest time the charged cycles stand for.
    pub fn guest_time(&self) -> Duration {
        Duration::from_secs_f64(self.cycles as f64 / (CLOCK_MHZ * 1_000_000.0))
    }

    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.instructions as f64 / self.cycles as f64
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Instructions: {} (loads: {} stores: {} branches: {} fpu: {})",
            self.instructions, self.loads, self.stores, self.branches, self.fpu_ops
        )?;
        writeln!(f, "Cycles: {} ({} stalled)", self.cycles, self.stalls)?;
        writeln!(f, "Exceptions: {} interrupts, {} faults", self.interrupts, self.faults)?;

        let guest = self.guest_time();
        writeln!(
            f,
            "VR4300 @ {:.2} MHz: {:.6} sec, IPC {:.2}",
            CLOCK_MHZ,
            guest.as_secs_f64(),
            self.ipc()
        )?;

        if let Some(host) = self.elapsed {
            let host = host.as_secs_f64();
            write!(f, "Host: {:.3} sec", host)?;
            if host > 0.0 {
                write!(f, ", {:.2}x real time", guest.as_secs_f64() / host)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
