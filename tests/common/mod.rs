//! Helpers compartilhados pelos testes de integração: montadores de
//! instruções e uma CPU com RAM já carregada.

#![allow(dead_code)]

use vr4300::emulator::cop0::{reg, STATUS_CU0, STATUS_CU1, STATUS_IE};
use vr4300::emulator::{Config, Cpu, Ram};

/// Programs are loaded at physical 0 and run from kseg0.
pub const BASE: u32 = 0x8000_0000;
/// General exception vector with BEV clear.
pub const GENERAL_VECTOR: u32 = 0x8000_0180;
pub const REFILL_VECTOR: u32 = 0x8000_0000;

pub const ZERO: u32 = 0;
pub const V0: u32 = 2;
pub const A0: u32 = 4;
pub const A1: u32 = 5;
pub const T0: u32 = 8;
pub const T1: u32 = 9;
pub const T2: u32 = 10;
pub const S0: u32 = 16;
pub const RA: u32 = 31;

pub fn r(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
    rs << 21 | rt << 16 | rd << 11 | shamt << 6 | funct
}

pub fn i(op: u32, rs: u32, rt: u32, imm: i32) -> u32 {
    op << 26 | rs << 21 | rt << 16 | (imm as u32 & 0xffff)
}

pub fn nop() -> u32 {
    0
}

pub fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, 0x21)
}

pub fn add(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, 0x20)
}

pub fn addiu(rt: u32, rs: u32, imm: i32) -> u32 {
    i(0x09, rs, rt, imm)
}

pub fn ori(rt: u32, rs: u32, imm: i32) -> u32 {
    i(0x0d, rs, rt, imm)
}

pub fn lui(rt: u32, imm: i32) -> u32 {
    i(0x0f, 0, rt, imm)
}

pub fn lw(rt: u32, offset: i32, base: u32) -> u32 {
    i(0x23, base, rt, offset)
}

pub fn sw(rt: u32, offset: i32, base: u32) -> u32 {
    i(0x2b, base, rt, offset)
}

pub fn lwl(rt: u32, offset: i32, base: u32) -> u32 {
    i(0x22, base, rt, offset)
}

pub fn lwr(rt: u32, offset: i32, base: u32) -> u32 {
    i(0x26, base, rt, offset)
}

/// Branch offsets are in instructions, relative to the delay slot.
pub fn beq(rs: u32, rt: u32, offset: i32) -> u32 {
    i(0x04, rs, rt, offset)
}

pub fn beql(rs: u32, rt: u32, offset: i32) -> u32 {
    i(0x14, rs, rt, offset)
}

pub fn jr(rs: u32) -> u32 {
    r(rs, 0, 0, 0, 0x08)
}

pub fn syscall() -> u32 {
    0x0000_000c
}

pub fn mtc0(rt: u32, rd: u32) -> u32 {
    0x4080_0000 | rt << 16 | rd << 11
}

pub fn mfc0(rt: u32, rd: u32) -> u32 {
    0x4000_0000 | rt << 16 | rd << 11
}

pub fn tlbwi() -> u32 {
    0x4200_0002
}

pub fn tlbwr() -> u32 {
    0x4200_0006
}

pub fn tlbp() -> u32 {
    0x4200_0008
}

pub fn eret() -> u32 {
    0x4200_0018
}

/// A CPU running `program` from `BASE`.
pub fn cpu_with(program: &[u32]) -> Cpu<Ram> {
    cpu_with_config(
        program,
        Config {
            reset_pc: BASE,
            ..Config::default()
        },
    )
}

pub fn cpu_with_config(program: &[u32], config: Config) -> Cpu<Ram> {
    let mut ram = Ram::new();
    ram.load_slice_into_addr(0, program)
        .expect("program fits in RAM");
    Cpu::new(ram, config)
}

/// Leaves the reset state: ERL and BEV clear, kernel mode, so faults go
/// to the regular vectors in kseg0. `extra` is OR-ed into Status.
pub fn leave_reset(cpu: &mut Cpu<Ram>, extra: u32) {
    cpu.write_cop0(reg::STATUS, (STATUS_CU0 | extra) as u64);
}

/// Status bits for interrupts enabled with every line unmasked.
pub fn all_interrupts() -> u32 {
    STATUS_IE | 0xff00
}

pub fn fpu_enabled() -> u32 {
    STATUS_CU1
}

/// Places `handler` at the general exception vector.
pub fn install_handler(cpu: &mut Cpu<Ram>, handler: &[u32]) {
    cpu.memory_mut()
        .load_slice_into_addr(GENERAL_VECTOR & 0x1fff_ffff, handler)
        .expect("handler fits in RAM");
}

pub fn run_steps(cpu: &mut Cpu<Ram>, n: usize) {
    for _ in 0..n {
        cpu.step();
    }
}
