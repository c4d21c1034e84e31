mod common;

use common::*;
use vr4300::emulator::cop0::{reg, INDEX_PROBE_FAILURE};
use vr4300::emulator::{Cpu, Ram, Register, Width};
use vr4300::Memory;

fn sext(addr: u32) -> u64 {
    addr as i32 as i64 as u64
}

const VALID: u64 = 1 << 1;
const DIRTY: u64 = 1 << 2;

/// Stages an entry mapping the page pair at `vaddr` onto `pfn` and
/// `pfn + 1`, ASID 0, not global.
fn stage(cpu: &mut Cpu<Ram>, vaddr: u32, pfn: u64, flags: u64) {
    cpu.write_cop0(reg::PAGE_MASK, 0);
    cpu.write_cop0(reg::ENTRY_HI, vaddr as u64 & !0x1fff);
    cpu.write_cop0(reg::ENTRY_LO0, pfn << 6 | flags);
    cpu.write_cop0(reg::ENTRY_LO1, (pfn + 1) << 6 | flags);
    cpu.write_cop0(reg::INDEX, 0);
}

#[test]
fn store_to_clean_page_raises_tlb_modified() {
    let mut cpu = cpu_with(&[tlbwi(), sw(T0, 0x10, ZERO)]);
    leave_reset(&mut cpu, 0);
    stage(&mut cpu, 0, 0x10, VALID);
    cpu.set_reg(Register(T0), 0x1234);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.cop0().exception_code(), 1);
    assert_eq!(cpu.cop0().bad_vaddr, 0x10);
    assert_eq!(cpu.cop0().epc, sext(BASE + 4));
    assert_eq!(cpu.pc(), GENERAL_VECTOR + 4);
    assert_eq!(cpu.memory_mut().peek(0x10010, Width::Word), Some(0));
}

#[test]
fn dirty_page_is_writable_through_the_mapping() {
    let program = [tlbwi(), sw(T0, 0x1010, ZERO), lw(T1, 0x1010, ZERO), nop()];
    let mut cpu = cpu_with(&program);
    leave_reset(&mut cpu, 0);
    stage(&mut cpu, 0, 0x10, VALID | DIRTY);
    cpu.set_reg(Register(T0), 0x1234);

    run_steps(&mut cpu, 4);
    assert_eq!(cpu.stats().exceptions(), 0);
    // 0x1010 sits in the odd page
    assert_eq!(cpu.memory_mut().peek(0x11010, Width::Word), Some(0x1234));
    assert_eq!(cpu.reg(Register(T1)), 0x1234);
}

#[test]
fn miss_uses_refill_vector_unless_exl() {
    let mut cpu = cpu_with(&[nop(), lw(T0, 0, S0)]);
    leave_reset(&mut cpu, 0);
    cpu.set_reg(Register(S0), 0x0040_0000);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.cop0().exception_code(), 2);
    assert_eq!(cpu.cop0().bad_vaddr, 0x0040_0000);
    assert_eq!(cpu.cop0().epc, sext(BASE + 4));
    // refill vector is 0x80000000, whose NOP already ran
    assert_eq!(cpu.pc(), REFILL_VECTOR + 4);
    assert_eq!(cpu.cop0().entry_hi & !0xff, 0x0040_0000);

    // second miss inside the handler goes to the general vector and keeps EPC
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.pc(), GENERAL_VECTOR + 4);
    assert_eq!(cpu.cop0().epc, sext(BASE + 4));
}

#[test]
fn invalid_entry_raises_tlb_invalid() {
    let mut cpu = cpu_with(&[tlbwi(), sw(T0, 0, ZERO)]);
    leave_reset(&mut cpu, 0);
    stage(&mut cpu, 0, 0x10, DIRTY);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.cop0().exception_code(), 3);
    assert_eq!(cpu.pc(), GENERAL_VECTOR + 4);
}

#[test]
fn probe_finds_written_entry() {
    let mut cpu = cpu_with(&[tlbwi(), tlbp()]);
    leave_reset(&mut cpu, 0);
    stage(&mut cpu, 0x0040_0000, 0x10, VALID);
    cpu.write_cop0(reg::INDEX, 5);

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().index, 5);

    let mut cpu = cpu_with(&[tlbp()]);
    leave_reset(&mut cpu, 0);
    cpu.write_cop0(reg::ENTRY_HI, 0x0040_0000);
    cpu.step();
    assert_ne!(cpu.cop0().index & INDEX_PROBE_FAILURE, 0);
}

#[test]
fn tlbp_misses_on_a_fresh_tlb() {
    for entry_hi in &[0xffff_ffff_8000_0000u64, 0xffff_ffff_8000_2000, 0] {
        let mut cpu = cpu_with(&[tlbp()]);
        leave_reset(&mut cpu, 0);
        cpu.write_cop0(reg::ENTRY_HI, *entry_hi);
        cpu.step();
        assert_ne!(cpu.cop0().index & INDEX_PROBE_FAILURE, 0, "entry_hi {:#x}", entry_hi);
    }
}

#[test]
fn random_writes_stay_above_wired() {
    let program = vec![tlbwr(); 64];
    let mut cpu = cpu_with(&program);
    leave_reset(&mut cpu, 0);
    stage(&mut cpu, 0x1000_0000, 0x10, VALID);
    cpu.write_cop0(reg::WIRED, 4);

    let before: Vec<_> = (0..4).map(|i| *cpu.cop0().tlb.entry(i)).collect();
    for _ in 0..64 {
        cpu.step();
        let random = cpu.cop0().read_reg(reg::RANDOM);
        assert!((4..=31).contains(&random), "random = {}", random);
    }

    for i in 0..4 {
        assert_eq!(*cpu.cop0().tlb.entry(i), before[i]);
    }
    let written = cpu.cop0().tlb.entry(4).entry_hi();
    assert_eq!(written, 0x1000_0000);
}
