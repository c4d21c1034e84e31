mod common;

use common::*;
use vr4300::emulator::cop0::{reg, CAUSE_BD, CAUSE_CE_SHIFT, CAUSE_IP_SHIFT, STATUS_EXL};
use vr4300::emulator::exception::State;
use vr4300::emulator::Interrupt;

fn sext(addr: u32) -> u64 {
    addr as i32 as i64 as u64
}

#[test]
fn fault_in_delay_slot_points_epc_at_the_branch() {
    let mut cpu = cpu_with(&[beq(ZERO, ZERO, 3), add(V0, A0, A1)]);
    leave_reset(&mut cpu, 0);
    cpu.set_reg(vr4300::emulator::Register(A0), 0x7fff_ffff);
    cpu.set_reg(vr4300::emulator::Register(A1), 1);

    run_steps(&mut cpu, 2);
    let fault = cpu.pending_fault().copied().expect("overflow is pending");
    assert!(fault.delay_slot);
    assert_eq!(fault.pc, BASE);
    assert_eq!(cpu.exception_state(), State::ExceptionPending);

    cpu.step();
    assert_eq!(cpu.cop0().exception_code(), 12);
    assert_eq!(cpu.cop0().epc, sext(BASE));
    assert_ne!(cpu.cop0().cause & CAUSE_BD, 0);
    assert_ne!(cpu.cop0().status & STATUS_EXL, 0);
    // the vector's first instruction already ran
    assert_eq!(cpu.pc(), GENERAL_VECTOR + 4);
    assert_eq!(cpu.exception_state(), State::InHandler);
}

#[test]
fn fault_outside_a_delay_slot_uses_its_own_pc() {
    let mut cpu = cpu_with(&[nop(), syscall()]);
    leave_reset(&mut cpu, 0);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.cop0().exception_code(), 8);
    assert_eq!(cpu.cop0().epc, sext(BASE + 4));
    assert_eq!(cpu.cop0().cause & CAUSE_BD, 0);
    assert_eq!(cpu.stats().exceptions(), 1);
}

#[test]
fn faulting_instruction_has_no_effect() {
    let mut cpu = cpu_with(&[add(V0, A0, A1)]);
    leave_reset(&mut cpu, 0);
    cpu.set_reg(vr4300::emulator::Register(A0), 0x7fff_ffff);
    cpu.set_reg(vr4300::emulator::Register(A1), 1);
    cpu.set_reg(vr4300::emulator::Register(V0), 0xdead);

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.reg(vr4300::emulator::Register(V0)), 0xdead);
    assert_eq!(cpu.cop0().exception_code(), 12);
}

#[test]
fn eret_returns_and_leaves_the_handler() {
    let mut cpu = cpu_with(&[nop(), syscall(), addiu(T1, ZERO, 7)]);
    leave_reset(&mut cpu, 0);
    install_handler(
        &mut cpu,
        &[
            mfc0(T0, reg::EPC),
            addiu(T0, T0, 4),
            mtc0(T0, reg::EPC),
            eret(),
        ],
    );

    run_steps(&mut cpu, 6);
    assert_eq!(cpu.pc(), BASE + 8);
    assert_eq!(cpu.cop0().status & STATUS_EXL, 0);
    assert_eq!(cpu.exception_state(), State::Normal);

    cpu.step();
    assert_eq!(cpu.reg(vr4300::emulator::Register(T1)), 7);
}

#[test]
fn two_lines_make_one_interrupt() {
    let mut cpu = cpu_with(&[]);
    leave_reset(&mut cpu, all_interrupts());
    cpu.raise(Interrupt::Rcp);
    cpu.raise(Interrupt::Cartridge);

    cpu.step();
    assert_eq!(cpu.cop0().exception_code(), 0);
    assert_eq!(cpu.cop0().epc, sext(BASE));
    let ip = cpu.cop0().cause >> CAUSE_IP_SHIFT;
    assert_eq!(ip & 0b1100, 0b1100);
    assert_eq!(cpu.pc(), GENERAL_VECTOR + 4);

    // EXL masks the still asserted lines
    run_steps(&mut cpu, 4);
    assert_eq!(cpu.stats().exceptions(), 1);
    assert_eq!(cpu.stats().interrupts(), 1);
}

#[test]
fn interrupts_wait_for_ie_and_mask() {
    let mut cpu = cpu_with(&[]);
    leave_reset(&mut cpu, 0xff00);
    cpu.raise(Interrupt::Rcp);
    cpu.step();
    assert_eq!(cpu.pc(), BASE + 4);
    assert_eq!(cpu.stats().exceptions(), 0);

    // IE set, but only the timer unmasked
    leave_reset(&mut cpu, 0x8001);
    cpu.step();
    assert_eq!(cpu.pc(), BASE + 8);

    cpu.lower(Interrupt::Rcp);
    leave_reset(&mut cpu, all_interrupts());
    cpu.step();
    assert_eq!(cpu.stats().exceptions(), 0);
}

#[test]
fn pending_fault_goes_before_an_interrupt() {
    let mut cpu = cpu_with(&[syscall()]);
    leave_reset(&mut cpu, all_interrupts());

    cpu.step();
    assert!(cpu.pending_fault().is_some());
    cpu.raise(Interrupt::Rcp);

    cpu.step();
    assert_eq!(cpu.cop0().exception_code(), 8);
    assert_eq!(cpu.cop0().epc, sext(BASE));

    cpu.step();
    assert_eq!(cpu.cop0().exception_code(), 8);
    assert_eq!(cpu.stats().exceptions(), 1);
}

#[test]
fn timer_fires_when_count_reaches_compare() {
    let mut cpu = cpu_with(&[]);
    leave_reset(&mut cpu, all_interrupts());
    cpu.write_cop0(reg::COMPARE, 10);

    // Count ticks every other cycle, one cycle per NOP
    run_steps(&mut cpu, 20);
    assert_eq!(cpu.cop0().count, 10);
    assert_eq!(cpu.stats().exceptions(), 0);

    cpu.step();
    assert_eq!(cpu.cop0().exception_code(), 0);
    assert_ne!(cpu.cop0().cause & (1 << (CAUSE_IP_SHIFT + 7)), 0);
    assert_eq!(cpu.cop0().epc, sext(BASE + 20 * 4));

    cpu.write_cop0(reg::COMPARE, 1000);
    assert_eq!(cpu.cop0().cause & (1 << (CAUSE_IP_SHIFT + 7)), 0);
}

#[test]
fn fpu_without_cu1_is_unusable() {
    // ADD.S $f0, $f1, $f2
    let mut cpu = cpu_with(&[0x4602_0800]);
    leave_reset(&mut cpu, 0);

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 11);
    assert_eq!((cpu.cop0().cause >> CAUSE_CE_SHIFT) & 3, 1);

    let mut cpu = cpu_with(&[0x4602_0800]);
    leave_reset(&mut cpu, fpu_enabled());
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.stats().exceptions(), 0);
}

#[test]
fn unassigned_cop1_encoding_checks_cu1_first() {
    // COP1 fmt 0x12 has nothing behind it
    let mut cpu = cpu_with(&[0x4640_0000]);
    leave_reset(&mut cpu, 0);
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 11);
    assert_eq!((cpu.cop0().cause >> CAUSE_CE_SHIFT) & 3, 1);

    let mut cpu = cpu_with(&[0x4640_0000]);
    leave_reset(&mut cpu, fpu_enabled());
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 10);
    assert_eq!(cpu.cop0().epc, sext(BASE));
}

#[test]
fn unassigned_cop0_encoding_is_reserved_in_kernel_mode() {
    // COP0 rs 0x02
    let mut cpu = cpu_with(&[0x4040_0000]);
    leave_reset(&mut cpu, 0);
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 10);
}

#[test]
fn reserved_instruction() {
    let mut cpu = cpu_with(&[0x7000_0000]);
    leave_reset(&mut cpu, 0);

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 10);
}

#[test]
fn misaligned_load_is_an_address_error() {
    let mut cpu = cpu_with(&[lw(T0, 2, S0), sw(T0, 1, S0)]);
    leave_reset(&mut cpu, 0);
    cpu.set_reg(vr4300::emulator::Register(S0), sext(0x8000_1000));

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.cop0().exception_code(), 4);
    assert_eq!(cpu.cop0().bad_vaddr, sext(0x8000_1002));
}

#[test]
fn boots_from_the_reset_vector() {
    let mut cpu = cpu_with_config(&[], vr4300::emulator::Config::default());
    assert_eq!(cpu.pc(), 0xbfc0_0000);
    cpu.step();
    assert_eq!(cpu.pc(), 0xbfc0_0004);

    cpu.set_reg(vr4300::emulator::Register(T0), 3);
    cpu.reset();
    assert_eq!(cpu.pc(), 0xbfc0_0000);
    assert_eq!(cpu.cop0().error_epc, sext(0xbfc0_0004));
    assert_eq!(cpu.reg(vr4300::emulator::Register(T0)), 0);
    assert_eq!(cpu.exception_state(), State::InHandler);
}
