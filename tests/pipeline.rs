mod common;

use common::*;
use vr4300::emulator::{Config, Register, Width};
use vr4300::Memory;

fn sext(addr: u32) -> u64 {
    addr as i32 as i64 as u64
}

#[test]
fn load_result_is_visible_one_instruction_late() {
    let program = [lw(T0, 0x100, S0), addu(T1, T0, ZERO), addu(T2, T0, ZERO)];
    let mut cpu = cpu_with(&program);
    cpu.memory_mut().load_slice_into_addr(0x1100, &[42]).unwrap();
    cpu.set_reg(Register(S0), sext(0x8000_1000));
    cpu.set_reg(Register(T0), 5);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(T1)), 5);
    assert_eq!(cpu.reg(Register(T2)), 42);
    // LW 2, ADDU 1 plus the load-use stall, ADDU 1
    assert_eq!(cpu.cycles(), 5);
    assert_eq!(cpu.stats().stalls(), 1);
}

#[test]
fn load_delay_can_be_turned_off() {
    let program = [lw(T0, 0x100, S0), addu(T1, T0, ZERO)];
    let config = Config {
        load_delay: false,
        reset_pc: BASE,
    };
    let mut cpu = cpu_with_config(&program, config);
    cpu.memory_mut().load_slice_into_addr(0x1100, &[42]).unwrap();
    cpu.set_reg(Register(S0), sext(0x8000_1000));

    run_steps(&mut cpu, 2);
    assert_eq!(cpu.reg(Register(T1)), 42);
}

#[test]
fn later_write_wins_over_a_pending_load() {
    let program = [lw(T0, 0x100, S0), addiu(T0, ZERO, 9), nop()];
    let mut cpu = cpu_with(&program);
    cpu.memory_mut().load_slice_into_addr(0x1100, &[42]).unwrap();
    cpu.set_reg(Register(S0), sext(0x8000_1000));

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(T0)), 9);
}

#[test]
fn unaligned_pair_merges_through_the_load_delay() {
    let program = [lwl(T0, 1, S0), lwr(T0, 4, S0), nop()];
    let mut cpu = cpu_with(&program);
    cpu.memory_mut()
        .load_slice_into_addr(0x1000, &[0x0011_2233, 0x4455_6677])
        .unwrap();
    cpu.set_reg(Register(S0), sext(0x8000_1000));

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(T0)), 0x1122_3344);
}

#[test]
fn taken_branch_runs_its_delay_slot() {
    let program = [
        beq(ZERO, ZERO, 2),
        addiu(T1, ZERO, 1),
        addiu(T2, ZERO, 2), // skipped
        addiu(T0, ZERO, 3),
    ];
    let mut cpu = cpu_with(&program);

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(T1)), 1);
    assert_eq!(cpu.reg(Register(T2)), 0);
    assert_eq!(cpu.reg(Register(T0)), 3);
    assert_eq!(cpu.pc(), BASE + 16);
}

#[test]
fn likely_branch_nullifies_slot_when_not_taken() {
    let program = [
        beql(T0, ZERO, 2),
        addiu(T1, ZERO, 1),
        addiu(T2, ZERO, 2),
        addiu(T2, T2, 10),
    ];

    let mut cpu = cpu_with(&program);
    cpu.set_reg(Register(T0), 1);
    cpu.step();
    assert_eq!(cpu.pc(), BASE + 8);
    cpu.step();
    assert_eq!(cpu.reg(Register(T1)), 0);
    assert_eq!(cpu.reg(Register(T2)), 2);

    let mut cpu = cpu_with(&program);
    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(T1)), 1);
    assert_eq!(cpu.reg(Register(T2)), 10);
}

#[test]
fn jump_register_and_link() {
    // JALR $ra, $s0
    let program = [r(S0, 0, RA, 0, 0x09), nop(), nop(), nop(), addiu(T0, ZERO, 1)];
    let mut cpu = cpu_with(&program);
    cpu.set_reg(Register(S0), sext(BASE + 16));

    run_steps(&mut cpu, 3);
    assert_eq!(cpu.reg(Register(RA)), sext(BASE + 8));
    assert_eq!(cpu.reg(Register(T0)), 1);

    let mut cpu = cpu_with(&[jr(S0), nop()]);
    cpu.set_reg(Register(S0), sext(0x8000_0400));
    run_steps(&mut cpu, 2);
    assert_eq!(cpu.pc(), 0x8000_0400);
}

#[test]
fn thirty_two_bit_results_are_sign_extended() {
    let program = [lui(T0, 0x8000), ori(T0, T0, 0x1234), addu(T1, T0, ZERO), add(T2, T1, ZERO)];
    let mut cpu = cpu_with(&program);

    run_steps(&mut cpu, 4);
    assert_eq!(cpu.reg(Register(T0)), 0xffff_ffff_8000_1234);
    assert_eq!(cpu.reg(Register(T1)), 0xffff_ffff_8000_1234);
    assert_eq!(cpu.reg(Register(T2)), 0xffff_ffff_8000_1234);
}

#[test]
fn addu_wraps_where_add_traps() {
    let mut cpu = cpu_with(&[addu(V0, A0, A1)]);
    cpu.set_reg(Register(A0), 0x7fff_ffff);
    cpu.set_reg(Register(A1), 1);

    cpu.step();
    assert_eq!(cpu.reg(Register(V0)), 0xffff_ffff_8000_0000);
    assert!(cpu.pending_fault().is_none());
}

#[test]
fn store_conditional_needs_the_link() {
    // LL $t0, 0($s0); SC $t1, 0($s0)
    let program = [
        i(0x30, S0, T0, 0),
        i(0x38, S0, T1, 0),
        nop(),
    ];
    let mut cpu = cpu_with(&program);
    cpu.set_reg(Register(S0), sext(0x8000_2000));
    cpu.set_reg(Register(T1), 77);

    run_steps(&mut cpu, 3);
    assert!(cpu.ll_bit());
    assert_eq!(cpu.reg(Register(T1)), 1);
    assert_eq!(cpu.memory_mut().peek(0x2000, Width::Word), Some(77));
    assert_eq!(cpu.cop0().ll_addr, 0x2000 >> 4);

    let mut cpu = cpu_with(&[i(0x38, S0, T1, 0)]);
    cpu.set_reg(Register(S0), sext(0x8000_2000));
    cpu.set_reg(Register(T1), 77);
    cpu.step();
    assert_eq!(cpu.reg(Register(T1)), 0);
    assert_eq!(cpu.memory_mut().peek(0x2000, Width::Word), Some(0));
}

#[test]
fn budget_runs_whole_instructions() {
    let mut cpu = cpu_with(&[]);
    let spent = cpu.run(10);
    assert_eq!(spent, 10);
    assert_eq!(cpu.pc(), BASE + 40);
    assert_eq!(cpu.stats().instructions(), 10);
}
