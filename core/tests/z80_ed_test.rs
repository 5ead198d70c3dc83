mod common;
use common::{TestBus, run_instruction};
use pacz80_core::core::Z80Error;
use pacz80_core::cpu::z80::{OpcodePolicy, Z80, Z80Config};

// --- NEG ---

#[test]
fn test_neg() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x01;
    bus.load(0, &[0xED, 0x44]); // NEG

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.a, 0xFF);
    assert_ne!(cpu.f & 0x01, 0, "C set for non-zero A");
    assert_ne!(cpu.f & 0x02, 0, "N should be set");
    assert_ne!(cpu.f & 0x10, 0, "H should be set");
}

#[test]
fn test_neg_0x80_overflows() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x80;
    bus.load(0, &[0xED, 0x44]);

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x80);
    assert_ne!(cpu.f & 0x04, 0, "PV should be set");
}

#[test]
fn test_neg_zero_clears_carry() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x00;
    cpu.f = 0x01;
    bus.load(0, &[0xED, 0x44]);

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_eq!(cpu.f & 0x01, 0, "C should be clear");
    assert_ne!(cpu.f & 0x40, 0, "Z should be set");
}

// --- IM ---

#[test]
fn test_im_modes() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x5E, 0xED, 0x46, 0xED, 0x56]); // IM 2; IM 0; IM 1

    assert_eq!(run_instruction(&mut cpu, &mut bus), 8);
    assert_eq!(cpu.im, 2);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.im, 0);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.im, 1);
}

// --- 16-bit arithmetic ---

#[test]
fn test_sbc_hl_de_zero() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_hl(0x1234);
    cpu.set_de(0x1233);
    cpu.f = 0x01;
    bus.load(0, &[0xED, 0x52]); // SBC HL, DE

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 15);
    assert_eq!(cpu.get_hl(), 0x0000);
    assert_ne!(cpu.f & 0x40, 0, "Z should be set");
    assert_ne!(cpu.f & 0x02, 0, "N should be set");
    assert_eq!(cpu.f & 0x01, 0, "C should be clear");
}

#[test]
fn test_adc_hl_bc_carry_out() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_hl(0xFFFF);
    cpu.set_bc(0x0000);
    cpu.f = 0x01;
    bus.load(0, &[0xED, 0x4A]); // ADC HL, BC

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 15);
    assert_eq!(cpu.get_hl(), 0x0000);
    assert_ne!(cpu.f & 0x01, 0, "C should be set");
    assert_ne!(cpu.f & 0x40, 0, "Z should be set");
}

// --- 16-bit memory loads ---

#[test]
fn test_ld_nn_de_and_back_into_sp() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_de(0xBEEF);
    bus.load(0, &[0xED, 0x53, 0x00, 0x43, 0xED, 0x7B, 0x00, 0x43]); // LD (0x4300),DE; LD SP,(0x4300)

    assert_eq!(run_instruction(&mut cpu, &mut bus), 20);
    assert_eq!(bus.memory[0x4300], 0xEF);
    assert_eq!(bus.memory[0x4301], 0xBE);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 20);
    assert_eq!(cpu.sp, 0xBEEF);
}

// --- I / R ---

#[test]
fn test_ld_a_i_reports_iff2() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x50;
    cpu.iff2 = true;
    bus.load(0, &[0xED, 0x47, 0x3E, 0x00, 0xED, 0x57]); // LD I,A; LD A,0; LD A,I

    assert_eq!(run_instruction(&mut cpu, &mut bus), 9);
    assert_eq!(cpu.i, 0x50);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 9);
    assert_eq!(cpu.a, 0x50);
    assert_ne!(cpu.f & 0x04, 0, "PV mirrors IFF2");
    assert_eq!(cpu.f & 0x40, 0, "Z should be clear");
}

#[test]
fn test_ld_r_a_then_refresh() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x80;
    bus.load(0, &[0xED, 0x4F, 0x00]); // LD R,A; NOP

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.r, 0x80);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.r, 0x81, "bit 7 of R survives the refresh counter");
}

// --- RRD / RLD ---

#[test]
fn test_rld() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x7A;
    cpu.set_hl(0x4000);
    bus.memory[0x4000] = 0x31;
    bus.load(0, &[0xED, 0x6F]); // RLD

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 18);
    assert_eq!(cpu.a, 0x73);
    assert_eq!(bus.memory[0x4000], 0x1A);
}

#[test]
fn test_rrd() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x84;
    cpu.set_hl(0x4000);
    bus.memory[0x4000] = 0x20;
    bus.load(0, &[0xED, 0x67]); // RRD

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x80);
    assert_eq!(bus.memory[0x4000], 0x42);
    assert_ne!(cpu.f & 0x80, 0, "S from A");
}

// --- Port I/O via C ---

#[test]
fn test_in_r_c_sets_flags() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_bc(0x0010);
    cpu.f = 0x01;
    bus.ports[0x10] = 0x00;
    bus.load(0, &[0xED, 0x50]); // IN D,(C)

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.get_de() >> 8, 0x00);
    assert_ne!(cpu.f & 0x40, 0, "Z should be set");
    assert_ne!(cpu.f & 0x04, 0, "PV holds parity");
    assert_ne!(cpu.f & 0x01, 0, "C should be preserved");
}

#[test]
fn test_out_c_r() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_bc(0x1234);
    cpu.set_hl(0x00AB); // L = 0xAB
    bus.load(0, &[0xED, 0x69]); // OUT (C),L

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(bus.io_writes, vec![(0x1234, 0xAB)]);
}

// --- RETN / RETI ---

#[test]
fn test_retn_restores_iff1_from_iff2() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.sp = 0x4FFE;
    bus.load(0x4FFE, &[0x00, 0x30]);
    cpu.iff1 = false;
    cpu.iff2 = true;
    bus.load(0, &[0xED, 0x45]); // RETN

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 14);
    assert_eq!(cpu.pc, 0x3000);
    assert!(cpu.iff1);
}

#[test]
fn test_reti_reenables_interrupts() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.sp = 0x4FFE;
    bus.load(0x4FFE, &[0x10, 0x00]);
    bus.load(0, &[0xED, 0x4D]); // RETI

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc, 0x0010);
    assert_eq!(cpu.sp, 0x5000);
    assert!(cpu.iff1 && cpu.iff2);
}

// --- Undefined ED opcodes ---

#[test]
fn test_undefined_ed_is_an_error_by_default() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    bus.load(0x0100, &[0xED, 0x00]);

    match cpu.step(&mut bus) {
        Err(Z80Error::UnimplementedOpcode { prefix, opcode, pc, .. }) => {
            assert_eq!(prefix, Some(0xED));
            assert_eq!(opcode, 0x00);
            assert_eq!(pc, 0x0100);
        }
        other => panic!("expected UnimplementedOpcode, got {other:?}"),
    }
}

#[test]
fn test_undefined_ed_error_message() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0xFF]);

    let err = cpu.step(&mut bus).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("0xED 0xFF"), "{message}");
    assert!(message.contains("PC=0000"), "{message}");
}

#[test]
fn test_undefined_ed_permissive_is_nop() {
    let mut cpu = Z80::with_config(Z80Config {
        opcode_policy: OpcodePolicy::Permissive,
        ..Z80Config::default()
    });
    let mut bus = TestBus::new();
    cpu.a = 0x12;
    bus.load(0, &[0xED, 0x00, 0x3C]); // undefined; INC A

    assert_eq!(run_instruction(&mut cpu, &mut bus), 8);
    assert_eq!(cpu.pc, 2);
    assert_eq!(cpu.a, 0x12);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.a, 0x13);
}
