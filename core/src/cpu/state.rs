//! CPU state snapshot types and traits

use std::fmt;

/// Trait for CPU types that can provide state snapshots
pub trait CpuStateTrait {
    type Snapshot;
    fn snapshot(&self) -> Self::Snapshot;
}

/// Z80 CPU state snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Z80State {
    pub a: u8,                // Accumulator
    pub f: u8,                // Flags register
    pub bc: u16,              // Register pair BC
    pub de: u16,              // Register pair DE
    pub hl: u16,              // Register pair HL
    pub af_prime: u16,        // Shadow AF
    pub bc_prime: u16,        // Shadow BC
    pub de_prime: u16,        // Shadow DE
    pub hl_prime: u16,        // Shadow HL
    pub ix: u16,              // Index register X
    pub iy: u16,              // Index register Y
    pub sp: u16,              // Stack pointer
    pub pc: u16,              // Program counter
    pub i: u8,                // Interrupt vector register
    pub r: u8,                // Memory refresh register
    pub iff1: bool,           // Interrupt flip-flop 1
    pub iff2: bool,           // Interrupt flip-flop 2
    pub im: u8,               // Interrupt mode (0, 1, 2)
    pub halted: bool,         // HALT executed, waiting for an interrupt
    pub interrupt_vector: u8, // Byte latched by OUT (0),A
}

impl fmt::Display for Z80State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "AF={:02X}{:02X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X}",
            self.a, self.f, self.bc, self.de, self.hl, self.ix, self.iy
        )?;
        writeln!(
            f,
            "AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X}",
            self.af_prime, self.bc_prime, self.de_prime, self.hl_prime
        )?;
        write!(
            f,
            "SP={:04X} PC={:04X} I={:02X} R={:02X} IFF1={} IFF2={} IM={} HALT={}",
            self.sp,
            self.pc,
            self.i,
            self.r,
            self.iff1 as u8,
            self.iff2 as u8,
            self.im,
            self.halted as u8
        )
    }
}
