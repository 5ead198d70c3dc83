//! Register file building blocks.

/// A 16-bit register pair (BC, DE, HL and their shadows).
///
/// The pair value is the only storage; the 8-bit halves are views computed
/// from it, so the two can never disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterPair(u16);

impl RegisterPair {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    pub fn set(&mut self, value: u16) {
        self.0 = value;
    }

    /// High byte (B, D or H).
    pub const fn hi(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Low byte (C, E or L).
    pub const fn lo(self) -> u8 {
        self.0 as u8
    }

    pub fn set_hi(&mut self, value: u8) {
        self.0 = (self.0 & 0x00FF) | ((value as u16) << 8);
    }

    pub fn set_lo(&mut self, value: u8) {
        self.0 = (self.0 & 0xFF00) | value as u16;
    }
}

/// 8-bit register selected by a 3-bit opcode field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
}

impl Reg8 {
    /// Decode a 3-bit register field. Field 6 selects the memory operand
    /// ((HL), (IX+d) or (IY+d)) and has no register, so it yields `None`.
    pub const fn decode(field: u8) -> Option<Self> {
        match field & 0x07 {
            0 => Some(Reg8::B),
            1 => Some(Reg8::C),
            2 => Some(Reg8::D),
            3 => Some(Reg8::E),
            4 => Some(Reg8::H),
            5 => Some(Reg8::L),
            6 => None,
            _ => Some(Reg8::A),
        }
    }
}

/// What "HL" means for the instruction being executed, set by a DD/FD prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMode {
    HL,
    IX,
    IY,
}
