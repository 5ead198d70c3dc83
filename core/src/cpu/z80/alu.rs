use crate::core::Bus;
use crate::cpu::z80::{Flag, Reg8, Z80};

// Flag helpers below return the complete new F value. Undocumented bits 3
// and 5 are always left clear.

const C: u8 = Flag::C as u8;
const N: u8 = Flag::N as u8;
const PV: u8 = Flag::PV as u8;
const H: u8 = Flag::H as u8;
const Z: u8 = Flag::Z as u8;
const S: u8 = Flag::S as u8;

/// True when `value` has an even number of set bits.
pub fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

fn sz(value: u8) -> u8 {
    let mut f = 0;
    if value == 0 { f |= Z; }
    if (value & 0x80) != 0 { f |= S; }
    f
}

pub(crate) fn szp(value: u8) -> u8 {
    let mut f = sz(value);
    if parity(value) { f |= PV; }
    f
}

/// ADD/ADC. Returns (result, flags).
pub fn add8(a: u8, val: u8, carry: bool) -> (u8, u8) {
    let c_val = carry as u8;
    let wide = (a as u16) + (val as u16) + (c_val as u16);
    let result = wide as u8;

    let mut f = sz(result);
    if ((a & 0x0F) + (val & 0x0F) + c_val) > 0x0F { f |= H; }
    if ((a ^ result) & (val ^ result) & 0x80) != 0 { f |= PV; }
    if wide > 0xFF { f |= C; }
    (result, f)
}

/// SUB/SBC. Returns (result, flags).
pub fn sub8(a: u8, val: u8, carry: bool) -> (u8, u8) {
    let c_val = carry as u8;
    let result = a.wrapping_sub(val).wrapping_sub(c_val);

    let mut f = sz(result) | N;
    if (a & 0x0F) < (val & 0x0F) + c_val { f |= H; }
    if ((a ^ val) & (a ^ result) & 0x80) != 0 { f |= PV; }
    if (a as u16) < (val as u16) + (c_val as u16) { f |= C; }
    (result, f)
}

/// CP: the flags of `a - val`; the accumulator is left alone.
pub fn cp8(a: u8, val: u8) -> u8 {
    sub8(a, val, false).1
}

pub fn and8(a: u8, val: u8) -> (u8, u8) {
    let result = a & val;
    (result, szp(result) | H)
}

pub fn or8(a: u8, val: u8) -> (u8, u8) {
    let result = a | val;
    (result, szp(result))
}

pub fn xor8(a: u8, val: u8) -> (u8, u8) {
    let result = a ^ val;
    (result, szp(result))
}

/// INC: carry preserved from `flags`, overflow only on 0x7F -> 0x80.
pub fn inc8(val: u8, flags: u8) -> (u8, u8) {
    let result = val.wrapping_add(1);
    let mut f = (flags & C) | sz(result);
    if (val & 0x0F) == 0x0F { f |= H; }
    if val == 0x7F { f |= PV; }
    (result, f)
}

/// DEC: carry preserved from `flags`, overflow only on 0x80 -> 0x7F.
pub fn dec8(val: u8, flags: u8) -> (u8, u8) {
    let result = val.wrapping_sub(1);
    let mut f = (flags & C) | sz(result) | N;
    if (val & 0x0F) == 0x00 { f |= H; }
    if val == 0x80 { f |= PV; }
    (result, f)
}

/// ADD HL,rr: H from bit 11, C from bit 15, N cleared, S/Z/PV preserved.
pub fn add16(a: u16, val: u16, flags: u8) -> (u16, u8) {
    let wide = (a as u32) + (val as u32);
    let mut f = flags & (S | Z | PV);
    if ((a & 0x0FFF) + (val & 0x0FFF)) > 0x0FFF { f |= H; }
    if wide > 0xFFFF { f |= C; }
    (wide as u16, f)
}

/// ADC HL,rr: full 16-bit flag set.
pub fn adc16(a: u16, val: u16, carry: bool) -> (u16, u8) {
    let c_val = carry as u32;
    let wide = (a as u32) + (val as u32) + c_val;
    let result = wide as u16;

    let mut f = 0;
    if result == 0 { f |= Z; }
    if (result & 0x8000) != 0 { f |= S; }
    if ((a & 0x0FFF) as u32 + (val & 0x0FFF) as u32 + c_val) > 0x0FFF { f |= H; }
    if ((a ^ result) & (val ^ result) & 0x8000) != 0 { f |= PV; }
    if wide > 0xFFFF { f |= C; }
    (result, f)
}

/// SBC HL,rr: full 16-bit flag set, N set.
pub fn sbc16(a: u16, val: u16, carry: bool) -> (u16, u8) {
    let c_val = carry as u32;
    let result = (a as u32).wrapping_sub(val as u32).wrapping_sub(c_val) as u16;

    let mut f = N;
    if result == 0 { f |= Z; }
    if (result & 0x8000) != 0 { f |= S; }
    if ((a & 0x0FFF) as u32) < (val & 0x0FFF) as u32 + c_val { f |= H; }
    if ((a ^ val) & (a ^ result) & 0x8000) != 0 { f |= PV; }
    if (a as u32) < (val as u32) + c_val { f |= C; }
    (result, f)
}

/// CB-table rotate/shift selected by `op` (bits 5-3 of the CB opcode):
/// RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL.
///
/// S/Z/PV come from the result and H/N are cleared. C takes the bit shifted
/// out, except for SWAP (nibble exchange) which keeps the incoming carry.
pub fn rotate_shift(op: u8, val: u8, flags: u8) -> (u8, u8) {
    let carry_in = (flags & C) != 0;
    let (result, carry) = match op & 0x07 {
        0 => (val.rotate_left(1), (val & 0x80) != 0),
        1 => (val.rotate_right(1), (val & 0x01) != 0),
        2 => ((val << 1) | carry_in as u8, (val & 0x80) != 0),
        3 => ((val >> 1) | ((carry_in as u8) << 7), (val & 0x01) != 0),
        4 => (val << 1, (val & 0x80) != 0),
        5 => ((val >> 1) | (val & 0x80), (val & 0x01) != 0),
        6 => (val.rotate_left(4), carry_in),
        _ => (val >> 1, (val & 0x01) != 0),
    };
    let mut f = szp(result);
    if carry { f |= C; }
    (result, f)
}

/// DAA: BCD-correct `a` after an add (N clear) or subtract (N set).
pub fn daa(a: u8, flags: u8) -> (u8, u8) {
    let n = (flags & N) != 0;
    let old_h = (flags & H) != 0;
    let old_c = (flags & C) != 0;

    let mut correction = 0u8;
    let mut new_c = old_c;
    if old_h || (a & 0x0F) > 9 {
        correction |= 0x06;
    }
    if old_c || a > 0x99 {
        correction |= 0x60;
        new_c = true;
    }

    let result = if n { a.wrapping_sub(correction) } else { a.wrapping_add(correction) };
    let new_h = if n { old_h && (a & 0x0F) < 6 } else { (a & 0x0F) > 9 };

    let mut f = szp(result);
    if new_c { f |= C; }
    if n { f |= N; }
    if new_h { f |= H; }
    (result, f)
}

impl Z80 {
    fn carry(&self) -> bool {
        (self.f & C) != 0
    }

    fn perform_alu_op(&mut self, op: u8, val: u8) {
        let (result, f) = match op & 0x07 {
            0 => add8(self.a, val, false),          // ADD
            1 => add8(self.a, val, self.carry()),   // ADC
            2 => sub8(self.a, val, false),          // SUB
            3 => sub8(self.a, val, self.carry()),   // SBC
            4 => and8(self.a, val),                 // AND
            5 => xor8(self.a, val),                 // XOR
            6 => or8(self.a, val),                  // OR
            _ => (self.a, cp8(self.a, val)),        // CP
        };
        self.a = result;
        self.f = f;
    }

    // --- Instructions ---

    /// ALU A, r: 4 T (reg), 7 T ((HL)), 15 T ((IX+d) before prefix)
    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP
    /// Opcode mask: 10 xxx zzz
    pub(crate) fn op_alu_r<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let alu_op = (opcode >> 3) & 0x07;
        match Reg8::decode(opcode) {
            Some(reg) => {
                let val = self.get_reg8_ix(reg);
                self.perform_alu_op(alu_op, val);
                4
            }
            None => {
                let addr = self.index_addr(bus);
                let val = bus.read(addr);
                self.perform_alu_op(alu_op, val);
                7 + self.index_penalty()
            }
        }
    }

    /// ALU A, n: 7 T
    /// Opcode mask: 11 xxx 110
    pub(crate) fn op_alu_n<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = self.fetch_byte(bus);
        self.perform_alu_op((opcode >> 3) & 0x07, val);
        7
    }

    /// INC/DEC r: 4 T (reg) or 11 T ((HL))
    /// Opcode mask: 00 rrr 10x
    pub(crate) fn op_inc_dec_r<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let is_dec = (opcode & 0x01) != 0;
        let apply = |val: u8, flags: u8| if is_dec { dec8(val, flags) } else { inc8(val, flags) };

        match Reg8::decode(opcode >> 3) {
            Some(reg) => {
                let (result, f) = apply(self.get_reg8_ix(reg), self.f);
                self.set_reg8_ix(reg, result);
                self.f = f;
                4
            }
            None => {
                let addr = self.index_addr(bus);
                let (result, f) = apply(bus.read(addr), self.f);
                bus.write(addr, result);
                self.f = f;
                11 + self.index_penalty()
            }
        }
    }

    // --- 16-bit ALU ---

    /// ADD HL,rr: 11 T
    /// Opcode mask: 00 rr1 001 (rr: 0=BC, 1=DE, 2=HL/IX/IY, 3=SP)
    pub(crate) fn op_add_hl_rr(&mut self, opcode: u8) -> u32 {
        let rr = self.get_rp((opcode >> 4) & 0x03);
        let (result, f) = add16(self.get_rp(2), rr, self.f);
        self.set_rp(2, result);
        self.f = f;
        11
    }

    /// INC rr / DEC rr: 6 T. No flags affected.
    pub(crate) fn op_inc_dec_rr(&mut self, opcode: u8) -> u32 {
        let rp = (opcode >> 4) & 0x03;
        let val = self.get_rp(rp);
        let result = if (opcode & 0x08) != 0 { val.wrapping_sub(1) } else { val.wrapping_add(1) };
        self.set_rp(rp, result);
        6
    }

    /// ADC HL,rr: 15 T (ED 4A/5A/6A/7A)
    pub(crate) fn op_adc_hl_rr(&mut self, opcode: u8) -> u32 {
        let rr = self.get_rp((opcode >> 4) & 0x03);
        let (result, f) = adc16(self.get_hl(), rr, self.carry());
        self.set_hl(result);
        self.f = f;
        15
    }

    /// SBC HL,rr: 15 T (ED 42/52/62/72)
    pub(crate) fn op_sbc_hl_rr(&mut self, opcode: u8) -> u32 {
        let rr = self.get_rp((opcode >> 4) & 0x03);
        let (result, f) = sbc16(self.get_hl(), rr, self.carry());
        self.set_hl(result);
        self.f = f;
        15
    }

    // --- Accumulator Rotates ---
    // S, Z, PV preserved; H and N cleared; C takes the bit shifted out.

    fn rotate_a(&mut self, result: u8, carry: bool) -> u32 {
        self.a = result;
        let mut f = self.f & (S | Z | PV);
        if carry { f |= C; }
        self.f = f;
        4
    }

    /// RLCA: 4 T
    pub(crate) fn op_rlca(&mut self) -> u32 {
        self.rotate_a(self.a.rotate_left(1), (self.a & 0x80) != 0)
    }

    /// RRCA: 4 T
    pub(crate) fn op_rrca(&mut self) -> u32 {
        self.rotate_a(self.a.rotate_right(1), (self.a & 0x01) != 0)
    }

    /// RLA: 4 T. Old C into bit 0.
    pub(crate) fn op_rla(&mut self) -> u32 {
        let result = (self.a << 1) | self.carry() as u8;
        self.rotate_a(result, (self.a & 0x80) != 0)
    }

    /// RRA: 4 T. Old C into bit 7.
    pub(crate) fn op_rra(&mut self) -> u32 {
        let result = (self.a >> 1) | ((self.carry() as u8) << 7);
        self.rotate_a(result, (self.a & 0x01) != 0)
    }

    // --- Misc ALU ---

    /// DAA: 4 T
    pub(crate) fn op_daa(&mut self) -> u32 {
        let (result, f) = daa(self.a, self.f);
        self.a = result;
        self.f = f;
        4
    }

    /// CPL: 4 T. Sets H and N; S, Z, PV, C preserved.
    pub(crate) fn op_cpl(&mut self) -> u32 {
        self.a = !self.a;
        self.f = (self.f & (S | Z | PV | C)) | H | N;
        4
    }

    /// SCF: 4 T
    pub(crate) fn op_scf(&mut self) -> u32 {
        self.f = (self.f & (S | Z | PV)) | C;
        4
    }

    /// CCF: 4 T. H = old C, C = !C.
    pub(crate) fn op_ccf(&mut self) -> u32 {
        let old_c = self.f & C;
        let mut f = self.f & (S | Z | PV);
        if old_c != 0 { f |= H; } else { f |= C; }
        self.f = f;
        4
    }

    /// NEG: 8 T (ED 44 and mirrors). A = 0 - A.
    pub(crate) fn op_neg(&mut self) -> u32 {
        let (result, f) = sub8(0, self.a, false);
        self.a = result;
        self.f = f;
        8
    }

    /// RRD: 18 T. Rotate the 12-bit value A[3:0]:(HL) right one nibble.
    pub(crate) fn op_rrd<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.get_hl();
        let mem = bus.read(addr);
        bus.write(addr, (self.a << 4) | (mem >> 4));
        self.a = (self.a & 0xF0) | (mem & 0x0F);
        self.f = (self.f & C) | szp(self.a);
        18
    }

    /// RLD: 18 T. Rotate the 12-bit value A[3:0]:(HL) left one nibble.
    pub(crate) fn op_rld<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.get_hl();
        let mem = bus.read(addr);
        bus.write(addr, (mem << 4) | (self.a & 0x0F));
        self.a = (self.a & 0xF0) | (mem >> 4);
        self.f = (self.f & C) | szp(self.a);
        18
    }
}
