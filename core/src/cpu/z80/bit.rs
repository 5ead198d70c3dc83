use crate::core::Bus;
use crate::cpu::z80::{Flag, IndexMode, Reg8, Z80, rotate_shift};

impl Z80 {
    /// BIT b: Z and PV = tested bit clear, S only for bit 7 when set, H=1,
    /// N=0, C preserved.
    fn bit_flags(&self, bit: u8, val: u8) -> u8 {
        let tested = val & (1 << bit);
        let mut f = (self.f & Flag::C as u8) | Flag::H as u8;
        if tested == 0 {
            f |= Flag::Z as u8 | Flag::PV as u8;
        }
        if bit == 7 && tested != 0 {
            f |= Flag::S as u8;
        }
        f
    }

    /// Apply a rotate/shift, RES or SET to `val`. BIT never reaches here.
    fn cb_modify(&mut self, op: u8, val: u8) -> u8 {
        let yyy = (op >> 3) & 0x07;
        match op >> 6 {
            0 => {
                let (result, f) = rotate_shift(yyy, val, self.f);
                self.f = f;
                result
            }
            2 => val & !(1 << yyy),
            _ => val | (1 << yyy),
        }
    }

    /// CB prefix: rotate/shift, BIT, RES, SET on a register or (HL).
    /// 8 T (register), 12 T (BIT b,(HL)), 15 T (other (HL) forms).
    /// Cycles include both M1 fetches.
    pub(crate) fn execute_instruction_cb<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);
        let bit = (op >> 3) & 0x07;

        match Reg8::decode(op) {
            Some(reg) => {
                let val = self.get_reg8(reg);
                if (op >> 6) == 1 {
                    self.f = self.bit_flags(bit, val);
                } else {
                    let result = self.cb_modify(op, val);
                    self.set_reg8(reg, result);
                }
                8
            }
            None => {
                let addr = self.get_hl();
                let val = bus.read(addr);
                if (op >> 6) == 1 {
                    self.f = self.bit_flags(bit, val);
                    12
                } else {
                    let result = self.cb_modify(op, val);
                    bus.write(addr, result);
                    15
                }
            }
        }
    }

    /// DD CB d op / FD CB d op. The displacement precedes the final opcode,
    /// which is fetched as data and does not refresh R.
    ///
    /// 20 T for BIT, 23 T for everything else; the value returned excludes
    /// the 4 T DD/FD fetch. Non-BIT forms with a register field also copy the
    /// result into that register.
    pub(crate) fn execute_instruction_index_cb<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> u32 {
        let d = self.fetch_byte(bus) as i8;
        let base = if self.index_mode == IndexMode::IY { self.iy } else { self.ix };
        let addr = base.wrapping_add(d as i16 as u16);
        let op = self.fetch_byte(bus);
        let val = bus.read(addr);

        if (op >> 6) == 1 {
            self.f = self.bit_flags((op >> 3) & 0x07, val);
            return 16;
        }

        let result = self.cb_modify(op, val);
        bus.write(addr, result);
        if let Some(reg) = Reg8::decode(op) {
            self.set_reg8(reg, result);
        }
        19
    }
}
