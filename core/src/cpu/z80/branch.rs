use crate::core::Bus;
use crate::cpu::z80::{Flag, Z80};

impl Z80 {
    /// Evaluate a condition code (3 bits from opcode bits 5-3).
    /// 0=NZ, 1=Z, 2=NC, 3=C, 4=PO, 5=PE, 6=P, 7=M
    pub(crate) fn eval_condition(&self, cc: u8) -> bool {
        match cc & 0x07 {
            0 => !self.get_flag(Flag::Z),
            1 => self.get_flag(Flag::Z),
            2 => !self.get_flag(Flag::C),
            3 => self.get_flag(Flag::C),
            4 => !self.get_flag(Flag::PV),
            5 => self.get_flag(Flag::PV),
            6 => !self.get_flag(Flag::S),
            _ => self.get_flag(Flag::S),
        }
    }

    /// Add a signed displacement to PC.
    fn jump_relative(&mut self, e: u8) {
        self.pc = self.pc.wrapping_add(e as i8 as i16 as u16);
    }

    /// JP nn: 10 T
    pub(crate) fn op_jp_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.pc = self.fetch_word(bus);
        10
    }

    /// JP cc,nn: 10 T whether taken or not.
    pub(crate) fn op_jp_cc_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let target = self.fetch_word(bus);
        if self.eval_condition(opcode >> 3) {
            self.pc = target;
        }
        10
    }

    /// JR e: 12 T. Displacement is relative to the next instruction.
    pub(crate) fn op_jr_e<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let e = self.fetch_byte(bus);
        self.jump_relative(e);
        12
    }

    /// JR cc,e: 12 T taken / 7 T not taken. Only NZ, Z, NC, C exist.
    pub(crate) fn op_jr_cc_e<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let e = self.fetch_byte(bus);
        if self.eval_condition((opcode >> 3) & 0x03) {
            self.jump_relative(e);
            12
        } else {
            7
        }
    }

    /// DJNZ e: 13 T taken / 8 T not taken. B--, jump while B != 0.
    pub(crate) fn op_djnz<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let e = self.fetch_byte(bus);
        let b = self.bc.hi().wrapping_sub(1);
        self.bc.set_hi(b);
        if b != 0 {
            self.jump_relative(e);
            13
        } else {
            8
        }
    }

    /// CALL nn: 17 T
    pub(crate) fn op_call_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let target = self.fetch_word(bus);
        self.push(bus, self.pc);
        self.pc = target;
        17
    }

    /// CALL cc,nn: 17 T taken / 10 T not taken.
    /// Both address bytes are read either way.
    pub(crate) fn op_call_cc_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let target = self.fetch_word(bus);
        if self.eval_condition(opcode >> 3) {
            self.push(bus, self.pc);
            self.pc = target;
            17
        } else {
            10
        }
    }

    /// RET: 10 T
    pub(crate) fn op_ret<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.pc = self.pop(bus);
        10
    }

    /// RET cc: 11 T taken / 5 T not taken
    pub(crate) fn op_ret_cc<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        if self.eval_condition(opcode >> 3) {
            self.pc = self.pop(bus);
            11
        } else {
            5
        }
    }

    /// RST p: 11 T. Target address = opcode & 0x38 (0x00, 0x08, ..., 0x38).
    pub(crate) fn op_rst<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        self.push(bus, self.pc);
        self.pc = (opcode & 0x38) as u16;
        11
    }

    /// DI: 4 T
    pub(crate) fn op_di(&mut self) -> u32 {
        self.iff1 = false;
        self.iff2 = false;
        4
    }

    /// EI: 4 T. Takes effect immediately; an interrupt may be accepted
    /// right after this instruction.
    pub(crate) fn op_ei(&mut self) -> u32 {
        self.iff1 = true;
        self.iff2 = true;
        4
    }

    /// RETN/RETI: 14 T (ED 45 and mirrors, ED 4D).
    /// RETN restores IFF1 from IFF2; RETI re-enables both.
    pub(crate) fn op_retn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        self.pc = self.pop(bus);
        if opcode == 0x4D {
            self.iff1 = true;
            self.iff2 = true;
        } else {
            self.iff1 = self.iff2;
        }
        14
    }

    /// IM 0/1/2: 8 T (ED 46/56/5E and mirrors).
    /// Bits 4-3: 00/01 -> IM 0, 10 -> IM 1, 11 -> IM 2.
    pub(crate) fn op_im(&mut self, opcode: u8) -> u32 {
        self.im = match (opcode >> 3) & 0x03 {
            0 | 1 => 0,
            2 => 1,
            _ => 2,
        };
        8
    }
}
