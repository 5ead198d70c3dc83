use crate::core::Bus;
use crate::cpu::z80::Z80;

impl Z80 {
    /// SP -= 2, high byte at SP+1, low byte at SP.
    pub(crate) fn push<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, val as u8);
    }

    pub(crate) fn pop<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let low = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let high = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        ((high as u16) << 8) | low as u16
    }

    /// PUSH rr: 11 T
    /// Opcode mask: 11 rr0 101 (rr: 0=BC, 1=DE, 2=HL/IX/IY, 3=AF)
    pub(crate) fn op_push<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = self.get_rp_af((opcode >> 4) & 0x03);
        self.push(bus, val);
        11
    }

    /// POP rr: 10 T
    /// Opcode mask: 11 rr0 001 (rr: 0=BC, 1=DE, 2=HL/IX/IY, 3=AF)
    pub(crate) fn op_pop<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = self.pop(bus);
        self.set_rp_af((opcode >> 4) & 0x03, val);
        10
    }

    /// EX (SP), HL: 19 T. Swaps HL (or IX/IY) with the word at the top of
    /// the stack; SP is unchanged.
    pub(crate) fn op_ex_sp_hl<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let top = self.read_word(bus, self.sp);
        let val = self.get_rp(2);
        self.write_word(bus, self.sp, val);
        self.set_rp(2, top);
        19
    }
}
