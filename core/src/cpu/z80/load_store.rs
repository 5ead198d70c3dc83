use crate::core::Bus;
use crate::cpu::z80::alu::szp;
use crate::cpu::z80::{Flag, IndexMode, Reg8, Z80};

impl Z80 {
    /// LD r, n: 7 T
    /// LD (HL), n: 10 T
    /// LD (IX+d), n: 15 T after the prefix; d comes before n.
    /// Opcode mask: 00 rrr 110
    pub(crate) fn op_ld_r_n<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        match Reg8::decode(opcode >> 3) {
            Some(reg) => {
                let n = self.fetch_byte(bus);
                self.set_reg8_ix(reg, n);
                7
            }
            None => {
                let addr = self.index_addr(bus);
                let n = self.fetch_byte(bus);
                bus.write(addr, n);
                if self.index_mode == IndexMode::HL { 10 } else { 15 }
            }
        }
    }

    /// LD r, r': 4 T (register-register)
    /// LD r, (HL) / LD (HL), r: 7 T
    /// LD r, (IX+d) / LD (IX+d), r: 15 T after the prefix
    /// Opcode mask: 01 dst src. 0x76 (HALT) is decoded before this.
    ///
    /// With a memory operand the other side is always the real H/L, never
    /// IXH/IXL.
    pub(crate) fn op_ld_r_r<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        match (Reg8::decode(opcode >> 3), Reg8::decode(opcode)) {
            (Some(dst), Some(src)) => {
                let val = self.get_reg8_ix(src);
                self.set_reg8_ix(dst, val);
                4
            }
            (Some(dst), None) => {
                let addr = self.index_addr(bus);
                let val = bus.read(addr);
                self.set_reg8(dst, val);
                7 + self.index_penalty()
            }
            (None, Some(src)) => {
                let addr = self.index_addr(bus);
                bus.write(addr, self.get_reg8(src));
                7 + self.index_penalty()
            }
            // 0x76 never gets here
            (None, None) => 4,
        }
    }

    /// LD rr, nn: 10 T
    /// Opcode mask: 00 rr0 001 (rr: 0=BC, 1=DE, 2=HL/IX/IY, 3=SP)
    pub(crate) fn op_ld_rr_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = self.fetch_word(bus);
        self.set_rp((opcode >> 4) & 0x03, val);
        10
    }

    /// LD A, (BC): 7 T
    pub(crate) fn op_ld_a_bc<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.a = bus.read(self.get_bc());
        7
    }

    /// LD A, (DE): 7 T
    pub(crate) fn op_ld_a_de<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.a = bus.read(self.get_de());
        7
    }

    /// LD (BC), A: 7 T
    pub(crate) fn op_ld_bc_a<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        bus.write(self.get_bc(), self.a);
        7
    }

    /// LD (DE), A: 7 T
    pub(crate) fn op_ld_de_a<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        bus.write(self.get_de(), self.a);
        7
    }

    /// LD A, (nn): 13 T
    pub(crate) fn op_ld_a_nn<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        self.a = bus.read(addr);
        13
    }

    /// LD (nn), A: 13 T
    pub(crate) fn op_ld_nn_a<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        bus.write(addr, self.a);
        13
    }

    /// LD (nn), HL: 16 T. Low byte at nn.
    pub(crate) fn op_ld_nn_hl<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        let val = self.get_rp(2);
        self.write_word(bus, addr, val);
        16
    }

    /// LD HL, (nn): 16 T
    pub(crate) fn op_ld_hl_nn_ind<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        let val = self.read_word(bus, addr);
        self.set_rp(2, val);
        16
    }

    /// LD (nn),rr: 20T (ED 43/53/63/73)
    pub(crate) fn op_ld_nn_rr_ed<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        let val = self.get_rp((opcode >> 4) & 0x03);
        self.write_word(bus, addr, val);
        20
    }

    /// LD rr,(nn): 20T (ED 4B/5B/6B/7B)
    pub(crate) fn op_ld_rr_nn_ed<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let addr = self.fetch_word(bus);
        let val = self.read_word(bus, addr);
        self.set_rp((opcode >> 4) & 0x03, val);
        20
    }

    // --- Interrupt / refresh registers ---

    /// LD I,A: 9T
    pub(crate) fn op_ld_i_a(&mut self) -> u32 {
        self.i = self.a;
        9
    }

    /// LD R,A: 9T
    pub(crate) fn op_ld_r_a(&mut self) -> u32 {
        self.r = self.a;
        9
    }

    /// S, Z from the loaded value, PV = IFF2, H=0, N=0, C preserved.
    fn ld_a_special(&mut self, val: u8) -> u32 {
        self.a = val;
        let mut f = self.f & Flag::C as u8;
        if val == 0 { f |= Flag::Z as u8; }
        if (val & 0x80) != 0 { f |= Flag::S as u8; }
        if self.iff2 { f |= Flag::PV as u8; }
        self.f = f;
        9
    }

    /// LD A,I: 9T
    pub(crate) fn op_ld_a_i(&mut self) -> u32 {
        self.ld_a_special(self.i)
    }

    /// LD A,R: 9T
    pub(crate) fn op_ld_a_r(&mut self) -> u32 {
        self.ld_a_special(self.r)
    }

    // --- Port I/O ---

    /// IN A,(n): 11 T. Port address is A:n. No flags.
    pub(crate) fn op_in_a_n<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let n = self.fetch_byte(bus);
        let port = ((self.a as u16) << 8) | n as u16;
        self.a = bus.io_read(port);
        11
    }

    /// OUT (n),A: 11 T. Port address is A:n.
    pub(crate) fn op_out_n_a<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let n = self.fetch_byte(bus);
        let port = ((self.a as u16) << 8) | n as u16;
        self.port_write(bus, port, self.a);
        11
    }

    /// IN r,(C): 12T. Port address is BC.
    /// Flags: S, Z, PV(parity) from input, H=0, N=0, C preserved.
    /// For r=6 (IN F,(C)): flags affected but value not stored.
    pub(crate) fn op_in_r_c<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = bus.io_read(self.get_bc());
        if let Some(reg) = Reg8::decode(opcode >> 3) {
            self.set_reg8(reg, val);
        }
        self.f = (self.f & Flag::C as u8) | szp(val);
        12
    }

    /// OUT (C),r: 12T. No flag changes. For r=6 outputs 0.
    pub(crate) fn op_out_c_r<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let val = Reg8::decode(opcode >> 3).map_or(0, |reg| self.get_reg8(reg));
        self.port_write(bus, self.get_bc(), val);
        12
    }
}
