use crate::core::Bus;
use crate::cpu::z80::{Flag, Z80};

// Block instructions. Bit 3 of the ED opcode selects decrement, bit 4 selects
// the repeating form. A repeating form runs to completion inside one step:
// 21 T per iteration that loops back, 16 T for the final one. A repeat that
// starts with its counter at zero wraps and runs the full 65536 (or 256)
// iterations, as on silicon.

impl Z80 {
    fn block_delta(opcode: u8) -> u16 {
        if (opcode & 0x08) != 0 { 0xFFFF } else { 1 }
    }

    fn block_repeats(opcode: u8) -> bool {
        (opcode & 0x10) != 0
    }

    // --- Block Transfer ---

    /// (DE) <- (HL), step HL and DE, BC--.
    /// H=0, N=0, PV = BC != 0. S, Z, C preserved.
    fn ldi_once<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, delta: u16, bus: &mut B) {
        let val = bus.read(self.get_hl());
        bus.write(self.get_de(), val);
        self.set_hl(self.get_hl().wrapping_add(delta));
        self.set_de(self.get_de().wrapping_add(delta));
        self.set_bc(self.get_bc().wrapping_sub(1));

        let mut f = self.f & (Flag::S as u8 | Flag::Z as u8 | Flag::C as u8);
        if self.get_bc() != 0 { f |= Flag::PV as u8; }
        self.f = f;
    }

    /// LDI/LDD: 16T, LDIR/LDDR: 21T per repeat + 16T
    pub(crate) fn op_block_ld<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let delta = Self::block_delta(opcode);
        let mut cycles = 0;
        loop {
            self.ldi_once(delta, bus);
            if !Self::block_repeats(opcode) || self.get_bc() == 0 {
                return cycles + 16;
            }
            cycles += 21;
        }
    }

    // --- Block Compare ---

    /// Compare A with (HL), step HL, BC--.
    /// S, Z, H from A-(HL), N=1, PV = BC != 0, C preserved.
    fn cpi_once<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, delta: u16, bus: &mut B) {
        let val = bus.read(self.get_hl());
        let result = self.a.wrapping_sub(val);
        self.set_hl(self.get_hl().wrapping_add(delta));
        self.set_bc(self.get_bc().wrapping_sub(1));

        let mut f = (self.f & Flag::C as u8) | Flag::N as u8;
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        if (self.a & 0x0F) < (val & 0x0F) { f |= Flag::H as u8; }
        if self.get_bc() != 0 { f |= Flag::PV as u8; }
        self.f = f;
    }

    /// CPI/CPD: 16T, CPIR/CPDR: 21T per repeat + 16T.
    /// The repeating forms stop on a match (Z set) or when BC reaches 0.
    pub(crate) fn op_block_cp<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let delta = Self::block_delta(opcode);
        let mut cycles = 0;
        loop {
            self.cpi_once(delta, bus);
            if !Self::block_repeats(opcode) || self.get_bc() == 0 || self.get_flag(Flag::Z) {
                return cycles + 16;
            }
            cycles += 21;
        }
    }

    // --- Block I/O ---
    // B is the counter. Z = (B == 0), N = 1, S from B, C preserved.

    fn block_io_flags(&mut self) {
        let b = self.bc.hi();
        let mut f = (self.f & Flag::C as u8) | Flag::N as u8;
        if b == 0 { f |= Flag::Z as u8; }
        if (b & 0x80) != 0 { f |= Flag::S as u8; }
        self.f = f;
    }

    /// INI/IND: 16T, INIR/INDR: 21T per repeat + 16T.
    /// (HL) <- port BC, then B-- and step HL.
    pub(crate) fn op_block_in<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let delta = Self::block_delta(opcode);
        let mut cycles = 0;
        loop {
            let val = bus.io_read(self.get_bc());
            bus.write(self.get_hl(), val);
            self.bc.set_hi(self.bc.hi().wrapping_sub(1));
            self.set_hl(self.get_hl().wrapping_add(delta));
            self.block_io_flags();
            if !Self::block_repeats(opcode) || self.bc.hi() == 0 {
                return cycles + 16;
            }
            cycles += 21;
        }
    }

    /// OUTI/OUTD: 16T, OTIR/OTDR: 21T per repeat + 16T.
    /// B-- first, then port BC <- (HL) and step HL.
    pub(crate) fn op_block_out<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let delta = Self::block_delta(opcode);
        let mut cycles = 0;
        loop {
            let val = bus.read(self.get_hl());
            self.bc.set_hi(self.bc.hi().wrapping_sub(1));
            self.port_write(bus, self.get_bc(), val);
            self.set_hl(self.get_hl().wrapping_add(delta));
            self.block_io_flags();
            if !Self::block_repeats(opcode) || self.bc.hi() == 0 {
                return cycles + 16;
            }
            cycles += 21;
        }
    }
}
