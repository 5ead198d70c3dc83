mod alu;
mod bit;
mod block;
mod branch;
mod config;
mod load_store;
mod registers;
mod stack;

pub use alu::{
    add8, add16, adc16, and8, cp8, daa, dec8, inc8, or8, parity, rotate_shift, sbc16, sub8, xor8,
};
pub use config::{OpcodePolicy, Z80Config};
pub use registers::{IndexMode, Reg8, RegisterPair};

use log::{debug, trace, warn};

use crate::core::{Bus, Z80Error};
use crate::cpu::{
    Cpu,
    state::{CpuStateTrait, Z80State},
};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    C = 0x01,  // Carry
    N = 0x02,  // Add/Subtract
    PV = 0x04, // Parity/Overflow
    H = 0x10,  // Half Carry
    Z = 0x40,  // Zero
    S = 0x80,  // Sign
}

/// Zilog Z80 execution engine.
///
/// Executes one whole instruction per `step()` and reports its cycle cost.
/// The bus is borrowed per call; the driver decides when to step, when to
/// deliver interrupts and when to reset.
pub struct Z80 {
    // Registers
    pub a: u8,
    pub f: u8,
    pub bc: RegisterPair,
    pub de: RegisterPair,
    pub hl: RegisterPair,
    // Shadow Registers
    pub a_prime: u8,
    pub f_prime: u8,
    pub bc_prime: RegisterPair,
    pub de_prime: RegisterPair,
    pub hl_prime: RegisterPair,
    // Index & Special Registers
    pub ix: u16,
    pub iy: u16,
    pub i: u8,
    pub r: u8,
    pub sp: u16,
    pub pc: u16,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
    /// Vector byte latched by a write to port 0, low half of the IM 2 pointer.
    pub interrupt_vector: u8,

    config: Z80Config,
    total_cycles: u64,
    last_cycles: u32,

    // Per-instruction decode state
    pub(crate) index_mode: IndexMode,
    pub(crate) instr_pc: u16,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    pub fn new() -> Self {
        Self::with_config(Z80Config::default())
    }

    pub fn with_config(config: Z80Config) -> Self {
        let mut cpu = Self {
            a: 0,
            f: 0,
            bc: RegisterPair::default(),
            de: RegisterPair::default(),
            hl: RegisterPair::default(),
            a_prime: 0,
            f_prime: 0,
            bc_prime: RegisterPair::default(),
            de_prime: RegisterPair::default(),
            hl_prime: RegisterPair::default(),
            ix: 0,
            iy: 0,
            i: 0,
            r: 0,
            sp: 0,
            pc: 0,
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
            interrupt_vector: 0,
            config,
            total_cycles: 0,
            last_cycles: 0,
            index_mode: IndexMode::HL,
            instr_pc: 0,
        };
        cpu.reset();
        cpu
    }

    pub fn config(&self) -> &Z80Config {
        &self.config
    }

    /// Power-on state: every register zeroed, SP at the configured stack
    /// top, interrupts disabled, interrupt mode 1.
    pub fn reset(&mut self) {
        self.a = 0;
        self.f = 0;
        self.bc.set(0);
        self.de.set(0);
        self.hl.set(0);
        self.a_prime = 0;
        self.f_prime = 0;
        self.bc_prime.set(0);
        self.de_prime.set(0);
        self.hl_prime.set(0);
        self.ix = 0;
        self.iy = 0;
        self.i = 0;
        self.r = 0;
        self.sp = self.config.reset_sp;
        self.pc = 0x0000;
        self.iff1 = false;
        self.iff2 = false;
        self.im = 1;
        self.halted = false;
        self.interrupt_vector = 0;
        self.total_cycles = 0;
        self.last_cycles = 0;
        self.index_mode = IndexMode::HL;
        self.instr_pc = 0;
        debug!("Z80 reset (SP={:04X})", self.sp);
    }

    // Helpers for 16-bit register access
    pub fn get_bc(&self) -> u16 { self.bc.get() }
    pub fn set_bc(&mut self, val: u16) { self.bc.set(val); }

    pub fn get_de(&self) -> u16 { self.de.get() }
    pub fn set_de(&mut self, val: u16) { self.de.set(val); }

    pub fn get_hl(&self) -> u16 { self.hl.get() }
    pub fn set_hl(&mut self, val: u16) { self.hl.set(val); }

    pub fn get_af(&self) -> u16 { ((self.a as u16) << 8) | self.f as u16 }
    pub fn set_af(&mut self, val: u16) { self.a = (val >> 8) as u8; self.f = val as u8; }

    pub fn set_pc(&mut self, val: u16) {
        self.pc = val;
    }

    pub fn get_flag(&self, flag: Flag) -> bool {
        (self.f & flag as u8) != 0
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.f |= flag as u8;
        } else {
            self.f &= !(flag as u8);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Cycles consumed since reset (or the last `reset_cycles`).
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Cycles consumed by the most recent step or interrupt acknowledge.
    pub fn last_cycles(&self) -> u32 {
        self.last_cycles
    }

    pub fn reset_cycles(&mut self) {
        self.total_cycles = 0;
    }

    /// EX AF,AF'
    pub fn exchange_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_prime);
        std::mem::swap(&mut self.f, &mut self.f_prime);
    }

    /// EXX: swap BC/DE/HL with their shadows.
    pub fn exchange_all(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_prime);
        std::mem::swap(&mut self.de, &mut self.de_prime);
        std::mem::swap(&mut self.hl, &mut self.hl_prime);
    }

    pub fn get_reg8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::B => self.bc.hi(),
            Reg8::C => self.bc.lo(),
            Reg8::D => self.de.hi(),
            Reg8::E => self.de.lo(),
            Reg8::H => self.hl.hi(),
            Reg8::L => self.hl.lo(),
            Reg8::A => self.a,
        }
    }

    pub fn set_reg8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::B => self.bc.set_hi(val),
            Reg8::C => self.bc.set_lo(val),
            Reg8::D => self.de.set_hi(val),
            Reg8::E => self.de.set_lo(val),
            Reg8::H => self.hl.set_hi(val),
            Reg8::L => self.hl.set_lo(val),
            Reg8::A => self.a = val,
        }
    }

    /// Get 8-bit register, respecting IX/IY prefix for H/L (undocumented IXH/IXL/IYH/IYL).
    pub(crate) fn get_reg8_ix(&self, reg: Reg8) -> u8 {
        match (reg, self.index_mode) {
            (Reg8::H, IndexMode::IX) => (self.ix >> 8) as u8,
            (Reg8::L, IndexMode::IX) => self.ix as u8,
            (Reg8::H, IndexMode::IY) => (self.iy >> 8) as u8,
            (Reg8::L, IndexMode::IY) => self.iy as u8,
            _ => self.get_reg8(reg),
        }
    }

    pub(crate) fn set_reg8_ix(&mut self, reg: Reg8, val: u8) {
        match (reg, self.index_mode) {
            (Reg8::H, IndexMode::IX) => self.ix = (self.ix & 0x00FF) | ((val as u16) << 8),
            (Reg8::L, IndexMode::IX) => self.ix = (self.ix & 0xFF00) | val as u16,
            (Reg8::H, IndexMode::IY) => self.iy = (self.iy & 0x00FF) | ((val as u16) << 8),
            (Reg8::L, IndexMode::IY) => self.iy = (self.iy & 0xFF00) | val as u16,
            _ => self.set_reg8(reg, val),
        }
    }

    /// Get 16-bit register pair by index (0=BC, 1=DE, 2=HL/IX/IY, 3=SP).
    /// Index 2 respects current index_mode for DD/FD prefixed instructions.
    pub(crate) fn get_rp(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.get_bc(),
            1 => self.get_de(),
            2 => match self.index_mode {
                IndexMode::HL => self.get_hl(),
                IndexMode::IX => self.ix,
                IndexMode::IY => self.iy,
            },
            _ => self.sp,
        }
    }

    /// Set 16-bit register pair by index (0=BC, 1=DE, 2=HL/IX/IY, 3=SP).
    pub(crate) fn set_rp(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => match self.index_mode {
                IndexMode::HL => self.set_hl(val),
                IndexMode::IX => self.ix = val,
                IndexMode::IY => self.iy = val,
            },
            _ => self.sp = val,
        }
    }

    /// Get 16-bit register pair by index for PUSH/POP (0=BC, 1=DE, 2=HL/IX/IY, 3=AF).
    pub(crate) fn get_rp_af(&self, index: u8) -> u16 {
        match index & 0x03 {
            3 => self.get_af(),
            rp => self.get_rp(rp),
        }
    }

    /// Set 16-bit register pair by index for PUSH/POP (0=BC, 1=DE, 2=HL/IX/IY, 3=AF).
    pub(crate) fn set_rp_af(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            3 => self.set_af(val),
            rp => self.set_rp(rp, val),
        }
    }

    // --- Bus access ---

    /// Advance the low 7 bits of R, once per M1 cycle.
    pub(crate) fn refresh(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    fn fetch_opcode<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let opcode = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.refresh();
        opcode
    }

    pub(crate) fn fetch_byte<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let val = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    pub(crate) fn fetch_word<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let low = self.fetch_byte(bus);
        let high = self.fetch_byte(bus);
        ((high as u16) << 8) | low as u16
    }

    pub(crate) fn read_word<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        ((high as u16) << 8) | low as u16
    }

    pub(crate) fn write_word<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B, addr: u16, val: u16) {
        bus.write(addr, val as u8);
        bus.write(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Effective address of the memory operand: HL, or IX/IY plus a signed
    /// displacement fetched from the instruction stream.
    pub(crate) fn index_addr<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u16 {
        match self.index_mode {
            IndexMode::HL => self.get_hl(),
            IndexMode::IX => {
                let d = self.fetch_byte(bus) as i8;
                self.ix.wrapping_add(d as i16 as u16)
            }
            IndexMode::IY => {
                let d = self.fetch_byte(bus) as i8;
                self.iy.wrapping_add(d as i16 as u16)
            }
        }
    }

    /// Extra cycles an (IX+d)/(IY+d) operand costs over (HL): displacement
    /// fetch plus address computation.
    pub(crate) fn index_penalty(&self) -> u32 {
        if self.index_mode == IndexMode::HL { 0 } else { 8 }
    }

    /// Port write. A write to port 0 also latches the IM 2 vector byte.
    pub(crate) fn port_write<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B, port: u16, val: u8) {
        if port & 0x00FF == 0 {
            self.interrupt_vector = val;
        }
        bus.io_write(port, val);
    }

    fn account(&mut self, cycles: u32) -> u32 {
        self.last_cycles = cycles;
        self.total_cycles += cycles as u64;
        cycles
    }

    // --- Execution ---

    /// Execute one instruction and return the cycles it consumed.
    ///
    /// While halted, each call costs 4 cycles and leaves every register alone.
    pub fn step<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> Result<u32, Z80Error> {
        if self.halted {
            return Ok(self.account(4));
        }

        self.instr_pc = self.pc;
        self.index_mode = IndexMode::HL;
        let opcode = self.fetch_opcode(bus);
        trace!("{:04X}: {:02X}", self.instr_pc, opcode);

        let result = match opcode {
            0xCB => Ok(self.execute_instruction_cb(bus)),
            0xED => self.execute_instruction_ed(bus),
            0xDD | 0xFD => self.execute_instruction_indexed(opcode, bus),
            _ => self.execute_instruction(opcode, bus),
        };
        self.index_mode = IndexMode::HL;
        result.map(|cycles| self.account(cycles))
    }

    /// Maskable interrupt acknowledge.
    ///
    /// No-op returning 0 when IFF1 is clear. Otherwise leaves HALT, disables
    /// interrupts, pushes PC and vectors according to the interrupt mode.
    /// IM 0 is handled as IM 1: the board drives RST 38h onto the data bus.
    pub fn interrupt<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        if !self.iff1 {
            return 0;
        }
        self.halted = false;
        self.iff1 = false;
        self.iff2 = false;
        self.refresh();
        self.push(bus, self.pc);

        let cycles = if self.im == 2 {
            let pointer = ((self.i as u16) << 8) | self.interrupt_vector as u16;
            self.pc = self.read_word(bus, pointer);
            19
        } else {
            self.pc = 0x0038;
            13
        };
        debug!("IRQ accepted (IM {}): PC={:04X}", self.im, self.pc);
        self.account(cycles)
    }

    /// Non-maskable interrupt: IFF1 cleared, IFF2 kept for RETN, jump to 0x0066.
    pub fn nmi<B: Bus<Address = u16, Data = u8> + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.halted = false;
        self.iff1 = false;
        self.refresh();
        self.push(bus, self.pc);
        self.pc = 0x0066;
        debug!("NMI accepted");
        self.account(11)
    }

    /// Build the error for an opcode with no handler, or log and carry on
    /// when the policy tolerates it. Primary-table misses are always errors.
    fn unimplemented(&self, prefix: Option<u8>, opcode: u8) -> Result<(), Z80Error> {
        if prefix.is_some() && self.config.opcode_policy == OpcodePolicy::Permissive {
            warn!(
                "unimplemented opcode 0x{:02X} 0x{:02X} at PC={:04X}, continuing",
                prefix.unwrap_or_default(),
                opcode,
                self.instr_pc
            );
            return Ok(());
        }
        Err(Z80Error::UnimplementedOpcode {
            prefix,
            opcode,
            pc: self.instr_pc,
            registers: Box::new(self.snapshot()),
        })
    }

    /// Primary opcode table. `index_mode` is already set when reached
    /// through a DD/FD prefix; the returned cycles exclude the prefix fetch.
    fn execute_instruction<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        opcode: u8,
        bus: &mut B,
    ) -> Result<u32, Z80Error> {
        let cycles = match opcode {
            // NOP: 4 T
            0x00 => 4,

            // HALT: 4 T. Sits inside the LD r,r' block, so it must match first.
            // PC stays past HALT.
            0x76 => {
                self.halted = true;
                4
            }

            // --- Load/Store ---

            // LD (BC), A: 7 T
            0x02 => self.op_ld_bc_a(bus),
            // LD (DE), A: 7 T
            0x12 => self.op_ld_de_a(bus),
            // LD (nn), HL: 16 T
            0x22 => self.op_ld_nn_hl(bus),
            // LD (nn), A: 13 T
            0x32 => self.op_ld_nn_a(bus),

            // EX AF, AF': 4 T
            0x08 => {
                self.exchange_af();
                4
            }

            // LD A, (BC): 7 T
            0x0A => self.op_ld_a_bc(bus),
            // LD A, (DE): 7 T
            0x1A => self.op_ld_a_de(bus),
            // LD HL, (nn): 16 T
            0x2A => self.op_ld_hl_nn_ind(bus),
            // LD A, (nn): 13 T
            0x3A => self.op_ld_a_nn(bus),

            // LD rr, nn (0x01/0x11/0x21/0x31): 10 T
            op if (op & 0xCF) == 0x01 => self.op_ld_rr_nn(op, bus),

            // LD r, n (0x06, 0x0E, ... 0x3E): 7 T
            op if (op & 0xC7) == 0x06 => self.op_ld_r_n(op, bus),

            // LD r, r' (0x40-0x7F excluding 0x76): 4/7 T
            op if (op & 0xC0) == 0x40 => self.op_ld_r_r(op, bus),

            // LD SP, HL: 6 T
            0xF9 => {
                self.sp = self.get_rp(2);
                6
            }

            // EX DE, HL: 4 T (NOT affected by DD/FD prefix)
            0xEB => {
                std::mem::swap(&mut self.de, &mut self.hl);
                4
            }
            // EXX: 4 T
            0xD9 => {
                self.exchange_all();
                4
            }
            // EX (SP), HL: 19 T
            0xE3 => self.op_ex_sp_hl(bus),

            // --- Stack ---

            // PUSH rr (0xC5/D5/E5/F5): 11 T
            op if (op & 0xCF) == 0xC5 => self.op_push(op, bus),
            // POP rr (0xC1/D1/E1/F1): 10 T
            op if (op & 0xCF) == 0xC1 => self.op_pop(op, bus),

            // --- ALU ---

            // ALU A, r (0x80 - 0xBF): 4 T (reg) or 7 T ((HL))
            op if (op & 0xC0) == 0x80 => self.op_alu_r(op, bus),
            // ALU A, n (0xC6, 0xCE, ... 0xFE): 7 T
            op if (op & 0xC7) == 0xC6 => self.op_alu_n(op, bus),

            // INC r / DEC r (0x04, 0x05, 0x0C...): 4 T (reg) or 11 T ((HL))
            op if (op & 0xC6) == 0x04 => self.op_inc_dec_r(op, bus),

            // ADD HL,rr (0x09/0x19/0x29/0x39): 11 T
            op if (op & 0xCF) == 0x09 => self.op_add_hl_rr(op),
            // INC rr / DEC rr (0x03/0x0B...): 6 T
            op if (op & 0xC7) == 0x03 => self.op_inc_dec_rr(op),

            // Accumulator rotates: 4 T
            0x07 => self.op_rlca(),
            0x0F => self.op_rrca(),
            0x17 => self.op_rla(),
            0x1F => self.op_rra(),

            // Misc ALU: 4 T
            0x27 => self.op_daa(),
            0x2F => self.op_cpl(),
            0x37 => self.op_scf(),
            0x3F => self.op_ccf(),

            // --- Branch/Control Flow ---

            // JP nn: 10 T
            0xC3 => self.op_jp_nn(bus),
            // JP (HL): 4 T
            0xE9 => {
                self.pc = self.get_rp(2);
                4
            }
            // JR e: 12 T
            0x18 => self.op_jr_e(bus),
            // DJNZ e: 13/8 T
            0x10 => self.op_djnz(bus),
            // CALL nn: 17 T
            0xCD => self.op_call_nn(bus),
            // RET: 10 T
            0xC9 => self.op_ret(bus),
            // IN A,(n): 11 T
            0xDB => self.op_in_a_n(bus),
            // OUT (n),A: 11 T
            0xD3 => self.op_out_n_a(bus),

            // DI: 4 T
            0xF3 => self.op_di(),
            // EI: 4 T
            0xFB => self.op_ei(),

            // JP cc,nn: 10 T
            op if (op & 0xC7) == 0xC2 => self.op_jp_cc_nn(op, bus),
            // JR cc,e: 12/7 T (NZ/Z/NC/C only)
            op if (op & 0xE7) == 0x20 => self.op_jr_cc_e(op, bus),
            // CALL cc,nn: 17/10 T
            op if (op & 0xC7) == 0xC4 => self.op_call_cc_nn(op, bus),
            // RET cc: 11/5 T
            op if (op & 0xC7) == 0xC0 => self.op_ret_cc(op, bus),
            // RST p: 11 T
            op if (op & 0xC7) == 0xC7 => self.op_rst(op, bus),

            // Prefix bytes never reach this table.
            op => {
                self.unimplemented(None, op)?;
                4
            }
        };
        Ok(cycles)
    }

    /// ED prefix dispatch. Returned cycles include both M1 fetches.
    fn execute_instruction_ed<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<u32, Z80Error> {
        let opcode = self.fetch_opcode(bus);
        let cycles = match opcode {
            // --- Specific ED opcodes (low 3 bits = 111) ---
            0x47 => self.op_ld_i_a(),         // LD I,A: 9T
            0x4F => self.op_ld_r_a(),         // LD R,A: 9T
            0x57 => self.op_ld_a_i(),         // LD A,I: 9T
            0x5F => self.op_ld_a_r(),         // LD A,R: 9T
            0x67 => self.op_rrd(bus),         // RRD: 18T
            0x6F => self.op_rld(bus),         // RLD: 18T

            // --- Block transfer/compare/IO ---
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.op_block_ld(opcode, bus), // LDI/LDD/LDIR/LDDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.op_block_cp(opcode, bus), // CPI/CPD/CPIR/CPDR
            0xA2 | 0xAA | 0xB2 | 0xBA => self.op_block_in(opcode, bus), // INI/IND/INIR/INDR
            0xA3 | 0xAB | 0xB3 | 0xBB => self.op_block_out(opcode, bus), // OUTI/OUTD/OTIR/OTDR

            // --- Pattern-based (40-7F range, low 3 bits 0-6) ---
            op if (op & 0xC7) == 0x40 => self.op_in_r_c(op, bus),  // IN r,(C): 12T
            op if (op & 0xC7) == 0x41 => self.op_out_c_r(op, bus), // OUT (C),r: 12T
            op if (op & 0xCF) == 0x42 => self.op_sbc_hl_rr(op),    // SBC HL,rr: 15T
            op if (op & 0xCF) == 0x43 => self.op_ld_nn_rr_ed(op, bus), // LD (nn),rr: 20T
            op if (op & 0xC7) == 0x44 => self.op_neg(),            // NEG: 8T
            op if (op & 0xC7) == 0x45 => self.op_retn(op, bus),    // RETN/RETI: 14T
            op if (op & 0xC7) == 0x46 => self.op_im(op),           // IM 0/1/2: 8T
            op if (op & 0xCF) == 0x4A => self.op_adc_hl_rr(op),    // ADC HL,rr: 15T
            op if (op & 0xCF) == 0x4B => self.op_ld_rr_nn_ed(op, bus), // LD rr,(nn): 20T

            // Undefined: an 8T NOP on silicon
            op => {
                self.unimplemented(Some(0xED), op)?;
                8
            }
        };
        Ok(cycles)
    }

    /// DD/FD prefix dispatch. Returned cycles include every prefix fetch.
    fn execute_instruction_indexed<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        prefix: u8,
        bus: &mut B,
    ) -> Result<u32, Z80Error> {
        let mut prefix = prefix;
        let mut cycles = 4;
        loop {
            self.index_mode = if prefix == 0xDD { IndexMode::IX } else { IndexMode::IY };
            let opcode = self.fetch_opcode(bus);
            match opcode {
                // Chained prefix: the earlier one is a 4T NOP, the last one wins
                0xDD | 0xFD => {
                    prefix = opcode;
                    cycles += 4;
                }
                // DD CB d op / FD CB d op
                0xCB => return Ok(cycles + self.execute_instruction_index_cb(bus)),
                op if Self::has_index_form(op) => {
                    return Ok(cycles + self.execute_instruction(op, bus)?);
                }
                op => {
                    self.unimplemented(Some(prefix), op)?;
                    // Orphan prefix: the opcode runs as if unprefixed
                    self.index_mode = IndexMode::HL;
                    let rest = if op == 0xED {
                        self.execute_instruction_ed(bus)?
                    } else {
                        self.execute_instruction(op, bus)?
                    };
                    return Ok(cycles + rest);
                }
            }
        }
    }

    /// True when a DD/FD prefix changes the meaning of this primary opcode:
    /// it touches HL, H, L or (HL).
    fn has_index_form(opcode: u8) -> bool {
        match opcode {
            0x09 | 0x19 | 0x29 | 0x39 => true,               // ADD IX,rr
            0x21 | 0x22 | 0x23 | 0x2A | 0x2B => true,        // LD/INC/DEC IX
            0x24 | 0x25 | 0x26 | 0x2C | 0x2D | 0x2E => true, // IXH/IXL forms
            0x34..=0x36 => true,                             // (IX+d) INC/DEC/LD n
            0x76 => false,                                   // HALT
            0x40..=0x7F => {
                let dst = (opcode >> 3) & 0x07;
                let src = opcode & 0x07;
                matches!(dst, 4..=6) || matches!(src, 4..=6)
            }
            0x80..=0xBF => matches!(opcode & 0x07, 4..=6),
            0xE1 | 0xE3 | 0xE5 | 0xE9 | 0xF9 => true,
            _ => false,
        }
    }
}

impl Cpu for Z80 {
    type Error = Z80Error;

    fn reset(&mut self) {
        Z80::reset(self);
    }

    fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>) -> Result<u32, Z80Error> {
        Z80::step(self, bus)
    }

    fn interrupt(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>) -> u32 {
        Z80::interrupt(self, bus)
    }

    fn is_halted(&self) -> bool {
        self.halted
    }
}

impl CpuStateTrait for Z80 {
    type Snapshot = Z80State;

    fn snapshot(&self) -> Z80State {
        Z80State {
            a: self.a,
            f: self.f,
            bc: self.bc.get(),
            de: self.de.get(),
            hl: self.hl.get(),
            af_prime: ((self.a_prime as u16) << 8) | self.f_prime as u16,
            bc_prime: self.bc_prime.get(),
            de_prime: self.de_prime.get(),
            hl_prime: self.hl_prime.get(),
            ix: self.ix,
            iy: self.iy,
            sp: self.sp,
            pc: self.pc,
            i: self.i,
            r: self.r,
            iff1: self.iff1,
            iff2: self.iff2,
            im: self.im,
            halted: self.halted,
            interrupt_vector: self.interrupt_vector,
        }
    }
}
