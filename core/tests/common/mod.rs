#![allow(dead_code)]

use pacz80_core::core::Bus;
use pacz80_core::cpu::z80::Z80;

/// Minimal bus for testing: flat 64KB read/write memory plus a 256-entry
/// port file. Every port write is recorded.
pub struct TestBus {
    pub memory: [u8; 0x10000],
    pub ports: [u8; 0x100],
    pub io_writes: Vec<(u16, u8)>,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            memory: [0; 0x10000],
            ports: [0; 0x100],
            io_writes: Vec::new(),
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }
}

impl Bus for TestBus {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.memory[addr as usize] = data;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.ports[(port & 0xFF) as usize]
    }

    fn io_write(&mut self, port: u16, data: u8) {
        self.io_writes.push((port, data));
    }
}

/// Execute one instruction, panicking on an engine error.
pub fn run_instruction(cpu: &mut Z80, bus: &mut TestBus) -> u32 {
    cpu.step(bus).expect("instruction should execute")
}

/// CPU with PC at 0 and interrupts off, as after reset.
pub fn setup() -> (Z80, TestBus) {
    (Z80::new(), TestBus::new())
}
