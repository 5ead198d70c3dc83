use crate::core::Bus;

/// Generic CPU interface used by the board driver.
///
/// The driver owns the CPU and lends it the bus for each call; it decides when
/// to step, when to raise interrupts and when to reset.
pub trait Cpu: CpuStateTrait {
    type Error;

    /// Return to the power-on state.
    fn reset(&mut self);

    /// Execute one instruction and return the cycles it consumed.
    fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>) -> Result<u32, Self::Error>;

    /// Attempt maskable interrupt delivery. Returns the acknowledge cost, or 0
    /// when interrupts are disabled.
    fn interrupt(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>) -> u32;

    /// Query if CPU is halted internally (HALT instruction)
    fn is_halted(&self) -> bool;
}

// Re-export state types
pub mod state;
pub use state::{CpuStateTrait, Z80State};

// Z80 CPU
pub mod z80;
pub use z80::Z80;
