pub mod core;
pub mod cpu;

pub mod prelude {
    pub use crate::core::{Bus, Z80Error};
    pub use crate::cpu::z80::{Flag, OpcodePolicy, Z80, Z80Config};
    pub use crate::cpu::{Cpu, CpuStateTrait, Z80State};
}
