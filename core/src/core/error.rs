use thiserror::Error;

use crate::cpu::state::Z80State;

/// Faults raised by the execution engine.
#[derive(Debug, Error)]
pub enum Z80Error {
    /// An opcode with no handler was fetched. `prefix` is the table the
    /// opcode was looked up in (`None` for the primary table), `pc` the
    /// address of the first byte of the instruction.
    #[error("unimplemented opcode {} at PC={pc:04X}\n{registers}", format_opcode(*.prefix, *.opcode))]
    UnimplementedOpcode {
        prefix: Option<u8>,
        opcode: u8,
        pc: u16,
        registers: Box<Z80State>,
    },
}

fn format_opcode(prefix: Option<u8>, opcode: u8) -> String {
    match prefix {
        Some(p) => format!("0x{p:02X} 0x{opcode:02X}"),
        None => format!("0x{opcode:02X}"),
    }
}
