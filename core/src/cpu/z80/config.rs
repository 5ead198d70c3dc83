/// How the engine reacts to an opcode it has no handler for.
///
/// Primary-table misses are always fatal. The policy only decides what
/// happens for undefined ED opcodes and DD/FD prefixes whose following opcode
/// has no indexed form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpcodePolicy {
    /// Stop and return `Z80Error::UnimplementedOpcode`.
    #[default]
    Strict,
    /// Log a warning and execute the opcode the way silicon does.
    Permissive,
}

/// Construction-time settings for a `Z80`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Z80Config {
    pub opcode_policy: OpcodePolicy,
    /// Stack pointer loaded by `reset()`. The Pac-Man board puts the top of
    /// work RAM at 0x5000.
    pub reset_sp: u16,
}

impl Default for Z80Config {
    fn default() -> Self {
        Self {
            opcode_policy: OpcodePolicy::Strict,
            reset_sp: 0x5000,
        }
    }
}
