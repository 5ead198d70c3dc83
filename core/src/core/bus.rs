/// Memory bus seen by the CPU.
///
/// All code fetches, data accesses and port I/O go through this trait. Address
/// decoding, mirroring and peripheral side effects belong to the implementor;
/// the CPU only ever sees the byte the bus hands back.
pub trait Bus {
    type Address: Copy + Into<u64>; // u16 for 8-bit CPUs
    type Data; // u8 for 8-bit CPUs

    fn read(&mut self, addr: Self::Address) -> Self::Data;

    /// Writes to ROM-mapped addresses are expected to be dropped by the bus.
    fn write(&mut self, addr: Self::Address, data: Self::Data);

    /// Read from I/O port address space (separate from memory on Z80).
    /// Default maps to memory read; override for boards with an I/O decoder.
    fn io_read(&mut self, port: Self::Address) -> Self::Data {
        self.read(port)
    }

    /// Write to I/O port address space (separate from memory on Z80).
    /// Default maps to memory write; override for boards with an I/O decoder.
    fn io_write(&mut self, port: Self::Address, data: Self::Data) {
        self.write(port, data)
    }
}
