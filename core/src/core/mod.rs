pub mod bus;
pub mod error;

pub use bus::Bus;
pub use error::Z80Error;
