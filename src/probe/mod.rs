pub mod client;
pub mod icmp;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use icmp::*;
pub use socket::*;
