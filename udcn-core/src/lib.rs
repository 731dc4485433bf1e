//! Already-decoded NDN packet values shared by the forwarder and its drivers.

pub mod name;
pub mod packets;

pub use name::*;
pub use packets::*;
