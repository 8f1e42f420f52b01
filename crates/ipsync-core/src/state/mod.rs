// # Last-Known-IP Store Implementations
//
// This module provides implementations of the LastIpStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileLastIpStore;
pub use memory::MemoryLastIpStore;
