//! Record storage backends.
//!
//! The trait lives with the market-data models; this module supplies
//! the in-process implementation the monitor runs on.

mod memory;

pub use memory::MemoryRecordStore;
