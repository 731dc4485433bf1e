//! Single-threaded NDN forwarding engine: PIT, FIB, dead nonce list,
//! strategies and the pipeline that ties them together.

pub mod clock;
pub mod config;
pub mod content_store;
pub mod counters;
pub mod dead_nonce_list;
pub mod error;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod pit;
pub mod scheduler;
pub mod strategy;

pub use clock::Timestamp;
pub use config::ForwarderConfig;
pub use content_store::{ContentStore, MemoryContentStore};
pub use counters::ForwarderCounters;
pub use dead_nonce_list::DeadNonceList;
pub use error::{ConfigError, ForwarderError};
pub use face::{Face, FaceOutbox, FaceTable, MemoryFace};
pub use fib::{Fib, FibEntry, NextHop};
pub use forwarder::Forwarder;
pub use pit::{Pit, PitEntry, PitId};
pub use scheduler::{EventId, Scheduler};
pub use strategy::{Strategy, StrategyChoice};
