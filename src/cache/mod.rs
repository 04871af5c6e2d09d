pub mod client;
pub mod dest_map;
pub mod error;
pub mod geometry;
pub mod l1;
pub mod message;
pub mod mshr;
pub mod request;
pub mod stall;
pub mod stats;
pub mod tag_store;

#[cfg(test)]
mod unit_tests;

/// Network node id of a cache or manager.
pub type NodeId = usize;

pub use client::ClientState;
pub use dest_map::{DestMap, FixedDestMap, PageBasedMap};
pub use error::CacheError;
pub use l1::L1Cache;
pub use message::{CohType, CoherenceMessage, MessageKind, NetworkPacket};
pub use request::{ProcRequest, ReqKind};
pub use stall::StallKind;
pub use stats::L1Stats;
