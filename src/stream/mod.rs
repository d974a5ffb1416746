//! Redis stream plumbing for the worker fleet.
//!
//! Requests arrive on a stream consumed through a consumer group, so each
//! message is delivered to exactly one worker:
//!
//! - [`consumer`]: consumer identity, group bootstrap and the read loop
//! - [`request`]: validation of one stream message into a typed request
//! - [`publisher`]: atomic response publication + acknowledgement
//!
//! # Delivery contract
//!
//! A response entry and the acknowledgement of its input message are
//! committed in one pipelined transaction. When that transaction fails the
//! message remains in the group's pending list and is reclaimable, which
//! makes the response side at-least-once.

pub mod consumer;
pub mod publisher;
pub mod request;

pub use consumer::Consumer;

/// Stream carrying command execution requests.
pub const SPAWN_STREAM: &str = "icinga2:process:spawn";
/// Stream carrying execution results.
pub const EXIT_STREAM: &str = "icinga2:process:exit";
/// Consumer group shared by the worker fleet.
pub const GROUP: &str = "icinga2-procmgr";
/// Upper bound on messages fetched per group read.
pub const READ_BATCH: usize = 100;
