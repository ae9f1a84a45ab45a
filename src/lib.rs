//! Project focus tracking: a capped set of active projects, time logs against
//! them, and the aggregate views built from both.
//!
//! [`domain`] holds the pure state transitions, [`report`] the read-side
//! aggregation. [`storage`], [`render`] and [`config`] are the collaborators
//! the `focus-ledger` binary wires around them.

pub mod config;
pub mod domain;
pub mod render;
pub mod report;
pub mod storage;
