//! Domain types shared by every `rqd` crate.
//!
//! Nothing in here performs I/O: the types describe what the coordinator asks
//! for ([`TaskAssignment`]), what the host can give ([`HostResources`]) and what
//! the agent reports back ([`TaskInfo`], [`TaskEvent`], [`HostReport`]).
mod domain;
pub use domain::*;

mod error;
pub use error::ModelError;
