//! streamgate-allocator: capacity-bounded stream-to-instance assignment.
//!
//! The control-plane allocator behind a load balancer: given a shop, a
//! stream, and a requested port, [`Allocator::register`] finds an instance
//! with spare capacity not already bound to that port and atomically records
//! the assignment across four denormalized records;
//! [`Allocator::unregister`] atomically reverses it.
//!
//! # Consistency protocol
//!
//! There is no central lock. Every commit is a single conditional
//! multi-item transaction ([`streamgate_state::WriteTransaction`]) whose
//! instance item carries a version-token precondition; two callers racing on
//! the same instance resolve by one transaction failing its condition.
//! Register treats a lost race as "try the next candidate"; unregister
//! surfaces it directly.
//!
//! # Bounds
//!
//! [`AllocatorConfig`] carries two independent knobs, both defaulting to 3:
//! the per-instance stream capacity and the per-port distinct-instance
//! bound.

pub mod config;
pub mod engine;
pub mod error;
pub mod register;
pub mod txn;
pub mod unregister;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AllocatorConfig;
pub use engine::{Allocator, Endpoints};
pub use error::{AllocatorError, AllocatorResult};
