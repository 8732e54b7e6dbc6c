//! Consistent hashing with virtual nodes.
//!
//! This crate provides:
//! - A stable 128-bit hash (MD5) that is identical across processes and machines
//! - An ordered ring store with clockwise successor lookups
//! - A consistent hash ring where each node occupies `R` virtual positions
//! - A copy-on-write coordinator for sharing the ring between threads
//!
//! # Example
//!
//! ```rust
//! use vnode_hashring::ConsistentHashRing;
//!
//! fn main() -> Result<(), vnode_hashring::Error> {
//!     let mut ring: ConsistentHashRing = ConsistentHashRing::new(160)?;
//!     ring.add_node("cache-a")?;
//!     ring.add_node("cache-b")?;
//!
//!     let owner = ring.get_node("user:42")?;
//!     assert!(ring.contains(owner.as_str()));
//!
//!     ring.remove_node("cache-b")?;
//!     assert_eq!(ring.get_node("user:42")?, "cache-a");
//!     Ok(())
//! }
//! ```
//!
//! # Choosing a replication factor
//!
//! With a single position per node, arc lengths between a handful of random
//! points vary wildly. Each node's share converges toward `1 / nodes` as the
//! replication factor grows, with spread shrinking roughly as `1 / sqrt(R)`.
//! Membership changes cost `O(R log n)` and memory grows with `nodes * R`.
//!
//! # Sharing between threads
//!
//! ```rust
//! use vnode_hashring::{ConsistentHashRing, MembershipEvent, RingCoordinator};
//!
//! let coordinator: RingCoordinator = RingCoordinator::new(ConsistentHashRing::new(64).unwrap());
//! let mut events = coordinator.subscribe();
//!
//! coordinator.add_node("shard-1").unwrap();
//! assert_eq!(events.try_recv().unwrap(), MembershipEvent::Joined("shard-1".into()));
//! assert_eq!(coordinator.get_node("any-key").unwrap(), "shard-1");
//! ```

mod config;
mod coordinator;
mod error;
mod hasher;
mod ring;
mod store;

pub use config::{
    RingConfig, DEFAULT_REPLICATION_FACTOR, MAX_REPLICATION_FACTOR, REPLICATION_FACTOR_ENV,
};
pub use coordinator::{MembershipEvent, RingCoordinator};
pub use error::{Error, Result};
pub use hasher::{serialize_virtual_node, HashValue, Md5Hasher, StableHasher};
pub use ring::{ConsistentHashRing, MembershipDiff, RingNode};
pub use store::RingStore;
