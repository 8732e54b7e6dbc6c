use crate::{ConsistentHashRing, Md5Hasher, MembershipDiff, Result, RingNode, StableHasher};
use arc_swap::ArcSwap;
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Buffered membership events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Membership change event.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipEvent<N = String> {
    Joined(N),
    Left(N),
}

/// Shares a [`ConsistentHashRing`] between one writer at a time and any
/// number of lock-free readers.
///
/// Every mutation clones the current ring, applies the change to the clone and
/// atomically swaps it in. Readers see either the ring before a mutation or
/// the ring after it, never a ring with only some of a node's virtual nodes
/// placed. A mutation that fails leaves the published ring untouched.
pub struct RingCoordinator<N = String, H = Md5Hasher> {
    ring: Arc<ArcSwap<ConsistentHashRing<N, H>>>,
    writer: Mutex<()>,
    event_tx: broadcast::Sender<MembershipEvent<N>>,
}

impl<N: RingNode, H: StableHasher> RingCoordinator<N, H> {
    pub fn new(ring: ConsistentHashRing<N, H>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ring: Arc::new(ArcSwap::from_pointee(ring)),
            writer: Mutex::new(()),
            event_tx,
        }
    }

    /// Add a node and publish the new ring.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateNode`] if the node is already a member.
    pub fn add_node(&self, node: impl Into<N>) -> Result<()> {
        let node = node.into();
        let _writer = self.lock_writer();

        let mut next = (**self.ring.load()).clone();
        next.add_node(node.clone())?;
        let count = next.node_count();
        self.ring.store(Arc::new(next));

        tracing::debug!(count, "Node joined, ring published");
        let _ = self.event_tx.send(MembershipEvent::Joined(node));
        Ok(())
    }

    /// Remove a node and publish the new ring.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownNode`] if the node is not a member.
    pub fn remove_node<Q>(&self, node: &Q) -> Result<()>
    where
        N: Borrow<Q>,
        Q: AsRef<[u8]> + Hash + Eq + ?Sized,
    {
        let _writer = self.lock_writer();

        let mut next = (**self.ring.load()).clone();
        let removed = next.remove_node(node)?;
        let count = next.node_count();
        self.ring.store(Arc::new(next));

        tracing::debug!(count, "Node left, ring published");
        let _ = self.event_tx.send(MembershipEvent::Left(removed));
        Ok(())
    }

    /// Replace the membership with `nodes`, as reported by an external
    /// membership source.
    ///
    /// The ring is only republished when membership actually changed. Events
    /// for every join and leave are broadcast after publishing.
    pub fn sync_members(&self, nodes: impl IntoIterator<Item = N>) -> MembershipDiff<N> {
        let _writer = self.lock_writer();

        let mut next = (**self.ring.load()).clone();
        let diff = next.rebuild(nodes);
        if diff.is_empty() {
            tracing::trace!(count = next.node_count(), "Sync: no membership changes");
            return diff;
        }

        let count = next.node_count();
        self.ring.store(Arc::new(next));
        tracing::debug!(
            count,
            joined = diff.joined.len(),
            left = diff.left.len(),
            "Membership changed, ring published"
        );

        for node in &diff.joined {
            let _ = self.event_tx.send(MembershipEvent::Joined(node.clone()));
        }
        for node in &diff.left {
            let _ = self.event_tx.send(MembershipEvent::Left(node.clone()));
        }
        diff
    }

    /// Route a key against the current ring.
    ///
    /// This is a lock-free operation using atomic pointer loading.
    pub fn get_node(&self, key: impl AsRef<[u8]>) -> Result<N> {
        self.ring.load().get_node(key).cloned()
    }

    pub fn get_nodes(&self, key: impl AsRef<[u8]>, count: usize) -> Result<Vec<N>> {
        let ring = self.ring.load();
        let nodes = ring.get_nodes(key, count)?;
        Ok(nodes.into_iter().cloned().collect())
    }

    pub fn members(&self) -> BTreeSet<N> {
        self.ring.load().members()
    }

    /// Get current node count in the ring.
    ///
    /// This is a lock-free operation using atomic pointer loading.
    pub fn node_count(&self) -> usize {
        self.ring.load().node_count()
    }

    pub fn contains<Q>(&self, node: &Q) -> bool
    where
        N: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ring.load().contains(node)
    }

    /// The currently published ring. Later mutations do not affect it.
    pub fn snapshot(&self) -> Arc<ConsistentHashRing<N, H>> {
        self.ring.load_full()
    }

    /// Subscribe to membership change events.
    ///
    /// Events are broadcast AFTER the ring has been published, so subscribers
    /// can safely call `node_count()` and get the new value.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent<N>> {
        self.event_tx.subscribe()
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock holds no broken state.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
