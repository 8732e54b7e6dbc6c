use crate::hasher::{serialize_virtual_node, HashValue, Md5Hasher, StableHasher};
use crate::store::RingStore;
use crate::{Error, Result, RingConfig, MAX_REPLICATION_FACTOR};
use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Anything that can identify a physical node on the ring.
///
/// Nodes are hashed over their bytes and ordered to break ties when two
/// virtual nodes land on the same position.
pub trait RingNode: AsRef<[u8]> + Clone + Eq + Hash + Ord {}

impl<T> RingNode for T where T: AsRef<[u8]> + Clone + Eq + Hash + Ord {}

/// One of the `R` ring positions owned by a node.
///
/// Ordered by `(node, replica)`, which decides who keeps a contested position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct VirtualNode<N> {
    node: N,
    replica: u32,
}

/// Nodes that joined and left during a [`ConsistentHashRing::rebuild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff<N> {
    pub joined: Vec<N>,
    pub left: Vec<N>,
}

impl<N> MembershipDiff<N> {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Consistent hash ring with virtual nodes.
///
/// Each member occupies `replication_factor` positions. A key belongs to the
/// member owning the first position at or clockwise after the key's hash.
///
/// When two virtual nodes hash to the same position, the smallest
/// `(node, replica)` pair occupies it and the others are shadowed until it
/// leaves. Routing therefore depends only on the member set, not on the
/// order in which members were added.
#[derive(Debug, Clone)]
pub struct ConsistentHashRing<N = String, H = Md5Hasher> {
    replication_factor: u32,
    hasher: H,
    store: RingStore<VirtualNode<N>>,
    positions: HashMap<N, Vec<HashValue>>,
    shadowed: BTreeMap<HashValue, BTreeSet<VirtualNode<N>>>,
}

impl<N: RingNode> ConsistentHashRing<N, Md5Hasher> {
    /// Create an empty ring hashing with MD5.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReplicationFactor`] if `replication_factor` is
    /// zero or above [`MAX_REPLICATION_FACTOR`].
    pub fn new(replication_factor: u32) -> Result<Self> {
        Self::with_hasher(replication_factor, Md5Hasher)
    }

    pub fn from_config(config: &RingConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.replication_factor)
    }
}

impl<N: RingNode, H: StableHasher> ConsistentHashRing<N, H> {
    /// Create an empty ring with an explicit hasher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReplicationFactor`] unless `replication_factor`
    /// is between 1 and [`MAX_REPLICATION_FACTOR`].
    pub fn with_hasher(replication_factor: u32, hasher: H) -> Result<Self> {
        if !(1..=MAX_REPLICATION_FACTOR).contains(&replication_factor) {
            return Err(Error::InvalidReplicationFactor(replication_factor));
        }
        Ok(Self {
            replication_factor,
            hasher,
            store: RingStore::new(),
            positions: HashMap::new(),
            shadowed: BTreeMap::new(),
        })
    }

    /// Add a node and its virtual nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateNode`] if the node is already a member. The
    /// ring is left untouched.
    pub fn add_node(&mut self, node: impl Into<N>) -> Result<()> {
        let node = node.into();
        if self.positions.contains_key(&node) {
            return Err(Error::duplicate_node(node.as_ref()));
        }
        self.attach(node);
        Ok(())
    }

    /// Remove a node and every position it owns, returning the stored
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNode`] if the node is not a member.
    pub fn remove_node<Q>(&mut self, node: &Q) -> Result<N>
    where
        N: Borrow<Q>,
        Q: AsRef<[u8]> + Hash + Eq + ?Sized,
    {
        let (node, owned) = self
            .positions
            .remove_entry(node)
            .ok_or_else(|| Error::unknown_node(node.as_ref()))?;
        self.detach(&node, owned);
        Ok(node)
    }

    /// Route a key to the node owning its clockwise successor position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyRing`] if there are no members.
    pub fn get_node(&self, key: impl AsRef<[u8]>) -> Result<&N> {
        let position = self.hasher.hash(key.as_ref());
        self.store
            .successor(position)
            .map(|(_, vnode)| &vnode.node)
            .ok_or(Error::EmptyRing)
    }

    /// Up to `count` distinct members in clockwise order from the key.
    ///
    /// The first entry is always `get_node(key)`. Asking for more nodes than
    /// there are members returns every member once.
    pub fn get_nodes(&self, key: impl AsRef<[u8]>, count: usize) -> Result<Vec<&N>> {
        if self.store.is_empty() {
            return Err(Error::EmptyRing);
        }
        let position = self.hasher.hash(key.as_ref());
        let mut seen = HashSet::new();
        Ok(self
            .store
            .walk_from(position)
            .map(|(_, vnode)| &vnode.node)
            .filter(|node| seen.insert(*node))
            .take(count.min(self.positions.len()))
            .collect())
    }

    /// Replace the membership with `nodes`.
    ///
    /// Nodes present both before and after keep their positions. Routing
    /// afterwards is identical to a ring built from scratch with `nodes`.
    pub fn rebuild(&mut self, nodes: impl IntoIterator<Item = N>) -> MembershipDiff<N> {
        let target: BTreeSet<N> = nodes.into_iter().collect();

        let mut left: Vec<N> = self
            .positions
            .keys()
            .filter(|node| !target.contains(*node))
            .cloned()
            .collect();
        left.sort();

        for node in &left {
            if let Some(owned) = self.positions.remove(node) {
                self.detach(node, owned);
            }
        }

        let joined: Vec<N> = target
            .into_iter()
            .filter(|node| !self.positions.contains_key(node))
            .collect();
        for node in &joined {
            self.attach(node.clone());
        }

        if joined.is_empty() && left.is_empty() {
            tracing::trace!(count = self.positions.len(), "Rebuild: no membership changes");
        }

        MembershipDiff { joined, left }
    }

    /// Currently registered nodes, independent of virtual node count.
    pub fn members(&self) -> BTreeSet<N> {
        self.positions.keys().cloned().collect()
    }

    pub fn contains<Q>(&self, node: &Q) -> bool
    where
        N: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.contains_key(node)
    }

    /// Positions computed for a node, including any that are shadowed by a
    /// colliding virtual node.
    pub fn positions_of<Q>(&self, node: &Q) -> Option<&[HashValue]>
    where
        N: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(node).map(Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of occupied ring positions.
    pub fn position_count(&self) -> usize {
        self.store.len()
    }

    pub fn replication_factor(&self) -> u32 {
        self.replication_factor
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Fraction of the ring span owned by each member. Values sum to 1.0 for a
    /// non-empty ring.
    ///
    /// A position owns the arc from its counter-clockwise predecessor
    /// (exclusive) up to itself (inclusive).
    pub fn ownership(&self) -> BTreeMap<N, f64> {
        const SPAN: f64 = 340_282_366_920_938_463_463_374_607_431_768_211_456.0; // 2^128

        let mut shares: BTreeMap<N, f64> =
            self.positions.keys().map(|node| (node.clone(), 0.0)).collect();

        if self.store.len() == 1 {
            if let Some((_, vnode)) = self.store.first() {
                shares.insert(vnode.node.clone(), 1.0);
            }
            return shares;
        }

        let Some((mut previous, _)) = self.store.last() else {
            return shares;
        };
        for (position, vnode) in self.store.iter() {
            let arc = previous.distance_to(position) as f64 / SPAN;
            if let Some(share) = shares.get_mut(&vnode.node) {
                *share += arc;
            }
            previous = position;
        }
        shares
    }

    fn attach(&mut self, node: N) {
        let mut owned = Vec::with_capacity(self.replication_factor as usize);
        for replica in 0..self.replication_factor {
            let position = self
                .hasher
                .hash(&serialize_virtual_node(node.as_ref(), replica));
            self.place(
                position,
                VirtualNode {
                    node: node.clone(),
                    replica,
                },
            );
            owned.push(position);
        }

        tracing::debug!(
            node = %node_label(&node),
            positions = owned.len(),
            count = self.positions.len() + 1,
            "Node added to ring"
        );
        self.positions.insert(node, owned);
    }

    fn place(&mut self, position: HashValue, vnode: VirtualNode<N>) {
        let occupant_wins = self
            .store
            .get(position)
            .is_some_and(|occupant| *occupant <= vnode);

        let displaced = if occupant_wins {
            Some(vnode)
        } else {
            self.store.put(position, vnode)
        };

        if let Some(loser) = displaced {
            tracing::trace!(
                %position,
                node = %node_label(&loser.node),
                replica = loser.replica,
                "Virtual node collision, position shadowed"
            );
            self.shadowed.entry(position).or_default().insert(loser);
        }
    }

    fn detach(&mut self, node: &N, owned: Vec<HashValue>) {
        for &position in &owned {
            if let Some(contenders) = self.shadowed.get_mut(&position) {
                contenders.retain(|vnode| vnode.node != *node);
                if contenders.is_empty() {
                    self.shadowed.remove(&position);
                }
            }

            let occupied_by_node = self
                .store
                .get(position)
                .is_some_and(|vnode| vnode.node == *node);
            if !occupied_by_node {
                continue;
            }

            self.store.remove(position);
            if let Some(next) = self.promote_shadowed(position) {
                self.store.put(position, next);
            }
        }

        tracing::debug!(
            node = %node_label(node),
            positions = owned.len(),
            count = self.positions.len(),
            "Node removed from ring"
        );
    }

    fn promote_shadowed(&mut self, position: HashValue) -> Option<VirtualNode<N>> {
        let contenders = self.shadowed.get_mut(&position)?;
        let next = contenders.pop_first();
        if contenders.is_empty() {
            self.shadowed.remove(&position);
        }
        next
    }
}

fn node_label<N: AsRef<[u8]>>(node: &N) -> Cow<'_, str> {
    String::from_utf8_lossy(node.as_ref())
}
