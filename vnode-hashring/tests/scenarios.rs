//! Routing properties of the ring under membership changes.
//!
//! Covers determinism, coverage, minimal disruption and balance, plus the
//! small fixed scenarios a caller is most likely to hit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap};
use vnode_hashring::{ConsistentHashRing, Error};

fn build(replicas: u32, nodes: &[&str]) -> ConsistentHashRing {
    let mut ring = ConsistentHashRing::new(replicas).unwrap();
    for node in nodes {
        ring.add_node(*node).unwrap();
    }
    ring
}

fn sample_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{}", i)).collect()
}

fn routes(ring: &ConsistentHashRing, keys: &[String]) -> HashMap<String, String> {
    keys.iter()
        .map(|key| (key.clone(), ring.get_node(key).unwrap().clone()))
        .collect()
}

#[test]
fn test_scenario_three_nodes_stable_answer() {
    let ring = build(3, &["A", "B", "C"]);
    let first = ring.get_node("foo").unwrap().clone();
    assert!(["A", "B", "C"].contains(&first.as_str()));
    for _ in 0..10 {
        assert_eq!(ring.get_node("foo").unwrap(), &first);
    }
}

#[test]
fn test_scenario_single_member_owns_everything() {
    let ring = build(8, &["A"]);
    for key in sample_keys(500) {
        assert_eq!(ring.get_node(&key).unwrap(), "A");
    }
    assert_eq!(ring.get_node("").unwrap(), "A");
}

#[test]
fn test_scenario_remove_moves_only_removed_keys() {
    let mut ring = build(64, &["A", "B"]);
    let keys = sample_keys(1000);
    let before = routes(&ring, &keys);

    ring.remove_node("B").unwrap();

    for key in &keys {
        assert_eq!(
            ring.get_node(key).unwrap(),
            "A",
            "key {} was on {} and must now be on A",
            key,
            before[key]
        );
    }
}

#[test]
fn test_scenario_empty_ring_errors() {
    let ring: ConsistentHashRing = ConsistentHashRing::new(3).unwrap();
    assert_eq!(ring.get_node("anything"), Err(Error::EmptyRing));
    assert!(ring.members().is_empty());
}

#[test]
fn test_scenario_duplicate_add_leaves_ring_unchanged() {
    let mut ring = build(16, &["A"]);
    let keys = sample_keys(200);
    let members_before = ring.members();
    let routes_before = routes(&ring, &keys);

    assert_eq!(ring.add_node("A"), Err(Error::DuplicateNode("A".into())));

    assert_eq!(ring.members(), members_before);
    assert_eq!(routes(&ring, &keys), routes_before);
    assert_eq!(ring.position_count(), 16);
}

#[test]
fn test_independent_rings_agree() {
    let nodes = ["cache-1", "cache-2", "cache-3", "cache-4", "cache-5"];
    let ring1 = build(100, &nodes);
    let ring2 = build(100, &nodes);
    let keys = sample_keys(2000);
    assert_eq!(routes(&ring1, &keys), routes(&ring2, &keys));
}

#[test]
fn test_every_key_maps_to_a_member() {
    let mut ring = build(10, &["a", "b", "c", "d"]);
    let mut rng = StdRng::seed_from_u64(7);

    for step in 0..20 {
        let members = ring.members();
        for _ in 0..200 {
            let key: [u8; 12] = rng.gen();
            let owner = ring.get_node(key).unwrap();
            assert!(members.contains(owner), "step {}: {} not a member", step, owner);
        }

        let node = format!("n{}", step);
        ring.add_node(node.clone()).unwrap();
        if step % 3 == 0 {
            let first = ring.members().into_iter().next().unwrap();
            ring.remove_node(&first).unwrap();
        }
    }
}

#[test]
fn test_add_only_moves_keys_to_new_node() {
    let mut ring = build(50, &["a", "b", "c"]);
    let keys = sample_keys(5000);
    let before = routes(&ring, &keys);

    ring.add_node("d").unwrap();
    let after = routes(&ring, &keys);

    let mut moved = 0;
    for key in &keys {
        if before[key] != after[key] {
            assert_eq!(after[key], "d", "key {} moved between old nodes", key);
            moved += 1;
        }
    }
    // Roughly a quarter of the keys should move to the fourth node.
    assert!((700..1900).contains(&moved), "moved {}", moved);
}

#[test]
fn test_remove_only_moves_keys_of_removed_node() {
    let mut ring = build(50, &["a", "b", "c", "d"]);
    let keys = sample_keys(5000);
    let before = routes(&ring, &keys);

    ring.remove_node("c").unwrap();
    let after = routes(&ring, &keys);

    for key in &keys {
        if before[key] == "c" {
            assert_ne!(after[key], "c");
            assert!(ring.contains(after[key].as_str()));
        } else {
            assert_eq!(before[key], after[key], "key {} should not move", key);
        }
    }
}

#[test]
fn test_moved_keys_land_on_clockwise_neighbour() {
    // With a removed node, each of its keys must go to the next surviving node
    // clockwise, which is the second entry in the preference list beforehand.
    let mut ring = build(20, &["a", "b", "c", "d", "e"]);
    let keys = sample_keys(2000);
    let successors: HashMap<String, (String, String)> = keys
        .iter()
        .map(|key| {
            let nodes = ring.get_nodes(key, 2).unwrap();
            (key.clone(), (nodes[0].clone(), nodes[1].clone()))
        })
        .collect();

    ring.remove_node("b").unwrap();

    for key in &keys {
        let (owner, next) = &successors[key];
        let now = ring.get_node(key).unwrap();
        if owner == "b" {
            assert_eq!(now, next);
        } else {
            assert_eq!(now, owner);
        }
    }
}

#[test]
fn test_remove_then_re_add_restores_routing() {
    let mut ring = build(40, &["a", "b", "c"]);
    let keys = sample_keys(1000);
    let before = routes(&ring, &keys);

    ring.remove_node("b").unwrap();
    ring.add_node("b").unwrap();

    assert_eq!(routes(&ring, &keys), before);
}

fn max_min_ratio(replicas: u32, nodes: &[&str], keys: &[String]) -> f64 {
    let ring = build(replicas, nodes);
    let mut counts: HashMap<&str, usize> = nodes.iter().map(|node| (*node, 0)).collect();
    for key in keys {
        let owner = ring.get_node(key).unwrap();
        *counts.get_mut(owner.as_str()).unwrap() += 1;
    }
    let max = *counts.values().max().unwrap() as f64;
    let min = *counts.values().min().unwrap() as f64;
    max / min.max(1.0)
}

#[test]
fn test_balance_improves_with_replication() {
    let nodes = ["n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8"];
    let keys = sample_keys(40_000);

    let coarse = max_min_ratio(1, &nodes, &keys);
    let fine = max_min_ratio(200, &nodes, &keys);

    assert!(fine < 1.6, "R=200 max/min ratio {}", fine);
    assert!(fine < coarse, "R=200 ratio {} not better than R=1 ratio {}", fine, coarse);
}

#[test]
fn test_ownership_tracks_key_share() {
    let ring = build(160, &["a", "b", "c"]);
    let keys = sample_keys(30_000);
    let shares = ring.ownership();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in &keys {
        *counts.entry(ring.get_node(key).unwrap().clone()).or_default() += 1;
    }

    for (node, share) in &shares {
        let observed = counts[node] as f64 / keys.len() as f64;
        assert!(
            (observed - share).abs() < 0.03,
            "{}: ring share {} vs observed {}",
            node,
            share,
            observed
        );
    }
}

#[test]
fn test_members_reports_physical_nodes() {
    let mut ring = build(128, &["x", "y"]);
    let expected: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ring.members(), expected);
    assert_eq!(ring.position_count(), 256);

    ring.remove_node("x").unwrap();
    assert_eq!(ring.members().len(), 1);
}
