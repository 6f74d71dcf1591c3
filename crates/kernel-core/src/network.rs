//! Symmetric weighted social network over household rows, and the activity
//! overlay recording which edges were consulted since the last propagation.
//!
//! Every edge is stored once under its canonical `(min, max)` key; lookups
//! canonicalise before touching the map.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rust_decimal::Decimal;

/// Canonical key of the unordered pair `{i, j}`.
pub fn canonical(i: usize, j: usize) -> (usize, usize) {
    if i <= j {
        (i, j)
    } else {
        (j, i)
    }
}

// ---------------------------------------------------------------------------
// SocialNetwork
// ---------------------------------------------------------------------------

/// Static topology: undirected, no self loops, positive weights only.
#[derive(Debug, Clone, Default)]
pub struct SocialNetwork {
    edges: BTreeMap<(usize, usize), Decimal>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl SocialNetwork {
    pub fn new(size: usize) -> Self {
        Self {
            edges: BTreeMap::new(),
            adjacency: vec![BTreeSet::new(); size],
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Sets the weight of `{i, j}`, replacing any previous weight. Self loops
    /// and non-positive weights are refused.
    pub fn insert(&mut self, i: usize, j: usize, weight: Decimal) -> bool {
        if i == j || weight <= Decimal::ZERO {
            return false;
        }
        self.ensure_node(i.max(j));
        self.edges.insert(canonical(i, j), weight);
        self.adjacency[i].insert(j);
        self.adjacency[j].insert(i);
        true
    }

    /// Removes `{i, j}` and returns its weight.
    pub fn remove(&mut self, i: usize, j: usize) -> Option<Decimal> {
        let weight = self.edges.remove(&canonical(i, j))?;
        self.adjacency[i].remove(&j);
        self.adjacency[j].remove(&i);
        Some(weight)
    }

    pub fn weight(&self, i: usize, j: usize) -> Option<Decimal> {
        self.edges.get(&canonical(i, j)).copied()
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.edges.contains_key(&canonical(i, j))
    }

    /// Neighbours of `i` in ascending order. Restartable: each call yields a
    /// fresh iterator over the current topology.
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency
            .get(i)
            .into_iter()
            .flat_map(|peers| peers.iter().copied())
    }

    pub fn weighted_neighbors(&self, i: usize) -> impl Iterator<Item = (usize, Decimal)> + '_ {
        self.neighbors(i)
            .filter_map(move |j| self.weight(i, j).map(|weight| (j, weight)))
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency.get(i).map_or(0, BTreeSet::len)
    }

    pub fn edges(&self) -> impl Iterator<Item = ((usize, usize), Decimal)> + '_ {
        self.edges.iter().map(|(key, weight)| (*key, *weight))
    }

    /// Hop distance between two nodes, `None` when disconnected.
    pub fn social_distance(&self, from: usize, to: usize) -> Option<u32> {
        self.distances_from(from).get(to).copied().flatten()
    }

    /// Breadth-first hop distances from `from` to every node.
    pub fn distances_from(&self, from: usize) -> Vec<Option<u32>> {
        let mut distances = vec![None; self.node_count()];
        if from >= distances.len() {
            return distances;
        }
        let mut queue = VecDeque::new();
        distances[from] = Some(0u32);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let next = distances[current].unwrap_or(0) + 1;
            for neighbor in self.neighbors(current) {
                if distances[neighbor].is_none() {
                    distances[neighbor] = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        distances
    }

    /// Mean shortest-path length over all connected ordered pairs.
    pub fn average_path_length(&self) -> Option<f64> {
        let mut total = 0u64;
        let mut pairs = 0u64;
        for from in 0..self.node_count() {
            for (to, distance) in self.distances_from(from).into_iter().enumerate() {
                if let (true, Some(distance)) = (to != from, distance) {
                    total += u64::from(distance);
                    pairs += 1;
                }
            }
        }
        (pairs > 0).then(|| total as f64 / pairs as f64)
    }

    fn ensure_node(&mut self, i: usize) {
        if i >= self.adjacency.len() {
            self.adjacency.resize(i + 1, BTreeSet::new());
        }
    }
}

// ---------------------------------------------------------------------------
// ActivityGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeActivity {
    /// Weight the propagator applies; zero once the cycle is consumed.
    pub weight: Decimal,
    /// Impression cycles in which this edge was activated.
    pub activations: u32,
}

/// Same shape as the social network; an edge is active while its weight is
/// positive.
#[derive(Debug, Clone, Default)]
pub struct ActivityGraph {
    edges: BTreeMap<(usize, usize), EdgeActivity>,
    active: BTreeMap<usize, BTreeSet<usize>>,
}

impl ActivityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `{i, j}` active with `weight` and bumps its activation count.
    pub fn activate(&mut self, i: usize, j: usize, weight: Decimal) {
        if i == j {
            return;
        }
        let edge = self.edges.entry(canonical(i, j)).or_default();
        edge.weight = weight;
        edge.activations += 1;
        if weight > Decimal::ZERO {
            self.active.entry(i).or_default().insert(j);
            self.active.entry(j).or_default().insert(i);
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Option<EdgeActivity> {
        self.edges.get(&canonical(i, j)).copied()
    }

    /// Currently active neighbours of `i` with their activation weights.
    pub fn active_neighbors(&self, i: usize) -> impl Iterator<Item = (usize, Decimal)> + '_ {
        self.active
            .get(&i)
            .into_iter()
            .flat_map(|peers| peers.iter().copied())
            .filter_map(move |j| {
                self.edges
                    .get(&canonical(i, j))
                    .map(|edge| (j, edge.weight))
            })
    }

    pub fn active_edge_count(&self) -> usize {
        self.edges
            .values()
            .filter(|edge| edge.weight > Decimal::ZERO)
            .count()
    }

    pub fn is_quiet(&self) -> bool {
        self.active.is_empty()
    }

    /// Accumulated activation counts of `i`'s edges, keyed by neighbour.
    pub fn activation_counts(&self, i: usize) -> BTreeMap<usize, u32> {
        self.edges
            .iter()
            .filter_map(|(&(a, b), edge)| {
                let peer = if a == i {
                    b
                } else if b == i {
                    a
                } else {
                    return None;
                };
                (edge.activations > 0).then_some((peer, edge.activations))
            })
            .collect()
    }

    /// Zeroes every activation weight; counts survive.
    pub fn clear_activation(&mut self) {
        for edge in self.edges.values_mut() {
            edge.weight = Decimal::ZERO;
        }
        self.active.clear();
    }

    /// Drops all history of `i`'s edges, used when its row is replaced.
    pub fn reset_node(&mut self, i: usize) {
        if let Some(peers) = self.active.remove(&i) {
            for peer in peers {
                if let Some(set) = self.active.get_mut(&peer) {
                    set.remove(&i);
                    if set.is_empty() {
                        self.active.remove(&peer);
                    }
                }
            }
        }
        self.edges.retain(|&(a, b), _| a != i && b != i);
    }
}
