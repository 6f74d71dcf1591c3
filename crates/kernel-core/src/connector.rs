//! Watts–Strogatz small-world generator with an edge-legality predicate.
//!
//! Nodes sit on a ring and link forward to their nearest legal successors
//! (the lattice), after which every lattice edge is rewired to a uniformly
//! drawn endpoint with probability `beta`. Candidates that stay illegal for
//! [`MAX_ATTEMPTS`] draws are given up on and counted in [`ConnectStats`].

use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use crate::network::SocialNetwork;

pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectStats {
    /// Forward links asked for by the degree supplier.
    pub requested_links: u64,
    pub lattice_links: u64,
    /// Forward links given up after exhausting their attempts or because
    /// the ring has too few distinct successors.
    pub lattice_shortfall: u64,
    pub rewire_selected: u64,
    pub rewired: u64,
    /// Selected edges left in place because no legal endpoint was drawn.
    pub rewire_failed: u64,
    /// Edges dropped because the weight function returned zero or less.
    pub zero_weight: u64,
}

impl ConnectStats {
    pub fn merge(&mut self, other: &ConnectStats) {
        self.requested_links += other.requested_links;
        self.lattice_links += other.lattice_links;
        self.lattice_shortfall += other.lattice_shortfall;
        self.rewire_selected += other.rewire_selected;
        self.rewired += other.rewired;
        self.rewire_failed += other.rewire_failed;
        self.zero_weight += other.zero_weight;
    }

    /// Fraction of requested links that did not make it into the graph.
    pub fn shortfall_rate(&self) -> f64 {
        if self.requested_links == 0 {
            return 0.0;
        }
        (self.lattice_shortfall + self.zero_weight) as f64 / self.requested_links as f64
    }
}

#[derive(Debug)]
pub struct WattsStrogatz<R> {
    rng: R,
    beta: f64,
}

impl<R: Rng> WattsStrogatz<R> {
    pub fn new(rng: R, beta: f64) -> Self {
        Self {
            rng,
            beta: beta.clamp(0.0, 1.0),
        }
    }

    /// Builds a graph over `0..size`.
    ///
    /// `degree` yields each node's target total degree; a node links forward
    /// to half of it, even-indexed nodes taking the extra link of an odd
    /// target, so that a constant even degree `d` gives every node exactly
    /// `d` neighbours on a pure lattice.
    pub fn connect<D, L, W>(
        &mut self,
        size: usize,
        mut degree: D,
        legal: L,
        mut weight: W,
    ) -> (SocialNetwork, ConnectStats)
    where
        D: FnMut(&mut R) -> u64,
        L: Fn(usize, usize) -> bool,
        W: FnMut(usize, usize) -> Decimal,
    {
        let mut stats = ConnectStats::default();
        let mut lattice = SocialNetwork::new(size);
        if size < 2 {
            return (lattice, stats);
        }
        let max_forward = (size - 1) / 2;

        for i in 0..size {
            let target = usize::try_from(degree(&mut self.rng)).unwrap_or(usize::MAX);
            let extra = usize::from(target % 2 == 1 && i % 2 == 0);
            let desired = target / 2 + extra;
            let forward = desired.min(max_forward.max(1));
            stats.requested_links += desired as u64;
            stats.lattice_shortfall += (desired - forward) as u64;

            let mut offset = 1;
            for _ in 0..forward {
                let mut linked = false;
                let mut attempts = 0;
                while attempts < MAX_ATTEMPTS && offset < size {
                    let j = (i + offset) % size;
                    offset += 1;
                    attempts += 1;
                    if lattice.contains(i, j) || !legal(i, j) {
                        continue;
                    }
                    lattice.insert(i, j, Decimal::ONE);
                    linked = true;
                    break;
                }
                if linked {
                    stats.lattice_links += 1;
                } else {
                    stats.lattice_shortfall += 1;
                }
            }
        }

        if self.beta > 0.0 {
            let edges = lattice.edges().map(|(key, _)| key).collect::<Vec<_>>();
            for (i, j) in edges {
                if self.rng.gen::<f64>() >= self.beta {
                    continue;
                }
                stats.rewire_selected += 1;
                let mut moved = false;
                for _ in 0..MAX_ATTEMPTS {
                    let k = self.rng.gen_range(0..size);
                    if k == i || lattice.contains(i, k) || !legal(i, k) {
                        continue;
                    }
                    if let Some(w) = lattice.remove(i, j) {
                        lattice.insert(i, k, w);
                    }
                    moved = true;
                    break;
                }
                if moved {
                    stats.rewired += 1;
                } else {
                    stats.rewire_failed += 1;
                }
            }
        }

        let mut network = SocialNetwork::new(size);
        for ((i, j), _) in lattice.edges() {
            if !network.insert(i, j, weight(i, j)) {
                stats.zero_weight += 1;
            }
        }
        debug!(
            size,
            edges = network.edge_count(),
            beta = self.beta,
            shortfall = stats.lattice_shortfall,
            rewired = stats.rewired,
            rewire_failed = stats.rewire_failed,
            "connected watts-strogatz graph"
        );
        (network, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{stream_rng, Stream};

    #[test]
    fn pure_lattice_gives_every_node_the_target_degree() {
        let mut connector = WattsStrogatz::new(stream_rng(1, Stream::Network), 0.0);
        let (network, stats) = connector.connect(20, |_| 4, |_, _| true, |_, _| Decimal::ONE);
        for node in 0..20 {
            assert_eq!(network.degree(node), 4, "node {node}");
        }
        assert_eq!(network.edge_count(), 40);
        assert_eq!(stats.lattice_shortfall, 0);
        assert!(network.contains(19, 0));
        assert!(network.contains(19, 1));
    }

    #[test]
    fn odd_degree_alternates_extra_forward_link() {
        let mut connector = WattsStrogatz::new(stream_rng(1, Stream::Network), 0.0);
        let (network, _) = connector.connect(10, |_| 3, |_, _| true, |_, _| Decimal::ONE);
        // five even nodes link twice, five odd nodes once
        assert_eq!(network.edge_count(), 15);
    }

    #[test]
    fn illegal_pairs_are_skipped_and_counted() {
        let mut connector = WattsStrogatz::new(stream_rng(2, Stream::Network), 1.0);
        let same_parity = |i: usize, j: usize| i % 2 == j % 2;
        let (network, stats) = connector.connect(30, |_| 4, same_parity, |_, _| Decimal::ONE);
        for ((i, j), _) in network.edges() {
            assert_eq!(i % 2, j % 2, "illegal edge {i}-{j}");
        }
        assert_eq!(stats.lattice_links + stats.lattice_shortfall, stats.requested_links);
        assert_eq!(stats.rewired + stats.rewire_failed, stats.rewire_selected);
    }

    #[test]
    fn rewiring_preserves_edge_count() {
        let mut connector = WattsStrogatz::new(stream_rng(3, Stream::Network), 0.5);
        let (network, stats) = connector.connect(50, |_| 6, |_, _| true, |_, _| Decimal::ONE);
        assert_eq!(network.edge_count() as u64, stats.lattice_links);
        assert!(stats.rewire_selected > 0);
    }

    #[test]
    fn weight_function_is_applied_per_edge_and_zero_drops() {
        let mut connector = WattsStrogatz::new(stream_rng(4, Stream::Network), 0.0);
        let (network, stats) = connector.connect(
            8,
            |_| 2,
            |_, _| true,
            |i, _| if i == 0 { Decimal::ZERO } else { Decimal::new(i as i64, 1) },
        );
        assert_eq!(stats.zero_weight, 2);
        assert_eq!(network.weight(3, 4), Some(Decimal::new(3, 1)));
    }

    #[test]
    fn degree_beyond_ring_size_is_reported_as_shortfall() {
        let mut connector = WattsStrogatz::new(stream_rng(6, Stream::Network), 0.0);
        let (network, stats) = connector.connect(4, |_| 3, |_, _| true, |_, _| Decimal::ONE);
        for node in 0..4 {
            assert_eq!(network.degree(node), 2, "node {node}");
        }
        assert_eq!(stats.requested_links, 6);
        assert_eq!(stats.lattice_links, 4);
        assert_eq!(stats.lattice_shortfall, 2);
        assert!(stats.shortfall_rate() > 0.0);

        let (_, stats) = connector.connect(6, |_| 5, |_, _| true, |_, _| Decimal::ONE);
        assert_eq!(stats.lattice_links + stats.lattice_shortfall, stats.requested_links);
        assert!(stats.lattice_shortfall > 0);
    }

    #[test]
    fn tiny_graphs_are_empty_or_single_edge() {
        let mut connector = WattsStrogatz::new(stream_rng(5, Stream::Network), 0.0);
        let (empty, _) = connector.connect(1, |_| 4, |_, _| true, |_, _| Decimal::ONE);
        assert_eq!(empty.edge_count(), 0);
        let (pair, _) = connector.connect(2, |_| 4, |_, _| true, |_, _| Decimal::ONE);
        assert_eq!(pair.edge_count(), 1);
    }
}
