use super::*;
use crate::connector::WattsStrogatz;
use crate::network::SocialNetwork;

impl HouseholdModel {
    /// Builds the two-layer social network: one assortative lattice per
    /// attractor group plus, when mixing is allowed, a dissortative lattice
    /// over all households whose edges must cross groups.
    pub(super) fn connect_households(&mut self) -> Result<(), SimError> {
        let attractors = self.store.attractor_count();
        if attractors == 0 {
            return Err(SimError::configuration("no attractors to connect households to"));
        }
        let rows = self.store.household_rows();
        let n = rows.len();
        let per_group = n / attractors + 1;
        let k = per_group
            .saturating_sub(1)
            .min(self.config.network.degree as usize);
        self.network_degree = k;

        let assortativity = self.config.network.assortativity;
        let mixing = attractors >= 2 && assortativity < 1.0;
        let assort_k = if mixing {
            (assortativity * k as f64).round() as u64
        } else {
            k as u64
        };
        let dissort = if mixing {
            Sampler::from_spec(
                &contracts::DistributionSpec::Poisson {
                    mean: (1.0 - assortativity) * k as f64,
                },
                "dissortative degree",
            )?
        } else {
            Sampler::Const(0.0)
        };

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); attractors];
        for &row in &rows {
            if let Some(attractor) = self.store.attractor_of(row) {
                if let Some(group) = groups.get_mut(attractor) {
                    group.push(row);
                }
            }
        }

        let mut network = SocialNetwork::new(self.store.households.row_count());
        let mut stats = ConnectStats::default();
        let mut connector = WattsStrogatz::new(
            stream_rng(self.config.seed, Stream::Network),
            self.config.network.beta,
        );

        for (attractor, members) in groups.iter().enumerate() {
            let inpeer = self
                .store
                .households
                .get(attractor, HouseholdAttribute::ImpressionInpeer);
            if inpeer <= Decimal::ZERO {
                warn!(attractor, %inpeer, "attractor has no in-peer weight");
            }
            let (lattice, group_stats) =
                connector.connect(members.len(), |_| assort_k, |_, _| true, |_, _| inpeer);
            for ((i, j), weight) in lattice.edges() {
                network.insert(members[i], members[j], weight);
            }
            stats.merge(&group_stats);
        }

        if mixing {
            let store = &self.store;
            let group_of = |x: usize| store.attractor_of(rows[x]);
            let (lattice, mixed_stats) = connector.connect(
                n,
                |rng| dissort.draw_count(rng),
                |x, y| group_of(x) != group_of(y),
                |x, _| {
                    let attractor = group_of(x).unwrap_or(0);
                    store
                        .households
                        .get(attractor, HouseholdAttribute::ImpressionOutpeer)
                },
            );
            for ((i, j), weight) in lattice.edges() {
                network.insert(rows[i], rows[j], weight);
            }
            stats.merge(&mixed_stats);
        }

        for &row in &rows {
            let own = self.store.attractor_of(row);
            let mut inpeer_total = Decimal::ZERO;
            let mut outpeer_total = Decimal::ZERO;
            let mut inpeers = 0u64;
            let mut peers = 0u64;
            for (peer, weight) in network.weighted_neighbors(row) {
                peers += 1;
                if self.store.attractor_of(peer) == own {
                    inpeers += 1;
                    inpeer_total += weight;
                } else {
                    outpeer_total += weight;
                }
            }
            let households = &mut self.store.households;
            households.set(row, HouseholdAttribute::ImpressionInpeer, inpeer_total);
            households.set(row, HouseholdAttribute::ImpressionOutpeer, outpeer_total);
            households.set(row, HouseholdAttribute::SocialNetworkSize, Decimal::from(peers));
            let share = if !mixing {
                Decimal::ONE
            } else if peers == 0 {
                Decimal::ZERO
            } else {
                Decimal::from(inpeers) / Decimal::from(peers)
            };
            households.set(row, HouseholdAttribute::SocialAssortativity, share);
            if peers == 0 {
                trace!(row, "household has no peers");
            }
        }

        info!(
            households = n,
            degree = k,
            beta = self.config.network.beta,
            assortativity,
            edges = network.edge_count(),
            shortfall = stats.lattice_shortfall,
            rewire_failed = stats.rewire_failed,
            shortfall_rate = stats.shortfall_rate(),
            "networked households"
        );
        self.store.network = network;
        self.connect_stats = stats;
        Ok(())
    }
}
