//! Discrete-event household model of vaccine hesitancy: attitude matrices,
//! a two-layer small-world network, peer-driven attitude propagation and
//! vaccination occasions, all driven by one virtual-time scheduler.

pub mod attributes;
pub mod connector;
pub mod error;
pub mod evaluator;
pub mod matrix;
pub mod network;
pub mod population;
pub mod propagator;
pub mod random;
pub mod reference;
pub mod scheduler;
pub mod world;

pub use attributes::{HouseholdAttribute, PersonAttribute};
pub use connector::{ConnectStats, WattsStrogatz};
pub use error::SimError;
pub use evaluator::AttitudeEvaluator;
pub use matrix::{AttributeKey, AttributeMatrix};
pub use network::{ActivityGraph, SocialNetwork};
pub use population::PopulationStore;
pub use propagator::AttitudePropagator;
pub use scheduler::{EventHandle, EventScheduler};
pub use world::{HouseholdModel, ModelCounters, ModelEvent};
