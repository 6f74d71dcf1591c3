//! Seeded random streams and the named distributions built from
//! [`DistributionSpec`]s at startup.

use contracts::DistributionSpec;
use rand::distributions::{Bernoulli, Distribution, Uniform, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, LogNormal, Poisson, Weibull};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::SimError;

/// Decimal places kept from floating-point draws.
pub const DRAW_SCALE: u32 = 9;

/// Independent stream identifiers mixed into the run seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    Population = 1,
    Network = 2,
    Impression = 3,
    Vaccination = 4,
    Migration = 5,
}

pub fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut value = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(29);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    value ^ (value >> 31)
}

/// A generator for one named stream of the run.
pub fn stream_rng(seed: u64, stream: Stream) -> StdRng {
    StdRng::seed_from_u64(mix_seed(seed, stream as u64))
}

/// Converts a finite float to a decimal rounded to [`DRAW_SCALE`] places.
pub fn to_decimal(value: f64) -> Result<Decimal, SimError> {
    Decimal::from_f64(value)
        .map(|decimal| decimal.round_dp(DRAW_SCALE))
        .ok_or_else(|| SimError::upstream(format!("draw {value} is not representable")))
}

#[derive(Debug, Clone)]
pub enum Sampler {
    Const(f64),
    Bernoulli(Bernoulli),
    Uniform(Uniform<f64>),
    UniformDiscrete(Uniform<i64>),
    Exponential(Exp<f64>),
    LogNormal(LogNormal<f64>),
    Weibull(Weibull<f64>),
    Poisson(Poisson<f64>),
}

impl Sampler {
    pub fn from_spec(spec: &DistributionSpec, label: &str) -> Result<Self, SimError> {
        spec.validate(label).map_err(SimError::Configuration)?;
        let malformed =
            |err: &dyn std::fmt::Display| SimError::configuration(format!("{label}: {err}"));
        Ok(match *spec {
            DistributionSpec::Const { value } => Self::Const(value),
            DistributionSpec::Bernoulli { p } => {
                Self::Bernoulli(Bernoulli::new(p).map_err(|err| malformed(&err))?)
            }
            DistributionSpec::Uniform { min, max } => {
                Self::Uniform(Uniform::new_inclusive(min, max))
            }
            DistributionSpec::UniformDiscrete { min, max } => {
                Self::UniformDiscrete(Uniform::new_inclusive(min, max))
            }
            DistributionSpec::Exponential { rate } => {
                Self::Exponential(Exp::new(rate).map_err(|err| malformed(&err))?)
            }
            DistributionSpec::LogNormal { mean, sd } => {
                Self::LogNormal(LogNormal::new(mean, sd).map_err(|err| malformed(&err))?)
            }
            DistributionSpec::Weibull { shape, scale } => {
                Self::Weibull(Weibull::new(scale, shape).map_err(|err| malformed(&err))?)
            }
            DistributionSpec::Poisson { mean } if mean <= 0.0 => Self::Const(0.0),
            DistributionSpec::Poisson { mean } => {
                Self::Poisson(Poisson::new(mean).map_err(|err| malformed(&err))?)
            }
        })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Const(value) => *value,
            Self::Bernoulli(dist) => {
                if dist.sample(rng) {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Uniform(dist) => dist.sample(rng),
            Self::UniformDiscrete(dist) => dist.sample(rng) as f64,
            Self::Exponential(dist) => dist.sample(rng),
            Self::LogNormal(dist) => dist.sample(rng),
            Self::Weibull(dist) => dist.sample(rng),
            Self::Poisson(dist) => dist.sample(rng),
        }
    }

    pub fn draw_decimal<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Decimal, SimError> {
        to_decimal(self.draw(rng))
    }

    /// Non-negative integer draw, rounding to nearest.
    pub fn draw_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let value = self.draw(rng);
        if value.is_finite() && value > 0.0 {
            value.round() as u64
        } else {
            0
        }
    }

    pub fn draw_bool<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.draw(rng) >= 0.5
    }
}

/// Categorical choice over items with non-negative weights.
#[derive(Debug, Clone)]
pub struct Categorical<T> {
    items: Vec<T>,
    index: WeightedIndex<f64>,
}

impl<T> Categorical<T> {
    pub fn new(entries: Vec<(T, f64)>, label: &str) -> Result<Self, SimError> {
        let (items, weights): (Vec<T>, Vec<f64>) = entries.into_iter().unzip();
        let index = WeightedIndex::new(&weights)
            .map_err(|err| SimError::configuration(format!("{label}: {err}")))?;
        Ok(Self { items, index })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.index.sample(rng)]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Up to `count` distinct items of `pool`, in draw order.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &[usize],
    count: usize,
) -> Vec<usize> {
    rand::seq::index::sample(rng, pool.len(), count.min(pool.len()))
        .into_iter()
        .map(|position| pool[position])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_reproducible_and_distinct() {
        let a: u64 = stream_rng(7, Stream::Network).gen();
        let b: u64 = stream_rng(7, Stream::Network).gen();
        let c: u64 = stream_rng(7, Stream::Population).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn const_and_degenerate_poisson_draw_fixed_values() {
        let mut rng = stream_rng(1, Stream::Population);
        let fixed = Sampler::from_spec(&DistributionSpec::constant(0.25), "c").expect("const");
        assert_eq!(fixed.draw_decimal(&mut rng), Ok(Decimal::new(25, 2)));
        let poisson =
            Sampler::from_spec(&DistributionSpec::Poisson { mean: 0.0 }, "k").expect("poisson");
        assert_eq!(poisson.draw_count(&mut rng), 0);
    }

    #[test]
    fn malformed_spec_is_a_configuration_error() {
        let err = Sampler::from_spec(&DistributionSpec::Bernoulli { p: 1.5 }, "coin")
            .expect_err("p out of range");
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn uniform_discrete_stays_in_range() {
        let mut rng = stream_rng(3, Stream::Migration);
        let dist = Sampler::from_spec(&DistributionSpec::UniformDiscrete { min: 2, max: 4 }, "u")
            .expect("uniform");
        for _ in 0..200 {
            let value = dist.draw(&mut rng);
            assert!((2.0..=4.0).contains(&value));
        }
    }

    #[test]
    fn categorical_skips_zero_weight_items() {
        let mut rng = stream_rng(9, Stream::Population);
        let choice = Categorical::new(vec![("never", 0.0), ("always", 1.0)], "t").expect("cat");
        for _ in 0..50 {
            assert_eq!(*choice.draw(&mut rng), "always");
        }
        assert!(Categorical::<u8>::new(vec![], "empty").is_err());
    }

    #[test]
    fn sampling_without_replacement_is_distinct() {
        let mut rng = stream_rng(4, Stream::Impression);
        let pool = vec![10, 11, 12, 13];
        let mut drawn = sample_without_replacement(&mut rng, &pool, 10);
        drawn.sort_unstable();
        assert_eq!(drawn, pool);
    }
}
