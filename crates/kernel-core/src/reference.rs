//! Samplers over the pre-parsed reference tables: household composition,
//! hesitancy profiles and relation contact frequencies.

use std::collections::BTreeMap;

use contracts::{AttitudeDist, HesitancyConfig, HesitancyProfile, HouseholdType, Relation};
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Weibull};
use rust_decimal::Decimal;

use crate::attributes::clamp_unit;
use crate::error::SimError;
use crate::random::{to_decimal, Categorical};

/// Draws a Weibull attitude value, cropped to the profile window and then
/// to [0,1].
#[derive(Debug, Clone)]
pub struct AttitudeSampler {
    weibull: Weibull<f64>,
    low: f64,
    high: f64,
}

impl AttitudeSampler {
    pub fn new(dist: &AttitudeDist, label: &str) -> Result<Self, SimError> {
        dist.validate(label).map_err(SimError::Configuration)?;
        let weibull = Weibull::new(dist.scale, dist.shape)
            .map_err(|err| SimError::configuration(format!("{label}: {err}")))?;
        let (low, high) = dist.crop_bounds();
        Ok(Self {
            weibull,
            low,
            high: high.max(low),
        })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Decimal, SimError> {
        let value = self.weibull.sample(rng).clamp(self.low, self.high);
        Ok(clamp_unit(to_decimal(value)?))
    }
}

#[derive(Debug, Clone)]
pub struct ProfileSampler {
    pub profile: HesitancyProfile,
    pub confidence: AttitudeSampler,
    pub complacency: AttitudeSampler,
}

#[derive(Debug, Clone)]
pub struct ReferenceTables {
    household_types: Categorical<HouseholdType>,
    profiles: Vec<ProfileSampler>,
    /// Profile choice per (religious, alternative) category.
    by_category: BTreeMap<(bool, bool), Categorical<usize>>,
    all_profiles: Categorical<usize>,
    relations: Vec<(Relation, bool, f64, f64, LogNormal<f64>)>,
    default_impression_days: Decimal,
}

impl ReferenceTables {
    pub fn new(
        household_types: &[HouseholdType],
        hesitancy: &HesitancyConfig,
    ) -> Result<Self, SimError> {
        let household_types = Categorical::new(
            household_types
                .iter()
                .map(|entry| (entry.clone(), entry.weight))
                .collect(),
            "household types",
        )?;

        let profiles = hesitancy
            .profiles
            .iter()
            .map(|profile| {
                Ok(ProfileSampler {
                    profile: profile.clone(),
                    confidence: AttitudeSampler::new(&profile.confidence, "confidence")?,
                    complacency: AttitudeSampler::new(&profile.complacency, "complacency")?,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        let mut grouped: BTreeMap<(bool, bool), Vec<(usize, f64)>> = BTreeMap::new();
        for (index, sampler) in profiles.iter().enumerate() {
            let profile = &sampler.profile;
            grouped
                .entry((profile.religious, profile.alternative))
                .or_default()
                .push((index, profile.fraction));
        }
        let mut by_category = BTreeMap::new();
        for (category, entries) in grouped {
            // a category whose fractions are all zero falls back to every profile
            if let Ok(choice) = Categorical::new(entries, "hesitancy profiles") {
                by_category.insert(category, choice);
            }
        }
        let all_profiles = Categorical::new(
            profiles
                .iter()
                .enumerate()
                .map(|(index, sampler)| (index, sampler.profile.fraction))
                .collect(),
            "hesitancy profiles",
        )?;

        let relations = hesitancy
            .relation_frequencies
            .iter()
            .map(|row| {
                let dist = LogNormal::new(row.meanlog, row.sdlog).map_err(|err| {
                    SimError::configuration(format!("relation frequency {row:?}: {err}"))
                })?;
                Ok((row.relation, row.male, row.age_min, row.age_max, dist))
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        Ok(Self {
            household_types,
            profiles,
            by_category,
            all_profiles,
            relations,
            default_impression_days: hesitancy.default_impression_days,
        })
    }

    pub fn draw_household_type<R: Rng + ?Sized>(&self, rng: &mut R) -> &HouseholdType {
        self.household_types.draw(rng)
    }

    /// A profile matching the attractor's category, or any profile when
    /// the category has none.
    pub fn draw_profile<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        religious: bool,
        alternative: bool,
    ) -> &ProfileSampler {
        let index = match self.by_category.get(&(religious, alternative)) {
            Some(choice) => *choice.draw(rng),
            None => *self.all_profiles.draw(rng),
        };
        &self.profiles[index]
    }

    /// Harmonic combination of one contact interval per relation kind:
    /// `1 / sum(1 / interval)`. Falls back to the configured default when no
    /// row matches the referent.
    pub fn impression_days<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        male: bool,
        age_years: f64,
    ) -> Result<Decimal, SimError> {
        let mut rate = 0.0f64;
        for relation in Relation::ALL {
            let matching = self.relations.iter().find(|(kind, row_male, min, max, _)| {
                *kind == relation && *row_male == male && age_years >= *min && age_years < *max
            });
            if let Some((_, _, _, _, dist)) = matching {
                let interval = dist.sample(rng);
                if interval.is_finite() && interval > 0.0 {
                    rate += 1.0 / interval;
                }
            }
        }
        if rate <= 0.0 || !rate.is_finite() {
            return Ok(self.default_impression_days);
        }
        let period = to_decimal(1.0 / rate)?;
        if period <= Decimal::ZERO {
            return Ok(self.default_impression_days);
        }
        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{stream_rng, Stream};
    use contracts::{RelationFrequency, SimConfig, VaccineStatus};

    fn tables(config: &SimConfig) -> ReferenceTables {
        ReferenceTables::new(&config.population.household_types, &config.hesitancy)
            .expect("tables")
    }

    #[test]
    fn attitude_draws_stay_in_unit_interval() {
        let sampler = AttitudeSampler::new(&AttitudeDist::new(0.8, 3.0, 0.0, 1.0), "wide")
            .expect("sampler");
        let mut rng = stream_rng(11, Stream::Population);
        for _ in 0..500 {
            let value = sampler.draw(&mut rng).expect("draw");
            assert!(value >= Decimal::ZERO && value <= Decimal::ONE);
        }
    }

    #[test]
    fn profile_draw_honours_category() {
        let config = SimConfig::default();
        let tables = tables(&config);
        let mut rng = stream_rng(5, Stream::Population);
        for _ in 0..100 {
            let drawn = tables.draw_profile(&mut rng, false, true);
            assert!(drawn.profile.alternative);
            assert_eq!(drawn.profile.status, VaccineStatus::None);
        }
        // no religious profile configured: any profile may come back
        let _ = tables.draw_profile(&mut rng, true, false);
    }

    #[test]
    fn impression_days_combine_harmonically() {
        let mut config = SimConfig::default();
        config.hesitancy.relation_frequencies = Relation::ALL
            .iter()
            .map(|relation| RelationFrequency {
                male: true,
                relation: *relation,
                age_min: 0.0,
                age_max: 100.0,
                meanlog: 6.0_f64.ln(),
                sdlog: 0.0,
            })
            .collect();
        let tables = tables(&config);
        let mut rng = stream_rng(2, Stream::Population);
        let days = tables.impression_days(&mut rng, true, 30.0).expect("days");
        assert!((days - Decimal::TWO).abs() < Decimal::new(1, 6));
        // women have no rows here
        assert_eq!(
            tables.impression_days(&mut rng, false, 30.0),
            Ok(config.hesitancy.default_impression_days)
        );
    }
}
