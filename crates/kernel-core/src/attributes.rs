//! Column layouts of the household and person matrices.

use rust_decimal::Decimal;

use crate::matrix::AttributeKey;

/// Row reference stored when a household has no such member.
pub const NO_MEMBER: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HouseholdAttribute {
    Identifier,
    /// Row of the household's attractor; an attractor references itself.
    AttractorRef,
    SocialNetworkSize,
    /// Mean impression interval in days, before the impact rate.
    ImpressionDays,
    ImpressionInpeer,
    ImpressionOutpeer,
    ImpressionSelf,
    ImpressionAttractor,
    /// Share of in-group peers among all peers.
    SocialAssortativity,
    /// 1 when the household's child attends an in-group school.
    SchoolAssortativity,
    Calculation,
    Confidence,
    Complacency,
    ImpressionRounds,
    /// Activated peers that moved this household's attitudes, summed over
    /// propagation cycles.
    ImpressionFeeds,
    ReferentRef,
    /// Person row, or [`NO_MEMBER`].
    ChildRef,
}

impl HouseholdAttribute {
    pub const ALL: [HouseholdAttribute; 17] = [
        Self::Identifier,
        Self::AttractorRef,
        Self::SocialNetworkSize,
        Self::ImpressionDays,
        Self::ImpressionInpeer,
        Self::ImpressionOutpeer,
        Self::ImpressionSelf,
        Self::ImpressionAttractor,
        Self::SocialAssortativity,
        Self::SchoolAssortativity,
        Self::Calculation,
        Self::Confidence,
        Self::Complacency,
        Self::ImpressionRounds,
        Self::ImpressionFeeds,
        Self::ReferentRef,
        Self::ChildRef,
    ];

    /// Columns that must stay within [0,1].
    pub fn is_unit_interval(self) -> bool {
        matches!(
            self,
            Self::Calculation | Self::Confidence | Self::Complacency | Self::SocialAssortativity
        )
    }
}

impl AttributeKey for HouseholdAttribute {
    const COUNT: usize = 17;
    const IDENTIFIER: Self = HouseholdAttribute::Identifier;

    fn column(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PersonAttribute {
    Identifier,
    HouseholdRef,
    /// Virtual day of birth; negative for persons born before the run.
    Birth,
    Male,
    Status,
    Behavior,
}

impl AttributeKey for PersonAttribute {
    const COUNT: usize = 6;
    const IDENTIFIER: Self = PersonAttribute::Identifier;

    fn column(self) -> usize {
        self as usize
    }
}

pub fn flag(value: bool) -> Decimal {
    if value {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

pub fn is_set(value: Decimal) -> bool {
    !value.is_zero()
}

/// Clamps a value into [0,1].
pub fn clamp_unit(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn household_columns_are_dense() {
        for (expected, attribute) in HouseholdAttribute::ALL.iter().enumerate() {
            assert_eq!(attribute.column(), expected);
        }
        assert_eq!(HouseholdAttribute::ALL.len(), HouseholdAttribute::COUNT);
    }

    #[test]
    fn clamp_unit_bounds_both_sides() {
        assert_eq!(clamp_unit(Decimal::from(-2)), Decimal::ZERO);
        assert_eq!(clamp_unit(Decimal::from(3)), Decimal::ONE);
        assert_eq!(clamp_unit(Decimal::new(25, 2)), Decimal::new(25, 2));
    }
}
