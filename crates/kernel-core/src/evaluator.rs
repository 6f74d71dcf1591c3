use contracts::{EvaluatorKind, VaxOccasion};
use rust_decimal::Decimal;

/// Decides whether a household's attitude clears a vaccination occasion.
///
/// Both policies reduce (confidence, complacency) to a barrier; a household
/// is positive when the occasion's convenience is at least that barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttitudeEvaluator {
    kind: EvaluatorKind,
}

impl AttitudeEvaluator {
    pub fn new(kind: EvaluatorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> EvaluatorKind {
        self.kind
    }

    /// Lower is more willing. `Threshold` uses `1 - (confidence - complacency)`,
    /// `Average` uses `1 - (confidence + 1 - complacency) / 2`.
    pub fn barrier(&self, confidence: Decimal, complacency: Decimal) -> Decimal {
        match self.kind {
            EvaluatorKind::Threshold => Decimal::ONE - (confidence - complacency),
            EvaluatorKind::Average => {
                Decimal::ONE - (confidence + Decimal::ONE - complacency) / Decimal::TWO
            }
        }
    }

    pub fn is_positive(
        &self,
        confidence: Decimal,
        complacency: Decimal,
        occasion: &VaxOccasion,
    ) -> bool {
        self.barrier(confidence, complacency) <= occasion.convenience()
    }
}
