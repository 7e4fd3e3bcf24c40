//! Recommended-total derivation from the two proposal input modes
use crate::error::EngineError;

/// Itemized proposal. A missing component counts as zero.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Breakdown {
    #[n(0)]
    pub labor: Option<u64>,
    #[n(1)]
    pub parts: Option<u64>,
    #[n(2)]
    pub inspection: Option<u64>,
}

/// The two mutually exclusive ways a technician can price a proposal.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingInput {
    #[n(0)]
    Range {
        #[n(0)]
        min: u64,
        #[n(1)]
        max: u64,
    },
    #[n(1)]
    Breakdown(#[n(0)] Breakdown),
}

impl Breakdown {
    pub fn new(labor: u64, parts: u64, inspection: u64) -> Self {
        Self {
            labor: Some(labor),
            parts: Some(parts),
            inspection: Some(inspection),
        }
    }

    pub fn total(&self) -> u64 {
        self.labor
            .unwrap_or(0)
            .saturating_add(self.parts.unwrap_or(0))
            .saturating_add(self.inspection.unwrap_or(0))
    }

    fn has_positive_component(&self) -> bool {
        [self.labor, self.parts, self.inspection]
            .into_iter()
            .flatten()
            .any(|v| v > 0)
    }
}

impl PricingInput {
    pub fn range(min: u64, max: u64) -> Self {
        PricingInput::Range { min, max }
    }

    pub fn recommended_total(&self) -> Option<u64> {
        match self {
            PricingInput::Range { min, max } => recommended_total(None, Some(*min), Some(*max)),
            PricingInput::Breakdown(b) => recommended_total(Some(b), None, None),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            PricingInput::Range { min, max } => {
                if *min == 0 || *max == 0 {
                    return Err(EngineError::InvalidInput(
                        "price range bounds must be greater than zero".into(),
                    ));
                }
                if min > max {
                    return Err(EngineError::InvalidInput(format!(
                        "price range minimum {min} exceeds maximum {max}"
                    )));
                }
                Ok(())
            }
            PricingInput::Breakdown(b) => {
                if !b.has_positive_component() {
                    return Err(EngineError::InvalidInput(
                        "breakdown needs at least one component greater than zero".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Single advisory total. A breakdown wins over a range; within a range the
/// maximum wins over the minimum.
pub fn recommended_total(
    breakdown: Option<&Breakdown>,
    price_min: Option<u64>,
    price_max: Option<u64>,
) -> Option<u64> {
    if let Some(b) = breakdown {
        return Some(b.total());
    }
    price_max.or(price_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_sums_components() {
        let b = Breakdown::new(50, 30, 0);
        assert_eq!(recommended_total(Some(&b), None, None), Some(80));
    }

    #[test]
    fn missing_breakdown_components_count_as_zero() {
        let b = Breakdown {
            labor: Some(120),
            ..Breakdown::default()
        };
        assert_eq!(PricingInput::Breakdown(b).recommended_total(), Some(120));
    }

    #[test]
    fn range_prefers_maximum() {
        assert_eq!(recommended_total(None, Some(100), Some(150)), Some(150));
        assert_eq!(recommended_total(None, Some(100), None), Some(100));
    }

    #[test]
    fn nothing_supplied_is_none() {
        assert_eq!(recommended_total(None, None, None), None);
    }

    #[test]
    fn validation_rules() {
        assert!(PricingInput::range(100, 150).validate().is_ok());
        assert!(PricingInput::range(0, 150).validate().is_err());
        assert!(PricingInput::range(200, 150).validate().is_err());
        assert!(PricingInput::Breakdown(Breakdown::default()).validate().is_err());
        assert!(PricingInput::Breakdown(Breakdown::new(0, 0, 10)).validate().is_ok());
    }
}
