use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RecapError;
use crate::types::{Money, OfferingId, Rate};
use crate::RecapResult;

/// Distribution mechanics of a waterfall tier, in the standard
/// real-estate-syndication priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierKind {
    /// Return contributed capital to investors pro-rata
    ReturnOfCapital,
    /// Pay down accrued-but-unpaid preferred return
    PreferredReturn,
    /// Sponsor catch-up toward an externally computed target
    GpCatchUp,
    /// Uncapped terminal split of all remaining cash
    ResidualSplit,
}

/// A single tier in an offering's waterfall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    /// Consumption priority; unique and ascending within a definition
    pub order: u32,
    pub kind: TierKind,
    /// Sponsor share of this tier's cash (0 except catch-up/residual)
    #[serde(default)]
    pub split_to_sponsor: Rate,
    /// Collective cap for this tier; None only for ResidualSplit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<Money>,
}

/// Ordered tier configuration for one offering, set at offering creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallDefinition {
    pub offering_id: OfferingId,
    pub tiers: Vec<Tier>,
}

impl WaterfallDefinition {
    pub fn new(offering_id: impl Into<OfferingId>, tiers: Vec<Tier>) -> Self {
        WaterfallDefinition {
            offering_id: offering_id.into(),
            tiers,
        }
    }

    /// The standard structure: capital back, preferred, then an uncapped
    /// residual split at `sponsor_share` to the sponsor.
    pub fn standard(offering_id: impl Into<OfferingId>, sponsor_share: Rate) -> Self {
        WaterfallDefinition::new(
            offering_id,
            vec![
                Tier {
                    order: 1,
                    kind: TierKind::ReturnOfCapital,
                    split_to_sponsor: Decimal::ZERO,
                    target_amount: None,
                },
                Tier {
                    order: 2,
                    kind: TierKind::PreferredReturn,
                    split_to_sponsor: Decimal::ZERO,
                    target_amount: None,
                },
                Tier {
                    order: 3,
                    kind: TierKind::ResidualSplit,
                    split_to_sponsor: sponsor_share,
                    target_amount: None,
                },
            ],
        )
    }

    /// Tiers sorted by consumption priority.
    pub fn ordered_tiers(&self) -> Vec<&Tier> {
        let mut tiers: Vec<&Tier> = self.tiers.iter().collect();
        tiers.sort_by_key(|t| t.order);
        tiers
    }

    /// Structural validation, performed before any allocation step.
    ///
    /// A waterfall must terminate in an uncapped ResidualSplit or leftover
    /// cash would be undefined; that is prevented here, not at runtime.
    pub fn validate(&self) -> RecapResult<()> {
        if self.tiers.is_empty() {
            return Err(RecapError::InvalidWaterfallDefinition(
                "waterfall has no tiers".into(),
            ));
        }

        let ordered = self.ordered_tiers();

        for pair in ordered.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(RecapError::InvalidWaterfallDefinition(format!(
                    "duplicate tier order {}",
                    pair[0].order
                )));
            }
        }

        for (i, tier) in ordered.iter().enumerate() {
            if tier.split_to_sponsor < Decimal::ZERO || tier.split_to_sponsor > Decimal::ONE {
                return Err(RecapError::InvalidWaterfallDefinition(format!(
                    "tier {}: sponsor split {} outside [0, 1]",
                    tier.order, tier.split_to_sponsor
                )));
            }

            match tier.kind {
                TierKind::ResidualSplit => {
                    if i != ordered.len() - 1 {
                        return Err(RecapError::InvalidWaterfallDefinition(format!(
                            "tier {}: ResidualSplit must be the final tier",
                            tier.order
                        )));
                    }
                    if tier.target_amount.is_some() {
                        return Err(RecapError::InvalidWaterfallDefinition(format!(
                            "tier {}: ResidualSplit is uncapped and cannot carry a target",
                            tier.order
                        )));
                    }
                }
                TierKind::ReturnOfCapital | TierKind::PreferredReturn => {
                    if !tier.split_to_sponsor.is_zero() {
                        return Err(RecapError::InvalidWaterfallDefinition(format!(
                            "tier {}: {:?} pays investors only; sponsor split must be 0",
                            tier.order, tier.kind
                        )));
                    }
                }
                TierKind::GpCatchUp => {}
            }

            if let Some(target) = tier.target_amount {
                if target < Decimal::ZERO {
                    return Err(RecapError::InvalidWaterfallDefinition(format!(
                        "tier {}: negative target amount {target}",
                        tier.order
                    )));
                }
            }
        }

        if ordered.last().map(|t| t.kind) != Some(TierKind::ResidualSplit) {
            return Err(RecapError::InvalidWaterfallDefinition(
                "waterfall must terminate in a ResidualSplit tier".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_standard_definition_is_valid() {
        let def = WaterfallDefinition::standard("off-1", dec!(0.20));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_empty_definition_rejected() {
        let def = WaterfallDefinition::new("off-1", vec![]);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(0.20));
        def.tiers[1].order = 1;
        match def.validate() {
            Err(RecapError::InvalidWaterfallDefinition(msg)) => {
                assert!(msg.contains("duplicate"));
            }
            other => panic!("Expected InvalidWaterfallDefinition, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_residual_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(0.20));
        def.tiers.pop();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_residual_not_last_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(0.20));
        def.tiers[0].kind = TierKind::ResidualSplit;
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_capped_residual_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(0.20));
        def.tiers[2].target_amount = Some(dec!(100));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_sponsor_split_on_capital_tier_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(0.20));
        def.tiers[0].split_to_sponsor = dec!(0.05);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_split_out_of_range_rejected() {
        let mut def = WaterfallDefinition::standard("off-1", dec!(1.2));
        assert!(def.validate().is_err());
        def.tiers[2].split_to_sponsor = dec!(-0.1);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_unsorted_input_ordering() {
        let def = WaterfallDefinition::new(
            "off-1",
            vec![
                Tier {
                    order: 3,
                    kind: TierKind::ResidualSplit,
                    split_to_sponsor: dec!(0.2),
                    target_amount: None,
                },
                Tier {
                    order: 1,
                    kind: TierKind::ReturnOfCapital,
                    split_to_sponsor: Decimal::ZERO,
                    target_amount: None,
                },
            ],
        );
        assert!(def.validate().is_ok());
        let ordered = def.ordered_tiers();
        assert_eq!(ordered[0].order, 1);
        assert_eq!(ordered[1].order, 3);
    }
}
