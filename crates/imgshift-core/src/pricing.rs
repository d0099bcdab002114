//! Batch pricing.
//!
//! A single image is free. Batches of 2 through 100 images fall into exactly one
//! tier; anything larger is rejected outright. The table is immutable once built
//! and shared read-only across requests.

use serde::Serialize;

/// Smallest batch that has to be paid for.
pub const MIN_PAID_BATCH: i64 = 2;
/// Largest batch accepted at all.
pub const MAX_BATCH: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    pub name: String,
    pub min_count: i64,
    pub max_count: i64,
    pub price_minor_units: i64,
    pub label: String,
}

impl PriceTier {
    pub fn new(
        name: impl Into<String>,
        min_count: i64,
        max_count: i64,
        price_minor_units: i64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            min_count,
            max_count,
            price_minor_units,
            label: label.into(),
        }
    }

    pub fn contains(&self, count: i64) -> bool {
        (self.min_count..=self.max_count).contains(&count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceDecision<'a> {
    Free,
    Tier(&'a PriceTier),
    Rejected,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Pricing table is empty")]
    Empty,

    #[error("Tier {name} has an empty or inverted range {min}..={max}")]
    InvalidRange { name: String, min: i64, max: i64 },

    #[error("Tier {name} has a non-positive price")]
    NonPositivePrice { name: String },

    #[error("Tier {name} starts at {found}, expected {expected}")]
    Discontinuous {
        name: String,
        expected: i64,
        found: i64,
    },

    #[error("Pricing table ends at {found}, expected {expected}")]
    IncompleteCoverage { expected: i64, found: i64 },
}

#[derive(Debug, Clone)]
pub struct PricingPolicy {
    tiers: Vec<PriceTier>,
}

impl PricingPolicy {
    /// Build a policy from an arbitrary tier table.
    ///
    /// Tiers are sorted by `min_count` and must tile `MIN_PAID_BATCH..=MAX_BATCH`
    /// with no gaps and no overlaps.
    pub fn new(mut tiers: Vec<PriceTier>) -> Result<Self, PricingError> {
        if tiers.is_empty() {
            return Err(PricingError::Empty);
        }
        tiers.sort_by_key(|t| t.min_count);

        let mut expected = MIN_PAID_BATCH;
        for tier in &tiers {
            if tier.max_count < tier.min_count {
                return Err(PricingError::InvalidRange {
                    name: tier.name.clone(),
                    min: tier.min_count,
                    max: tier.max_count,
                });
            }
            if tier.price_minor_units <= 0 {
                return Err(PricingError::NonPositivePrice {
                    name: tier.name.clone(),
                });
            }
            if tier.min_count != expected {
                return Err(PricingError::Discontinuous {
                    name: tier.name.clone(),
                    expected,
                    found: tier.min_count,
                });
            }
            expected = tier.max_count + 1;
        }

        if expected != MAX_BATCH + 1 {
            return Err(PricingError::IncompleteCoverage {
                expected: MAX_BATCH,
                found: expected - 1,
            });
        }

        Ok(Self { tiers })
    }

    /// The production tier table.
    pub fn standard() -> Self {
        Self {
            tiers: vec![
                PriceTier::new("A", 2, 10, 199, "Small batch conversion"),
                PriceTier::new("B", 11, 30, 399, "Medium batch conversion"),
                PriceTier::new("C", 31, 100, 799, "Large batch conversion"),
            ],
        }
    }

    pub fn tiers(&self) -> &[PriceTier] {
        &self.tiers
    }

    pub fn price_for(&self, count: i64) -> PriceDecision<'_> {
        if count < MIN_PAID_BATCH {
            return PriceDecision::Free;
        }
        if count > MAX_BATCH {
            return PriceDecision::Rejected;
        }
        self.tiers
            .iter()
            .find(|t| t.contains(count))
            .map(PriceDecision::Tier)
            .unwrap_or(PriceDecision::Rejected)
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
