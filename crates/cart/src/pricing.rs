//! The price resolution collaborator.
//!
//! The engine never trusts a caller-supplied price except as a last-resort
//! snapshot when this collaborator returns nothing, so a buggy or hostile
//! caller cannot set its own price for a known catalog entry.

use std::collections::HashMap;

use hillbloom_core::{ProductId, UnitPrice};

/// Pure lookup from product/size to a minor-unit price.
pub trait PriceResolver: Send + Sync + 'static {
    /// Resolve the price for a product variant, `None` when unknown.
    fn resolve(&self, product: &ProductId, size: &str) -> Option<UnitPrice>;
}

/// Table-backed resolver keyed by size.
///
/// The default table carries the store's jar sizes; every product shares
/// the same size pricing.
#[derive(Debug, Clone)]
pub struct StaticPriceResolver {
    by_size: HashMap<String, UnitPrice>,
}

impl StaticPriceResolver {
    /// A resolver that knows no prices.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_size: HashMap::new(),
        }
    }

    /// Build a resolver from `(size, minor units)` pairs; non-positive
    /// amounts are skipped.
    #[must_use]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            by_size: pairs
                .into_iter()
                .filter_map(|(size, minor_units)| {
                    UnitPrice::from_minor_units(minor_units)
                        .map(|price| (size.into().trim().to_lowercase(), price))
                })
                .collect(),
        }
    }
}

impl Default for StaticPriceResolver {
    fn default() -> Self {
        Self::from_pairs([
            ("250 gram", 119_900),
            ("500 gram", 199_900),
            ("1000 gram", 349_900),
        ])
    }
}

impl PriceResolver for StaticPriceResolver {
    fn resolve(&self, _product: &ProductId, size: &str) -> Option<UnitPrice> {
        self.by_size.get(&size.trim().to_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_resolves_known_sizes() {
        let resolver = StaticPriceResolver::default();
        let product = ProductId::new("wild-honey");
        assert_eq!(
            resolver
                .resolve(&product, "250 Gram ")
                .map(UnitPrice::minor_units),
            Some(119_900)
        );
        assert_eq!(resolver.resolve(&product, "2 kilogram"), None);
    }

    #[test]
    fn test_non_positive_entries_are_skipped() {
        let resolver = StaticPriceResolver::from_pairs([("250 gram", 0)]);
        assert_eq!(
            resolver.resolve(&ProductId::new("wild-honey"), "250 gram"),
            None
        );
    }
}
