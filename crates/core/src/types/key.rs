//! Cart line item identity.
//!
//! A cart never holds two lines for the same product in the same size.
//! [`ItemKey`] is the normalized `(product_id, size)` pair that enforces
//! this: both components are trimmed and lowercased, and an empty size
//! falls back to `"default"`.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Size component used when an item carries no size selection.
const DEFAULT_SIZE: &str = "default";

/// Normalized `(product_id, size)` pair identifying a unique cart line.
///
/// The canonical text form is `"<product-id>::<size>"`, e.g.
/// `"wild-honey::250 gram"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    product: String,
    size: String,
}

impl ItemKey {
    /// Build a key from a product ID and raw size selection.
    #[must_use]
    pub fn new(product_id: &ProductId, size: &str) -> Self {
        let size = size.trim().to_lowercase();
        Self {
            product: product_id.as_str().trim().to_lowercase(),
            size: if size.is_empty() {
                DEFAULT_SIZE.to_owned()
            } else {
                size
            },
        }
    }

    /// Normalized product component.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Normalized size component.
    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.product, self.size)
    }
}

/// Turn free-form text into a URL-safe lowercase slug.
///
/// Runs of non-alphanumeric characters collapse into single dashes and
/// leading/trailing dashes are stripped, so `"Wild Honey"` becomes
/// `"wild-honey"`.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_case_and_whitespace() {
        let key = ItemKey::new(&ProductId::new("Wild-Honey"), "  250 Gram ");
        assert_eq!(key.product(), "wild-honey");
        assert_eq!(key.size(), "250 gram");
        assert_eq!(key.to_string(), "wild-honey::250 gram");
    }

    #[test]
    fn test_empty_size_falls_back_to_default() {
        let key = ItemKey::new(&ProductId::new("wild-honey"), "  ");
        assert_eq!(key.to_string(), "wild-honey::default");
    }

    #[test]
    fn test_equal_keys_for_differently_cased_input() {
        let a = ItemKey::new(&ProductId::new("WILD-HONEY"), "250 GRAM");
        let b = ItemKey::new(&ProductId::new("wild-honey"), "250 gram");
        assert_eq!(a, b);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Wild Honey"), "wild-honey");
        assert_eq!(slugify("  Shila Madhu — Honey Dew  "), "shila-madhu-honey-dew");
        assert_eq!(slugify("--a__b--"), "a-b");
        assert_eq!(slugify(""), "");
    }
}
