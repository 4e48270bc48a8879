//! The in-memory cart data model.
//!
//! A [`Cart`] is a list of [`CartItem`]s unique by [`ItemKey`], plus
//! bookkeeping metadata used by the synchronization engine. Raw caller or
//! stored input enters the model through [`ItemDraft::into_item`]
//! (validation) and [`sanitize_items`] (best-effort cleanup of
//! deserialized lists).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::key::slugify;
use crate::types::{CurrencyCode, ItemKey, ProductId, UnitPrice};

/// Localized product display name.
///
/// English is the canonical variant; the Hindi variant is carried when the
/// catalog provides one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductName {
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi: Option<String>,
}

impl ProductName {
    /// Create a name with only the English variant.
    #[must_use]
    pub fn new(en: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            hi: None,
        }
    }
}

/// Which store a cart is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CartMode {
    /// Unauthenticated session; the cart lives only in local storage.
    #[default]
    Guest,
    /// Authenticated session; the cart lives in a per-user remote document.
    Remote,
}

/// Synchronization bookkeeping carried alongside the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartMeta {
    /// Current binding; changes only through explicit connect/disconnect.
    #[serde(default)]
    pub mode: CartMode,
    /// When the cart last changed through a mutation operation.
    #[serde(default)]
    pub last_mutated_at: Option<DateTime<Utc>>,
    /// When the cart was last merged into a remote cart.
    #[serde(default)]
    pub last_merged_at: Option<DateTime<Utc>>,
}

impl CartMeta {
    /// Whether a guest cart holds changes not yet merged into a remote cart.
    ///
    /// A cart that was never mutated has nothing to merge. The merge stamp
    /// is set to the mutation timestamp it covered, so exact equality means
    /// merged; only a strictly later mutation re-arms the merge.
    #[must_use]
    pub fn has_unmerged_changes(&self) -> bool {
        match (self.last_mutated_at, self.last_merged_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(mutated), Some(merged)) => mutated > merged,
        }
    }
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: ProductName,
    pub size: String,
    pub quantity: u32,
    /// Price snapshot taken at add time; absent when unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<UnitPrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// The normalized identity of this line.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.product_id, &self.size)
    }
}

/// Raw item input as supplied by a caller or read back from storage.
///
/// Everything except the product name and size is optional; quantity and
/// price are coerced into range by [`ItemDraft::into_item`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_hi: Option<String>,
    pub size: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Caller-supplied price snapshot in minor units; used only as a
    /// fallback when price resolution returns nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_minor_units: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

const fn default_quantity() -> i64 {
    1
}

impl ItemDraft {
    /// Start a draft for the given product name and size, quantity 1.
    #[must_use]
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            quantity: 1,
            ..Self::default()
        }
    }

    /// Set an explicit product ID instead of the slugified name.
    #[must_use]
    pub fn with_product_id(mut self, product_id: impl Into<ProductId>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Set the Hindi name variant.
    #[must_use]
    pub fn with_hindi_name(mut self, name_hi: impl Into<String>) -> Self {
        self.name_hi = Some(name_hi.into());
        self
    }

    /// Set the desired quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set a caller-supplied price snapshot in minor units.
    #[must_use]
    pub fn with_price_minor_units(mut self, minor_units: i64) -> Self {
        self.price_minor_units = Some(minor_units);
        self
    }

    /// Set the item image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set free-form notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate and normalize the draft into a [`CartItem`].
    ///
    /// The product ID falls back to the slugified English name, quantity is
    /// clamped to at least 1, and a non-positive price snapshot becomes
    /// absent rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the product name or size is empty.
    pub fn into_item(self, now: DateTime<Utc>) -> Result<CartItem, ValidationError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ValidationError::MissingProduct);
        }
        let size = self.size.trim().to_owned();
        if size.is_empty() {
            return Err(ValidationError::MissingSize);
        }

        let product_id = self
            .product_id
            .map(|id| id.as_str().trim().to_owned())
            .filter(|id| !id.is_empty())
            .map_or_else(|| ProductId::new(slugify(&name)), ProductId::new);

        let quantity = u32::try_from(self.quantity.max(1)).unwrap_or(u32::MAX);

        Ok(CartItem {
            product_id,
            name: ProductName {
                en: name,
                hi: self
                    .name_hi
                    .map(|hi| hi.trim().to_owned())
                    .filter(|hi| !hi.is_empty()),
            },
            size,
            quantity,
            unit_price: self.price_minor_units.and_then(UnitPrice::from_minor_units),
            image: self.image.filter(|image| !image.trim().is_empty()),
            notes: self.notes.unwrap_or_default(),
            metadata: self.metadata,
            added_at: self.added_at.unwrap_or(now),
        })
    }
}

/// Errors rejecting a cart item draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The draft has no product name.
    #[error("cart item is missing a product name")]
    MissingProduct,
    /// The draft has no size selection.
    #[error("cart item is missing a size selection")]
    MissingSize,
}

/// The authoritative cart snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub meta: CartMeta,
}

impl Cart {
    /// An empty cart in guest mode.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            updated_at: None,
            currency,
            meta: CartMeta::default(),
        }
    }

    /// Look up a line by key.
    #[must_use]
    pub fn find(&self, key: &ItemKey) -> Option<&CartItem> {
        self.items.iter().find(|item| item.key() == *key)
    }

    /// Clone the lines into a key-ordered map.
    #[must_use]
    pub fn items_by_key(&self) -> std::collections::BTreeMap<ItemKey, CartItem> {
        self.items
            .iter()
            .map(|item| (item.key(), item.clone()))
            .collect()
    }
}

/// Best-effort cleanup of a deserialized item list.
///
/// Lines with an empty product name or size are dropped, zero quantities
/// are clamped to 1, and duplicate keys are collapsed keeping the first
/// occurrence. Never fails; malformed entries simply disappear.
#[must_use]
pub fn sanitize_items(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter_map(|mut item| {
            if item.name.en.trim().is_empty() || item.size.trim().is_empty() {
                return None;
            }
            if item.quantity == 0 {
                item.quantity = 1;
            }
            seen.insert(item.key()).then_some(item)
        })
        .collect()
}
