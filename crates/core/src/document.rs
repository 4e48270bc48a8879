//! The remote cart document wire shape.
//!
//! One document exists per authenticated user. Items are keyed by the
//! canonical [`ItemKey`] text form so the remote store can merge on item
//! identity, and the document carries the writer's generation counter as
//! `version` for echo classification on the subscription side.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cart::{Cart, CartItem, CartMeta, CartMode, ProductName, sanitize_items};
use crate::types::{CurrencyCode, ProductId, UnitPrice, UserId};

/// Per-user remote cart document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDocument {
    pub user_id: UserId,
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Server-assigned write timestamp; absent on documents this client
    /// built but has not round-tripped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// The writing client's clock at write time.
    pub client_updated_at: DateTime<Utc>,
    /// The writing client's generation counter.
    pub version: u64,
    pub items: BTreeMap<String, DocumentItem>,
}

/// One cart line as stored in the remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    pub product_id: String,
    pub name: ProductName,
    pub size: String,
    pub qty: i64,
    /// Raw minor-unit snapshot; non-positive values decode to no price.
    #[serde(default)]
    pub price_snapshot: Option<i64>,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub added_at: DateTime<Utc>,
}

impl CartDocument {
    /// Build the outbound document for a cart snapshot.
    #[must_use]
    pub fn from_cart(
        user_id: &UserId,
        cart: &Cart,
        version: u64,
        client_updated_at: DateTime<Utc>,
    ) -> Self {
        let items = cart
            .items
            .iter()
            .map(|item| {
                (
                    item.key().to_string(),
                    DocumentItem {
                        product_id: item.product_id.as_str().to_owned(),
                        name: item.name.clone(),
                        size: item.size.clone(),
                        qty: i64::from(item.quantity),
                        price_snapshot: item.unit_price.map(UnitPrice::minor_units),
                        currency: cart.currency,
                        image: item.image.clone(),
                        notes: item.notes.clone(),
                        metadata: item.metadata.clone(),
                        added_at: item.added_at,
                    },
                )
            })
            .collect();

        Self {
            user_id: user_id.clone(),
            currency: cart.currency,
            updated_at: None,
            client_updated_at,
            version,
            items,
        }
    }

    /// Convert the document back into an in-memory remote-mode cart.
    ///
    /// Items are rebuilt from their stored fields (the map key is not
    /// trusted), sanitized, and ordered by key. Lines that lost their
    /// product name or size decode to nothing rather than an error.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        let items = self
            .items
            .into_values()
            .filter_map(DocumentItem::into_item)
            .collect();

        Cart {
            items: sanitize_items(items),
            updated_at: Some(self.updated_at.unwrap_or(self.client_updated_at)),
            currency: self.currency,
            meta: CartMeta {
                mode: CartMode::Remote,
                last_mutated_at: None,
                last_merged_at: None,
            },
        }
    }
}

impl DocumentItem {
    /// Rebuild the in-memory line, dropping it when identity fields are gone.
    fn into_item(self) -> Option<CartItem> {
        let name = self.name.en.trim().to_owned();
        let size = self.size.trim().to_owned();
        if name.is_empty() || size.is_empty() {
            return None;
        }

        let quantity = u32::try_from(self.qty.max(1)).unwrap_or(u32::MAX);

        Some(CartItem {
            product_id: ProductId::new(self.product_id),
            name: ProductName {
                en: name,
                hi: self.name.hi.filter(|hi| !hi.trim().is_empty()),
            },
            size,
            quantity,
            unit_price: self.price_snapshot.and_then(UnitPrice::from_minor_units),
            image: self.image,
            notes: self.notes,
            metadata: self.metadata,
            added_at: self.added_at,
        })
    }
}
