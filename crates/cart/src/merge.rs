//! One-time union of a guest cart into a remote cart on sign-in.
//!
//! The union is additive and always succeeds - there is no merge-conflict
//! error. Idempotence does not come from this function (running the union
//! twice would double quantities) but from the caller's unmerged check:
//! the guest cart is merged only while `last_mutated_at >= last_merged_at`
//! and stamped afterwards.

use std::collections::BTreeMap;

use hillbloom_core::{Cart, CartItem, CartMeta, CartMode, ItemKey};

/// Compute the union of a guest cart into a remote cart.
///
/// For keys on both sides quantities are summed; the remote side wins every
/// field tie, and the guest side only fills gaps (missing price snapshot,
/// empty image/notes, absent Hindi name or metadata).
#[must_use]
pub fn merge_carts(remote: &Cart, guest: &Cart) -> Cart {
    let mut merged: BTreeMap<ItemKey, CartItem> = remote.items_by_key();

    for (key, guest_item) in guest.items_by_key() {
        match merged.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let combined = combine(entry.get(), &guest_item);
                entry.insert(combined);
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(guest_item);
            }
        }
    }

    Cart {
        items: merged.into_values().collect(),
        updated_at: None,
        currency: remote.currency,
        meta: CartMeta {
            mode: CartMode::Remote,
            last_mutated_at: None,
            last_merged_at: None,
        },
    }
}

/// Fold one guest line into the matching remote line.
fn combine(remote: &CartItem, guest: &CartItem) -> CartItem {
    let mut item = remote.clone();
    item.quantity = remote.quantity.saturating_add(guest.quantity).max(1);
    if item.unit_price.is_none() {
        item.unit_price = guest.unit_price;
    }
    if item.image.as_deref().is_none_or(str::is_empty) {
        item.image = guest.image.clone();
    }
    if item.notes.is_empty() {
        item.notes.clone_from(&guest.notes);
    }
    if item.name.hi.is_none() {
        item.name.hi.clone_from(&guest.name.hi);
    }
    if item.metadata.is_none() {
        item.metadata.clone_from(&guest.metadata);
    }
    item
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use hillbloom_core::{CurrencyCode, ItemDraft, UnitPrice};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn cart_with(items: Vec<CartItem>) -> Cart {
        let mut cart = Cart::empty(CurrencyCode::INR);
        cart.items = items;
        cart
    }

    fn honey(quantity: i64) -> CartItem {
        ItemDraft::new("Wild Honey", "250 gram")
            .with_quantity(quantity)
            .into_item(now())
            .expect("valid draft")
    }

    #[test]
    fn test_empty_remote_takes_guest_items() {
        let merged = merge_carts(&cart_with(Vec::new()), &cart_with(vec![honey(2)]));
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items.first().map(|item| item.quantity), Some(2));
        assert_eq!(merged.meta.mode, CartMode::Remote);
    }

    #[test]
    fn test_shared_key_sums_quantities() {
        let merged = merge_carts(&cart_with(vec![honey(1)]), &cart_with(vec![honey(2)]));
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items.first().map(|item| item.quantity), Some(3));
    }

    #[test]
    fn test_disjoint_keys_union() {
        let dew = ItemDraft::new("Honey Dew", "500 gram")
            .into_item(now())
            .expect("valid draft");
        let merged = merge_carts(&cart_with(vec![honey(1)]), &cart_with(vec![dew]));
        assert_eq!(merged.items.len(), 2);
    }

    #[test]
    fn test_remote_price_snapshot_wins() {
        let remote_item = ItemDraft::new("Wild Honey", "250 gram")
            .with_price_minor_units(119_900)
            .into_item(now())
            .expect("valid draft");
        let guest_item = ItemDraft::new("Wild Honey", "250 gram")
            .with_price_minor_units(99_900)
            .into_item(now())
            .expect("valid draft");

        let merged = merge_carts(&cart_with(vec![remote_item]), &cart_with(vec![guest_item]));
        assert_eq!(
            merged.items.first().and_then(|item| item.unit_price),
            UnitPrice::from_minor_units(119_900)
        );
    }

    #[test]
    fn test_guest_fills_missing_price_and_fields() {
        let remote_item = honey(1);
        let guest_item = ItemDraft::new("Wild Honey", "250 gram")
            .with_price_minor_units(119_900)
            .with_image("honey.png")
            .with_notes("gift wrap")
            .into_item(now())
            .expect("valid draft");

        let merged = merge_carts(&cart_with(vec![remote_item]), &cart_with(vec![guest_item]));
        let item = merged.items.first().expect("one line");
        assert_eq!(
            item.unit_price,
            UnitPrice::from_minor_units(119_900)
        );
        assert_eq!(item.image.as_deref(), Some("honey.png"));
        assert_eq!(item.notes, "gift wrap");
    }

    #[test]
    fn test_remote_non_empty_fields_win_ties() {
        let remote_item = ItemDraft::new("Wild Honey", "250 gram")
            .with_image("remote.png")
            .with_notes("remote note")
            .into_item(now())
            .expect("valid draft");
        let guest_item = ItemDraft::new("Wild Honey", "250 gram")
            .with_image("guest.png")
            .with_notes("guest note")
            .into_item(now())
            .expect("valid draft");

        let merged = merge_carts(&cart_with(vec![remote_item]), &cart_with(vec![guest_item]));
        let item = merged.items.first().expect("one line");
        assert_eq!(item.image.as_deref(), Some("remote.png"));
        assert_eq!(item.notes, "remote note");
    }
}
