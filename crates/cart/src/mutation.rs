//! Pure, synchronous cart mutations.
//!
//! Each operation takes the current item list and returns the full next
//! list; nothing here touches storage or the network. The service layer
//! commits the result, notifies subscribers, and only then hands the
//! snapshot to persistence, which is what makes local actions optimistic.
//!
//! Invariants enforced here:
//! - quantities never drop to 0; an operation that would do so removes the
//!   line instead
//! - a line keeps its first price snapshot; an incoming one only fills a
//!   missing snapshot

use serde_json::Value;

use hillbloom_core::{CartItem, ItemKey};

/// How `add_item` treats an existing line with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddAction {
    /// Sum the quantities.
    #[default]
    Add,
    /// Overwrite the quantity with the incoming one.
    Replace,
}

/// Partial update for a single line; only present fields are applied.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub notes: Option<String>,
    pub image: Option<String>,
    pub metadata: Option<Value>,
    pub name_hi: Option<String>,
}

/// Add a line, or fold it into an existing line with the same key.
#[must_use]
pub fn add_item(mut items: Vec<CartItem>, incoming: CartItem, action: AddAction) -> Vec<CartItem> {
    let key = incoming.key();
    if let Some(existing) = items.iter_mut().find(|item| item.key() == key) {
        existing.quantity = match action {
            AddAction::Add => existing.quantity.saturating_add(incoming.quantity),
            AddAction::Replace => incoming.quantity,
        }
        .max(1);
        if existing.unit_price.is_none() {
            existing.unit_price = incoming.unit_price;
        }
        if !incoming.notes.is_empty() {
            existing.notes = incoming.notes;
        }
        if incoming.image.is_some() {
            existing.image = incoming.image;
        }
        if incoming.metadata.is_some() {
            existing.metadata = incoming.metadata;
        }
        if incoming.name.hi.is_some() {
            existing.name.hi = incoming.name.hi;
        }
    } else {
        items.push(incoming);
    }
    items
}

/// Set a line's quantity; zero or negative removes the line.
#[must_use]
pub fn set_quantity(mut items: Vec<CartItem>, key: &ItemKey, quantity: i64) -> Vec<CartItem> {
    if quantity <= 0 {
        items.retain(|item| item.key() != *key);
        return items;
    }
    if let Some(existing) = items.iter_mut().find(|item| item.key() == *key) {
        existing.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    }
    items
}

/// Apply an integer delta to a line's quantity; a result at or below zero
/// removes the line, and a zero delta changes nothing.
#[must_use]
pub fn increment(mut items: Vec<CartItem>, key: &ItemKey, delta: i64) -> Vec<CartItem> {
    if delta == 0 {
        return items;
    }
    let Some(position) = items.iter().position(|item| item.key() == *key) else {
        return items;
    };
    let Some(existing) = items.get_mut(position) else {
        return items;
    };
    let next = i64::from(existing.quantity).saturating_add(delta);
    if next <= 0 {
        items.remove(position);
    } else {
        existing.quantity = u32::try_from(next).unwrap_or(u32::MAX);
    }
    items
}

/// Remove a line if present.
#[must_use]
pub fn remove(mut items: Vec<CartItem>, key: &ItemKey) -> Vec<CartItem> {
    items.retain(|item| item.key() != *key);
    items
}

/// Merge the defined fields of a patch into an existing line.
#[must_use]
pub fn update_details(mut items: Vec<CartItem>, key: &ItemKey, patch: ItemPatch) -> Vec<CartItem> {
    if let Some(existing) = items.iter_mut().find(|item| item.key() == *key) {
        if let Some(notes) = patch.notes {
            existing.notes = notes;
        }
        if let Some(image) = patch.image {
            existing.image = Some(image);
        }
        if let Some(metadata) = patch.metadata {
            existing.metadata = Some(metadata);
        }
        if let Some(name_hi) = patch.name_hi {
            existing.name.hi = Some(name_hi);
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use hillbloom_core::{ItemDraft, UnitPrice};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn honey(quantity: i64) -> CartItem {
        ItemDraft::new("Wild Honey", "250 gram")
            .with_quantity(quantity)
            .into_item(now())
            .expect("valid draft")
    }

    fn honey_key() -> ItemKey {
        honey(1).key()
    }

    #[test]
    fn test_add_same_key_sums_quantities() {
        let items = add_item(Vec::new(), honey(1), AddAction::Add);
        let items = add_item(items, honey(1), AddAction::Add);
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().map(|item| item.quantity), Some(2));
    }

    #[test]
    fn test_add_never_duplicates_keys() {
        let mut items = Vec::new();
        for _ in 0..5 {
            items = add_item(items, honey(1), AddAction::Add);
        }
        let keys: std::collections::HashSet<_> = items.iter().map(CartItem::key).collect();
        assert_eq!(keys.len(), items.len());
    }

    #[test]
    fn test_replace_overwrites_quantity() {
        let items = add_item(Vec::new(), honey(3), AddAction::Add);
        let items = add_item(items, honey(1), AddAction::Replace);
        assert_eq!(items.first().map(|item| item.quantity), Some(1));
    }

    #[test]
    fn test_price_snapshot_fills_only_when_missing() {
        let unpriced = honey(1);
        let priced = ItemDraft::new("Wild Honey", "250 gram")
            .with_price_minor_units(119_900)
            .into_item(now())
            .expect("valid draft");

        // A snapshot fills an empty slot...
        let items = add_item(Vec::new(), unpriced.clone(), AddAction::Add);
        let items = add_item(items, priced.clone(), AddAction::Add);
        assert_eq!(
            items.first().and_then(|item| item.unit_price),
            UnitPrice::from_minor_units(119_900)
        );

        // ...but never overwrites an existing one.
        let cheaper = ItemDraft::new("Wild Honey", "250 gram")
            .with_price_minor_units(99_900)
            .into_item(now())
            .expect("valid draft");
        let items = add_item(items, cheaper, AddAction::Add);
        assert_eq!(
            items.first().and_then(|item| item.unit_price),
            UnitPrice::from_minor_units(119_900)
        );
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let items = add_item(Vec::new(), honey(2), AddAction::Add);
        let items = set_quantity(items, &honey_key(), 0);
        assert!(items.is_empty());
    }

    #[test]
    fn test_set_quantity_updates_existing_line() {
        let items = add_item(Vec::new(), honey(2), AddAction::Add);
        let items = set_quantity(items, &honey_key(), 7);
        assert_eq!(items.first().map(|item| item.quantity), Some(7));
    }

    #[test]
    fn test_increment_below_one_removes_line() {
        let items = add_item(Vec::new(), honey(1), AddAction::Add);
        let items = increment(items, &honey_key(), -1);
        assert!(items.is_empty());
    }

    #[test]
    fn test_increment_zero_delta_is_noop() {
        let items = add_item(Vec::new(), honey(2), AddAction::Add);
        let next = increment(items.clone(), &honey_key(), 0);
        assert_eq!(next, items);
    }

    #[test]
    fn test_increment_missing_key_is_noop() {
        let items = add_item(Vec::new(), honey(2), AddAction::Add);
        let missing = ItemKey::new(&hillbloom_core::ProductId::new("ghost"), "250 gram");
        let next = increment(items.clone(), &missing, 1);
        assert_eq!(next, items);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let items = remove(Vec::new(), &honey_key());
        assert!(items.is_empty());
    }

    #[test]
    fn test_update_details_merges_only_defined_fields() {
        let items = add_item(
            Vec::new(),
            add_notes_and_image(honey(1), "first note", "a.png"),
            AddAction::Add,
        );
        let items = update_details(
            items,
            &honey_key(),
            ItemPatch {
                notes: Some("second note".to_owned()),
                ..ItemPatch::default()
            },
        );
        let item = items.first().expect("line kept");
        assert_eq!(item.notes, "second note");
        assert_eq!(item.image.as_deref(), Some("a.png"));
    }

    fn add_notes_and_image(mut item: CartItem, notes: &str, image: &str) -> CartItem {
        item.notes = notes.to_owned();
        item.image = Some(image.to_owned());
        item
    }
}
