//! Local-only cart behavior: optimistic mutations, price snapshots, and
//! cache degradation, all without ever touching the remote store.

use hillbloom_cart::mutation::{AddAction, ItemPatch};
use hillbloom_core::{CartMode, ItemDraft, ItemKey, ProductId, UnitPrice};

use hillbloom_integration_tests::Harness;

fn honey_key() -> ItemKey {
    ItemKey::new(&ProductId::new("wild-honey"), "250 gram")
}

#[tokio::test]
async fn test_first_add_snapshots_catalog_price() {
    let harness = Harness::new();

    let cart = harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");

    assert_eq!(cart.meta.mode, CartMode::Guest);
    assert_eq!(cart.items.len(), 1);
    let item = cart.items.first().expect("one line");
    assert_eq!(item.key().to_string(), "wild-honey::250 gram");
    assert_eq!(item.quantity, 1);
    assert_eq!(
        item.unit_price.map(UnitPrice::minor_units),
        Some(119_900)
    );
}

#[tokio::test]
async fn test_adding_same_product_and_size_sums_into_one_line() {
    let harness = Harness::new();

    harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");
    let cart = harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items.first().map(|item| item.quantity), Some(2));
    assert_eq!(harness.service.item_count(), 2);
}

#[tokio::test]
async fn test_replace_action_overwrites_quantity() {
    let harness = Harness::new();

    harness
        .service
        .add_item(
            ItemDraft::new("Wild Honey", "250 gram").with_quantity(4),
            AddAction::Add,
        )
        .expect("valid draft");
    let cart = harness
        .service
        .add_item(
            ItemDraft::new("Wild Honey", "250 gram").with_quantity(2),
            AddAction::Replace,
        )
        .expect("valid draft");

    assert_eq!(cart.items.first().map(|item| item.quantity), Some(2));
}

#[tokio::test]
async fn test_decrement_at_quantity_one_removes_the_line() {
    let harness = Harness::new();

    harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");
    let cart = harness.service.increment(&honey_key(), -1);

    assert!(cart.items.is_empty());
    assert_eq!(harness.service.item_count(), 0);
}

#[tokio::test]
async fn test_set_quantity_updates_and_removes() {
    let harness = Harness::new();
    harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");

    let cart = harness.service.set_quantity(&honey_key(), 7);
    assert_eq!(cart.items.first().map(|item| item.quantity), Some(7));

    let cart = harness.service.set_quantity(&honey_key(), 0);
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn test_update_item_merges_only_defined_fields() {
    let harness = Harness::new();
    harness
        .service
        .add_item(
            ItemDraft::new("Wild Honey", "250 gram").with_image("honey.png"),
            AddAction::Add,
        )
        .expect("valid draft");

    let cart = harness.service.update_item(
        &honey_key(),
        ItemPatch {
            notes: Some("less crystallized please".to_owned()),
            ..ItemPatch::default()
        },
    );

    let item = cart.items.first().expect("line kept");
    assert_eq!(item.notes, "less crystallized please");
    assert_eq!(item.image.as_deref(), Some("honey.png"));
}

#[tokio::test]
async fn test_cart_survives_engine_restart_via_local_cache() {
    let harness = Harness::new();
    harness
        .service
        .add_item(
            ItemDraft::new("Wild Honey", "250 gram").with_quantity(3),
            AddAction::Add,
        )
        .expect("valid draft");

    // A fresh engine over the same local store: first access loads the
    // cached guest cart.
    let restarted = hillbloom_cart::CartService::new(
        harness.local.clone(),
        harness.remote.clone(),
        harness.identity.clone(),
        hillbloom_cart::pricing::StaticPriceResolver::default(),
        hillbloom_cart::SyncConfig::default(),
    );
    assert_eq!(restarted.item_count(), 3);
}

#[tokio::test]
async fn test_corrupt_cache_degrades_to_empty_cart() {
    use hillbloom_cart::LocalStore;

    let harness = Harness::new();
    let config = hillbloom_cart::SyncConfig::default();
    harness
        .local
        .set(&config.storage_key, "{definitely not json")
        .expect("seed corrupt record");

    let restarted = hillbloom_cart::CartService::new(
        harness.local.clone(),
        harness.remote.clone(),
        harness.identity.clone(),
        hillbloom_cart::pricing::StaticPriceResolver::default(),
        config,
    );
    assert_eq!(restarted.item_count(), 0);

    // The engine is fully functional afterwards.
    let cart = restarted
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");
    assert_eq!(cart.items.len(), 1);
}

#[tokio::test]
async fn test_clear_local_empties_cart_and_cache() {
    let harness = Harness::new();
    harness
        .service
        .add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)
        .expect("valid draft");

    let cart = harness.service.clear_local();
    assert!(cart.items.is_empty());

    // Reload over the same store: nothing cached anymore.
    let reloaded = hillbloom_cart::CartService::new(
        harness.local.clone(),
        harness.remote.clone(),
        harness.identity.clone(),
        hillbloom_cart::pricing::StaticPriceResolver::default(),
        hillbloom_cart::SyncConfig::default(),
    );
    assert_eq!(reloaded.item_count(), 0);
}
