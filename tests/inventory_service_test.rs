mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockledger_api::entities::low_stock_alert::AlertStatus;
use stockledger_api::entities::stock_movement::MovementType;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::inventory::RestockLine;
use uuid::Uuid;

#[tokio::test]
async fn bulk_restock_applies_lines_and_collects_failures() {
    let app = TestApp::new().await;
    let first = app.seed_item(10, 0).await;
    let second = app.seed_item(20, 0).await;
    let unknown = Uuid::new_v4();
    let svc = &app.state.inventory;

    let lines = vec![
        RestockLine { product_id: first, variant_id: None, quantity: 5 },
        RestockLine { product_id: second, variant_id: None, quantity: 7 },
        RestockLine { product_id: unknown, variant_id: None, quantity: 3 },
    ];

    let report = svc
        .bulk_add_stock(&lines, "Supplier delivery", Some("ops"))
        .await
        .expect("bulk restock");

    // A failing line is reported, not fatal to the rest of the batch.
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].product_id, unknown);

    let status = svc.get_status(first, None).await.expect("status");
    assert_eq!(status.quantity, 15);
    let status = svc.get_status(second, None).await.expect("status");
    assert_eq!(status.quantity, 27);
}

#[tokio::test]
async fn reserve_confirm_updates_counters_and_ledger() {
    let app = TestApp::new().await;
    let product = app.seed_item(100, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 30, None, "ORD-1001")
        .await
        .expect("reserve");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 100);
    assert_eq!(status.reserved_quantity, 30);
    assert_eq!(status.available_quantity, 70);

    svc.confirm_sale(product, 30, None, "ORD-1001")
        .await
        .expect("confirm");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 70);
    assert_eq!(status.reserved_quantity, 0);
    assert_eq!(status.available_quantity, 70);
}

#[tokio::test]
async fn reserve_beyond_available_reports_what_is_left() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 8, None, "ORD-1").await.expect("reserve");

    let err = svc
        .reserve_stock(product, 5, None, "ORD-2")
        .await
        .expect_err("should be short");
    assert_matches!(err, ServiceError::InsufficientStock { available: 2 });

    // The failed attempt must not have claimed anything.
    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.reserved_quantity, 8);
}

#[tokio::test]
async fn release_returns_units_and_is_idempotent() {
    let app = TestApp::new().await;
    let product = app.seed_item(50, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 20, None, "ORD-7").await.expect("reserve");
    svc.release_stock(product, 20, None, "ORD-7").await.expect("release");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 50);
    assert_eq!(status.reserved_quantity, 0);

    // Retried release with the same reference is a no-op, not an underflow.
    svc.release_stock(product, 20, None, "ORD-7")
        .await
        .expect("second release");
    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.reserved_quantity, 0);
}

// The checkout back-and-forth in full: a claim, a second claim that is
// refused while the first holds the stock, the first abandoned, and the
// refused claim succeeding on retry.
#[tokio::test]
async fn refused_reservation_succeeds_after_blocking_claim_released() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 8, None, "ORD-A").await.expect("first claim");

    let err = svc
        .reserve_stock(product, 5, None, "ORD-B")
        .await
        .expect_err("held stock blocks the second claim");
    assert_matches!(err, ServiceError::InsufficientStock { available: 2 });

    svc.release_stock(product, 8, None, "ORD-A")
        .await
        .expect("abandon first claim");

    svc.reserve_stock(product, 5, None, "ORD-B")
        .await
        .expect("retry succeeds once stock is free");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 10);
    assert_eq!(status.reserved_quantity, 5);
    assert_eq!(status.available_quantity, 5);
}

// Releasing more than the reference holds floors the counter in a single
// clamped statement; it must never underflow.
#[tokio::test]
async fn over_release_clamps_reserved_at_zero() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 3, None, "ORD-C").await.expect("reserve");
    svc.release_stock(product, 5, None, "ORD-C").await.expect("release");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.reserved_quantity, 0);
    assert_eq!(status.quantity, 10);
}

#[tokio::test]
async fn duplicate_reserve_reference_claims_once() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 4, None, "ORD-9").await.expect("reserve");
    svc.reserve_stock(product, 4, None, "ORD-9")
        .await
        .expect("retried reserve");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.reserved_quantity, 4);
}

#[tokio::test]
async fn confirm_sale_retry_does_not_double_decrement() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 3, None, "ORD-42").await.expect("reserve");
    svc.confirm_sale(product, 3, None, "ORD-42").await.expect("confirm");
    svc.confirm_sale(product, 3, None, "ORD-42")
        .await
        .expect("retried confirm");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 7);
    assert_eq!(status.reserved_quantity, 0);
}

#[tokio::test]
async fn invalid_quantities_are_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;
    let svc = &app.state.inventory;

    assert_matches!(
        svc.reserve_stock(product, 0, None, "ORD-0").await,
        Err(ServiceError::InvalidQuantity(_))
    );
    assert_matches!(
        svc.add_stock(product, -5, None, "bad", None, None).await,
        Err(ServiceError::InvalidQuantity(_))
    );
}

#[tokio::test]
async fn missing_item_not_found_but_availability_is_permissive() {
    let app = TestApp::new().await;
    let svc = &app.state.inventory;
    let unknown = Uuid::new_v4();

    assert_matches!(
        svc.get_status(unknown, None).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        svc.reserve_stock(unknown, 1, None, "ORD-X").await,
        Err(ServiceError::NotFound(_))
    );
    // Storefront display check stays permissive for unknown products.
    assert!(svc.is_in_stock(unknown, None, 1).await.expect("availability"));
}

#[tokio::test]
async fn untracked_items_bypass_the_ledger() {
    let app = TestApp::new().await;
    let svc = &app.state.inventory;
    let product = Uuid::new_v4();

    svc.create_item(product, None, "SKU-UNTRACKED".into(), 0, false, None)
        .await
        .expect("create");

    svc.reserve_stock(product, 999, None, "ORD-U").await.expect("reserve");
    svc.confirm_sale(product, 999, None, "ORD-U").await.expect("confirm");
    svc.release_stock(product, 999, None, "ORD-U").await.expect("release");

    let status = svc.get_status(product, None).await.expect("status");
    assert_eq!(status.quantity, 0);
    assert_eq!(status.reserved_quantity, 0);
    assert!(svc.is_in_stock(product, None, 10_000).await.expect("availability"));

    // Untracked operations leave no audit trail.
    let movements = svc
        .movements()
        .list_for_product(product, None, 50, 0)
        .await
        .expect("movements");
    assert!(movements.is_empty());
}

#[tokio::test]
async fn movement_log_records_every_transition_newest_first() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 5, None, "ORD-M").await.expect("reserve");
    svc.confirm_sale(product, 5, None, "ORD-M").await.expect("confirm");

    let movements = svc
        .movements()
        .list_for_product(product, None, 50, 0)
        .await
        .expect("movements");
    let kinds: Vec<MovementType> = movements.iter().map(|m| m.movement_type).collect();
    assert_eq!(
        kinds,
        vec![MovementType::Out, MovementType::Reserved, MovementType::In]
    );
    assert_eq!(movements[0].reference.as_deref(), Some("ORD-M"));
}

#[tokio::test]
async fn low_stock_alert_raised_and_resolved_on_restock() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 5).await;
    let svc = &app.state.inventory;

    svc.reserve_stock(product, 6, None, "ORD-L").await.expect("reserve");
    svc.confirm_sale(product, 6, None, "ORD-L").await.expect("confirm");

    // On-hand fell to 4, below the threshold of 5.
    let alert = svc
        .low_stock()
        .find_alert(product, None)
        .await
        .expect("query")
        .expect("alert raised");
    assert_eq!(alert.status, AlertStatus::Active);
    assert_eq!(alert.current_stock, 4);
    assert_eq!(alert.threshold, 5);

    svc.add_stock(product, 20, None, "Restock", None, None)
        .await
        .expect("restock");

    let alert = svc
        .low_stock()
        .find_alert(product, None)
        .await
        .expect("query")
        .expect("alert row kept");
    assert_eq!(alert.status, AlertStatus::Resolved);

    let active = svc.low_stock().active_alerts(50, 0).await.expect("list");
    assert!(active.iter().all(|a| a.product_id != product));
}

#[tokio::test]
async fn variants_are_independent_ledger_rows() {
    let app = TestApp::new().await;
    let svc = &app.state.inventory;
    let product = Uuid::new_v4();
    let variant_a = Uuid::new_v4();
    let variant_b = Uuid::new_v4();

    svc.create_item(product, Some(variant_a), "SKU-A".into(), 0, true, None)
        .await
        .expect("create a");
    svc.create_item(product, Some(variant_b), "SKU-B".into(), 0, true, None)
        .await
        .expect("create b");
    svc.add_stock(product, 5, Some(variant_a), "Seed", None, None)
        .await
        .expect("seed a");

    assert!(svc
        .is_in_stock(product, Some(variant_a), 5)
        .await
        .expect("availability a"));
    let status_b = svc
        .get_status(product, Some(variant_b))
        .await
        .expect("status b");
    assert_eq!(status_b.quantity, 0);
}
