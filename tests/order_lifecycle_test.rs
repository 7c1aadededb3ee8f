mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockledger_api::entities::order::OrderStatus;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::orders::{CreateOrderRequest, OrderLineRequest};
use stockledger_api::services::reservation_sweeper::ReservationSweeper;
use uuid::Uuid;

fn order_request(order_number: &str, lines: Vec<(Uuid, i32)>) -> CreateOrderRequest {
    CreateOrderRequest {
        order_number: order_number.to_string(),
        items: lines
            .into_iter()
            .map(|(product_id, quantity)| OrderLineRequest {
                product_id,
                variant_id: None,
                quantity,
            })
            .collect(),
    }
}

#[tokio::test]
async fn full_lifecycle_reserves_then_sells() {
    let app = TestApp::new().await;
    let product = app.seed_item(50, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-100", vec![(product, 5)]))
        .await
        .expect("create");
    assert_eq!(order.status, OrderStatus::Pending);

    let status = app
        .state
        .inventory
        .get_status(product, None)
        .await
        .expect("status");
    assert_eq!(status.reserved_quantity, 5);

    let order = app
        .state
        .orders
        .confirm_payment(order.id)
        .await
        .expect("confirm payment");
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());

    let status = app
        .state
        .inventory
        .get_status(product, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 45);
    assert_eq!(status.reserved_quantity, 0);

    let order = app
        .state
        .orders
        .mark_shipped(order.id)
        .await
        .expect("ship");
    assert_eq!(order.status, OrderStatus::Shipped);
    assert!(order.shipped_at.is_some());
}

#[tokio::test]
async fn failed_line_rolls_back_earlier_reservations() {
    let app = TestApp::new().await;
    let plentiful = app.seed_item(100, 0).await;
    let scarce = app.seed_item(2, 0).await;

    let err = app
        .state
        .orders
        .create_order(order_request("SO-200", vec![(plentiful, 10), (scarce, 5)]))
        .await
        .expect_err("second line is short");
    assert_matches!(err, ServiceError::InsufficientStock { available: 2 });

    // The first line's reservation must have been released.
    let status = app
        .state
        .inventory
        .get_status(plentiful, None)
        .await
        .expect("status");
    assert_eq!(status.reserved_quantity, 0);
    assert_eq!(status.available_quantity, 100);
}

#[tokio::test]
async fn double_payment_confirmation_decrements_once() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-300", vec![(product, 4)]))
        .await
        .expect("create");

    app.state
        .orders
        .confirm_payment(order.id)
        .await
        .expect("first confirm");
    let again = app
        .state
        .orders
        .confirm_payment(order.id)
        .await
        .expect("second confirm is a no-op");
    assert_eq!(again.status, OrderStatus::Paid);

    let status = app
        .state
        .inventory
        .get_status(product, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 16);
    assert_eq!(status.reserved_quantity, 0);
}

// A payment confirmation that fails after the order flipped to Paid must be
// repairable: the retry re-runs the per-line confirmations instead of
// short-circuiting on the order status, so no sold line is left unrecorded
// for the sweeper to "release" later.
#[tokio::test]
async fn payment_retry_repairs_partially_confirmed_order() {
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    use stockledger_api::entities::inventory_item;

    let app = TestApp::new().await;
    let first = app.seed_item(50, 0).await;
    let second = app.seed_item(50, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-450", vec![(first, 5), (second, 5)]))
        .await
        .expect("create");

    // Remove the second line's ledger row so its confirmation fails after
    // the first line's sale has already been recorded.
    inventory_item::Entity::delete_many()
        .filter(inventory_item::Column::ProductId.eq(second))
        .exec(&*app.state.db)
        .await
        .expect("remove row");

    let err = app
        .state
        .orders
        .confirm_payment(order.id)
        .await
        .expect_err("second line has no ledger row");
    assert_matches!(err, ServiceError::NotFound(_));

    // The order was claimed before the failure.
    let stuck = app.state.orders.get_order(order.id).await.expect("read");
    assert_eq!(stuck.status, OrderStatus::Paid);
    let status = app
        .state
        .inventory
        .get_status(first, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 45);

    // Restore the row and retry; the repaired line must record its sale.
    app.state
        .inventory
        .create_item(second, None, "SKU-RESTORED".into(), 0, true, None)
        .await
        .expect("recreate");
    app.state
        .inventory
        .add_stock(second, 50, None, "Seed", None, None)
        .await
        .expect("reseed");

    let repaired = app
        .state
        .orders
        .confirm_payment(order.id)
        .await
        .expect("retry");
    assert_eq!(repaired.status, OrderStatus::Paid);

    let status = app
        .state
        .inventory
        .get_status(second, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 45, "sold units must leave on-hand stock on retry");

    // The already-confirmed line is not decremented twice.
    let status = app
        .state
        .inventory
        .get_status(first, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 45);
}

#[tokio::test]
async fn cancellation_releases_reserved_stock() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-400", vec![(product, 6)]))
        .await
        .expect("create");

    let cancelled = app
        .state
        .orders
        .cancel_order(order.id, Some("customer changed mind".into()))
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("customer changed mind")
    );

    let status = app
        .state
        .inventory
        .get_status(product, None)
        .await
        .expect("status");
    assert_eq!(status.quantity, 20);
    assert_eq!(status.reserved_quantity, 0);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-500", vec![(product, 1)]))
        .await
        .expect("create");
    app.state
        .orders
        .confirm_payment(order.id)
        .await
        .expect("confirm");
    app.state.orders.mark_shipped(order.id).await.expect("ship");

    assert_matches!(
        app.state.orders.cancel_order(order.id, None).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn pending_order_cannot_ship() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;

    let order = app
        .state
        .orders
        .create_order(order_request("SO-600", vec![(product, 1)]))
        .await
        .expect("create");

    assert_matches!(
        app.state.orders.mark_shipped(order.id).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn duplicate_order_number_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_item(20, 0).await;

    app.state
        .orders
        .create_order(order_request("SO-700", vec![(product, 1)]))
        .await
        .expect("create");
    assert_matches!(
        app.state
            .orders
            .create_order(order_request("SO-700", vec![(product, 1)]))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

// The sweeper releases stock held past the reservation deadline.
#[tokio::test]
async fn sweeper_expires_overdue_reservations() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 0).await;

    // A service with a TTL in the past makes every reservation instantly
    // overdue without waiting out a real deadline.
    let expiring = stockledger_api::services::inventory::InventoryService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        -1,
        app.state.config.conflict_retries,
    );
    expiring
        .reserve_stock(product, 4, None, "SO-800")
        .await
        .expect("reserve");

    let sweeper = ReservationSweeper::new(app.state.db.clone(), expiring, 60);
    let report = sweeper.sweep_once().await.expect("sweep");
    assert_eq!(report.expired, 1);
    assert_eq!(report.failed, 0);

    let status = app
        .state
        .inventory
        .get_status(product, None)
        .await
        .expect("status");
    assert_eq!(status.reserved_quantity, 0);
    assert_eq!(status.quantity, 10);

    // A second sweep finds nothing left to expire.
    let report = sweeper.sweep_once().await.expect("second sweep");
    assert_eq!(report.expired, 0);
}
