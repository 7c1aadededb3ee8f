use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};
use rand::Rng;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::inventory_item::{self, Entity as InventoryItems};
use crate::entities::stock_movement::MovementType;
use crate::entities::stock_reservation::{
    self, Entity as StockReservations, ReservationStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::low_stock::LowStockService;
use crate::services::movements::StockMovementService;

lazy_static! {
    static ref STOCK_RESERVATIONS_TOTAL: IntCounter = register_int_counter!(
        "stockledger_reservations_total",
        "Total number of successful stock reservations"
    )
    .expect("metric can be created");
    static ref STOCK_RESERVATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "stockledger_reservation_failures_total",
        "Failed stock reservations by reason",
        &["reason"]
    )
    .expect("metric can be created");
    static ref STOCK_RELEASES_TOTAL: IntCounter = register_int_counter!(
        "stockledger_releases_total",
        "Total number of stock releases"
    )
    .expect("metric can be created");
    static ref SALES_CONFIRMED_TOTAL: IntCounter = register_int_counter!(
        "stockledger_sales_confirmed_total",
        "Total number of confirmed sales"
    )
    .expect("metric can be created");
    static ref RESERVATIONS_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        "stockledger_reservations_expired_total",
        "Reservations released by the expiry sweep"
    )
    .expect("metric can be created");
}

/// Whether quantity bookkeeping applies to an item, resolved once at the
/// service boundary instead of branching on a flag inside every operation.
pub enum StockControl {
    Tracked(inventory_item::Model),
    Untracked,
}

/// Snapshot of one ledger row for callers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryStatus {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub low_stock_threshold: i32,
    pub reorder_point: i32,
    pub reorder_quantity: i32,
    pub track_quantity: bool,
    pub location: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<inventory_item::Model> for InventoryStatus {
    fn from(model: inventory_item::Model) -> Self {
        let available_quantity = model.available_quantity();
        Self {
            id: model.id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            sku: model.sku,
            quantity: model.quantity,
            reserved_quantity: model.reserved_quantity,
            available_quantity,
            low_stock_threshold: model.low_stock_threshold,
            reorder_point: model.reorder_point,
            reorder_quantity: model.reorder_quantity,
            track_quantity: model.track_quantity,
            location: model.location,
            last_updated: model.updated_at,
        }
    }
}

/// One line of a batch restock.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RestockLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkRestockError {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub message: String,
}

///// Outcome of a batch restock: how many lines applied, and what each
/// failing line reported.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkRestockReport {
    pub processed: usize,
    pub errors: Vec<BulkRestockError>,
}

/// The single writer-facing API over the ledger. Every mutation is an atomic
/// conditional update at the storage layer; there is no in-process lock to
/// serialize replicas behind a load balancer.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    movements: StockMovementService,
    low_stock: LowStockService,
    reservation_ttl: Duration,
    conflict_retries: u32,
}

impl InventoryService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        reservation_ttl_minutes: i64,
        conflict_retries: u32,
    ) -> Self {
        let movements = StockMovementService::new(db_pool.clone());
        let low_stock = LowStockService::new(db_pool.clone(), event_sender.clone());
        Self {
            db_pool,
            event_sender,
            movements,
            low_stock,
            reservation_ttl: Duration::minutes(reservation_ttl_minutes),
            conflict_retries,
        }
    }

    pub fn movements(&self) -> &StockMovementService {
        &self.movements
    }

    pub fn low_stock(&self) -> &LowStockService {
        &self.low_stock
    }

    /// Provisions the ledger row for a catalog product/variant. Stands in
    /// for the catalog collaborator boundary; new rows start at quantity 0.
    #[instrument(skip(self))]
    pub async fn create_item(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        sku: String,
        low_stock_threshold: i32,
        track_quantity: bool,
        location: Option<String>,
    ) -> Result<InventoryStatus, ServiceError> {
        if self.find_item(product_id, variant_id).await?.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Inventory already provisioned for product {} variant {:?}",
                product_id, variant_id
            )));
        }

        let item = inventory_item::ActiveModel {
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            sku: Set(sku),
            quantity: Set(0),
            reserved_quantity: Set(0),
            low_stock_threshold: Set(low_stock_threshold),
            reorder_point: Set(0),
            reorder_quantity: Set(0),
            track_quantity: Set(track_quantity),
            location: Set(location),
            ..Default::default()
        };
        let model = item
            .insert(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(model.into())
    }

    /// Authoritative status read.
    #[instrument(skip(self))]
    pub async fn get_status(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<InventoryStatus, ServiceError> {
        let item = self.require_item(product_id, variant_id).await?;
        Ok(item.into())
    }

    /// Advisory availability check for UI hints; a plain read that takes no
    /// lock and must not be used to gate a reservation. Missing or untracked
    /// items count as in stock, matching the storefront's display behavior.
    #[instrument(skip(self))]
    pub async fn is_in_stock(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        match self.find_item(product_id, variant_id).await? {
            None => Ok(true),
            Some(item) if !item.track_quantity => Ok(true),
            Some(item) => Ok(item.available_quantity() >= quantity),
        }
    }

    /// Restock: increments on-hand quantity and appends an `IN` movement.
    /// Never touches `reserved_quantity`.
    #[instrument(skip(self))]
    pub async fn add_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        variant_id: Option<Uuid>,
        reason: &str,
        reference: Option<&str>,
        actor: Option<&str>,
    ) -> Result<InventoryStatus, ServiceError> {
        ensure_positive(quantity)?;
        let item = self.require_item(product_id, variant_id).await?;

        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        InventoryItems::update_many()
            .col_expr(
                inventory_item::Column::Quantity,
                Expr::col(inventory_item::Column::Quantity).add(quantity),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(item.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        self.movements
            .record(
                &txn,
                item.id,
                MovementType::In,
                quantity,
                reason,
                reference,
                actor,
            )
            .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        let updated = self.require_item_by_id(item.id).await?;
        // Replenishment may clear a previously raised alert.
        self.low_stock.evaluate(&updated).await?;

        let _ = self
            .event_sender
            .send(Event::StockAdded {
                product_id,
                variant_id,
                quantity,
                reference: reference.map(str::to_string),
            })
            .await;

        info!(
            product_id = %product_id,
            quantity = %quantity,
            new_on_hand = %updated.quantity,
            "stock added"
        );
        Ok(updated.into())
    }

    /// Batch restock, e.g. receiving a delivery manifest. Lines apply
    /// independently: a line that fails (unknown product, bad quantity) is
    /// collected into the report and the rest of the batch continues.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn bulk_add_stock(
        &self,
        lines: &[RestockLine],
        reason: &str,
        actor: Option<&str>,
    ) -> Result<BulkRestockReport, ServiceError> {
        let mut report = BulkRestockReport {
            processed: 0,
            errors: Vec::new(),
        };
        for line in lines {
            match self
                .add_stock(
                    line.product_id,
                    line.quantity,
                    line.variant_id,
                    reason,
                    None,
                    actor,
                )
                .await
            {
                Ok(_) => report.processed += 1,
                Err(err) => {
                    warn!(
                        product_id = %line.product_id,
                        error = %err,
                        "bulk restock line failed"
                    );
                    report.errors.push(BulkRestockError {
                        product_id: line.product_id,
                        variant_id: line.variant_id,
                        message: err.to_string(),
                    });
                }
            }
        }
        info!(
            processed = report.processed,
            failed = report.errors.len(),
            "bulk restock complete"
        );
        Ok(report)
    }

    /// Claims `quantity` units for `reference`. The precondition
    /// `available >= quantity` and the increment commit in a single storage
    /// statement, so concurrent reservers can never oversell.
    #[instrument(skip(self))]
    pub async fn reserve_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        variant_id: Option<Uuid>,
        reference: &str,
    ) -> Result<(), ServiceError> {
        ensure_positive(quantity).map_err(|e| {
            STOCK_RESERVATION_FAILURES
                .with_label_values(&["invalid_quantity"])
                .inc();
            e
        })?;

        let item = match self.resolve(product_id, variant_id).await? {
            StockControl::Untracked => {
                debug!(product_id = %product_id, "untracked item, reservation is a no-op");
                return Ok(());
            }
            StockControl::Tracked(item) => item,
        };

        // A retried call with the same reference must not claim twice.
        if let Some(existing) = self.find_reservation(item.id, reference).await? {
            if existing.status == ReservationStatus::Active {
                debug!(
                    reference = %reference,
                    "duplicate reservation reference, no-op"
                );
                return Ok(());
            }
        }

        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        let result = InventoryItems::update_many()
            .col_expr(
                inventory_item::Column::ReservedQuantity,
                Expr::col(inventory_item::Column::ReservedQuantity).add(quantity),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(item.id))
            .filter(
                Expr::col(inventory_item::Column::ReservedQuantity)
                    .lte(Expr::col(inventory_item::Column::Quantity).sub(quantity)),
            )
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            drop(txn);
            // Lost to concurrent claims or genuinely short; report what is
            // left so the caller can render "only N left".
            let current = self.require_item_by_id(item.id).await?;
            STOCK_RESERVATION_FAILURES
                .with_label_values(&["insufficient_stock"])
                .inc();
            debug!(
                product_id = %product_id,
                requested = %quantity,
                available = %current.available_quantity(),
                "insufficient stock for reservation"
            );
            return Err(ServiceError::InsufficientStock {
                available: current.available_quantity(),
            });
        }

        let reservation = stock_reservation::ActiveModel {
            inventory_item_id: Set(item.id),
            reference: Set(reference.to_string()),
            quantity: Set(quantity),
            status: Set(ReservationStatus::Active),
            expires_at: Set(Utc::now() + self.reservation_ttl),
            ..Default::default()
        };
        reservation
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        self.movements
            .record(
                &txn,
                item.id,
                MovementType::Reserved,
                quantity,
                &format!("Stock reservation - {}", reference),
                Some(reference),
                None,
            )
            .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        STOCK_RESERVATIONS_TOTAL.inc();
        let _ = self
            .event_sender
            .send(Event::StockReserved {
                product_id,
                variant_id,
                quantity,
                reference: reference.to_string(),
            })
            .await;

        info!(
            product_id = %product_id,
            quantity = %quantity,
            reference = %reference,
            "stock reserved"
        );
        Ok(())
    }

    /// Returns reserved units to the available pool. Clamped at zero and
    /// safe to retry: a reference whose reservation was already released (or
    /// converted) is a no-op.
    #[instrument(skip(self))]
    pub async fn release_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        variant_id: Option<Uuid>,
        reference: &str,
    ) -> Result<(), ServiceError> {
        ensure_positive(quantity)?;

        let item = match self.resolve(product_id, variant_id).await? {
            StockControl::Untracked => return Ok(()),
            StockControl::Tracked(item) => item,
        };

        if let Some(existing) = self.find_reservation(item.id, reference).await? {
            if existing.status != ReservationStatus::Active {
                debug!(
                    reference = %reference,
                    status = ?existing.status,
                    "reservation already settled, release is a no-op"
                );
                return Ok(());
            }
        }

        self.apply_release(
            item.id,
            quantity,
            reference,
            &format!("Stock release - {}", reference),
            ReservationStatus::Released,
        )
        .await?;

        STOCK_RELEASES_TOTAL.inc();
        let _ = self
            .event_sender
            .send(Event::StockReleased {
                product_id,
                variant_id,
                quantity,
                reference: reference.to_string(),
            })
            .await;

        info!(
            product_id = %product_id,
            quantity = %quantity,
            reference = %reference,
            "stock released"
        );
        Ok(())
    }

    /// Converts a reservation into a sale: decrements both on-hand and
    /// reserved counters (clamped at zero), appends an `OUT` movement, and
    /// re-evaluates the low-stock state. Idempotent per reference.
    #[instrument(skip(self))]
    pub async fn confirm_sale(
        &self,
        product_id: Uuid,
        quantity: i32,
        variant_id: Option<Uuid>,
        reference: &str,
    ) -> Result<(), ServiceError> {
        ensure_positive(quantity)?;

        let item = match self.resolve(product_id, variant_id).await? {
            StockControl::Untracked => return Ok(()),
            StockControl::Tracked(item) => item,
        };

        // At-least-once callers: the movement log is the dedup record.
        if self
            .movements
            .has_movement(item.id, MovementType::Out, reference)
            .await?
        {
            debug!(reference = %reference, "sale already confirmed, no-op");
            return Ok(());
        }

        // Both counters clamp at zero, so the new values depend on the old
        // ones; optimistic compare-and-swap with bounded retries.
        let mut attempt = 0u32;
        let updated = loop {
            let current = self.require_item_by_id(item.id).await?;
            let (new_quantity, new_reserved) =
                clamped_sale(current.quantity, current.reserved_quantity, quantity);

            let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
            let result = InventoryItems::update_many()
                .col_expr(inventory_item::Column::Quantity, Expr::value(new_quantity))
                .col_expr(
                    inventory_item::Column::ReservedQuantity,
                    Expr::value(new_reserved),
                )
                .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_item::Column::Id.eq(item.id))
                .filter(inventory_item::Column::Quantity.eq(current.quantity))
                .filter(
                    inventory_item::Column::ReservedQuantity.eq(current.reserved_quantity),
                )
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            if result.rows_affected == 1 {
                self.movements
                    .record(
                        &txn,
                        item.id,
                        MovementType::Out,
                        quantity,
                        &format!("Sale confirmed - {}", reference),
                        Some(reference),
                        None,
                    )
                    .await?;
                txn.commit().await.map_err(ServiceError::db_error)?;
                break (new_quantity, new_reserved);
            }

            drop(txn);
            attempt += 1;
            if attempt >= self.conflict_retries {
                return Err(ServiceError::ConcurrencyConflict(format!(
                    "confirm_sale for product {} lost {} update races",
                    product_id, attempt
                )));
            }
            backoff(attempt).await;
        };

        self.settle_reservation(item.id, reference, ReservationStatus::Converted)
            .await?;

        let fresh = self.require_item_by_id(item.id).await?;
        self.low_stock.evaluate(&fresh).await?;

        SALES_CONFIRMED_TOTAL.inc();
        let _ = self
            .event_sender
            .send(Event::SaleConfirmed {
                product_id,
                variant_id,
                quantity,
                reference: reference.to_string(),
            })
            .await;

        info!(
            product_id = %product_id,
            quantity = %quantity,
            reference = %reference,
            on_hand = %updated.0,
            reserved = %updated.1,
            "sale confirmed"
        );
        Ok(())
    }

    /// Sweeper entry point: releases the units held by an expired Active
    /// reservation and marks it Expired.
    #[instrument(skip(self, reservation), fields(reservation_id = %reservation.id))]
    pub async fn expire_reservation(
        &self,
        reservation: &stock_reservation::Model,
    ) -> Result<(), ServiceError> {
        if reservation.status != ReservationStatus::Active {
            return Ok(());
        }

        self.apply_release(
            reservation.inventory_item_id,
            reservation.quantity,
            &reservation.reference,
            "Reservation expired",
            ReservationStatus::Expired,
        )
        .await?;

        RESERVATIONS_EXPIRED_TOTAL.inc();
        let _ = self
            .event_sender
            .send(Event::ReservationExpired {
                inventory_item_id: reservation.inventory_item_id,
                quantity: reservation.quantity,
                reference: reservation.reference.clone(),
            })
            .await;

        warn!(
            reference = %reservation.reference,
            quantity = %reservation.quantity,
            "expired reservation released"
        );
        Ok(())
    }

    /// Clamped atomic decrement of `reserved_quantity` plus the audit
    /// movement and reservation settlement, in one transaction. The clamp is
    /// a single CASE expression so the compare and the decrement commit in
    /// one statement; concurrent reserves cannot slip between a guard and
    /// its floor.
    async fn apply_release(
        &self,
        item_id: Uuid,
        quantity: i32,
        reference: &str,
        reason: &str,
        settle_as: ReservationStatus,
    ) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        let clamped_decrement: SimpleExpr = Expr::case(
            Expr::col(inventory_item::Column::ReservedQuantity).gte(quantity),
            Expr::col(inventory_item::Column::ReservedQuantity).sub(quantity),
        )
        .finally(Expr::value(0))
        .into();
        InventoryItems::update_many()
            .col_expr(inventory_item::Column::ReservedQuantity, clamped_decrement)
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(item_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        self.movements
            .record(
                &txn,
                item_id,
                MovementType::Released,
                quantity,
                reason,
                Some(reference),
                None,
            )
            .await?;

        StockReservations::update_many()
            .col_expr(
                stock_reservation::Column::Status,
                Expr::value(settle_as),
            )
            .col_expr(
                stock_reservation::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(stock_reservation::Column::InventoryItemId.eq(item_id))
            .filter(stock_reservation::Column::Reference.eq(reference))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)
    }

    async fn settle_reservation(
        &self,
        item_id: Uuid,
        reference: &str,
        status: ReservationStatus,
    ) -> Result<(), ServiceError> {
        StockReservations::update_many()
            .col_expr(stock_reservation::Column::Status, Expr::value(status))
            .col_expr(
                stock_reservation::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(stock_reservation::Column::InventoryItemId.eq(item_id))
            .filter(stock_reservation::Column::Reference.eq(reference))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    /// Resolves the tracked/untracked split once at the boundary.
    async fn resolve(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<StockControl, ServiceError> {
        let item = self.require_item(product_id, variant_id).await?;
        if item.track_quantity {
            Ok(StockControl::Tracked(item))
        } else {
            Ok(StockControl::Untracked)
        }
    }

    async fn find_item(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        let mut query =
            InventoryItems::find().filter(inventory_item::Column::ProductId.eq(product_id));
        query = match variant_id {
            Some(v) => query.filter(inventory_item::Column::VariantId.eq(v)),
            None => query.filter(inventory_item::Column::VariantId.is_null()),
        };
        query.one(&*self.db_pool).await.map_err(ServiceError::db_error)
    }

    async fn require_item(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<inventory_item::Model, ServiceError> {
        self.find_item(product_id, variant_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "No inventory item for product {} variant {:?}",
                product_id, variant_id
            ))
        })
    }

    async fn require_item_by_id(&self, id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        InventoryItems::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))
    }

    async fn find_reservation(
        &self,
        item_id: Uuid,
        reference: &str,
    ) -> Result<Option<stock_reservation::Model>, ServiceError> {
        StockReservations::find()
            .filter(stock_reservation::Column::InventoryItemId.eq(item_id))
            .filter(stock_reservation::Column::Reference.eq(reference))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

fn ensure_positive(quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

/// New (on-hand, reserved) pair after selling `sold` units, both floored at
/// zero.
fn clamped_sale(quantity: i32, reserved: i32, sold: i32) -> (i32, i32) {
    ((quantity - sold).max(0), (reserved - sold).max(0))
}

async fn backoff(attempt: u32) {
    let jitter = rand::thread_rng().gen_range(0..10);
    let millis = 10u64 * attempt as u64 + jitter;
    tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
}
