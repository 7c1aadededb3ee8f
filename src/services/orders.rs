use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{self, Entity as Orders, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItems};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::inventory::InventoryService;

const COMPENSATION_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order number is required"))]
    pub order_number: String,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLineRequest>,
    pub cancellation_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Bridges order-level lifecycle transitions onto the reservation manager:
/// creation reserves every line or nothing, payment converts reservations to
/// sales exactly once, cancellation releases whatever is still held.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DatabaseConnection>,
    inventory: InventoryService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            inventory,
            event_sender,
        }
    }

    /// Creates the order and reserves stock for every line item. If any line
    /// cannot be reserved, every reservation already taken in this attempt
    /// is released before the first failure is returned; the order row is
    /// left Cancelled so the number cannot be silently reused with stale
    /// reservations.
    #[instrument(skip(self, req), fields(order_number = %req.order_number))]
    pub async fn create_order(
        &self,
        req: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid order: {}", e)))?;
        for line in &req.items {
            if line.quantity <= 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "line quantity must be positive, got {}",
                    line.quantity
                )));
            }
        }

        if self.find_by_number(&req.order_number).await?.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Order {} already exists",
                req.order_number
            )));
        }

        // Order and lines commit first; reservations follow, line by line.
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        let order_model = order::ActiveModel {
            order_number: Set(req.order_number.clone()),
            status: Set(OrderStatus::Pending),
            ..Default::default()
        };
        let created = order_model
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        for line in &req.items {
            let item = order_item::ActiveModel {
                order_id: Set(created.id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                quantity: Set(line.quantity),
                ..Default::default()
            };
            item.insert(&txn).await.map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        let mut reserved: Vec<&OrderLineRequest> = Vec::with_capacity(req.items.len());
        for line in &req.items {
            match self
                .inventory
                .reserve_stock(
                    line.product_id,
                    line.quantity,
                    line.variant_id,
                    &req.order_number,
                )
                .await
            {
                Ok(()) => reserved.push(line),
                Err(err) => {
                    if matches!(err, ServiceError::NotFound(_)) {
                        // Bookkeeping gap, not a reason to crash the flow;
                        // surfaced to ops and the order fails cleanly.
                        warn!(
                            order_number = %req.order_number,
                            product_id = %line.product_id,
                            "no inventory item for order line"
                        );
                    }
                    self.compensate(&req.order_number, &reserved).await;
                    self.transition(created.id, OrderStatus::Cancelled, |am| {
                        am.cancellation_reason =
                            Set(Some("reservation failed at creation".to_string()));
                    })
                    .await?;
                    return Err(err);
                }
            }
        }

        let _ = self.event_sender.send(Event::OrderCreated(created.id)).await;
        info!(order_id = %created.id, lines = %req.items.len(), "order created, stock reserved");

        self.get_order(created.id).await
    }

    /// Idempotent per order id: the Pending -> Paid transition is a
    /// conditional update on the current status, and a second confirmation
    /// observes Paid and returns without touching the ledger.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;

        let claimed = Orders::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(order::Column::PaidAt, Expr::value(Some(Utc::now())))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            let current = self.require_order(order_id).await?;
            return match current.status {
                // Claimed by an earlier (or concurrent) call. That call may
                // have failed partway through the line confirmations, so run
                // the loop again before answering: confirm_sale is
                // idempotent per reference, and a retry must leave every
                // line's sale recorded rather than short-circuit on the
                // order status alone.
                OrderStatus::Paid | OrderStatus::Shipped => {
                    self.confirm_lines(&order).await?;
                    self.get_order(order_id).await
                }
                status => Err(ServiceError::ValidationError(format!(
                    "Order {} cannot be paid from status {}",
                    order.order_number, status
                ))),
            };
        }

        self.confirm_lines(&order).await?;

        let _ = self
            .event_sender
            .send(Event::OrderPaymentConfirmed(order_id))
            .await;
        info!(order_id = %order_id, "payment confirmed, sales recorded");

        self.get_order(order_id).await
    }

    /// Cancels an order that has not shipped and releases every line still
    /// reserved under its number.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;

        match order.status {
            OrderStatus::Shipped => {
                return Err(ServiceError::ValidationError(
                    "Cannot cancel an order that has already shipped".to_string(),
                ))
            }
            OrderStatus::Cancelled => return self.get_order(order_id).await,
            OrderStatus::Pending | OrderStatus::Paid => {}
        }

        let claimed = Orders::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
            .col_expr(
                order::Column::CancellationReason,
                Expr::value(reason.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(order.status))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 1 {
            for line in self.lines(order_id).await? {
                self.inventory
                    .release_stock(
                        line.product_id,
                        line.quantity,
                        line.variant_id,
                        &order.order_number,
                    )
                    .await?;
            }
            let _ = self.event_sender.send(Event::OrderCancelled(order_id)).await;
            info!(order_id = %order_id, "order cancelled, reservations released");
        }

        self.get_order(order_id).await
    }

    /// Paid -> Shipped; terminal for stock purposes.
    #[instrument(skip(self))]
    pub async fn mark_shipped(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        if order.status != OrderStatus::Paid {
            return Err(ServiceError::ValidationError(format!(
                "Order {} cannot ship from status {}",
                order.order_number, order.status
            )));
        }

        self.transition(order_id, OrderStatus::Shipped, |am| {
            am.shipped_at = Set(Some(Utc::now()));
        })
        .await?;

        let _ = self.event_sender.send(Event::OrderShipped(order_id)).await;
        self.get_order(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        let items = self
            .lines(order_id)
            .await?
            .into_iter()
            .map(|line| OrderLineRequest {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
            })
            .collect();

        Ok(OrderResponse {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            items,
            cancellation_reason: order.cancellation_reason,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            created_at: order.created_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let paginator = Orders::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let models = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let mut orders = Vec::with_capacity(models.len());
        for model in models {
            orders.push(self.get_order(model.id).await?);
        }

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page: limit,
        })
    }

    /// Records the sale for every line of the order. Each line is a no-op
    /// once its `OUT` movement exists, so the loop can be re-run to finish
    /// an attempt that failed partway through.
    async fn confirm_lines(&self, order: &order::Model) -> Result<(), ServiceError> {
        for line in self.lines(order.id).await? {
            self.inventory
                .confirm_sale(
                    line.product_id,
                    line.quantity,
                    line.variant_id,
                    &order.order_number,
                )
                .await?;
        }
        Ok(())
    }

    /// Releases every already-reserved line of a failed creation attempt.
    /// Each line is retried a bounded number of times; a line that still
    /// cannot be released is escalated to ops rather than left holding
    /// stock silently.
    async fn compensate(&self, order_number: &str, reserved: &[&OrderLineRequest]) {
        for line in reserved {
            let mut attempt = 0u32;
            loop {
                match self
                    .inventory
                    .release_stock(
                        line.product_id,
                        line.quantity,
                        line.variant_id,
                        order_number,
                    )
                    .await
                {
                    Ok(()) => break,
                    Err(err) => {
                        attempt += 1;
                        if attempt >= COMPENSATION_RETRIES {
                            error!(
                                order_number = %order_number,
                                product_id = %line.product_id,
                                error = %err,
                                "compensating release failed after retries"
                            );
                            let _ = self
                                .event_sender
                                .send(Event::CompensationFailed {
                                    order_number: order_number.to_string(),
                                    product_id: line.product_id,
                                    variant_id: line.variant_id,
                                    quantity: line.quantity,
                                })
                                .await;
                            break;
                        }
                        warn!(
                            order_number = %order_number,
                            product_id = %line.product_id,
                            attempt = %attempt,
                            "retrying compensating release"
                        );
                    }
                }
            }
        }
    }

    async fn transition<F>(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        mutate: F,
    ) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut order::ActiveModel),
    {
        let order = self.require_order(order_id).await?;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        mutate(&mut active);
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn lines(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        OrderItems::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn require_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Orders::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<order::Model>, ServiceError> {
        Orders::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
