use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::inventory_item::{self, Entity as InventoryItems};
use crate::entities::stock_movement::{self, Entity as StockMovements, MovementType};
use crate::errors::ServiceError;

/// Append-only audit trail of every quantity change. Records are inserted as
/// part of each ledger mutation and never touched again.
#[derive(Clone)]
pub struct StockMovementService {
    db_pool: Arc<DatabaseConnection>,
}

impl StockMovementService {
    pub fn new(db_pool: Arc<DatabaseConnection>) -> Self {
        Self { db_pool }
    }

    /// Appends one movement. Callable inside a caller-held transaction.
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        inventory_item_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
        reason: &str,
        reference: Option<&str>,
        actor: Option<&str>,
    ) -> Result<(), ServiceError> {
        let movement = stock_movement::ActiveModel {
            inventory_item_id: Set(inventory_item_id),
            movement_type: Set(movement_type),
            quantity: Set(quantity),
            reason: Set(reason.to_string()),
            reference: Set(reference.map(str::to_string)),
            actor: Set(actor.map(str::to_string)),
            ..Default::default()
        };
        movement.insert(conn).await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    /// True when a movement of this type with the same reference already
    /// exists against the item. Used to no-op duplicate applications of a
    /// retried call.
    pub async fn has_movement(
        &self,
        inventory_item_id: Uuid,
        movement_type: MovementType,
        reference: &str,
    ) -> Result<bool, ServiceError> {
        let count = StockMovements::find()
            .filter(stock_movement::Column::InventoryItemId.eq(inventory_item_id))
            .filter(stock_movement::Column::MovementType.eq(movement_type))
            .filter(stock_movement::Column::Reference.eq(reference))
            .count(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(count > 0)
    }

    /// Movement history for one inventory item, most recent first.
    #[instrument(skip(self))]
    pub async fn list_for_item(
        &self,
        inventory_item_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let movements = StockMovements::find()
            .filter(stock_movement::Column::InventoryItemId.eq(inventory_item_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(movements)
    }

    /// Movement history addressed by (product, variant), most recent first.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let mut query = InventoryItems::find()
            .filter(inventory_item::Column::ProductId.eq(product_id));
        query = match variant_id {
            Some(v) => query.filter(inventory_item::Column::VariantId.eq(v)),
            None => query.filter(inventory_item::Column::VariantId.is_null()),
        };

        let item = query
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No inventory item for product {} variant {:?}",
                    product_id, variant_id
                ))
            })?;

        self.list_for_item(item.id, limit, offset).await
    }
}
