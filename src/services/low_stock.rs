use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::inventory_item;
use crate::entities::low_stock_alert::{self, AlertStatus, Entity as LowStockAlerts};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Watches the ledger after depleting and replenishing mutations and keeps
/// one alert row per (product, variant) in the right state.
#[derive(Clone)]
pub struct LowStockService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl LowStockService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Re-evaluates the alert state from a freshly read ledger row: at or
    /// below threshold raises (or refreshes) an Active alert, above threshold
    /// resolves a previously raised one.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn evaluate(&self, item: &inventory_item::Model) -> Result<(), ServiceError> {
        if !item.track_quantity {
            return Ok(());
        }

        let existing = self.find_alert(item.product_id, item.variant_id).await?;

        if item.quantity <= item.low_stock_threshold {
            match existing {
                Some(alert) => {
                    let mut active: low_stock_alert::ActiveModel = alert.into();
                    active.current_stock = Set(item.quantity);
                    active.threshold = Set(item.low_stock_threshold);
                    active.status = Set(AlertStatus::Active);
                    active
                        .update(&*self.db_pool)
                        .await
                        .map_err(ServiceError::db_error)?;
                }
                None => {
                    let alert = low_stock_alert::ActiveModel {
                        product_id: Set(item.product_id),
                        variant_id: Set(item.variant_id),
                        current_stock: Set(item.quantity),
                        threshold: Set(item.low_stock_threshold),
                        status: Set(AlertStatus::Active),
                        ..Default::default()
                    };
                    alert
                        .insert(&*self.db_pool)
                        .await
                        .map_err(ServiceError::db_error)?;
                }
            }

            let _ = self
                .event_sender
                .send(Event::LowStockAlertRaised {
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    current_stock: item.quantity,
                    threshold: item.low_stock_threshold,
                })
                .await;
        } else if let Some(alert) = existing {
            if alert.status == AlertStatus::Active {
                let mut active: low_stock_alert::ActiveModel = alert.into();
                active.current_stock = Set(item.quantity);
                active.status = Set(AlertStatus::Resolved);
                active
                    .update(&*self.db_pool)
                    .await
                    .map_err(ServiceError::db_error)?;

                info!(
                    product_id = %item.product_id,
                    current_stock = %item.quantity,
                    "low stock alert resolved"
                );
                let _ = self
                    .event_sender
                    .send(Event::LowStockAlertResolved {
                        product_id: item.product_id,
                        variant_id: item.variant_id,
                        current_stock: item.quantity,
                    })
                    .await;
            }
        }

        Ok(())
    }

    /// The alert row for a (product, variant), regardless of status.
    pub async fn find_alert(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<low_stock_alert::Model>, ServiceError> {
        let mut query =
            LowStockAlerts::find().filter(low_stock_alert::Column::ProductId.eq(product_id));
        query = match variant_id {
            Some(v) => query.filter(low_stock_alert::Column::VariantId.eq(v)),
            None => query.filter(low_stock_alert::Column::VariantId.is_null()),
        };
        query.one(&*self.db_pool).await.map_err(ServiceError::db_error)
    }

    /// Active alerts for the ops dashboard, most recent first.
    #[instrument(skip(self))]
    pub async fn active_alerts(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<low_stock_alert::Model>, ServiceError> {
        LowStockAlerts::find()
            .filter(low_stock_alert::Column::Status.eq(AlertStatus::Active))
            .order_by_desc(low_stock_alert::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
