use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::entities::stock_reservation::{self, Entity as StockReservations, ReservationStatus};
use crate::errors::ServiceError;
use crate::services::inventory::InventoryService;

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub expired: u64,
    pub failed: u64,
}

/// Periodically returns stock held by reservations whose deadline passed.
/// All heavy lifting goes through the inventory service so each expiry gets
/// the same clamped release, audit record, and event as a manual release.
#[derive(Clone)]
pub struct ReservationSweeper {
    db_pool: Arc<DatabaseConnection>,
    inventory: InventoryService,
    interval: Duration,
}

impl ReservationSweeper {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        inventory: InventoryService,
        interval_secs: u64,
    ) -> Self {
        Self {
            db_pool,
            inventory,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(report) if report.expired > 0 || report.failed > 0 => {
                    info!(
                        expired = report.expired,
                        failed = report.failed,
                        "reservation sweep complete"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "reservation sweep failed"),
            }
        }
    }

    /// One pass over overdue Active reservations, expiring each in turn.
    /// A failure on one reservation does not stop the rest of the batch.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, ServiceError> {
        let overdue = StockReservations::find()
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active))
            .filter(stock_reservation::Column::ExpiresAt.lt(Utc::now()))
            .order_by_asc(stock_reservation::Column::ExpiresAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let mut report = SweepReport::default();
        for reservation in overdue {
            match self.inventory.expire_reservation(&reservation).await {
                Ok(()) => report.expired += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(
                        reservation_id = %reservation.id,
                        reference = %reservation.reference,
                        error = %err,
                        "failed to expire reservation"
                    );
                }
            }
        }

        Ok(report)
    }
}
