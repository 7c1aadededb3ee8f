use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the services after a committed mutation. Downstream of
/// every write; consumers must tolerate at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderCreated(Uuid),
    OrderPaymentConfirmed(Uuid),
    OrderCancelled(Uuid),
    OrderShipped(Uuid),

    // Ledger mutations
    StockAdded {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        reference: Option<String>,
    },
    StockReserved {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        reference: String,
    },
    StockReleased {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        reference: String,
    },
    SaleConfirmed {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        reference: String,
    },
    ReservationExpired {
        inventory_item_id: Uuid,
        quantity: i32,
        reference: String,
    },

    // Monitoring
    LowStockAlertRaised {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        current_stock: i32,
        threshold: i32,
    },
    LowStockAlertResolved {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        current_stock: i32,
    },

    /// A compensating release could not be applied after bounded retries;
    /// ops must reconcile the reservation by hand.
    CompensationFailed {
        order_number: String,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. The channel keeps mutation
/// paths decoupled from whatever downstream consumers are attached.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::CompensationFailed {
                order_number,
                product_id,
                quantity,
                ..
            } => {
                error!(
                    order_number = %order_number,
                    product_id = %product_id,
                    quantity = %quantity,
                    "compensating release failed after retries; manual reconciliation required"
                );
            }
            Event::LowStockAlertRaised {
                product_id,
                current_stock,
                threshold,
                ..
            } => {
                warn!(
                    product_id = %product_id,
                    current_stock = %current_stock,
                    threshold = %threshold,
                    "low stock alert raised"
                );
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
    info!("Event channel closed, stopping event processor");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::OrderCreated(Uuid::nil()))
            .await
            .unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, Uuid::nil()),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
