use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted after successful commits. Delivery is best-effort
/// and never affects the outcome of the transaction that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SaleCreated {
        sale_id: i64,
        franchise_id: i64,
    },
    TransportCreated {
        transport_id: i64,
        sale_id: i64,
    },
    TransportDispatched {
        transport_id: i64,
        dispatched_at: DateTime<Utc>,
    },
    TransportDelivered {
        transport_id: i64,
        sale_id: i64,
        franchise_id: i64,
        delivered_at: DateTime<Utc>,
    },
    StockPosted {
        transaction_id: i64,
        transport_id: i64,
        line_count: usize,
    },
    AdminStockRefilled {
        medicine_count: usize,
        total_quantity: i64,
    },
    StockRecalled {
        recall_id: i64,
        franchise_id: i64,
        medicine_id: i64,
        quantity: i32,
    },
    BalancesRebuilt {
        balance_rows: u64,
        batch_rows: u64,
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

    /// Fire-and-forget send used on commit paths. A full or closed channel
    /// only logs; the originating transaction has already committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, event = ?event, "dropping domain event");
        }
    }
}

/// Event processing loop. Currently logs events for audit visibility;
/// downstream consumers (notifications, exports) attach here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::TransportDelivered {
                transport_id,
                sale_id,
                franchise_id,
                ..
            } => {
                info!(
                    transport_id,
                    sale_id, franchise_id, "transport delivered and posted"
                );
            }
            Event::StockPosted {
                transaction_id,
                transport_id,
                line_count,
            } => {
                info!(
                    transaction_id,
                    transport_id, line_count, "stock ledger lines posted"
                );
            }
            Event::BalancesRebuilt {
                balance_rows,
                batch_rows,
            } => {
                info!(balance_rows, batch_rows, "stock balances rebuilt");
            }
            other => info!(event = ?other, "event received"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::SaleCreated {
                sale_id: 1,
                franchise_id: 2,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::SaleCreated {
                sale_id,
                franchise_id,
            }) => {
                assert_eq!(sale_id, 1);
                assert_eq!(franchise_id, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic.
        sender
            .send_or_log(Event::TransportCreated {
                transport_id: 1,
                sale_id: 1,
            })
            .await;
    }
}
