use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Domain events emitted by the storefront services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(i64),
    ProductUpdated(i64),

    // Cart events
    CartItemAdded { order_id: i64, product_id: i64 },
    CartItemUpdated { order_id: i64, item_id: i64 },
    CartItemRemoved { order_id: i64, item_id: i64 },
    CartCleared(i64),

    // Checkout events
    CheckoutStarted { order_id: i64 },

    // Payment events
    PaymentCreated(i64),
    PaymentStatusChanged {
        payment_id: i64,
        old_status: Option<String>,
        new_status: String,
    },
    OrderPaid(i64),
    NotificationProduced { payment_id: i64 },

    // Review events
    ReviewSubmitted { product_id: i64, review_id: i64 },

    // Customer events
    CustomerUpdated(i64),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a full or closed channel is logged, never an error
    /// path for the emitting operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Consumes the event channel and dispatches each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPaid(order_id) => {
                if let Err(e) = handle_order_paid(*order_id).await {
                    error!("Failed to handle order paid event: {}", e);
                }
            }
            Event::PaymentStatusChanged {
                payment_id,
                old_status,
                new_status,
            } => {
                info!(
                    payment_id,
                    old = old_status.as_deref().unwrap_or("-"),
                    new = %new_status,
                    "payment status changed"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

async fn handle_order_paid(order_id: i64) -> Result<(), String> {
    info!(order_id, "order paid");
    Ok(())
}
