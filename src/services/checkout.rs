use crate::{
    config::AppConfig,
    entities::{
        order, payment, Customer, Order, OrderModel, Payment, PaymentMethod, PaymentModel,
        PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::{lines_with_products, CartLine},
        notifications,
    },
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const ORDER_TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_TOKEN_LEN: usize = 5;

/// Checkout: assigns the human-readable order identifier and hands the open
/// order off to the payment lifecycle.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Starts checkout on the customer's open order. The order identifier is
    /// assigned exactly once; a second call returns the order unchanged.
    #[instrument(skip(self))]
    pub async fn begin_checkout(&self, customer_id: i64) -> Result<OrderModel, ServiceError> {
        let order = self.open_order_with_items(customer_id).await?;

        if order.order_id.is_some() {
            return Ok(order);
        }

        let identifier = next_order_identifier();
        let order_id = order.id;
        let mut active: order::ActiveModel = order.into();
        active.order_id = Set(Some(identifier.clone()));
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CheckoutStarted { order_id })
            .await;

        info!("Checkout started for order {} as {}", order_id, identifier);
        Ok(order)
    }

    /// Idempotent payment creation: an existing payment for the order is
    /// returned unchanged (whatever its method); otherwise one is created
    /// with status pending and the order total snapshotted as its amount.
    /// Concurrent submissions race on the unique payments.order_id index and
    /// the loser re-fetches the winner's row.
    #[instrument(skip(self))]
    pub async fn create_or_get_payment(
        &self,
        customer_id: i64,
        method: PaymentMethod,
    ) -> Result<PaymentModel, ServiceError> {
        let order = self.begin_checkout(customer_id).await?;

        if let Some(existing) = self.find_payment(order.id).await? {
            return Ok(existing);
        }

        let lines = lines_with_products(&*self.db, order.id).await?;
        let total: Decimal = lines.iter().map(|l| l.item.line_total()).sum();
        let now = Utc::now();

        let payment = payment::ActiveModel {
            order_id: Set(order.id),
            payment_method: Set(method),
            payment_id: Set(None),
            amount: Set(total),
            currency: Set(self.config.currency.clone()),
            status: Set(PaymentStatus::Pending),
            notification_sent: Set(false),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match payment.insert(&*self.db).await {
            Ok(created) => {
                self.event_sender
                    .send_or_log(Event::PaymentCreated(created.id))
                    .await;
                info!(
                    "Created payment {} for order {} ({} {})",
                    created.id, order.id, created.amount, created.currency
                );
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => self
                .find_payment(order.id)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    /// Input for the rendering/export collaborator: the order, its lines and
    /// a decimal-exact total.
    pub async fn invoice_data(
        &self,
        customer_id: i64,
        order_id: i64,
    ) -> Result<InvoiceData, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let lines = lines_with_products(&*self.db, order.id).await?;
        let total = lines.iter().map(|l| l.item.line_total()).sum();

        Ok(InvoiceData {
            order,
            lines,
            total,
        })
    }

    /// Deep-link URL for the manual order flow: opens the store owner's
    /// WhatsApp with the current cart summary pre-filled. `None` when no
    /// owner phone is configured.
    pub async fn order_details_link(
        &self,
        customer_id: i64,
    ) -> Result<Option<String>, ServiceError> {
        let Some(owner_phone) = self.config.whatsapp.owner_phone.as_deref() else {
            warn!("No owner phone configured; cannot build order deep link");
            return Ok(None);
        };
        let Some(phone) = notifications::sanitize_phone(owner_phone) else {
            warn!("Configured owner phone is not a usable number");
            return Ok(None);
        };

        let order = self.open_order_with_items(customer_id).await?;
        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })?;

        let lines = lines_with_products(&*self.db, order.id).await?;
        let total = lines.iter().map(|l| l.item.line_total()).sum();
        let message =
            notifications::order_summary_message(&order, &lines, total, &self.config.currency, &customer);

        let url =
            notifications::deep_link(&self.config.whatsapp.send_base_url, &phone, &message)?;
        Ok(Some(url))
    }

    async fn open_order_with_items(&self, customer_id: i64) -> Result<OrderModel, ServiceError> {
        let order = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Paid.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No open order".to_string()))?;

        let lines = lines_with_products(&*self.db, order.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cart is empty".to_string(),
            ));
        }
        Ok(order)
    }

    async fn find_payment(&self, order_id: i64) -> Result<Option<PaymentModel>, ServiceError> {
        Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }
}

/// Everything the invoice renderer needs.
#[derive(Debug, Serialize)]
pub struct InvoiceData {
    pub order: OrderModel,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

/// `ORD-<YYYYMMDD>-<5 uppercase alphanumerics>`
pub fn next_order_identifier() -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let token: String = (0..ORDER_TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_TOKEN_CHARSET.len());
            ORDER_TOKEN_CHARSET[idx] as char
        })
        .collect();
    format!("ORD-{}-{}", date, token)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static ORDER_ID_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^ORD-\d{8}-[A-Z0-9]{5}$").unwrap());

    #[test]
    fn order_identifier_format() {
        for _ in 0..64 {
            let id = next_order_identifier();
            assert!(ORDER_ID_RE.is_match(&id), "bad identifier: {}", id);
        }
    }

    #[test]
    fn order_identifier_embeds_todays_date() {
        let id = next_order_identifier();
        let date = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(&id[4..12], date.as_str());
    }
}
