use crate::{
    config::WhatsAppConfig,
    entities::{
        payment, Customer, CustomerModel, Order, OrderModel, Payment, PaymentMethod, PaymentModel,
        PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::{lines_with_products, CartLine},
        payments::StatusTransition,
    },
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// Produces the WhatsApp payment-approval notification: a deep-link URL with
/// the order summary pre-filled for the customer's number. Fires at most
/// once per approval; the outbound messaging collaborator owns delivery.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    whatsapp: WhatsAppConfig,
}

impl NotificationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        whatsapp: WhatsAppConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            whatsapp,
        }
    }

    /// Reacts to one payment status write. The decision is a pure function
    /// of the transition the caller observed; nothing here re-reads "old
    /// status" from shared state, so concurrent transitions of unrelated
    /// payments cannot interfere.
    ///
    /// Returns the produced deep-link URL, or `None` when the transition
    /// does not notify: wrong method, no change, already sent, or an
    /// unusable phone (logged as a warning, never an error).
    #[instrument(skip(self, payment), fields(payment_id = payment.id))]
    pub async fn on_payment_transition(
        &self,
        payment: &PaymentModel,
        transition: &StatusTransition,
    ) -> Result<Option<String>, ServiceError> {
        if !should_notify(payment.payment_method, transition, payment.notification_sent) {
            return Ok(None);
        }

        let order = Order::find_by_id(payment.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", payment.order_id))
            })?;

        let customer = Customer::find_by_id(order.customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", order.customer_id))
            })?;

        let Some(phone) = customer.phone_number.as_deref().and_then(sanitize_phone) else {
            warn!(
                customer = %customer.username,
                "customer has no usable phone number; skipping WhatsApp notification"
            );
            return Ok(None);
        };

        let lines = lines_with_products(&*self.db, order.id).await?;
        let message = payment_approval_message(&order, &lines, payment, &customer);
        let link = deep_link(&self.whatsapp.send_base_url, &phone, &message)?;

        // Direct column update: flips the flag without another status write,
        // so the trigger cannot re-enter itself.
        Payment::update_many()
            .col_expr(payment::Column::NotificationSent, Expr::value(true))
            .filter(payment::Column::Id.eq(payment.id))
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::NotificationProduced {
                payment_id: payment.id,
            })
            .await;

        info!(
            order = %display_order_id(&order),
            customer = %customer.username,
            "WhatsApp notification produced"
        );
        Ok(Some(link))
    }
}

/// The fire condition: WhatsApp payments arriving at success from pending
/// (or born successful), not yet notified.
pub fn should_notify(
    method: PaymentMethod,
    transition: &StatusTransition,
    notification_sent: bool,
) -> bool {
    method == PaymentMethod::Whatsapp
        && transition.current == PaymentStatus::Success
        && !notification_sent
        && matches!(transition.previous, None | Some(PaymentStatus::Pending))
}

/// Strips `+`, spaces, dashes and parentheses; accepts digits-only results.
pub fn sanitize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();
    if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

/// Deterministic payment-approval message: order identifier, each line as
/// unit price x quantity, the paid amount, and the customer's contact info.
pub fn payment_approval_message(
    order: &OrderModel,
    lines: &[CartLine],
    payment: &PaymentModel,
    customer: &CustomerModel,
) -> String {
    let mut parts = Vec::new();
    parts.push("Payment approved!".to_string());
    parts.push(format!("Order: {}", display_order_id(order)));
    for line in lines {
        let label = match line.item.packsize.as_deref() {
            Some(size) => format!("{} ({})", line.product.name, size),
            None => line.product.name.clone(),
        };
        parts.push(format!(
            "- {}: {} x {} = {}",
            label,
            line.item.unit_price,
            line.item.quantity,
            line.item.line_total()
        ));
    }
    parts.push(format!("Amount paid: {} {}", payment.currency, payment.amount));
    parts.push(format!(
        "Customer: {} ({})",
        customer.full_name, customer.username
    ));
    parts.push("Your order is now being processed. Thank you for your purchase!".to_string());
    parts.join("\n")
}

/// Pre-checkout cart summary for the manual order flow (sent to the store
/// owner's number).
pub fn order_summary_message(
    order: &OrderModel,
    lines: &[CartLine],
    total: Decimal,
    currency: &str,
    customer: &CustomerModel,
) -> String {
    let mut parts = Vec::new();
    parts.push("New order request".to_string());
    parts.push(format!("Order: {}", display_order_id(order)));
    for line in lines {
        let label = match line.item.packsize.as_deref() {
            Some(size) => format!("{} ({})", line.product.name, size),
            None => line.product.name.clone(),
        };
        parts.push(format!(
            "- {}: {} x {} = {}",
            label,
            line.item.unit_price,
            line.item.quantity,
            line.item.line_total()
        ));
    }
    parts.push(format!("Total: {} {}", currency, total));
    parts.push(format!(
        "Customer: {} ({})",
        customer.full_name, customer.username
    ));
    if let Some(phone) = customer.phone_number.as_deref() {
        parts.push(format!("Phone: {}", phone));
    }
    if let Some(address) = customer.address.as_deref() {
        parts.push(format!("Address: {}", address));
    }
    parts.join("\n")
}

/// `<base>?phone=<digits>&text=<url-encoded body>`
pub fn deep_link(base: &str, phone: &str, text: &str) -> Result<String, ServiceError> {
    let mut url = Url::parse(base).map_err(|e| {
        ServiceError::ExternalServiceError(format!("invalid WhatsApp base URL '{}': {}", base, e))
    })?;
    url.query_pairs_mut()
        .append_pair("phone", phone)
        .append_pair("text", text);
    Ok(url.to_string())
}

fn display_order_id(order: &OrderModel) -> String {
    order
        .order_id
        .clone()
        .unwrap_or_else(|| format!("#{}", order.id))
}
