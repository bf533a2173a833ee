use crate::{
    entities::{order, payment, Order, Payment, PaymentModel, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::NotificationService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};

/// The before/after pair of one status write, scoped to the call that
/// performed it. This is what the notification trigger consumes; there is
/// deliberately no shared lookup of "previous status" keyed by payment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// `None` only for a freshly inserted payment row.
    pub previous: Option<PaymentStatus>,
    pub current: PaymentStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }
}

/// Result of approving a payment: the updated row, the observed transition
/// and the WhatsApp deep link when the trigger fired.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub payment: PaymentModel,
    pub transition: StatusTransition,
    pub notification: Option<String>,
}

/// Payment lifecycle. Pending is the only non-terminal state; success,
/// failed and cancelled stay where they are unless an operator resets the
/// payment to pending.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifications: Arc<NotificationService>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifications,
        }
    }

    pub async fn get_payment(&self, payment_id: i64) -> Result<PaymentModel, ServiceError> {
        Payment::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))
    }

    /// Marks a payment successful and flips the owning order to paid.
    ///
    /// Both writes commit in one database transaction: either the payment is
    /// successful and the order paid, or neither changed. The pre-write
    /// status is captured inside that same transaction and handed to the
    /// notification trigger after commit. Repeating the call on an
    /// already-successful payment is harmless and produces no side effects.
    #[instrument(skip(self))]
    pub async fn mark_success(
        &self,
        payment_id: i64,
        external_payment_id: Option<String>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let payment = Payment::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        let previous = payment.status;
        match previous {
            PaymentStatus::Pending | PaymentStatus::Success => {}
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Payment {} is {}; reset it to pending before approving",
                    payment_id, other
                )))
            }
        }

        let order = Order::find_by_id(payment.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", payment.order_id))
            })?;

        let mut active: payment::ActiveModel = payment.into();
        active.status = Set(PaymentStatus::Success);
        if let Some(external) = external_payment_id {
            active.payment_id = Set(Some(external));
        }
        active.updated_at = Set(Utc::now());
        let payment = active.update(&txn).await?;

        if !order.paid {
            let mut order: order::ActiveModel = order.into();
            order.paid = Set(true);
            order.updated_at = Set(Utc::now());
            order.update(&txn).await?;
        }

        txn.commit().await?;

        let transition = StatusTransition {
            previous: Some(previous),
            current: PaymentStatus::Success,
        };

        if transition.changed() {
            self.event_sender
                .send_or_log(Event::PaymentStatusChanged {
                    payment_id,
                    old_status: Some(previous.to_string()),
                    new_status: PaymentStatus::Success.to_string(),
                })
                .await;
            self.event_sender
                .send_or_log(Event::OrderPaid(payment.order_id))
                .await;
            info!("Payment {} approved", payment_id);
        }

        // Post-commit: the trigger decides from the transition alone whether
        // to produce the WhatsApp message. A missing or invalid phone leaves
        // notification_sent false and is reported as None, not an error.
        let notification = self
            .notifications
            .on_payment_transition(&payment, &transition)
            .await?;

        Ok(ApprovalOutcome {
            payment,
            transition,
            notification,
        })
    }

    /// Marks a pending payment failed. The order stays unpaid.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, payment_id: i64) -> Result<PaymentModel, ServiceError> {
        self.close_pending(payment_id, PaymentStatus::Failed).await
    }

    /// Marks a pending payment cancelled. The order stays unpaid.
    #[instrument(skip(self))]
    pub async fn mark_cancelled(&self, payment_id: i64) -> Result<PaymentModel, ServiceError> {
        self.close_pending(payment_id, PaymentStatus::Cancelled)
            .await
    }

    /// Administrative override: back to pending so the payment can move
    /// again. Clears notification_sent so a later approval notifies anew.
    #[instrument(skip(self))]
    pub async fn reset_to_pending(&self, payment_id: i64) -> Result<PaymentModel, ServiceError> {
        let payment = self.get_payment(payment_id).await?;
        let previous = payment.status;

        let mut active: payment::ActiveModel = payment.into();
        active.status = Set(PaymentStatus::Pending);
        active.notification_sent = Set(false);
        active.updated_at = Set(Utc::now());
        let payment = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentStatusChanged {
                payment_id,
                old_status: Some(previous.to_string()),
                new_status: PaymentStatus::Pending.to_string(),
            })
            .await;

        info!("Payment {} reset to pending by operator", payment_id);
        Ok(payment)
    }

    async fn close_pending(
        &self,
        payment_id: i64,
        target: PaymentStatus,
    ) -> Result<PaymentModel, ServiceError> {
        let payment = self.get_payment(payment_id).await?;
        let previous = payment.status;

        if previous == target {
            return Ok(payment);
        }
        if previous != PaymentStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment {} is {}; only pending payments can become {}",
                payment_id, previous, target
            )));
        }

        let mut active: payment::ActiveModel = payment.into();
        active.status = Set(target);
        active.updated_at = Set(Utc::now());
        let payment = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentStatusChanged {
                payment_id,
                old_status: Some(previous.to_string()),
                new_status: target.to_string(),
            })
            .await;

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_from_pending_counts_as_changed() {
        let t = StatusTransition {
            previous: Some(PaymentStatus::Pending),
            current: PaymentStatus::Success,
        };
        assert!(t.changed());
    }

    #[test]
    fn repeated_success_is_not_a_change() {
        let t = StatusTransition {
            previous: Some(PaymentStatus::Success),
            current: PaymentStatus::Success,
        };
        assert!(!t.changed());
    }

    #[test]
    fn fresh_row_counts_as_changed() {
        let t = StatusTransition {
            previous: None,
            current: PaymentStatus::Success,
        };
        assert!(t.changed());
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }
}
