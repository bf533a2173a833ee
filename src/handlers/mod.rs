pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod payments;
pub mod reviews;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        CartService, CatalogService, CheckoutService, CustomerService, NotificationService,
        PaymentService, ReviewService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Services used by the HTTP handlers, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub notifications: Arc<NotificationService>,
    pub reviews: Arc<ReviewService>,
    pub customers: Arc<CustomerService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            db.clone(),
            event_sender.clone(),
            config.whatsapp.clone(),
        ));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                config.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                db.clone(),
                event_sender.clone(),
                notifications.clone(),
            )),
            notifications,
            reviews: Arc::new(ReviewService::new(db.clone(), event_sender.clone())),
            customers: Arc::new(CustomerService::new(db, event_sender)),
        }
    }
}
