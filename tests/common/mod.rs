use rust_decimal::Decimal;
use std::sync::Arc;
use storefront_api::{
    config::AppConfig,
    db,
    entities::ProductModel,
    events::{self, EventSender},
    handlers::AppServices,
    services::{CreateProductInput, IdentityProfile},
    AppState,
};
use tokio::sync::mpsc;

/// Test harness: application state backed by an in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single pooled connection keeps every query on the one in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.whatsapp.owner_phone = Some("+919800000001".to_string());

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let cfg = Arc::new(cfg);
        let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()), cfg.clone());

        TestApp {
            state: AppState {
                db,
                config: cfg,
                event_sender,
                services,
            },
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Seeds a customer profile the way the identity layer would.
    pub async fn seed_customer(&self, id: i64, phone: Option<&str>) -> i64 {
        self.services()
            .customers
            .upsert_profile(IdentityProfile {
                id,
                username: format!("customer{}", id),
                email: format!("customer{}@example.com", id),
                full_name: format!("Customer {}", id),
                phone_number: phone.map(str::to_string),
                address: Some("12 Market Road".to_string()),
            })
            .await
            .expect("failed to seed customer")
            .id
    }

    /// Seeds a category and a product in it.
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        discount: Option<i32>,
        stock: i32,
    ) -> ProductModel {
        let category = self.seed_category("Sweeteners").await;
        self.services()
            .catalog
            .create_product(CreateProductInput {
                category_id: category,
                name: name.to_string(),
                description: None,
                original_price: price,
                discount_percentage: discount,
                stock,
                available: true,
            })
            .await
            .expect("failed to seed product")
    }

    pub async fn seed_category(&self, name: &str) -> i64 {
        use sea_orm::{ActiveModelTrait, Set};
        use storefront_api::entities::category;

        let category = category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            ..Default::default()
        };
        category
            .insert(&*self.state.db)
            .await
            .expect("failed to seed category")
            .id
    }

    /// Seeds a pack-size label and its price override for a product.
    pub async fn seed_pack_size(&self, product_id: i64, label: &str, price: Decimal) -> i64 {
        let pack_size = self
            .services()
            .catalog
            .create_pack_size(label.to_string())
            .await
            .expect("failed to seed pack size");
        self.services()
            .catalog
            .set_pack_size_price(product_id, pack_size.id, price)
            .await
            .expect("failed to set pack size price");
        pack_size.id
    }
}
