use crate::{
    entities::{review, Customer, Product, Review, ReviewModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Product reviews.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Stores a review for a product. The reviewer's email is denormalized
    /// from the customer profile at submission time.
    #[instrument(skip(self, input))]
    pub async fn submit_review(
        &self,
        customer_id: i64,
        product_id: i64,
        input: SubmitReviewInput,
    ) -> Result<ReviewModel, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::ValidationError(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        if input.review.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "review text must not be empty".to_string(),
            ));
        }

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })?;

        let review = review::ActiveModel {
            product_id: Set(product_id),
            customer_id: Set(customer_id),
            email: Set(customer.email),
            rating: Set(input.rating),
            review: Set(input.review),
            submitted_at: Set(Utc::now()),
            ..Default::default()
        };

        let review = review.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                product_id,
                review_id: review.id,
            })
            .await;

        Ok(review)
    }

    /// Reviews for a product, newest first.
    pub async fn reviews_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<ReviewModel>, ServiceError> {
        Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::SubmittedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewInput {
    pub rating: i32,
    pub review: String,
}
