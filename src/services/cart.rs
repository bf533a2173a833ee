use crate::{
    entities::{
        order, order_item, Order, OrderItem, OrderItemModel, OrderModel, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Cart / order aggregator. Maintains the single open (unpaid) order per
/// customer and its line items; every quantity change recomputes the line
/// total from the stored unit price.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the customer's open order, creating one if absent.
    ///
    /// Two concurrent first-add-to-cart calls may both observe no open
    /// order; the partial unique index on `orders(customer_id) WHERE paid =
    /// FALSE` makes one insert lose, and the loser re-fetches the winner's
    /// row.
    #[instrument(skip(self))]
    pub async fn open_order(&self, customer_id: i64) -> Result<OrderModel, ServiceError> {
        if let Some(existing) = self.find_open_order(customer_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let order = order::ActiveModel {
            order_id: Set(None),
            customer_id: Set(customer_id),
            paid: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match order.insert(&*self.db).await {
            Ok(created) => {
                info!("Opened order {} for customer {}", created.id, customer_id);
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => self
                .find_open_order(customer_id)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_open_order(&self, customer_id: i64) -> Result<Option<OrderModel>, ServiceError> {
        Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Paid.eq(false))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Adds a product (optionally a pack size of it) to the open order.
    ///
    /// The unit price is resolved once: the pack-size override when an
    /// override row exists for the label, the discounted catalog price
    /// otherwise. An existing line for the same (order, product, packsize)
    /// is incremented by the requested quantity, never replaced, and its
    /// line total recomputed from the unit price stored on the line.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: i64,
        input: AddItemInput,
    ) -> Result<OrderItemModel, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let order = self.open_order(customer_id).await?;

        // A concurrent request for the same line can win the insert; the
        // loser's second attempt lands on the increment path.
        let mut last_conflict = None;
        for _ in 0..2 {
            match self.upsert_line(&order, &input).await {
                Err(ServiceError::Conflict(msg)) => last_conflict = Some(msg),
                other => return other,
            }
        }
        Err(ServiceError::Conflict(last_conflict.unwrap_or_else(|| {
            "cart line changed concurrently".to_string()
        })))
    }

    async fn upsert_line(
        &self,
        order: &OrderModel,
        input: &AddItemInput,
    ) -> Result<OrderItemModel, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.available {
            return Err(ServiceError::InvalidOperation(format!(
                "Product '{}' is not available",
                product.name
            )));
        }

        let existing = find_line(&txn, order.id, input.product_id, input.packsize.as_deref()).await?;

        match existing {
            Some(line) => {
                let new_quantity = line.quantity + input.quantity;
                ensure_stock(&product, new_quantity)?;
                let unit_price = line.unit_price;
                let mut active: order_item::ActiveModel = line.into();
                active.quantity = Set(new_quantity);
                active.price = Set(Some(unit_price * Decimal::from(new_quantity)));
                let updated = active.update(&txn).await?;
                txn.commit().await?;

                self.event_sender
                    .send_or_log(Event::CartItemUpdated {
                        order_id: order.id,
                        item_id: updated.id,
                    })
                    .await;
                Ok(updated)
            }
            None => {
                ensure_stock(&product, input.quantity)?;
                let unit_price = match input.packsize.as_deref() {
                    Some(label) => catalog::price_for_pack_size(&txn, product.id, label)
                        .await?
                        .unwrap_or_else(|| product.discounted_price()),
                    None => product.discounted_price(),
                };

                let line = order_item::ActiveModel {
                    order_id: Set(order.id),
                    product_id: Set(product.id),
                    quantity: Set(input.quantity),
                    packsize: Set(input.packsize.clone()),
                    unit_price: Set(unit_price),
                    price: Set(Some(unit_price * Decimal::from(input.quantity))),
                    ..Default::default()
                };

                match line.insert(&txn).await {
                    Ok(created) => {
                        txn.commit().await?;
                        self.event_sender
                            .send_or_log(Event::CartItemAdded {
                                order_id: order.id,
                                product_id: product.id,
                            })
                            .await;
                        Ok(created)
                    }
                    Err(e) if is_unique_violation(&e) => {
                        txn.rollback().await?;
                        Err(ServiceError::Conflict(
                            "cart line was created concurrently".to_string(),
                        ))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Sets the quantity of a cart line. Rejects quantities below 1 and
    /// quantities above the product's stock; the line total is recomputed
    /// from the stored unit price.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        customer_id: i64,
        item_id: i64,
        new_quantity: i32,
    ) -> Result<OrderItemModel, ServiceError> {
        if new_quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let (line, order) = self.owned_unpaid_line(&txn, customer_id, item_id).await?;

        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Cart line {} has no quantity; its unit price is undefined",
                item_id
            )));
        }

        let product = Product::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;

        ensure_stock(&product, new_quantity)?;

        let unit_price = line.unit_price;
        let mut active: order_item::ActiveModel = line.into();
        active.quantity = Set(new_quantity);
        active.price = Set(Some(unit_price * Decimal::from(new_quantity)));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                order_id: order.id,
                item_id,
            })
            .await;

        Ok(updated)
    }

    /// Removes a cart line. Succeeds only when the line belongs to the
    /// caller's own open (unpaid) order.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, customer_id: i64, item_id: i64) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let (line, order) = self.owned_unpaid_line(&txn, customer_id, item_id).await?;
        line.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                order_id: order.id,
                item_id,
            })
            .await;

        Ok(())
    }

    /// Sum of the stored line totals. Lines whose total was never written
    /// count as zero instead of failing the sum.
    pub async fn total_amount(&self, order_id: i64) -> Result<Decimal, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(items.iter().map(|i| i.line_total()).sum())
    }

    /// Bulk-clears every line from an order (cart abandonment).
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: i64) -> Result<(), ServiceError> {
        let order = self
            .find_open_order(customer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No open order".to_string()))?;

        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::CartCleared(order.id)).await;

        info!("Cleared order {}", order.id);
        Ok(())
    }

    /// The open order with its lines, joined products and total, for
    /// display and for the deep-link summary.
    pub async fn get_cart(&self, customer_id: i64) -> Result<CartView, ServiceError> {
        let order = self.open_order(customer_id).await?;
        let lines = lines_with_products(&*self.db, order.id).await?;
        let total = lines.iter().map(|l| l.item.line_total()).sum();

        Ok(CartView {
            order,
            lines,
            total,
        })
    }

    async fn owned_unpaid_line<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: i64,
        item_id: i64,
    ) -> Result<(OrderItemModel, OrderModel), ServiceError> {
        let line = OrderItem::find_by_id(item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let order = Order::find_by_id(line.order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;

        if order.customer_id != customer_id {
            // Treated as absent rather than forbidden; order ids are not
            // guessable information worth confirming.
            return Err(ServiceError::NotFound(format!(
                "Cart item {} not found",
                item_id
            )));
        }
        if order.paid {
            return Err(ServiceError::InvalidOperation(
                "Order is already paid; its items can no longer change".to_string(),
            ));
        }

        Ok((line, order))
    }
}

/// One cart line joined with its product.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub item: OrderItemModel,
    pub product: ProductModel,
}

/// The open order with lines and a decimal-exact total.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub order: OrderModel,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemInput {
    pub product_id: i64,
    pub packsize: Option<String>,
    pub quantity: i32,
}

pub(crate) async fn lines_with_products<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
) -> Result<Vec<CartLine>, ServiceError> {
    let rows = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .find_also_related(Product)
        .all(conn)
        .await?;

    rows.into_iter()
        .map(|(item, product)| {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart line {} references a missing product",
                    item.id
                ))
            })?;
            Ok(CartLine { item, product })
        })
        .collect()
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    product_id: i64,
    packsize: Option<&str>,
) -> Result<Option<OrderItemModel>, ServiceError> {
    let mut query = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .filter(order_item::Column::ProductId.eq(product_id));

    query = match packsize {
        Some(label) => query.filter(order_item::Column::Packsize.eq(label)),
        None => query.filter(order_item::Column::Packsize.is_null()),
    };

    query.one(conn).await.map_err(Into::into)
}

fn ensure_stock(product: &ProductModel, requested: i32) -> Result<(), ServiceError> {
    if requested > product.stock {
        return Err(ServiceError::InsufficientStock(format!(
            "Only {} of '{}' in stock",
            product.stock, product.name
        )));
    }
    Ok(())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product_with_stock(stock: i32) -> ProductModel {
        ProductModel {
            id: 1,
            category_id: 1,
            name: "Cane Syrup".to_string(),
            description: None,
            slug: "cane-syrup".to_string(),
            original_price: dec!(180.00),
            discount_percentage: None,
            stock,
            available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stock_guard_rejects_over_allocation() {
        let err = ensure_stock(&product_with_stock(3), 4).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
    }

    #[test]
    fn stock_guard_allows_exact_stock() {
        assert!(ensure_stock(&product_with_stock(3), 3).is_ok());
    }
}
