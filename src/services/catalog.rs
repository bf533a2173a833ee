use crate::{
    entities::{
        pack_size, product, product_pack_size, PackSize, PackSizeModel, Product, ProductModel,
        ProductPackSize,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Catalog service: products, categories' reference data and pack-size
/// pricing. Read-mostly; writes come from catalog management.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product and assigns its slug. Slugs derive from the name;
    /// a collision is resolved by suffixing the id of the newest product
    /// already holding the slug, repeated until the slug is free. Once
    /// assigned the slug never changes.
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if input.original_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "original_price must not be negative".to_string(),
            ));
        }
        if let Some(pct) = input.discount_percentage {
            if !(0..=100).contains(&pct) {
                return Err(ServiceError::ValidationError(
                    "discount_percentage must be between 0 and 100".to_string(),
                ));
            }
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "stock must not be negative".to_string(),
            ));
        }

        let slug = self.unique_slug(&*self.db, &slugify(&input.name)).await?;
        let now = Utc::now();

        let product = product::ActiveModel {
            category_id: Set(input.category_id),
            name: Set(input.name),
            description: Set(input.description),
            slug: Set(slug),
            original_price: Set(input.original_price),
            discount_percentage: Set(input.discount_percentage),
            stock: Set(input.stock),
            available: Set(input.available),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product {} ({})", product.id, product.slug);
        Ok(product)
    }

    /// Partial update. The slug is immutable and deliberately not touchable
    /// from here.
    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: i64,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.original_price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "original_price must not be negative".to_string(),
                ));
            }
            active.original_price = Set(price);
        }
        if let Some(pct) = input.discount_percentage {
            if !(0..=100).contains(&pct) {
                return Err(ServiceError::ValidationError(
                    "discount_percentage must be between 0 and 100".to_string(),
                ));
            }
            active.discount_percentage = Set(Some(pct));
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock must not be negative".to_string(),
                ));
            }
            active.stock = Set(stock);
        }
        if let Some(available) = input.available {
            active.available = Set(available);
        }
        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(product)
    }

    pub async fn get_product(&self, product_id: i64) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}' not found", slug)))
    }

    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let paginator = Product::find()
            .filter(product::Column::Available.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    pub async fn create_pack_size(&self, size: String) -> Result<PackSizeModel, ServiceError> {
        if size.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "pack size label must not be empty".to_string(),
            ));
        }
        let pack_size = pack_size::ActiveModel {
            size: Set(size),
            ..Default::default()
        };
        Ok(pack_size.insert(&*self.db).await?)
    }

    /// Upserts the price override for a (product, pack size) pair.
    #[instrument(skip(self))]
    pub async fn set_pack_size_price(
        &self,
        product_id: i64,
        pack_size_id: i64,
        price: Decimal,
    ) -> Result<(), ServiceError> {
        if price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        self.get_product(product_id).await?;
        PackSize::find_by_id(pack_size_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pack size {} not found", pack_size_id)))?;

        let existing = ProductPackSize::find()
            .filter(product_pack_size::Column::ProductId.eq(product_id))
            .filter(product_pack_size::Column::PackSizeId.eq(pack_size_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut active: product_pack_size::ActiveModel = row.into();
                active.price = Set(price);
                active.update(&*self.db).await?;
            }
            None => {
                let row = product_pack_size::ActiveModel {
                    product_id: Set(product_id),
                    pack_size_id: Set(pack_size_id),
                    price: Set(price),
                    ..Default::default()
                };
                row.insert(&*self.db).await?;
            }
        }
        Ok(())
    }

    /// Price override for a pack-size label on a product. NotFound when no
    /// override row exists; callers fall back to the discounted catalog
    /// price.
    pub async fn price_for_pack_size(
        &self,
        product_id: i64,
        label: &str,
    ) -> Result<Decimal, ServiceError> {
        price_for_pack_size(&*self.db, product_id, label)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No pack size '{}' for product {}",
                    label, product_id
                ))
            })
    }

    /// Pack sizes offered for a product, ordered ascending by normalized
    /// weight (kilogram labels compare in grams; the labels themselves are
    /// returned untouched; unparseable labels sort last).
    pub async fn pack_sizes_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<ProductPackOption>, ServiceError> {
        let rows = ProductPackSize::find()
            .filter(product_pack_size::Column::ProductId.eq(product_id))
            .find_also_related(PackSize)
            .all(&*self.db)
            .await?;

        let mut options: Vec<ProductPackOption> = rows
            .into_iter()
            .filter_map(|(override_row, pack_size)| {
                pack_size.map(|ps| ProductPackOption {
                    pack_size: ps,
                    price: override_row.price,
                })
            })
            .collect();

        options.sort_by_key(|o| o.pack_size.normalized_grams().unwrap_or(i64::MAX));
        Ok(options)
    }
}

/// Shared override lookup; also used by the cart when resolving unit prices
/// inside its own transaction.
pub(crate) async fn price_for_pack_size<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    label: &str,
) -> Result<Option<Decimal>, ServiceError> {
    let row = ProductPackSize::find()
        .filter(product_pack_size::Column::ProductId.eq(product_id))
        .join(JoinType::InnerJoin, product_pack_size::Relation::PackSize.def())
        .filter(pack_size::Column::Size.eq(label))
        .one(conn)
        .await?;
    Ok(row.map(|r| r.price))
}

impl CatalogService {
    async fn unique_slug<C: ConnectionTrait>(
        &self,
        conn: &C,
        base: &str,
    ) -> Result<String, ServiceError> {
        let mut slug = base.to_string();
        loop {
            let colliding = Product::find()
                .filter(product::Column::Slug.eq(slug.clone()))
                .order_by_desc(product::Column::Id)
                .one(conn)
                .await?;
            match colliding {
                None => return Ok(slug),
                Some(existing) => slug = format!("{}-{}", slug, existing.id),
            }
        }
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub original_price: Decimal,
    pub discount_percentage: Option<i32>,
    pub stock: i32,
    pub available: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub stock: Option<i32>,
    pub available: Option<bool>,
}

/// A pack size offered for a product together with its override price.
#[derive(Debug, Serialize)]
pub struct ProductPackOption {
    pub pack_size: PackSizeModel,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Jaggery Cubes", "jaggery-cubes")]
    #[test_case("  Cane  Syrup  ", "cane-syrup")]
    #[test_case("Gur (Organic) 2024!", "gur-organic-2024")]
    #[test_case("---", "")]
    fn slugify_cases(name: &str, expected: &str) {
        assert_eq!(slugify(name), expected);
    }
}
