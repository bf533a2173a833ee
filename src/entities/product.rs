use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub original_price: Decimal,
    #[sea_orm(nullable)]
    pub discount_percentage: Option<i32>,
    pub stock: i32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::product_pack_size::Entity")]
    ProductPackSizes,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_pack_size::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductPackSizes.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Catalog price after the percentage discount, truncated toward zero to
    /// one decimal place. Truncation is the contract here, not nearest
    /// rounding.
    pub fn discounted_price(&self) -> Decimal {
        let price = match self.discount_percentage {
            Some(pct) if pct > 0 => {
                let discount = self.original_price * Decimal::from(pct) / Decimal::from(100);
                self.original_price - discount
            }
            _ => self.original_price,
        };
        price.round_dp_with_strategy(1, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn product(original_price: Decimal, discount_percentage: Option<i32>) -> Model {
        Model {
            id: 1,
            category_id: 1,
            name: "Jaggery Cubes".to_string(),
            description: None,
            slug: "jaggery-cubes".to_string(),
            original_price,
            discount_percentage,
            stock: 10,
            available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test_case(dec!(100.00), Some(33), dec!(67.0); "truncates toward zero")]
    #[test_case(dec!(500.00), Some(10), dec!(450.0); "ten percent off")]
    #[test_case(dec!(99.99), None, dec!(99.9); "no discount still truncates")]
    #[test_case(dec!(79.95), Some(0), dec!(79.9); "zero percent is no discount")]
    fn discounted_price_cases(original: Decimal, pct: Option<i32>, expected: Decimal) {
        assert_eq!(product(original, pct).discounted_price(), expected);
    }

    proptest! {
        #[test]
        fn discounted_price_never_rounds_up(cents in 0u32..1_000_000, pct in 0i32..=100) {
            let original = Decimal::new(cents as i64, 2);
            let got = product(original, Some(pct)).discounted_price();
            let exact = original - original * Decimal::from(pct) / Decimal::from(100);
            prop_assert!(got <= exact);
            prop_assert!(exact - got < dec!(0.1));
        }
    }
}
