use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line item. `unit_price` is resolved once when the line is created
/// (pack-size override or discounted catalog price); `price` is the line
/// total, recomputed from `unit_price` on every quantity change so unit
/// prices are never recovered by division.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    #[sea_orm(nullable)]
    pub packsize: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub price: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Line total; a row whose total was never written counts as zero
    /// rather than failing the whole order sum.
    pub fn line_total(&self) -> Decimal {
        self.price.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Option<Decimal>) -> Model {
        Model {
            id: 1,
            order_id: 1,
            product_id: 1,
            quantity: 2,
            packsize: Some("500g".to_string()),
            unit_price: dec!(120.00),
            price,
        }
    }

    #[test]
    fn line_total_reads_stored_total() {
        assert_eq!(item(Some(dec!(240.00))).line_total(), dec!(240.00));
    }

    #[test]
    fn unset_line_total_counts_as_zero() {
        assert_eq!(item(None).line_total(), Decimal::ZERO);
    }
}
