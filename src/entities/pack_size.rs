use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named pack-size variant (e.g. "250g", "1kg")
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pack_sizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub size: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_pack_size::Entity")]
    ProductPackSizes,
}

impl Related<super::product_pack_size::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductPackSizes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Weight in grams used for ordering pack sizes. Labels in kilograms are
    /// scaled to grams for comparison only; the display label is untouched.
    /// Returns `None` for labels that do not parse as a weight.
    pub fn normalized_grams(&self) -> Option<i64> {
        normalized_grams(&self.size)
    }
}

pub fn normalized_grams(label: &str) -> Option<i64> {
    let lower = label.trim().to_ascii_lowercase();
    if let Some(value) = lower.strip_suffix("kg") {
        value.trim().parse::<i64>().ok().map(|n| n * 1000)
    } else if let Some(value) = lower.strip_suffix('g') {
        value.trim().parse::<i64>().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("250g", Some(250))]
    #[test_case("500g", Some(500))]
    #[test_case("1kg", Some(1000))]
    #[test_case("2kg", Some(2000))]
    #[test_case("5 kg", Some(5000))]
    #[test_case("jumbo", None)]
    fn normalizes_weights(label: &str, expected: Option<i64>) {
        assert_eq!(normalized_grams(label), expected);
    }

    #[test]
    fn kilograms_sort_after_grams() {
        let mut labels = vec!["1kg", "250g", "500g"];
        labels.sort_by_key(|l| normalized_grams(l).unwrap_or(i64::MAX));
        assert_eq!(labels, vec!["250g", "500g", "1kg"]);
    }
}
