mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{errors::ServiceError, services::CreateProductInput};

#[tokio::test]
async fn slugs_deduplicate_with_the_colliding_products_id() {
    let app = TestApp::new().await;
    let category = app.seed_category("Sweeteners").await;

    let make = |name: &str| CreateProductInput {
        category_id: category,
        name: name.to_string(),
        description: None,
        original_price: dec!(100.00),
        discount_percentage: None,
        stock: 5,
        available: true,
    };

    let first = app
        .services()
        .catalog
        .create_product(make("Jaggery Cubes"))
        .await
        .unwrap();
    let second = app
        .services()
        .catalog
        .create_product(make("Jaggery Cubes"))
        .await
        .unwrap();

    assert_eq!(first.slug, "jaggery-cubes");
    assert_eq!(second.slug, format!("jaggery-cubes-{}", first.id));

    let by_slug = app
        .services()
        .catalog
        .get_product_by_slug(&second.slug)
        .await
        .unwrap();
    assert_eq!(by_slug.id, second.id);
}

#[tokio::test]
async fn update_does_not_touch_the_slug() {
    let app = TestApp::new().await;
    let product = app.seed_product("Cane Syrup", dec!(180.00), None, 10).await;

    let updated = app
        .services()
        .catalog
        .update_product(
            product.id,
            storefront_api::services::UpdateProductInput {
                name: Some("Cane Syrup Premium".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Cane Syrup Premium");
    assert_eq!(updated.slug, product.slug);
}

#[tokio::test]
async fn pack_sizes_list_in_weight_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Jaggery Cubes", dec!(150.00), None, 10).await;

    // seeded out of order on purpose
    app.seed_pack_size(product.id, "1kg", dec!(200.00)).await;
    app.seed_pack_size(product.id, "250g", dec!(70.00)).await;
    app.seed_pack_size(product.id, "500g", dec!(120.00)).await;

    let options = app
        .services()
        .catalog
        .pack_sizes_for_product(product.id)
        .await
        .unwrap();

    let labels: Vec<&str> = options.iter().map(|o| o.pack_size.size.as_str()).collect();
    assert_eq!(labels, vec!["250g", "500g", "1kg"]);
}

#[tokio::test]
async fn pack_size_price_lookup_and_upsert() {
    let app = TestApp::new().await;
    let product = app.seed_product("Jaggery Cubes", dec!(150.00), None, 10).await;
    let pack_size = app.seed_pack_size(product.id, "500g", dec!(120.00)).await;

    let price = app
        .services()
        .catalog
        .price_for_pack_size(product.id, "500g")
        .await
        .unwrap();
    assert_eq!(price, dec!(120.00));

    // second write on the unique pair updates in place
    app.services()
        .catalog
        .set_pack_size_price(product.id, pack_size, dec!(125.00))
        .await
        .unwrap();
    let price = app
        .services()
        .catalog
        .price_for_pack_size(product.id, "500g")
        .await
        .unwrap();
    assert_eq!(price, dec!(125.00));

    let missing = app
        .services()
        .catalog
        .price_for_pack_size(product.id, "2kg")
        .await
        .unwrap_err();
    assert_matches!(missing, ServiceError::NotFound(_));
}

#[tokio::test]
async fn discount_validation_bounds() {
    let app = TestApp::new().await;
    let category = app.seed_category("Sweeteners").await;

    let err = app
        .services()
        .catalog
        .create_product(CreateProductInput {
            category_id: category,
            name: "Overdone".to_string(),
            description: None,
            original_price: dec!(100.00),
            discount_percentage: Some(101),
            stock: 5,
            available: true,
        })
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}
