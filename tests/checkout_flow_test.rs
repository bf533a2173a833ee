mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::{PaymentMethod, PaymentStatus},
    errors::ServiceError,
    services::AddItemInput,
};

async fn seed_cart(app: &TestApp, customer: i64) {
    let product = app.seed_product("Jaggery Cubes", dec!(150.00), Some(20), 50).await;
    app.services()
        .cart
        .add_item(
            customer,
            AddItemInput {
                product_id: product.id,
                packsize: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn begin_checkout_assigns_the_order_identifier_once() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    seed_cart(&app, customer).await;

    let first = app.services().checkout.begin_checkout(customer).await.unwrap();
    let assigned = first.order_id.clone().expect("identifier assigned");
    assert!(assigned.starts_with("ORD-"));
    assert_eq!(assigned.len(), "ORD-20240101-AB12C".len());

    let second = app.services().checkout.begin_checkout(customer).await.unwrap();
    assert_eq!(second.order_id.as_deref(), Some(assigned.as_str()));
}

#[tokio::test]
async fn begin_checkout_rejects_an_empty_cart() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    app.services().cart.open_order(customer).await.unwrap();

    let err = app
        .services()
        .checkout
        .begin_checkout(customer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn payment_is_created_pending_with_a_total_snapshot() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    seed_cart(&app, customer).await;

    let payment = app
        .services()
        .checkout
        .create_or_get_payment(customer, PaymentMethod::Whatsapp)
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.payment_method, PaymentMethod::Whatsapp);
    // 2 x (150.00 minus 20%) = 240.00
    assert_eq!(payment.amount, dec!(240.0));
    assert_eq!(payment.currency, "INR");
    assert!(!payment.notification_sent);
}

#[tokio::test]
async fn create_or_get_payment_is_idempotent_across_methods() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    seed_cart(&app, customer).await;

    let first = app
        .services()
        .checkout
        .create_or_get_payment(customer, PaymentMethod::Whatsapp)
        .await
        .unwrap();
    let second = app
        .services()
        .checkout
        .create_or_get_payment(customer, PaymentMethod::Upi)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.payment_method, PaymentMethod::Whatsapp, "unchanged");
}

#[tokio::test]
async fn concurrent_payment_creation_yields_one_payment() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    seed_cart(&app, customer).await;
    app.services().checkout.begin_checkout(customer).await.unwrap();

    let checkout = &app.services().checkout;
    let (a, b) = tokio::join!(
        checkout.create_or_get_payment(customer, PaymentMethod::Whatsapp),
        checkout.create_or_get_payment(customer, PaymentMethod::Whatsapp)
    );

    assert_eq!(a.unwrap().id, b.unwrap().id);
}

#[tokio::test]
async fn payment_amount_stays_snapshotted_after_cart_changes() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    let product = app.seed_product("Cane Syrup", dec!(180.00), None, 10).await;
    let item = app
        .services()
        .cart
        .add_item(
            customer,
            AddItemInput {
                product_id: product.id,
                packsize: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let payment = app
        .services()
        .checkout
        .create_or_get_payment(customer, PaymentMethod::Upi)
        .await
        .unwrap();
    assert_eq!(payment.amount, dec!(180.0));

    app.services()
        .cart
        .set_quantity(customer, item.id, 3)
        .await
        .unwrap();

    let refetched = app
        .services()
        .checkout
        .create_or_get_payment(customer, PaymentMethod::Upi)
        .await
        .unwrap();
    assert_eq!(refetched.amount, dec!(180.0), "snapshot, not live total");
}

#[tokio::test]
async fn invoice_data_carries_order_lines_and_total() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, None).await;
    seed_cart(&app, customer).await;

    let order = app.services().checkout.begin_checkout(customer).await.unwrap();
    let invoice = app
        .services()
        .checkout
        .invoice_data(customer, order.id)
        .await
        .unwrap();

    assert_eq!(invoice.order.id, order.id);
    assert_eq!(invoice.lines.len(), 1);
    assert_eq!(invoice.total, dec!(240.0));

    let stranger = app.seed_customer(2, None).await;
    let err = app
        .services()
        .checkout
        .invoice_data(stranger, order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn order_details_link_targets_the_owner_phone() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(1, Some("+919825550144")).await;
    seed_cart(&app, customer).await;

    let link = app
        .services()
        .checkout
        .order_details_link(customer)
        .await
        .unwrap()
        .expect("owner phone configured in the test harness");

    assert!(link.starts_with("https://api.whatsapp.com/send?phone=919800000001&text="));
    assert!(link.contains("Jaggery+Cubes"));
}
