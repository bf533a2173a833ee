pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod customers;
pub mod notifications;
pub mod payments;
pub mod reviews;

pub use cart::{AddItemInput, CartService, CartView};
pub use catalog::{CatalogService, CreateProductInput, UpdateProductInput};
pub use checkout::{CheckoutService, InvoiceData};
pub use customers::{CustomerService, IdentityProfile, UpdateProfileInput};
pub use notifications::NotificationService;
pub use payments::{ApprovalOutcome, PaymentService, StatusTransition};
pub use reviews::{ReviewService, SubmitReviewInput};
