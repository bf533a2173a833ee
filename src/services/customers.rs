use crate::{
    config::PHONE_RE,
    entities::{customer, Customer, CustomerModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Local customer profiles. Authentication happens upstream; this service
/// only mirrors the identity it is handed and keeps the contact fields the
/// storefront needs (phone for notifications, address for delivery).
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn get_profile(&self, customer_id: i64) -> Result<CustomerModel, ServiceError> {
        Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })
    }

    /// Syncs an authenticated identity into the local profile store. The id
    /// is the identity provider's id and is taken as-is.
    #[instrument(skip(self, identity), fields(customer_id = identity.id))]
    pub async fn upsert_profile(
        &self,
        identity: IdentityProfile,
    ) -> Result<CustomerModel, ServiceError> {
        validate_phone(identity.phone_number.as_deref())?;
        let now = Utc::now();

        let existing = Customer::find_by_id(identity.id).one(&*self.db).await?;
        let profile = match existing {
            Some(current) => {
                let mut active: customer::ActiveModel = current.into();
                active.username = Set(identity.username);
                active.email = Set(identity.email);
                active.full_name = Set(identity.full_name);
                active.phone_number = Set(identity.phone_number);
                active.address = Set(identity.address);
                active.updated_at = Set(now);
                active.update(&*self.db).await?
            }
            None => {
                let profile = customer::ActiveModel {
                    id: Set(identity.id),
                    username: Set(identity.username),
                    email: Set(identity.email),
                    full_name: Set(identity.full_name),
                    phone_number: Set(identity.phone_number),
                    address: Set(identity.address),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                profile.insert(&*self.db).await?
            }
        };

        self.event_sender
            .send_or_log(Event::CustomerUpdated(profile.id))
            .await;

        Ok(profile)
    }

    /// Partial profile update with the same phone validation as sync.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        customer_id: i64,
        input: UpdateProfileInput,
    ) -> Result<CustomerModel, ServiceError> {
        if let Some(phone) = &input.phone_number {
            validate_phone(Some(phone))?;
        }

        let profile = self.get_profile(customer_id).await?;
        let mut active: customer::ActiveModel = profile.into();

        if let Some(full_name) = input.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(phone_number) = input.phone_number {
            active.phone_number = Set(Some(phone_number));
        }
        if let Some(address) = input.address {
            active.address = Set(Some(address));
        }
        active.updated_at = Set(Utc::now());

        let profile = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CustomerUpdated(customer_id))
            .await;

        Ok(profile)
    }
}

fn validate_phone(phone: Option<&str>) -> Result<(), ServiceError> {
    match phone {
        Some(p) if !PHONE_RE.is_match(p) => Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid phone number",
            p
        ))),
        _ => Ok(()),
    }
}

/// The identity the upstream auth layer vouches for.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_phones_pass() {
        assert!(validate_phone(Some("+919825550144")).is_ok());
        assert!(validate_phone(None).is_ok());
    }

    #[test]
    fn invalid_phones_are_rejected() {
        assert!(matches!(
            validate_phone(Some("98-25x")),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
