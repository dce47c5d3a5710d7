//! Customer business rules.
//!
//! The service is the single entry point the request layer calls. It owns identifier
//! generation, required-field validation and timestamp assignment; persistence is
//! delegated to an injected [`CustomerRepository`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::customer::{
    required, Customer, CustomerId, CustomerPatch, NewCustomer, UpdateCustomer,
};
use crate::errors::{ServiceError, ValidationError};
use crate::repository::CustomerRepository;

#[derive(Clone)]
pub struct CustomerService {
    repository: Arc<dyn CustomerRepository>,
}

impl CustomerService {
    pub fn new(repository: Arc<dyn CustomerRepository>) -> Self {
        Self { repository }
    }

    /// Validates `input` and persists a new record.
    ///
    /// Validation runs before the repository is touched, so a rejected request never
    /// reaches storage.
    pub async fn create(&self, input: NewCustomer) -> Result<Customer, ServiceError> {
        let name = required("name", input.name)?;
        let email = required("email", input.email)?;
        let id = match input.id {
            Some(id) if !id.trim().is_empty() => CustomerId(id),
            _ => CustomerId::generate(),
        };

        let now = Utc::now();
        let customer = Customer { id, name, email, created_at: now, updated_at: now };
        let created = self.repository.create(customer).await?;

        info!(
            event_name = "customer.created",
            customer_id = %created.id,
            "customer created"
        );
        Ok(created)
    }

    pub async fn find_all(&self) -> Result<Vec<Customer>, ServiceError> {
        Ok(self.repository.find_all().await?)
    }

    pub async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, ServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Replaces `name` and `email` on an existing record. Both fields are required.
    pub async fn update(
        &self,
        id: &CustomerId,
        input: UpdateCustomer,
    ) -> Result<Option<Customer>, ServiceError> {
        if let Some(body_id) = input.id.filter(|value| !value.trim().is_empty()) {
            if body_id != id.0 {
                return Err(ValidationError::IdMismatch { path: id.0.clone(), body: body_id }.into());
            }
        }

        let patch = CustomerPatch {
            name: Some(required("name", input.name)?),
            email: Some(required("email", input.email)?),
        };
        let updated = self.repository.update(id, patch).await?;

        match &updated {
            Some(customer) => info!(
                event_name = "customer.updated",
                customer_id = %customer.id,
                "customer updated"
            ),
            None => debug!(
                event_name = "customer.update_missed",
                customer_id = %id,
                "update matched no customer"
            ),
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &CustomerId) -> Result<u64, ServiceError> {
        let removed = self.repository.delete(id).await?;
        if removed > 0 {
            info!(event_name = "customer.deleted", customer_id = %id, "customer deleted");
        }
        Ok(removed)
    }
}
