use async_trait::async_trait;

use crate::domain::customer::{Customer, CustomerId, CustomerPatch};
use crate::errors::StorageError;

/// Persistence port for customers.
///
/// Implementations do no validation of their own: uniqueness of `id` and `email` is
/// left to the backing store and surfaces as a constraint [`StorageError`].
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Inserts the fully populated record and returns it unchanged.
    async fn create(&self, customer: Customer) -> Result<Customer, StorageError>;

    async fn find_all(&self) -> Result<Vec<Customer>, StorageError>;

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StorageError>;

    /// Applies `patch`, bumps `updated_at`, and re-reads the row. A missing id yields
    /// `Ok(None)` rather than an error.
    async fn update(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StorageError>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete(&self, id: &CustomerId) -> Result<u64, StorageError>;
}
