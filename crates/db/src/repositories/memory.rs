use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use roster_core::domain::customer::{Customer, CustomerId, CustomerPatch};
use roster_core::errors::StorageError;
use roster_core::repository::CustomerRepository;

/// Vec-backed repository that keeps insertion order and enforces the same `id` and
/// `email` uniqueness as the SQL schema.
#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<Vec<Customer>>,
}

impl InMemoryCustomerRepository {
    pub async fn len(&self) -> usize {
        self.customers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.customers.read().await.is_empty()
    }
}

fn email_taken(customers: &[Customer], email: &str, except: Option<&CustomerId>) -> bool {
    customers.iter().any(|existing| existing.email == email && Some(&existing.id) != except)
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn create(&self, customer: Customer) -> Result<Customer, StorageError> {
        let mut customers = self.customers.write().await;
        if customers.iter().any(|existing| existing.id == customer.id) {
            return Err(StorageError::constraint(format!(
                "primary key constraint failed: customers.id `{}`",
                customer.id
            )));
        }
        if email_taken(&customers, &customer.email, None) {
            return Err(StorageError::constraint("UNIQUE constraint failed: customers.email"));
        }

        customers.push(customer.clone());
        Ok(customer)
    }

    async fn find_all(&self) -> Result<Vec<Customer>, StorageError> {
        Ok(self.customers.read().await.clone())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StorageError> {
        let customers = self.customers.read().await;
        Ok(customers.iter().find(|customer| &customer.id == id).cloned())
    }

    async fn update(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StorageError> {
        let mut customers = self.customers.write().await;
        let Some(index) = customers.iter().position(|customer| &customer.id == id) else {
            return Ok(None);
        };
        if let Some(email) = &patch.email {
            if email_taken(&customers, email, Some(id)) {
                return Err(StorageError::constraint("UNIQUE constraint failed: customers.email"));
            }
        }

        let customer = &mut customers[index];
        if let Some(name) = patch.name {
            customer.name = name;
        }
        if let Some(email) = patch.email {
            customer.email = email;
        }
        customer.updated_at = Utc::now();

        Ok(Some(customer.clone()))
    }

    async fn delete(&self, id: &CustomerId) -> Result<u64, StorageError> {
        let mut customers = self.customers.write().await;
        let before = customers.len();
        customers.retain(|customer| &customer.id != id);
        Ok((before - customers.len()) as u64)
    }
}
