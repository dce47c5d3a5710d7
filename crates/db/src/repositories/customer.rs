use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use roster_core::domain::customer::{Customer, CustomerId, CustomerPatch};
use roster_core::errors::StorageError;
use roster_core::repository::CustomerRepository;

use crate::schema::CUSTOMERS_TABLE;
use crate::store::{decode_timestamp, Predicate, SqlValue, Store};

pub struct SqlCustomerRepository {
    store: Store,
}

impl SqlCustomerRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

fn by_id(id: &CustomerId) -> Predicate {
    Predicate::eq("id", id.as_str())
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, StorageError> {
    let text = |column: &str| -> Result<String, StorageError> {
        row.try_get::<String, _>(column).map_err(|e| {
            StorageError::decode(format!("customers.{column}: {e}")).with_source(e)
        })
    };

    Ok(Customer {
        id: CustomerId(text("id")?),
        name: text("name")?,
        email: text("email")?,
        created_at: decode_timestamp(&text("created_at")?)?,
        updated_at: decode_timestamp(&text("updated_at")?)?,
    })
}

#[async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn create(&self, customer: Customer) -> Result<Customer, StorageError> {
        self.store
            .insert(
                CUSTOMERS_TABLE,
                &[
                    ("id", customer.id.as_str().into()),
                    ("name", customer.name.as_str().into()),
                    ("email", customer.email.as_str().into()),
                    ("created_at", customer.created_at.into()),
                    ("updated_at", customer.updated_at.into()),
                ],
            )
            .await?;

        Ok(customer)
    }

    async fn find_all(&self) -> Result<Vec<Customer>, StorageError> {
        let rows = self.store.select_all(CUSTOMERS_TABLE).await?;
        rows.iter().map(row_to_customer).collect()
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StorageError> {
        match self.store.select_one(CUSTOMERS_TABLE, &by_id(id)).await? {
            Some(ref row) => Ok(Some(row_to_customer(row)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StorageError> {
        let mut columns: Vec<(&str, SqlValue)> = Vec::with_capacity(3);
        if let Some(name) = patch.name {
            columns.push(("name", name.into()));
        }
        if let Some(email) = patch.email {
            columns.push(("email", email.into()));
        }
        columns.push(("updated_at", Utc::now().into()));

        self.store.update(CUSTOMERS_TABLE, &by_id(id), &columns).await?;
        self.find_by_id(id).await
    }

    async fn delete(&self, id: &CustomerId) -> Result<u64, StorageError> {
        self.store.delete_where(CUSTOMERS_TABLE, &by_id(id)).await
    }
}
