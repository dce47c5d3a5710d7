use roster_core::errors::StorageError;
use tracing::info;

use crate::store::{ColumnSpec, Store, TableSpec};

pub const CUSTOMERS_TABLE: &str = "customers";

pub fn customers_table() -> TableSpec {
    TableSpec {
        name: CUSTOMERS_TABLE.to_string(),
        columns: vec![
            ColumnSpec::text("id").primary_key(),
            ColumnSpec::text("name").not_null(),
            ColumnSpec::text("email").not_null().unique(),
            ColumnSpec::timestamp("created_at"),
            ColumnSpec::timestamp("updated_at"),
        ],
    }
}

/// Creates the `customers` table when it is missing. Returns whether it was created.
///
/// Safe to run on every start.
pub async fn initialize(store: &Store) -> Result<bool, StorageError> {
    if store.table_exists(CUSTOMERS_TABLE).await? {
        return Ok(false);
    }

    store.create_table(&customers_table()).await?;
    info!(
        event_name = "system.schema.table_created",
        correlation_id = "bootstrap",
        table = CUSTOMERS_TABLE,
        "customers table created"
    );
    Ok(true)
}
