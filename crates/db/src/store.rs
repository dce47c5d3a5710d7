//! Table and row primitives over SQLite.
//!
//! `Store` is the only place SQL text is assembled. Table and column names are checked
//! against a plain identifier grammar before being spliced in; every value goes through
//! a bound parameter.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use roster_core::errors::{StorageError, StorageErrorKind};
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::connection::{connect_with_settings, ConnectionSettings, DbPool};

#[derive(Debug, Error)]
#[error("could not connect to database `{url}`: {source}")]
pub struct ConnectionError {
    pub url: String,
    #[source]
    pub source: sqlx::Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    Null,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Equality filter on a single column.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub value: SqlValue,
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self { column: column.into(), value: value.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default_now: bool,
}

impl ColumnSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Text,
            primary_key: false,
            not_null: false,
            unique: false,
            default_now: false,
        }
    }

    /// Timestamp column that is required and defaults to the insertion time.
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self {
            column_type: ColumnType::Timestamp,
            not_null: true,
            default_now: true,
            ..Self::text(name)
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// Handle over the relational engine.
///
/// Clones share one lazily opened pool, so the store can be built before the database
/// is reachable and handed to every repository.
#[derive(Clone, Debug)]
pub struct Store {
    settings: ConnectionSettings,
    pool: Arc<OnceCell<DbPool>>,
}

impl Store {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings, pool: Arc::new(OnceCell::new()) }
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            settings: ConnectionSettings::new("<external pool>"),
            pool: Arc::new(OnceCell::new_with(Some(pool))),
        }
    }

    /// Opens the pool on first call; later calls return the same pool.
    pub async fn ensure_connected(&self) -> Result<&DbPool, ConnectionError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = connect_with_settings(&self.settings).await?;
                info!(
                    event_name = "system.store.connected",
                    correlation_id = "bootstrap",
                    in_memory = self.settings.is_in_memory(),
                    "database connection established"
                );
                Ok::<_, sqlx::Error>(pool)
            })
            .await
            .map_err(|source| ConnectionError { url: self.settings.url.clone(), source })
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(self.pool().await?)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(self.pool().await?)
        .await
        .map_err(storage_error)?;
        Ok(count > 0)
    }

    /// Fails if the table already exists; callers check [`Store::table_exists`] first.
    pub async fn create_table(&self, spec: &TableSpec) -> Result<(), StorageError> {
        let ddl = create_table_sql(spec)?;
        sqlx::query(&ddl).execute(self.pool().await?).await.map_err(storage_error)?;
        Ok(())
    }

    pub async fn insert(&self, table: &str, row: &[(&str, SqlValue)]) -> Result<u64, StorageError> {
        if row.is_empty() {
            return Err(StorageError::new(
                StorageErrorKind::Engine,
                "insert requires at least one column",
            ));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        builder.push(identifier(table)?).push(" (");
        for (index, (column, _)) in row.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(identifier(column)?);
        }
        builder.push(") VALUES (");
        for (index, (_, value)) in row.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(")");

        let result =
            builder.build().execute(self.pool().await?).await.map_err(storage_error)?;
        Ok(result.rows_affected())
    }

    /// Returns rows in insertion order.
    pub async fn select_all(&self, table: &str) -> Result<Vec<SqliteRow>, StorageError> {
        let sql = format!("SELECT * FROM {} ORDER BY rowid", identifier(table)?);
        let rows = sqlx::query(&sql).fetch_all(self.pool().await?).await.map_err(storage_error)?;
        Ok(rows)
    }

    pub async fn select_one(
        &self,
        table: &str,
        predicate: &Predicate,
    ) -> Result<Option<SqliteRow>, StorageError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
        builder.push(identifier(table)?);
        push_where(&mut builder, predicate)?;
        builder.push(" LIMIT 1");

        let row =
            builder.build().fetch_optional(self.pool().await?).await.map_err(storage_error)?;
        Ok(row)
    }

    pub async fn update(
        &self,
        table: &str,
        predicate: &Predicate,
        patch: &[(&str, SqlValue)],
    ) -> Result<u64, StorageError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE ");
        builder.push(identifier(table)?).push(" SET ");
        for (index, (column, value)) in patch.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(identifier(column)?).push(" = ");
            push_value(&mut builder, value);
        }
        push_where(&mut builder, predicate)?;

        let result =
            builder.build().execute(self.pool().await?).await.map_err(storage_error)?;
        Ok(result.rows_affected())
    }

    pub async fn delete_where(
        &self,
        table: &str,
        predicate: &Predicate,
    ) -> Result<u64, StorageError> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        builder.push(identifier(table)?);
        push_where(&mut builder, predicate)?;

        let result =
            builder.build().execute(self.pool().await?).await.map_err(storage_error)?;
        Ok(result.rows_affected())
    }

    async fn pool(&self) -> Result<&DbPool, StorageError> {
        self.ensure_connected().await.map_err(|error| {
            StorageError::new(StorageErrorKind::Connection, "database is unreachable")
                .with_source(error)
        })
    }
}

pub fn create_table_sql(spec: &TableSpec) -> Result<String, StorageError> {
    if spec.columns.is_empty() {
        return Err(StorageError::new(
            StorageErrorKind::Engine,
            format!("table `{}` has no columns", spec.name),
        ));
    }

    let mut columns = Vec::with_capacity(spec.columns.len());
    for column in &spec.columns {
        let mut definition = format!(
            "{} {}",
            identifier(&column.name)?,
            match column.column_type {
                ColumnType::Text => "TEXT",
                ColumnType::Timestamp => "TIMESTAMP",
            }
        );
        if column.primary_key {
            definition.push_str(" PRIMARY KEY");
        }
        if column.not_null {
            definition.push_str(" NOT NULL");
        }
        if column.unique {
            definition.push_str(" UNIQUE");
        }
        if column.default_now {
            definition.push_str(" DEFAULT CURRENT_TIMESTAMP");
        }
        columns.push(definition);
    }

    Ok(format!("CREATE TABLE {} ({})", identifier(&spec.name)?, columns.join(", ")))
}

/// Fixed-width RFC 3339 with nanoseconds, so text order matches time order.
pub fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Accepts RFC 3339 as well as SQLite's `CURRENT_TIMESTAMP` output.
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|error| {
            StorageError::decode(format!("invalid timestamp `{raw}`")).with_source(error)
        })
}

pub(crate) fn storage_error(error: sqlx::Error) -> StorageError {
    let kind = match &error {
        sqlx::Error::Database(database) => match database.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => StorageErrorKind::Constraint,
            _ if database.message().contains("constraint failed") => StorageErrorKind::Constraint,
            _ => StorageErrorKind::Engine,
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageErrorKind::Connection
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StorageErrorKind::Decode,
        _ => StorageErrorKind::Engine,
    };
    StorageError::new(kind, error.to_string()).with_source(error)
}

fn identifier(name: &str) -> Result<&str, StorageError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(name)
    } else {
        Err(StorageError::new(StorageErrorKind::Engine, format!("invalid SQL identifier `{name}`")))
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &SqlValue) {
    match value {
        SqlValue::Text(text) => builder.push_bind(text.clone()),
        SqlValue::Timestamp(timestamp) => builder.push_bind(encode_timestamp(timestamp)),
        SqlValue::Null => builder.push_bind(Option::<String>::None),
    };
}

fn push_where(
    builder: &mut QueryBuilder<'_, Sqlite>,
    predicate: &Predicate,
) -> Result<(), StorageError> {
    builder.push(" WHERE ").push(identifier(&predicate.column)?).push(" = ");
    push_value(builder, &predicate.value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use roster_core::errors::StorageErrorKind;
    use sqlx::Row;

    use super::{
        create_table_sql, decode_timestamp, encode_timestamp, ColumnSpec, Predicate, SqlValue,
        Store, TableSpec,
    };
    use crate::connection::{connect, ConnectionSettings};

    fn widgets() -> TableSpec {
        TableSpec {
            name: "widgets".to_string(),
            columns: vec![
                ColumnSpec::text("id").primary_key(),
                ColumnSpec::text("label").not_null().unique(),
                ColumnSpec::timestamp("created_at"),
            ],
        }
    }

    async fn store_with_widgets() -> Store {
        let store = Store::from_pool(connect("sqlite::memory:").await.expect("connect"));
        store.create_table(&widgets()).await.expect("create widgets");
        store
    }

    #[test]
    fn create_table_sql_renders_constraints() {
        let ddl = create_table_sql(&widgets()).expect("render ddl");

        assert_eq!(
            ddl,
            "CREATE TABLE widgets (id TEXT PRIMARY KEY, label TEXT NOT NULL UNIQUE, \
             created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)"
        );
    }

    #[test]
    fn identifiers_with_sql_metacharacters_are_refused() {
        let spec = TableSpec {
            name: "widgets; DROP TABLE customers".to_string(),
            columns: vec![ColumnSpec::text("id")],
        };

        let error = create_table_sql(&spec).expect_err("identifier should be rejected");
        assert_eq!(error.kind(), StorageErrorKind::Engine);
    }

    #[test]
    fn timestamps_round_trip_and_accept_sqlite_defaults() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single().expect("valid date")
            + chrono::Duration::nanoseconds(123_456_789);

        assert_eq!(decode_timestamp(&encode_timestamp(&instant)).expect("decode"), instant);
        assert_eq!(
            decode_timestamp("2024-05-01 12:30:00").expect("sqlite format"),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single().expect("valid date")
        );
        assert_eq!(
            decode_timestamp("yesterday").expect_err("garbage").kind(),
            StorageErrorKind::Decode
        );
    }

    #[tokio::test]
    async fn ensure_connected_reuses_the_same_pool() {
        let store = Store::new(ConnectionSettings::new("sqlite::memory:"));

        let first = store.ensure_connected().await.expect("first connect").clone();
        sqlx::query("CREATE TABLE marker (id TEXT)").execute(&first).await.expect("marker");

        let clone = store.clone();
        assert!(clone.table_exists("marker").await.expect("table check"));
        store.close().await;
    }

    #[tokio::test]
    async fn ensure_connected_reports_unreachable_database() {
        let store = Store::new(ConnectionSettings::new(
            "sqlite:///nonexistent-roster-dir/nested/roster.db",
        ));

        let error = store.ensure_connected().await.expect_err("path should be unreachable");
        assert!(error.to_string().contains("nonexistent-roster-dir"));

        let storage = store.table_exists("customers").await.expect_err("ops should fail too");
        assert_eq!(storage.kind(), StorageErrorKind::Connection);
    }

    #[tokio::test]
    async fn table_exists_tracks_creation() {
        let store = Store::from_pool(connect("sqlite::memory:").await.expect("connect"));

        assert!(!store.table_exists("widgets").await.expect("check"));
        store.create_table(&widgets()).await.expect("create");
        assert!(store.table_exists("widgets").await.expect("check"));

        let error = store.create_table(&widgets()).await.expect_err("second create fails");
        assert_eq!(error.kind(), StorageErrorKind::Engine);
    }

    #[tokio::test]
    async fn row_primitives_insert_select_update_delete() {
        let store = store_with_widgets().await;

        for id in ["w-2", "w-1"] {
            store
                .insert("widgets", &[("id", id.into()), ("label", format!("label {id}").into())])
                .await
                .expect("insert");
        }

        let rows = store.select_all("widgets").await.expect("select all");
        let ids: Vec<String> = rows.iter().map(|row| row.get::<String, _>("id")).collect();
        assert_eq!(ids, vec!["w-2".to_string(), "w-1".to_string()]);

        let row = store
            .select_one("widgets", &Predicate::eq("id", "w-1"))
            .await
            .expect("select one")
            .expect("row should exist");
        let created_at: String = row.get("created_at");
        assert!(decode_timestamp(&created_at).is_ok(), "default timestamp should decode");

        let updated = store
            .update("widgets", &Predicate::eq("id", "w-1"), &[("label", "renamed".into())])
            .await
            .expect("update");
        assert_eq!(updated, 1);

        let missing = store
            .update("widgets", &Predicate::eq("id", "nope"), &[("label", "x".into())])
            .await
            .expect("update on missing row");
        assert_eq!(missing, 0);

        let by_id = Predicate::eq("id", "w-1");
        assert_eq!(store.delete_where("widgets", &by_id).await.expect("delete"), 1);
        assert_eq!(store.delete_where("widgets", &by_id).await.expect("delete again"), 0);
        assert!(store
            .select_one("widgets", &Predicate::eq("id", "w-1"))
            .await
            .expect("select one")
            .is_none());
    }

    #[tokio::test]
    async fn unique_and_primary_key_violations_are_constraint_errors() {
        let store = store_with_widgets().await;
        store
            .insert("widgets", &[("id", "w-1".into()), ("label", "same".into())])
            .await
            .expect("first insert");

        let duplicate_label = store
            .insert("widgets", &[("id", "w-2".into()), ("label", "same".into())])
            .await
            .expect_err("duplicate label");
        assert_eq!(duplicate_label.kind(), StorageErrorKind::Constraint);

        let duplicate_id = store
            .insert("widgets", &[("id", "w-1".into()), ("label", "other".into())])
            .await
            .expect_err("duplicate id");
        assert_eq!(duplicate_id.kind(), StorageErrorKind::Constraint);

        let null_label = store
            .insert("widgets", &[("id", "w-3".into()), ("label", SqlValue::Null)])
            .await
            .expect_err("null label");
        assert_eq!(null_label.kind(), StorageErrorKind::Constraint);
    }
}
