//! Generic repository over entity metadata.
//!
//! An [`Entity`] declares where it lives (table name and column projection) and
//! which payloads create and change it. [`Repository`] turns that metadata into
//! the standard find/create/update/delete contract, each operation available as
//! a sentinel variant (`Ok(None)` on a miss) and an `_or_fail` variant.
//!
//! Every operation accepts an optional transaction connection. With `Some` the
//! statement runs on that connection and nothing is committed; with `None` it
//! runs on the pool as a single autocommitted statement.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::repositories::transaction::{TransactionRunner, TxFuture};

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Columns owned by the repository. Values supplied by callers are dropped.
const PROTECTED_COLUMNS: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

/// A column value bound into a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    BigInt(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// A payload that can be written to an entity's table.
pub trait EntityFields {
    /// Physical column names paired with the values to write.
    fn fields(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Storage metadata for a row-backed record with `id`, `created_at` and
/// `updated_at` columns.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Target table name.
    const TABLE: &'static str;
    /// Full column projection returned by every read and write.
    const COLUMNS: &'static [&'static str];
    /// Insert payload.
    type New: EntityFields + Send + Sync;
    /// Partial update payload.
    type Changes: EntityFields + Send + Sync;
}

/// Table-qualified projection, e.g. `users.id, users.email`.
pub fn projection<E: Entity>() -> String {
    E::COLUMNS
        .iter()
        .map(|column| format!("{}.{}", E::TABLE, column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn writable_fields(fields: Vec<(&'static str, SqlValue)>) -> Vec<(&'static str, SqlValue)> {
    fields
        .into_iter()
        .filter(|(column, _)| !PROTECTED_COLUMNS.contains(column))
        .collect()
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: SqlValue) {
    match value {
        SqlValue::Text(v) => builder.push_bind(v),
        SqlValue::BigInt(v) => builder.push_bind(v),
        SqlValue::Bool(v) => builder.push_bind(v),
        SqlValue::Timestamp(v) => builder.push_bind(v),
    };
}

pub struct Repository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn transactions(&self) -> TransactionRunner {
        TransactionRunner::new(self.pool.clone())
    }

    pub async fn find(
        &self,
        id: i64,
        tx: Option<&mut PgConnection>,
    ) -> Result<Option<E>, AppError> {
        let mut builder = Self::select_where(ID_COLUMN);
        builder.push_bind(id).push(" LIMIT 1");
        self.fetch_optional(tx, builder).await
    }

    pub async fn find_or_fail(
        &self,
        id: i64,
        tx: Option<&mut PgConnection>,
    ) -> Result<E, AppError> {
        self.find(id, tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} record {} not found", E::TABLE, id)))
    }

    /// Soft variant of [`Repository::create_or_fail`].
    ///
    /// Rejections caused by the payload (constraint or data violations, no row
    /// returned) become `Ok(None)`. Infrastructure failures still propagate.
    /// Inside a caller transaction a rejected insert leaves that transaction
    /// aborted, so the caller must roll back.
    pub async fn create(
        &self,
        fields: &E::New,
        tx: Option<&mut PgConnection>,
    ) -> Result<Option<E>, AppError> {
        match self.create_or_fail(fields, tx).await {
            Ok(entity) => Ok(Some(entity)),
            Err(err) if err.is_rejected_input() => {
                tracing::warn!(table = E::TABLE, error = %err, "create rejected");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn create_or_fail(
        &self,
        fields: &E::New,
        tx: Option<&mut PgConnection>,
    ) -> Result<E, AppError> {
        let builder = Self::insert_statement(fields.fields(), Utc::now());
        self.fetch_optional(tx, builder)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Could not create {} record", E::TABLE)))
    }

    pub async fn update(
        &self,
        id: i64,
        changes: &E::Changes,
        tx: Option<&mut PgConnection>,
    ) -> Result<Option<E>, AppError> {
        let builder = Self::update_statement(id, changes.fields(), Utc::now());
        self.fetch_optional(tx, builder).await
    }

    pub async fn update_or_fail(
        &self,
        id: i64,
        changes: &E::Changes,
        tx: Option<&mut PgConnection>,
    ) -> Result<E, AppError> {
        self.update(id, changes, tx)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("{} record {} not updated", E::TABLE, id)))
    }

    /// Deletes the row and returns its last state.
    pub async fn delete(
        &self,
        id: i64,
        tx: Option<&mut PgConnection>,
    ) -> Result<Option<E>, AppError> {
        let builder = Self::delete_statement(id);
        self.fetch_optional(tx, builder).await
    }

    pub async fn delete_or_fail(
        &self,
        id: i64,
        tx: Option<&mut PgConnection>,
    ) -> Result<E, AppError> {
        self.delete(id, tx)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("{} record {} not deleted", E::TABLE, id)))
    }

    /// Runs `body` in a new transaction.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        self.transactions().run(body).await
    }

    /// Runs `body` in `tx` when given, otherwise in a new transaction.
    pub async fn with_transaction<T, F>(
        &self,
        tx: Option<&mut PgConnection>,
        body: F,
    ) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        self.transactions().continue_or_start_new(tx, body).await
    }

    /// `SELECT <projection> FROM <table> WHERE <table>.<column> = ` ready for a bind.
    pub(crate) fn select_where(column: &str) -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE {}.{} = ",
            projection::<E>(),
            E::TABLE,
            E::TABLE,
            column
        ))
    }

    pub(crate) fn insert_statement(
        fields: Vec<(&'static str, SqlValue)>,
        now: DateTime<Utc>,
    ) -> QueryBuilder<'static, Postgres> {
        let fields = writable_fields(fields);

        let mut columns: Vec<&str> = fields.iter().map(|(column, _)| *column).collect();
        columns.push(CREATED_AT_COLUMN);
        columns.push(UPDATED_AT_COLUMN);

        let mut builder = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            E::TABLE,
            columns.join(", ")
        ));
        for (_, value) in fields {
            push_value(&mut builder, value);
            builder.push(", ");
        }
        builder.push_bind(now).push(", ").push_bind(now);
        builder.push(") RETURNING ").push(projection::<E>());
        builder
    }

    pub(crate) fn update_statement(
        id: i64,
        changes: Vec<(&'static str, SqlValue)>,
        now: DateTime<Utc>,
    ) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
        for (column, value) in writable_fields(changes) {
            builder.push(column).push(" = ");
            push_value(&mut builder, value);
            builder.push(", ");
        }
        builder.push(UPDATED_AT_COLUMN).push(" = ").push_bind(now);
        builder
            .push(" WHERE ")
            .push(ID_COLUMN)
            .push(" = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(projection::<E>());
        builder
    }

    pub(crate) fn delete_statement(id: i64) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "DELETE FROM {} WHERE {} = ",
            E::TABLE,
            ID_COLUMN
        ));
        builder.push_bind(id).push(" RETURNING ").push(projection::<E>());
        builder
    }

    /// Executes a statement that yields at most one row of `E`, on `tx` when
    /// given and on the pool otherwise.
    pub(crate) async fn fetch_optional(
        &self,
        tx: Option<&mut PgConnection>,
        mut builder: QueryBuilder<'static, Postgres>,
    ) -> Result<Option<E>, AppError> {
        tracing::debug!(
            table = E::TABLE,
            sql = builder.sql(),
            in_transaction = tx.is_some(),
            "executing statement"
        );
        let query = builder.build_query_as::<E>();
        let row = match tx {
            Some(conn) => query.fetch_optional(conn).await?,
            None => query.fetch_optional(&self.pool).await?,
        };
        Ok(row)
    }
}
