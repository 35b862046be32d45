pub(crate) mod memory;
pub(crate) mod mysql;

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{error_code::ErrorCode, migrations::Migration, schema::ColumnDescription};

/// A row of the ledger table
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) struct AppliedMigration {
    pub(crate) version: u32,
    pub(crate) name: String,
    pub(crate) checksum: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) applied_on: OffsetDateTime,
}

/// Column layout of a set of tables, plus the ledger contents
#[derive(Clone, Debug, Default)]
pub(crate) struct Snapshot {
    pub(crate) tables: BTreeMap<String, Vec<ColumnDescription>>,
    pub(crate) applied: Vec<AppliedMigration>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Table {table} doesn't exist")]
    NoSuchTable { table: String },

    #[error("Duplicate column name {column}")]
    DuplicateColumn { column: String },

    #[error("Unknown column {column}")]
    UnknownColumn { column: String },

    #[error("Data too long for column {column}")]
    DataTooLong { column: String },

    #[error("Column {column} cannot be null")]
    NotNull { column: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Migration {0} is already recorded")]
    AlreadyRecorded(u32),

    #[error("Invalid ledger row")]
    Ledger(#[source] LedgerError),

    #[error("Couldn't read the type of {table}.{column}")]
    ColumnType {
        table: String,
        column: String,
        #[source]
        source: crate::schema::ParseColumnTypeError,
    },

    #[error("Error in database")]
    Mysql(#[source] mysql_async::Error),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum LedgerError {
    #[error("Migration {0} was not found after recording it")]
    Missing(u32),

    #[error("Couldn't parse applied_on {0:?}")]
    AppliedOn(String, #[source] time::error::Parse),
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoSuchTable { .. } => ErrorCode::NO_SUCH_TABLE,
            Self::DuplicateColumn { .. } => ErrorCode::DUPLICATE_COLUMN,
            Self::UnknownColumn { .. } => ErrorCode::UNKNOWN_COLUMN,
            Self::DataTooLong { .. } => ErrorCode::DATA_TOO_LONG,
            Self::NotNull { .. } => ErrorCode::NOT_NULL,
            Self::AccessDenied(_) => ErrorCode::ACCESS_DENIED,
            Self::AlreadyRecorded(_) => ErrorCode::ALREADY_RECORDED,
            Self::Ledger(_) => ErrorCode::INVALID_LEDGER,
            Self::ColumnType { .. } => ErrorCode::INVALID_COLUMN_TYPE,
            Self::Mysql(_) => ErrorCode::MYSQL_ERROR,
        }
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait SchemaRepo {
    async fn health_check(&mut self) -> Result<(), RepoError>;

    /// Create the ledger table when it is missing
    async fn ensure_ledger(&mut self) -> Result<(), RepoError>;

    /// Ledger rows ordered by version
    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, RepoError>;

    /// Execute every statement of `migration`, then record it in the ledger.
    ///
    /// Nothing is recorded when a statement fails.
    async fn apply(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError>;

    /// Record `migration` in the ledger without executing it
    async fn record(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError>;

    async fn describe(&mut self, table: &str) -> Result<Vec<ColumnDescription>, RepoError>;

    async fn snapshot(&mut self, tables: &[&str]) -> Result<Snapshot, RepoError> {
        let mut snapshot = Snapshot::default();

        for table in tables {
            match self.describe(table).await {
                Ok(columns) => {
                    snapshot.tables.insert(table.to_string(), columns);
                }
                // a dry run should report the missing table the same way a real run does
                Err(RepoError::NoSuchTable { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        snapshot.applied = self.applied().await?;

        Ok(snapshot)
    }
}
