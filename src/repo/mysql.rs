
use mysql_async::{prelude::Queryable, Conn, Opts, OptsBuilder, TxOpts};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::Instrument;

use crate::{
    config,
    migrations::Migration,
    schema::{quote_ident, ColumnDescription},
};

use super::{AppliedMigration, LedgerError, RepoError, SchemaRepo};

const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_BAD_NULL_ERROR: u16 = 1048;
const ER_BAD_FIELD_ERROR: u16 = 1054;
const ER_DUP_FIELDNAME: u16 = 1060;
const ER_TABLEACCESS_DENIED_ERROR: u16 = 1142;
const ER_NO_SUCH_TABLE: u16 = 1146;
const ER_DATA_TOO_LONG: u16 = 1406;

pub(crate) struct MysqlRepo {
    conn: Conn,
    ledger_table: String,
}

impl std::fmt::Debug for MysqlRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlRepo")
            .field("connection_id", &self.conn.id())
            .field("ledger_table", &self.ledger_table)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to connect to {host}:{port}")]
pub(crate) struct ConnectMysqlError {
    host: String,
    port: u16,
    #[source]
    source: RepoError,
}

impl ConnectMysqlError {
    pub(crate) const fn error_code(&self) -> crate::error_code::ErrorCode {
        self.source.error_code()
    }
}

/// Text between the first pair of single quotes in a server message
fn quoted(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once('\'')?;
    let (inner, _) = rest.split_once('\'')?;

    Some(inner)
}

fn classify(error: mysql_async::Error) -> RepoError {
    let mysql_async::Error::Server(server) = &error else {
        return RepoError::Mysql(error);
    };

    let name = quoted(&server.message).map(String::from);

    match (server.code, name) {
        (ER_DUP_FIELDNAME, Some(column)) => RepoError::DuplicateColumn { column },
        (ER_BAD_FIELD_ERROR, Some(column)) => RepoError::UnknownColumn { column },
        (ER_DATA_TOO_LONG, Some(column)) => RepoError::DataTooLong { column },
        (ER_BAD_NULL_ERROR, Some(column)) => RepoError::NotNull { column },
        (ER_NO_SUCH_TABLE, Some(qualified)) => RepoError::NoSuchTable {
            // reported as 'database.table'
            table: qualified
                .rsplit_once('.')
                .map(|(_, table)| table.to_string())
                .unwrap_or(qualified),
        },
        (ER_DBACCESS_DENIED_ERROR | ER_ACCESS_DENIED_ERROR | ER_TABLEACCESS_DENIED_ERROR, _) => {
            RepoError::AccessDenied(server.message.clone())
        }
        _ => RepoError::Mysql(error),
    }
}

fn parse_applied_on(applied_on: String) -> Result<OffsetDateTime, RepoError> {
    OffsetDateTime::parse(&applied_on, &Rfc3339)
        .map_err(|e| RepoError::Ledger(LedgerError::AppliedOn(applied_on, e)))
}

type LedgerRow = (u32, String, String, String);

fn ledger_row((version, name, checksum, applied_on): LedgerRow) -> Result<AppliedMigration, RepoError> {
    Ok(AppliedMigration {
        version,
        name,
        checksum,
        applied_on: parse_applied_on(applied_on)?,
    })
}

type ColumnRow = (String, String, String, String, Option<String>, String);

fn column_description(
    table: &str,
    (field, ty, null, key, default, extra): ColumnRow,
) -> Result<ColumnDescription, RepoError> {
    let ty = ty.parse().map_err(|source| RepoError::ColumnType {
        table: table.to_string(),
        column: field.clone(),
        source,
    })?;

    Ok(ColumnDescription {
        field,
        ty,
        null: null == "YES",
        key,
        // MariaDB reports a missing default as the literal NULL
        default: default.filter(|d| d != "NULL"),
        extra,
    })
}

impl MysqlRepo {
    pub(crate) async fn connect(
        database: &config::Database,
        ledger_table: &str,
    ) -> Result<Self, ConnectMysqlError> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(database.host.clone())
            .tcp_port(database.port)
            .user(Some(database.user.clone()))
            .pass(database.password.clone())
            .db_name(Some(database.name.clone()));

        Self::connect_with(opts.into(), ledger_table)
            .await
            .map_err(|source| ConnectMysqlError {
                host: database.host.clone(),
                port: database.port,
                source,
            })
    }

    pub(crate) async fn connect_with(opts: Opts, ledger_table: &str) -> Result<Self, RepoError> {
        let conn = Conn::new(opts)
            .instrument(tracing::info_span!("mysql-connect"))
            .await
            .map_err(classify)?;

        tracing::debug!("Connected with id {}", conn.id());

        Ok(MysqlRepo {
            conn,
            ledger_table: ledger_table.to_string(),
        })
    }

    pub(crate) async fn close(self) -> Result<(), RepoError> {
        self.conn.disconnect().await.map_err(classify)
    }

    fn select_ledger(&self) -> String {
        format!(
            "SELECT version, name, checksum, DATE_FORMAT(applied_on, '%Y-%m-%dT%H:%i:%sZ') FROM {}",
            quote_ident(&self.ledger_table)
        )
    }

    async fn ledger_entry(&mut self, version: u32) -> Result<AppliedMigration, RepoError> {
        let query = format!("{} WHERE version = ?", self.select_ledger());

        let row: Option<LedgerRow> = self
            .conn
            .exec_first(query, (version,))
            .await
            .map_err(classify)?;

        let row = row.ok_or(RepoError::Ledger(LedgerError::Missing(version)))?;

        ledger_row(row)
    }

    fn insert_ledger(&self) -> String {
        format!(
            "INSERT INTO {} (version, name, checksum, applied_on) VALUES (?, ?, ?, UTC_TIMESTAMP())",
            quote_ident(&self.ledger_table)
        )
    }

    async fn is_recorded(&mut self, version: u32) -> Result<bool, RepoError> {
        Ok(self.applied().await?.iter().any(|a| a.version == version))
    }
}

#[async_trait::async_trait(?Send)]
impl SchemaRepo for MysqlRepo {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn health_check(&mut self) -> Result<(), RepoError> {
        self.conn.query_drop("SELECT 1").await.map_err(classify)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn ensure_ledger(&mut self) -> Result<(), RepoError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INT UNSIGNED NOT NULL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                checksum CHAR(64) NOT NULL,
                applied_on DATETIME NOT NULL
            )",
            quote_ident(&self.ledger_table)
        );

        self.conn.query_drop(query).await.map_err(classify)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, RepoError> {
        let query = format!("{} ORDER BY version", self.select_ledger());

        let rows: Vec<LedgerRow> = match self.conn.query(query).await.map_err(classify) {
            Ok(rows) => rows,
            // nothing has been applied before the ledger exists
            Err(RepoError::NoSuchTable { table }) if table == self.ledger_table => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e),
        };

        rows.into_iter().map(ledger_row).collect()
    }

    #[tracing::instrument(skip(self, migration), fields(version = migration.version, name = migration.name))]
    async fn apply(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError> {
        if self.is_recorded(migration.version).await? {
            return Err(RepoError::AlreadyRecorded(migration.version));
        }

        let insert = self.insert_ledger();

        let mut tx = self
            .conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(classify)?;

        for statement in migration.statements() {
            tracing::info!("Executing {statement}");
            // dropping tx on error rolls back whatever the server has not committed implicitly
            tx.query_drop(statement.as_str()).await.map_err(classify)?;
        }

        tx.exec_drop(
            insert,
            (migration.version, migration.name, migration.checksum()),
        )
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        self.ledger_entry(migration.version).await
    }

    #[tracing::instrument(skip(self, migration), fields(version = migration.version, name = migration.name))]
    async fn record(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError> {
        if self.is_recorded(migration.version).await? {
            return Err(RepoError::AlreadyRecorded(migration.version));
        }

        let insert = self.insert_ledger();

        self.conn
            .exec_drop(
                insert,
                (migration.version, migration.name, migration.checksum()),
            )
            .await
            .map_err(classify)?;

        self.ledger_entry(migration.version).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn describe(&mut self, table: &str) -> Result<Vec<ColumnDescription>, RepoError> {
        let rows: Vec<ColumnRow> = self
            .conn
            .exec(
                "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, COLUMN_DEFAULT, EXTRA
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION",
                (table,),
            )
            .await
            .map_err(classify)?;

        if rows.is_empty() {
            return Err(RepoError::NoSuchTable {
                table: table.to_string(),
            });
        }

        rows.into_iter()
            .map(|row| column_description(table, row))
            .collect()
    }
}
