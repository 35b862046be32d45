use crate::config::primitives::{LogFormat, Targets};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            db_host,
            db_port,
            db_name,
            db_user,
            db_password,
            db_pass,
            ledger_table,
            log_format,
            log_targets,
            log_spans,
            save_to,
            command,
        } = self;

        let database = Database {
            host: db_host,
            port: db_port,
            name: db_name,
            user: db_user,
            password: db_password.or(db_pass),
        }
        .set();

        let migrations = Migrations { ledger_table }.set();

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets,
                log_spans: log_spans.then_some(true),
            }
            .set(),
        }
        .set();

        let operation = match command {
            Command::Migrate(Migrate { target, dry_run }) => {
                Operation::Database(DatabaseOperation::Migrate { target, dry_run })
            }
            Command::Status(Status { json }) => {
                Operation::Database(DatabaseOperation::Status { json })
            }
            Command::Baseline(Baseline { target }) => {
                Operation::Database(DatabaseOperation::Baseline { target })
            }
            Command::Verify => Operation::Database(DatabaseOperation::Verify),
            Command::Describe(Describe { table }) => {
                Operation::Database(DatabaseOperation::Describe { table })
            }
            Command::Script(Script { version, output }) => Operation::Script { version, output },
        };

        Output {
            config_format: ConfigFormat {
                database,
                migrations,
                tracing,
            },
            operation,
            save_to,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) operation: Operation,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    Script {
        version: Option<u32>,
        output: Option<PathBuf>,
    },
    Database(DatabaseOperation),
}

/// Operations run against a live connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DatabaseOperation {
    Migrate {
        target: Option<u32>,
        dry_run: bool,
    },
    Status {
        json: bool,
    },
    Baseline {
        target: Option<u32>,
    },
    Verify,
    Describe {
        table: String,
    },
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<Database>,
    #[serde(skip_serializing_if = "Option::is_none")]
    migrations: Option<Migrations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracing: Option<Tracing>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Database {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl Database {
    fn set(self) -> Option<Self> {
        let any_set = self.host.is_some()
            || self.port.is_some()
            || self.name.is_some()
            || self.user.is_some()
            || self.password.is_some();

        if any_set {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Migrations {
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger_table: Option<String>,
}

impl Migrations {
    fn set(self) -> Option<Self> {
        if self.ledger_table.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    #[serde(skip_serializing_if = "Option::is_none")]
    logging: Option<Logging>,
}

impl Tracing {
    fn set(self) -> Option<Self> {
        if self.logging.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_spans: Option<bool>,
}

impl Logging {
    fn set(self) -> Option<Self> {
        if self.format.is_some() || self.targets.is_some() || self.log_spans.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

/// Apply and inspect schema migrations of the KPI dashboard database
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the kpi-migrate configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Hostname of the MariaDB/MySQL server
    #[arg(long, env = "DB_HOST")]
    db_host: Option<String>,
    /// Port of the MariaDB/MySQL server
    #[arg(long, env = "DB_PORT")]
    db_port: Option<u16>,
    /// Database holding the users table
    #[arg(long, env = "DB_NAME")]
    db_name: Option<String>,
    /// User to connect as, needs ALTER privileges to apply migrations
    #[arg(long, env = "DB_USER")]
    db_user: Option<String>,
    /// Password for the database user
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,
    /// Older name for the database password variable
    #[arg(long, env = "DB_PASS", hide = true, hide_env_values = true)]
    db_pass: Option<String>,

    /// Table recording which migrations have been applied
    #[arg(long)]
    ledger_table: Option<String>,

    /// Format of logs printed to stderr
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stderr, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stderr
    #[arg(long)]
    log_spans: bool,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Apply pending migrations in version order
    Migrate(Migrate),

    /// List every known migration and whether it has been applied
    Status(Status),

    /// Record migrations that were already applied by hand, without running them
    Baseline(Baseline),

    /// Check that applied migrations are still reflected in the schema
    Verify,

    /// Print the columns of a table, like DESCRIBE
    Describe(Describe),

    /// Print or write migrations as standalone SQL scripts
    Script(Script),
}

#[derive(Clone, Debug, Parser)]
struct Migrate {
    /// Stop after applying this version
    #[arg(long)]
    target: Option<u32>,

    /// Run against an in-memory copy of the affected tables and report the result
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Debug, Parser)]
struct Status {
    /// Print the status as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Debug, Parser)]
struct Baseline {
    /// Stop after recording this version
    #[arg(long)]
    target: Option<u32>,
}

#[derive(Clone, Debug, Parser)]
struct Describe {
    /// The table to describe
    table: String,
}

#[derive(Clone, Debug, Parser)]
struct Script {
    /// Only render this version
    #[arg(long)]
    version: Option<u32>,

    /// Directory to write the scripts into, instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}
