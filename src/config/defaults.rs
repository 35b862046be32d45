use crate::config::primitives::{LogFormat, Targets};

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Defaults {
    database: DatabaseDefaults,
    migrations: MigrationsDefaults,
    tracing: TracingDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct DatabaseDefaults {
    host: String,
    port: u16,
    name: String,
    user: String,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MigrationsDefaults {
    ledger_table: String,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct TracingDefaults {
    logging: LoggingDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct LoggingDefaults {
    format: LogFormat,
    targets: Targets,
    log_spans: bool,
}

impl Default for DatabaseDefaults {
    fn default() -> Self {
        DatabaseDefaults {
            host: String::from("localhost"),
            port: 3306,
            name: String::from("kpi_db"),
            user: String::from("root"),
        }
    }
}

impl Default for MigrationsDefaults {
    fn default() -> Self {
        MigrationsDefaults {
            ledger_table: String::from("schema_migrations"),
        }
    }
}

impl Default for LoggingDefaults {
    fn default() -> Self {
        LoggingDefaults {
            format: LogFormat::Normal,
            targets: "warn,kpi_migrate=info"
                .parse()
                .expect("Valid targets string"),
            log_spans: false,
        }
    }
}
