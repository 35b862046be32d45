mod change;
mod config;
mod error;
mod error_code;
mod init_tracing;
mod migrations;
mod repo;
mod runner;
mod schema;

use std::path::Path;

use self::{
    config::{Configuration, DatabaseOperation, Operation},
    error::{Error, MigrateError},
    init_tracing::init_tracing,
    migrations::Migration,
    repo::{mysql::MysqlRepo, SchemaRepo},
    runner::{MigrationStatus, State},
    schema::ColumnDescription,
};

pub use self::config::KpiMigrateConfiguration;

impl KpiMigrateConfiguration {
    /// Build the configuration from the command line, environment and config file
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    pub fn install_tracing(&self) -> color_eyre::Result<()> {
        init_tracing(&self.config.tracing)
    }

    pub async fn run(self) -> color_eyre::Result<()> {
        let KpiMigrateConfiguration { config, operation } = self;

        match run_operation(&config, operation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(code = %e.error_code(), "{}", e.root_cause());
                Err(e.into_report())
            }
        }
    }
}

async fn run_operation(config: &Configuration, operation: Operation) -> Result<(), Error> {
    let migrations = migrations::registry()?;

    let operation = match operation {
        Operation::Script { version, output } => {
            return write_scripts(&migrations, version, output.as_deref()).await
        }
        Operation::Database(operation) => operation,
    };

    let mut repo =
        MysqlRepo::connect(&config.database, &config.migrations.ledger_table).await?;

    let res = match repo.health_check().await {
        Ok(()) => run_with_repo(&mut repo, &migrations, operation).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = repo.close().await {
        tracing::warn!("Failed to close database connection: {e}");
    }

    res
}

async fn run_with_repo<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
    operation: DatabaseOperation,
) -> Result<(), Error> {
    match operation {
        DatabaseOperation::Migrate {
            target,
            dry_run: false,
        } => {
            let applied = runner::migrate(repo, migrations, target).await?;

            for entry in &applied {
                println!("applied {:03} {}", entry.version, entry.name);
            }
            if applied.is_empty() {
                println!("nothing to apply");
            }
        }
        DatabaseOperation::Migrate {
            target,
            dry_run: true,
        } => {
            let planned = runner::dry_run(repo, migrations, target).await?;

            for entry in &planned.applied {
                println!("would apply {:03} {}", entry.version, entry.name);
            }
            if planned.applied.is_empty() {
                println!("nothing to apply");
            }

            for (table, columns) in &planned.tables {
                println!();
                println!("{table} after migrating:");
                print_columns(columns);
            }
        }
        DatabaseOperation::Status { json } => {
            let statuses = runner::status(repo, migrations).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    println!("{}", status_line(status));
                }
            }
        }
        DatabaseOperation::Baseline { target } => {
            let recorded = runner::baseline(repo, migrations, target).await?;

            for entry in &recorded {
                println!("recorded {:03} {}", entry.version, entry.name);
            }
            if recorded.is_empty() {
                println!("nothing to record");
            }
        }
        DatabaseOperation::Verify => {
            let verifications = runner::verify(repo, migrations).await?;

            let mut failed = 0;
            for verification in &verifications {
                if verification.problems.is_empty() {
                    println!("ok       {:03} {}", verification.version, verification.name);
                } else {
                    failed += 1;
                    for problem in &verification.problems {
                        println!(
                            "mismatch {:03} {}: {problem}",
                            verification.version, verification.name
                        );
                    }
                }
            }

            if failed > 0 {
                return Err(MigrateError::Verify(failed).into());
            }
        }
        DatabaseOperation::Describe { table } => {
            let columns = repo.describe(&table).await?;
            print_columns(&columns);
        }
    }

    Ok(())
}

fn status_line(status: &MigrationStatus) -> String {
    let state = match &status.state {
        State::Applied {
            applied_on,
            checksum_matches: true,
        } => format!("applied {applied_on}"),
        State::Applied {
            applied_on,
            checksum_matches: false,
        } => format!("applied {applied_on} (checksum differs)"),
        State::Pending => String::from("pending"),
    };

    format!("{:03} {:<32} {state}", status.version, status.name)
}

fn print_columns(columns: &[ColumnDescription]) {
    println!(
        "{:<24} {:<16} {:<4} {:<4} {:<12} Extra",
        "Field", "Type", "Null", "Key", "Default"
    );

    for column in columns {
        println!(
            "{:<24} {:<16} {:<4} {:<4} {:<12} {}",
            column.field,
            column.ty.to_string(),
            if column.null { "YES" } else { "NO" },
            column.key,
            column.default.as_deref().unwrap_or("NULL"),
            column.extra,
        );
    }
}

async fn write_scripts(
    migrations: &[Migration],
    version: Option<u32>,
    output: Option<&Path>,
) -> Result<(), Error> {
    let selected = migrations
        .iter()
        .filter(|m| version.map_or(true, |version| m.version == version))
        .collect::<Vec<_>>();

    if selected.is_empty() {
        if let Some(version) = version {
            return Err(runner::RunnerError::UnknownTarget(version).into());
        }
    }

    for migration in selected {
        match output {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(migration.file_name());
                tokio::fs::write(&path, migration.script()).await?;
                tracing::info!("Wrote {}", path.display());
            }
            None => print!("{}", migration.script()),
        }
    }

    Ok(())
}
