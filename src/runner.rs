#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{
    change::Unsatisfied,
    error_code::ErrorCode,
    migrations::Migration,
    repo::{memory::MemoryRepo, AppliedMigration, RepoError, SchemaRepo},
    schema::ColumnDescription,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum RunnerError {
    #[error("Error in repo")]
    Repo(#[from] RepoError),

    #[error("Migration {version} failed")]
    Apply {
        version: u32,
        #[source]
        source: RepoError,
    },

    #[error("Migration {version} was applied with checksum {applied} but is now {current}")]
    ChecksumMismatch {
        version: u32,
        applied: String,
        current: String,
    },

    #[error("Migration {0} is in the ledger but unknown to this build")]
    UnknownApplied(u32),

    #[error("Migration {0} is pending but a later migration is already applied")]
    Missing(u32),

    #[error("Target {0} is not a known migration")]
    UnknownTarget(u32),

    #[error("Migration {version} can't be recorded, {reason}")]
    NotSatisfied { version: u32, reason: Unsatisfied },
}

impl RunnerError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Repo(e) | Self::Apply { source: e, .. } => e.error_code(),
            Self::ChecksumMismatch { .. } => ErrorCode::CHECKSUM_MISMATCH,
            Self::UnknownApplied(_) => ErrorCode::UNKNOWN_APPLIED,
            Self::Missing(_) => ErrorCode::MISSING_MIGRATION,
            Self::UnknownTarget(_) => ErrorCode::UNKNOWN_TARGET,
            Self::NotSatisfied { .. } => ErrorCode::NOT_SATISFIED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "state")]
pub(crate) enum State {
    Applied {
        #[serde(with = "time::serde::rfc3339")]
        applied_on: OffsetDateTime,
        checksum_matches: bool,
    },
    Pending,
}

#[derive(Clone, Debug, serde::Serialize)]
pub(crate) struct MigrationStatus {
    pub(crate) version: u32,
    pub(crate) name: &'static str,
    #[serde(flatten)]
    pub(crate) state: State,
}

#[derive(Debug)]
pub(crate) struct DryRun {
    pub(crate) applied: Vec<AppliedMigration>,
    pub(crate) tables: BTreeMap<String, Vec<ColumnDescription>>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct Verification {
    pub(crate) version: u32,
    pub(crate) name: String,
    pub(crate) problems: Vec<String>,
}

/// Decide which migrations to run, refusing a ledger that disagrees with the registry
fn plan<'a>(
    migrations: &'a [Migration],
    applied: &[AppliedMigration],
    target: Option<u32>,
) -> Result<Vec<&'a Migration>, RunnerError> {
    for entry in applied {
        let Some(migration) = migrations.iter().find(|m| m.version == entry.version) else {
            return Err(RunnerError::UnknownApplied(entry.version));
        };

        let current = migration.checksum();
        if current != entry.checksum {
            return Err(RunnerError::ChecksumMismatch {
                version: entry.version,
                applied: entry.checksum.clone(),
                current,
            });
        }
    }

    if let Some(target) = target {
        if !migrations.iter().any(|m| m.version == target) {
            return Err(RunnerError::UnknownTarget(target));
        }
    }

    let latest = applied.iter().map(|a| a.version).max().unwrap_or(0);

    let pending = migrations
        .iter()
        .filter(|m| !applied.iter().any(|a| a.version == m.version))
        .collect::<Vec<_>>();

    if let Some(missing) = pending.iter().find(|m| m.version < latest) {
        return Err(RunnerError::Missing(missing.version));
    }

    Ok(pending
        .into_iter()
        .filter(|m| target.map_or(true, |target| m.version <= target))
        .collect())
}

#[tracing::instrument(skip_all)]
pub(crate) async fn status<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
) -> Result<Vec<MigrationStatus>, RunnerError> {
    let applied = repo.applied().await?;

    for unknown in applied
        .iter()
        .filter(|a| !migrations.iter().any(|m| m.version == a.version))
    {
        tracing::warn!(
            "Ledger holds migration {} ({}) which this build doesn't know",
            unknown.version,
            unknown.name
        );
    }

    let statuses = migrations
        .iter()
        .map(|migration| {
            let state = match applied.iter().find(|a| a.version == migration.version) {
                Some(entry) => State::Applied {
                    applied_on: entry.applied_on,
                    checksum_matches: entry.checksum == migration.checksum(),
                },
                None => State::Pending,
            };

            MigrationStatus {
                version: migration.version,
                name: migration.name,
                state,
            }
        })
        .collect();

    Ok(statuses)
}

#[tracing::instrument(skip(repo, migrations))]
pub(crate) async fn migrate<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
    target: Option<u32>,
) -> Result<Vec<AppliedMigration>, RunnerError> {
    repo.ensure_ledger().await?;

    let applied = repo.applied().await?;
    let pending = plan(migrations, &applied, target)?;

    if pending.is_empty() {
        tracing::info!("Database is up to date");
        return Ok(Vec::new());
    }

    tracing::info!("{} migrations pending", pending.len());

    let mut newly_applied = Vec::with_capacity(pending.len());

    for migration in pending {
        tracing::info!("Applying {:03} {}", migration.version, migration.name);

        let entry = repo
            .apply(migration)
            .await
            .map_err(|source| RunnerError::Apply {
                version: migration.version,
                source,
            })?;

        newly_applied.push(entry);
    }

    Ok(newly_applied)
}

/// Run the pending migrations against an in-memory copy of the touched tables
#[tracing::instrument(skip(repo, migrations))]
pub(crate) async fn dry_run<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
    target: Option<u32>,
) -> Result<DryRun, RunnerError> {
    let applied = repo.applied().await?;
    let pending = plan(migrations, &applied, target)?;

    let mut tables: Vec<&str> = Vec::new();
    for migration in &pending {
        for table in migration.tables() {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }

    let snapshot = repo.snapshot(&tables).await?;
    let mut memory = MemoryRepo::from_snapshot(snapshot);

    let applied = migrate(&mut memory, migrations, target).await?;

    let mut described = BTreeMap::new();
    for table in tables {
        described.insert(table.to_string(), memory.describe(table).await?);
    }

    Ok(DryRun {
        applied,
        tables: described,
    })
}

/// Record pending migrations whose effects are already present, without executing them
#[tracing::instrument(skip(repo, migrations))]
pub(crate) async fn baseline<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
    target: Option<u32>,
) -> Result<Vec<AppliedMigration>, RunnerError> {
    repo.ensure_ledger().await?;

    let applied = repo.applied().await?;
    let pending = plan(migrations, &applied, target)?;

    for migration in &pending {
        for change in &migration.changes {
            let columns = repo.describe(change.table()).await?;

            change
                .is_satisfied(&columns)
                .map_err(|reason| RunnerError::NotSatisfied {
                    version: migration.version,
                    reason,
                })?;
        }
    }

    let mut recorded = Vec::with_capacity(pending.len());

    for migration in pending {
        tracing::warn!(
            "Recording {:03} {} without executing it",
            migration.version,
            migration.name
        );
        recorded.push(repo.record(migration).await?);
    }

    Ok(recorded)
}

/// Check every applied migration is still reflected in the schema
#[tracing::instrument(skip_all)]
pub(crate) async fn verify<R: SchemaRepo>(
    repo: &mut R,
    migrations: &[Migration],
) -> Result<Vec<Verification>, RunnerError> {
    let applied = repo.applied().await?;

    let mut verifications = Vec::with_capacity(applied.len());

    for entry in applied {
        let mut problems = Vec::new();

        match migrations.iter().find(|m| m.version == entry.version) {
            None => problems.push(String::from("unknown to this build")),
            Some(migration) => {
                if migration.checksum() != entry.checksum {
                    problems.push(String::from("checksum differs from the ledger"));
                }

                for change in &migration.changes {
                    match repo.describe(change.table()).await {
                        Ok(columns) => {
                            if let Err(reason) = change.is_satisfied(&columns) {
                                problems.push(reason.to_string());
                            }
                        }
                        Err(RepoError::NoSuchTable { table }) => {
                            problems.push(format!("table {table} does not exist"));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        verifications.push(Verification {
            version: entry.version,
            name: entry.name,
            problems,
        });
    }

    Ok(verifications)
}
