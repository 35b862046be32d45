use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{
    change::Change,
    migrations::Migration,
    schema::{ColumnDescription, ColumnType, Position, Value},
};

use super::{AppliedMigration, RepoError, SchemaRepo, Snapshot};

/// An in-memory catalog that follows MySQL's rules for the changes it can apply
#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryRepo {
    tables: BTreeMap<String, Table>,
    applied: Vec<AppliedMigration>,
}

#[derive(Clone, Debug, Default)]
struct Table {
    columns: Vec<ColumnDescription>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.field.eq_ignore_ascii_case(column))
    }
}

fn implicit_default(description: &ColumnDescription) -> Value {
    if description.null {
        return Value::Null;
    }

    match description.ty {
        ColumnType::Int | ColumnType::BigInt | ColumnType::TinyInt => Value::Int(0),
        _ => Value::Text(String::new()),
    }
}

impl MemoryRepo {
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        let tables = snapshot
            .tables
            .into_iter()
            .map(|(name, columns)| {
                (
                    name,
                    Table {
                        columns,
                        rows: Vec::new(),
                    },
                )
            })
            .collect();

        MemoryRepo {
            tables,
            applied: snapshot.applied,
        }
    }

    fn execute(&mut self, change: &Change) -> Result<(), RepoError> {
        match change {
            Change::AddColumn {
                table,
                column,
                position,
            } => {
                let Some(entry) = self.tables.get_mut(table) else {
                    return Err(RepoError::NoSuchTable {
                        table: table.clone(),
                    });
                };

                if entry.index_of(&column.name).is_some() {
                    return Err(RepoError::DuplicateColumn {
                        column: column.name.clone(),
                    });
                }

                let index = match position {
                    Position::Last => entry.columns.len(),
                    Position::First => 0,
                    Position::After(after) => {
                        entry
                            .index_of(after)
                            .ok_or_else(|| RepoError::UnknownColumn {
                                column: after.clone(),
                            })?
                            + 1
                    }
                };

                let description = column.describe();
                let fill = implicit_default(&description);

                entry.columns.insert(index, description);
                for row in &mut entry.rows {
                    row.insert(index, fill.clone());
                }

                Ok(())
            }
        }
    }

    fn push_ledger(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError> {
        if self.applied.iter().any(|a| a.version == migration.version) {
            return Err(RepoError::AlreadyRecorded(migration.version));
        }

        let now = OffsetDateTime::now_utc();
        // DATETIME keeps whole seconds
        let applied_on = now.replace_nanosecond(0).unwrap_or(now);

        let applied = AppliedMigration {
            version: migration.version,
            name: migration.name.to_string(),
            checksum: migration.checksum(),
            applied_on,
        };

        self.applied.push(applied.clone());
        self.applied.sort_by_key(|a| a.version);

        Ok(applied)
    }
}

#[cfg(test)]
impl MemoryRepo {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create_table(&mut self, name: &str, columns: Vec<ColumnDescription>) {
        self.tables.insert(
            name.to_string(),
            Table {
                columns,
                rows: Vec::new(),
            },
        );
    }

    /// Insert a row, validating it the way a strict-mode server would
    pub(crate) fn insert(&mut self, table: &str, values: &[(&str, Value)]) -> Result<(), RepoError> {
        let Some(entry) = self.tables.get_mut(table) else {
            return Err(RepoError::NoSuchTable {
                table: table.to_string(),
            });
        };

        let mut row: Vec<Option<Value>> = vec![None; entry.columns.len()];

        for (name, value) in values {
            let index = entry.index_of(name).ok_or_else(|| RepoError::UnknownColumn {
                column: name.to_string(),
            })?;
            row[index] = Some(value.clone());
        }

        let mut checked = Vec::with_capacity(row.len());

        for (description, value) in entry.columns.iter().zip(row) {
            let value = match value {
                Some(value) => value,
                None if description.null => Value::Null,
                None => {
                    return Err(RepoError::NotNull {
                        column: description.field.clone(),
                    })
                }
            };

            match &value {
                Value::Null if !description.null => {
                    return Err(RepoError::NotNull {
                        column: description.field.clone(),
                    });
                }
                Value::Text(text) => {
                    if let Some(max) = description.ty.max_chars() {
                        if text.chars().count() > max as usize {
                            return Err(RepoError::DataTooLong {
                                column: description.field.clone(),
                            });
                        }
                    }
                }
                _ => {}
            }

            checked.push(value);
        }

        entry.rows.push(checked);

        Ok(())
    }

    pub(crate) fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait(?Send)]
impl SchemaRepo for MemoryRepo {
    async fn health_check(&mut self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, RepoError> {
        Ok(self.applied.clone())
    }

    async fn apply(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError> {
        if self.applied.iter().any(|a| a.version == migration.version) {
            return Err(RepoError::AlreadyRecorded(migration.version));
        }

        for change in &migration.changes {
            self.execute(change)?;
        }

        self.push_ledger(migration)
    }

    async fn record(&mut self, migration: &Migration) -> Result<AppliedMigration, RepoError> {
        self.push_ledger(migration)
    }

    async fn describe(&mut self, table: &str) -> Result<Vec<ColumnDescription>, RepoError> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| RepoError::NoSuchTable {
                table: table.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryRepo;
    use crate::{
        change::Change,
        migrations::registry,
        repo::{RepoError, SchemaRepo},
        schema::{ColumnDef, ColumnType, Position, Value},
    };

    fn users() -> MemoryRepo {
        let mut repo = MemoryRepo::new();
        repo.create_table(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Int).not_null().describe(),
                ColumnDef::new("nombre", ColumnType::Varchar(100)).describe(),
            ],
        );
        repo
    }

    #[tokio::test]
    async fn existing_rows_get_null() {
        let mut repo = users();
        repo.insert("users", &[("id", Value::Int(1)), ("nombre", "Ana".into())])
            .unwrap();

        let migration = registry().unwrap().remove(0);
        repo.apply(&migration).await.unwrap();

        assert_eq!(
            repo.rows("users"),
            vec![vec![Value::Int(1), "Ana".into(), Value::Null]]
        );

        let described = repo.describe("users").await.unwrap();
        assert_eq!(described[1].field, "nombre");
        assert_eq!(
            described[2].to_string(),
            "nombre_mostrar varchar(120) YES NULL"
        );
    }

    #[tokio::test]
    async fn second_alter_is_duplicate_column() {
        let mut repo = users();
        let migration = registry().unwrap().remove(0);

        repo.execute(&migration.changes[0]).unwrap();
        let res = repo.execute(&migration.changes[0]);

        assert!(matches!(res, Err(RepoError::DuplicateColumn { column }) if column == "nombre_mostrar"));
    }

    #[tokio::test]
    async fn display_name_length_is_bounded() {
        let mut repo = users();
        let migration = registry().unwrap().remove(0);
        repo.apply(&migration).await.unwrap();

        let exact = "ñ".repeat(120);
        repo.insert(
            "users",
            &[
                ("id", Value::Int(1)),
                ("nombre_mostrar", Value::Text(exact)),
            ],
        )
        .unwrap();

        let long = "a".repeat(121);
        let res = repo.insert(
            "users",
            &[("id", Value::Int(2)), ("nombre_mostrar", Value::Text(long))],
        );

        assert!(matches!(res, Err(RepoError::DataTooLong { .. })));
        assert_eq!(repo.rows("users").len(), 1);
    }

    #[tokio::test]
    async fn missing_table() {
        let mut repo = MemoryRepo::new();
        let migration = registry().unwrap().remove(0);

        let res = repo.apply(&migration).await;

        assert!(matches!(res, Err(RepoError::NoSuchTable { table }) if table == "users"));
        assert!(repo.applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_after_column() {
        let mut repo = MemoryRepo::new();
        repo.create_table(
            "users",
            vec![ColumnDef::new("id", ColumnType::Int).not_null().describe()],
        );
        let migration = registry().unwrap().remove(0);

        let res = repo.apply(&migration).await;

        assert!(matches!(res, Err(RepoError::UnknownColumn { column }) if column == "nombre"));
    }

    #[tokio::test]
    async fn first_column_shifts_rows() {
        let mut repo = users();
        repo.insert("users", &[("id", Value::Int(1)), ("nombre", "Ana".into())])
            .unwrap();

        repo.execute(&Change::add_column(
            "users",
            ColumnDef::new("orden", ColumnType::Int).not_null(),
            Position::First,
        ))
        .unwrap();

        let described = repo.describe("users").await.unwrap();
        assert_eq!(described[0].field, "orden");
        assert_eq!(
            repo.rows("users"),
            vec![vec![Value::Int(0), Value::Int(1), "Ana".into()]]
        );
    }

    #[tokio::test]
    async fn not_null_without_value() {
        let mut repo = users();

        let res = repo.insert("users", &[("nombre", "Ana".into())]);

        assert!(matches!(res, Err(RepoError::NotNull { column }) if column == "id"));
    }
}
