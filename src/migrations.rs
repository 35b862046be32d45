mod m001_add_nombre_mostrar;

use sha2::{Digest, Sha256};

use crate::change::Change;

#[derive(Clone, Debug)]
pub(crate) struct Migration {
    pub(crate) version: u32,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) changes: Vec<Change>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RegistryError {
    #[error("Migration versions must start at 1")]
    ZeroVersion,

    #[error("Migration {current} is registered after {previous}")]
    Unordered { previous: u32, current: u32 },

    #[error("Migration {0} has no changes")]
    Empty(u32),
}

/// Every known migration, in the order they apply
pub(crate) fn registry() -> Result<Vec<Migration>, RegistryError> {
    let migrations = vec![m001_add_nombre_mostrar::migration()];

    validate(&migrations)?;

    Ok(migrations)
}

fn validate(migrations: &[Migration]) -> Result<(), RegistryError> {
    let mut previous = 0;

    for migration in migrations {
        if migration.version == 0 {
            return Err(RegistryError::ZeroVersion);
        }

        if migration.version <= previous {
            return Err(RegistryError::Unordered {
                previous,
                current: migration.version,
            });
        }

        if migration.changes.is_empty() {
            return Err(RegistryError::Empty(migration.version));
        }

        previous = migration.version;
    }

    Ok(())
}

impl Migration {
    pub(crate) fn statements(&self) -> Vec<String> {
        self.changes.iter().map(Change::sql).collect()
    }

    pub(crate) fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.statements().join("\n").as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Distinct tables touched by this migration, in first-touched order
    pub(crate) fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();

        for change in &self.changes {
            if !tables.contains(&change.table()) {
                tables.push(change.table());
            }
        }

        tables
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{:03}_{}.sql", self.version, self.name)
    }

    /// A standalone SQL script an operator can feed to the mysql client
    pub(crate) fn script(&self) -> String {
        let mut out = format!(
            "-- Migration {:03}: {}\n-- {}\n--\n-- Apply with:\n--   mysql -u <user> -p <database> < migrations/{}\n\n",
            self.version,
            self.name,
            self.description,
            self.file_name(),
        );

        for statement in self.statements() {
            out.push_str(&statement);
            out.push_str(";\n");
        }

        out.push_str("\n-- Verify with:\n");
        for table in self.tables() {
            out.push_str(&format!("-- DESCRIBE {table};\n"));
        }

        out
    }
}
