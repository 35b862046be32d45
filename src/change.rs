use crate::schema::{quote_ident, ColumnDef, ColumnDescription, Position};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Change {
    AddColumn {
        table: String,
        column: ColumnDef,
        position: Position,
    },
}

/// Why a change's post-condition does not hold against a described table
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Unsatisfied {
    MissingColumn {
        column: String,
    },
    WrongType {
        column: String,
        expected: String,
        found: String,
    },
    WrongNullability {
        column: String,
        expected: bool,
    },
    WrongPosition {
        column: String,
        expected: Position,
        found: Position,
    },
}

impl Change {
    pub(crate) fn add_column(table: &str, column: ColumnDef, position: Position) -> Self {
        Change::AddColumn {
            table: table.to_string(),
            column,
            position,
        }
    }

    pub(crate) fn table(&self) -> &str {
        match self {
            Self::AddColumn { table, .. } => table,
        }
    }

    /// The statement, without the terminating semicolon
    pub(crate) fn sql(&self) -> String {
        match self {
            Self::AddColumn {
                table,
                column,
                position,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_ident(table),
                    column.sql()
                );

                if let Some(position) = position.sql() {
                    sql.push(' ');
                    sql.push_str(&position);
                }

                sql
            }
        }
    }

    /// Check the change is reflected in `columns`, the ordered description of its table
    pub(crate) fn is_satisfied(&self, columns: &[ColumnDescription]) -> Result<(), Unsatisfied> {
        match self {
            Self::AddColumn {
                column, position, ..
            } => {
                let Some(index) = columns
                    .iter()
                    .position(|c| c.field.eq_ignore_ascii_case(&column.name))
                else {
                    return Err(Unsatisfied::MissingColumn {
                        column: column.name.clone(),
                    });
                };

                let found = &columns[index];

                if found.ty != column.ty {
                    return Err(Unsatisfied::WrongType {
                        column: column.name.clone(),
                        expected: column.ty.to_string(),
                        found: found.ty.to_string(),
                    });
                }

                if found.null != column.nullable {
                    return Err(Unsatisfied::WrongNullability {
                        column: column.name.clone(),
                        expected: column.nullable,
                    });
                }

                if !position.holds(columns, index) {
                    return Err(Unsatisfied::WrongPosition {
                        column: column.name.clone(),
                        expected: position.clone(),
                        found: Position::of(columns, index),
                    });
                }

                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "column {column} does not exist"),
            Self::WrongType {
                column,
                expected,
                found,
            } => write!(f, "column {column} is {found}, expected {expected}"),
            Self::WrongNullability { column, expected } => {
                if *expected {
                    write!(f, "column {column} should be nullable")
                } else {
                    write!(f, "column {column} should be NOT NULL")
                }
            }
            Self::WrongPosition {
                column,
                expected,
                found,
            } => {
                match expected {
                    Position::Last => write!(f, "column {column} should be last")?,
                    Position::First => write!(f, "column {column} should be first")?,
                    Position::After(after) => write!(f, "column {column} should follow {after}")?,
                }

                write!(f, ", found {found}")
            }
        }
    }
}
