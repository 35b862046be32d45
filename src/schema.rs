use std::{fmt::Display, str::FromStr};

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(into = "String")]
pub(crate) enum ColumnType {
    Int,
    BigInt,
    TinyInt,
    Varchar(u32),
    Char(u32),
    Text,
    DateTime,
    Timestamp,
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ColumnDef {
    pub(crate) name: String,
    pub(crate) ty: ColumnType,
    pub(crate) nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Position {
    Last,
    First,
    After(String),
}

/// A single row of `DESCRIBE <table>`
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) struct ColumnDescription {
    pub(crate) field: String,
    #[serde(rename = "type")]
    pub(crate) ty: ColumnType,
    pub(crate) null: bool,
    pub(crate) key: String,
    pub(crate) default: Option<String>,
    pub(crate) extra: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Value {
    Null,
    Int(i64),
    Text(String),
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid column type {0:?}")]
pub(crate) struct ParseColumnTypeError(String);

/// Quote an identifier for MySQL, doubling any embedded backticks
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

impl ColumnType {
    /// The type as it appears in DDL, e.g. `VARCHAR(120)`
    pub(crate) fn sql(&self) -> String {
        match self {
            Self::Other(other) => other.to_uppercase(),
            ty => ty.to_string().to_uppercase(),
        }
    }
}

#[cfg(test)]
impl ColumnType {
    pub(crate) const fn max_chars(&self) -> Option<u32> {
        match self {
            Self::Varchar(len) | Self::Char(len) => Some(*len),
            _ => None,
        }
    }
}

fn sized(inner: &str) -> Option<u32> {
    inner.strip_suffix(')')?.trim().parse().ok()
}

impl FromStr for ColumnType {
    type Err = ParseColumnTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();

        if lower.is_empty() {
            return Err(ParseColumnTypeError(s.to_string()));
        }

        let (base, rest) = match lower.split_once('(') {
            Some((base, rest)) => (base.trim(), Some(rest)),
            None => (lower.as_str(), None),
        };

        let ty = match (base, rest) {
            ("varchar", Some(rest)) => {
                Self::Varchar(sized(rest).ok_or_else(|| ParseColumnTypeError(s.to_string()))?)
            }
            ("char", Some(rest)) => {
                Self::Char(sized(rest).ok_or_else(|| ParseColumnTypeError(s.to_string()))?)
            }
            // display widths like int(11) carry no meaning for the stored value
            ("int" | "integer", rest) if rest.map_or(true, |r| sized(r).is_some()) => Self::Int,
            ("bigint", rest) if rest.map_or(true, |r| sized(r).is_some()) => Self::BigInt,
            ("tinyint", rest) if rest.map_or(true, |r| sized(r).is_some()) => Self::TinyInt,
            ("text", None) => Self::Text,
            ("datetime", None) => Self::DateTime,
            ("timestamp", None) => Self::Timestamp,
            _ => Self::Other(s.trim().to_lowercase()),
        };

        Ok(ty)
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::BigInt => write!(f, "bigint"),
            Self::TinyInt => write!(f, "tinyint"),
            Self::Varchar(len) => write!(f, "varchar({len})"),
            Self::Char(len) => write!(f, "char({len})"),
            Self::Text => write!(f, "text"),
            Self::DateTime => write!(f, "datetime"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

impl ColumnDef {
    pub(crate) fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        ColumnDef {
            name: name.into(),
            ty,
            nullable: true,
        }
    }

    pub(crate) fn sql(&self) -> String {
        let null = if self.nullable { "NULL" } else { "NOT NULL" };

        format!("{} {} {null}", quote_ident(&self.name), self.ty.sql())
    }

    pub(crate) fn describe(&self) -> ColumnDescription {
        ColumnDescription {
            field: self.name.clone(),
            ty: self.ty.clone(),
            null: self.nullable,
            key: String::new(),
            default: None,
            extra: String::new(),
        }
    }
}

#[cfg(test)]
impl ColumnDef {
    pub(crate) fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

impl Position {
    pub(crate) fn sql(&self) -> Option<String> {
        match self {
            Self::Last => None,
            Self::First => Some(String::from("FIRST")),
            Self::After(column) => Some(format!("AFTER {}", quote_ident(column))),
        }
    }

    /// Where the column at `index` sits among `columns`
    pub(crate) fn of(columns: &[ColumnDescription], index: usize) -> Self {
        if index == 0 {
            Self::First
        } else if index + 1 == columns.len() {
            Self::Last
        } else {
            Self::After(columns[index - 1].field.clone())
        }
    }

    /// Whether the column at `index` satisfies this position, comparing names like MySQL does
    pub(crate) fn holds(&self, columns: &[ColumnDescription], index: usize) -> bool {
        match self {
            Self::Last => index + 1 == columns.len(),
            Self::First => index == 0,
            Self::After(after) => {
                index > 0 && columns[index - 1].field.eq_ignore_ascii_case(after)
            }
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Last => write!(f, "last"),
            Self::First => write!(f, "first"),
            Self::After(column) => write!(f, "after {column}"),
        }
    }
}

impl Display for ColumnDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let null = if self.null { "YES" } else { "NO" };
        let default = self.default.as_deref().unwrap_or("NULL");

        write!(f, "{} {} {null} {default}", self.field, self.ty)?;

        if !self.key.is_empty() {
            write!(f, " {}", self.key)?;
        }

        if !self.extra.is_empty() {
            write!(f, " {}", self.extra)?;
        }

        Ok(())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{quote_ident, ColumnDef, ColumnType, Position};

    #[test]
    fn parse_varchar() {
        assert_eq!(
            "varchar(120)".parse::<ColumnType>().unwrap(),
            ColumnType::Varchar(120)
        );
        assert_eq!(
            "VARCHAR( 100 )".parse::<ColumnType>().unwrap(),
            ColumnType::Varchar(100)
        );
    }

    #[test]
    fn parse_int_display_width() {
        assert_eq!("int(11)".parse::<ColumnType>().unwrap(), ColumnType::Int);
        assert_eq!("int".parse::<ColumnType>().unwrap(), ColumnType::Int);
        assert_eq!("tinyint(1)".parse::<ColumnType>().unwrap(), ColumnType::TinyInt);
    }

    #[test]
    fn parse_unknown_is_other() {
        assert_eq!(
            "int unsigned".parse::<ColumnType>().unwrap(),
            ColumnType::Other(String::from("int unsigned"))
        );
        assert_eq!(
            "enum('a','b')".parse::<ColumnType>().unwrap(),
            ColumnType::Other(String::from("enum('a','b')"))
        );
    }

    #[test]
    fn parse_broken_varchar() {
        assert!("varchar(abc)".parse::<ColumnType>().is_err());
        assert!("".parse::<ColumnType>().is_err());
    }

    #[test]
    fn column_sql() {
        let column = ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120));
        assert_eq!(column.sql(), "`nombre_mostrar` VARCHAR(120) NULL");

        let column = ColumnDef::new("id", ColumnType::Int).not_null();
        assert_eq!(column.sql(), "`id` INT NOT NULL");
    }

    #[test]
    fn position_sql() {
        assert_eq!(Position::Last.sql(), None);
        assert_eq!(Position::First.sql().as_deref(), Some("FIRST"));
        assert_eq!(
            Position::After(String::from("nombre")).sql().as_deref(),
            Some("AFTER `nombre`")
        );
    }

    #[test]
    fn position_of_column() {
        let columns: Vec<_> = [
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("Nombre", ColumnType::Varchar(100)),
            ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120)),
            ColumnDef::new("correo", ColumnType::Varchar(255)),
        ]
        .iter()
        .map(ColumnDef::describe)
        .collect();

        assert_eq!(Position::of(&columns, 0), Position::First);
        assert_eq!(
            Position::of(&columns, 2),
            Position::After(String::from("Nombre"))
        );
        assert_eq!(Position::of(&columns, 3), Position::Last);

        assert!(Position::First.holds(&columns, 0));
        assert!(Position::Last.holds(&columns, 3));
        assert!(Position::After(String::from("nombre")).holds(&columns, 2));
        assert!(!Position::After(String::from("id")).holds(&columns, 2));
    }

    #[test]
    fn quote_backticks() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn describe_row() {
        let description = ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120)).describe();

        assert_eq!(description.to_string(), "nombre_mostrar varchar(120) YES NULL");
    }
}
