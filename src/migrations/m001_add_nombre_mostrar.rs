use crate::{
    change::Change,
    schema::{ColumnDef, ColumnType, Position},
};

use super::Migration;

pub(super) fn migration() -> Migration {
    Migration {
        version: 1,
        name: "add_nombre_mostrar",
        description: "Adds the optional display name shown in the dashboard for each user",
        changes: vec![Change::add_column(
            "users",
            ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120)),
            Position::After(String::from("nombre")),
        )],
    }
}
