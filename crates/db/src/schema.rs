//! Best-effort, idempotent alignment of the live `todos` table with the
//! entity. Columns are only ever added, never altered or dropped.

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use sea_orm_migration::{
    SchemaManager,
    prelude::*,
    sea_orm::{DatabaseBackend, DbErr},
};

use crate::entities::todo;

const TABLE: &str = "todos";

#[derive(DeriveIden)]
enum Todos {
    Table,
    Id,
    Title,
    Done,
    Priority,
    DueDate,
    CreatedAt,
}

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSync {
    pub added_columns: Vec<&'static str>,
    /// Introspection failed and the column pass was skipped.
    pub skipped: bool,
}

/// Creates the table with its base columns if needed, then adds whichever of
/// `priority`, `due_date` and `created_at` are missing.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<SchemaSync, DbErr> {
    let manager = SchemaManager::new(db);

    manager
        .create_table(
            Table::create()
                .if_not_exists()
                .table(Todos::Table)
                .col(pk_id_col(&manager, Todos::Id))
                .col(ColumnDef::new(Todos::Title).string_len(200).not_null())
                .col(
                    ColumnDef::new(Todos::Done)
                        .boolean()
                        .not_null()
                        .default(Expr::val(false)),
                )
                .to_owned(),
        )
        .await?;

    let mut sync = SchemaSync::default();
    let missing = match missing_columns(&manager).await {
        Ok(missing) => missing,
        Err(err) => {
            tracing::warn!("Skipping todos column sync, introspection failed: {}", err);
            sync.skipped = true;
            return Ok(sync);
        }
    };

    for column in missing {
        let def = match column {
            Todos::Priority => ColumnDef::new(Todos::Priority)
                .string_len(10)
                .not_null()
                .default(Expr::val("medium"))
                .to_owned(),
            Todos::DueDate => ColumnDef::new(Todos::DueDate).date().null().to_owned(),
            // Some backends reject non-constant defaults in ADD COLUMN, so the
            // column starts nullable and existing rows are backfilled below.
            Todos::CreatedAt => ColumnDef::new(Todos::CreatedAt)
                .timestamp_with_time_zone()
                .null()
                .to_owned(),
            _ => continue,
        };
        let name = column_name(&column);
        manager
            .alter_table(
                Table::alter()
                    .table(Todos::Table)
                    .add_column(def)
                    .to_owned(),
            )
            .await?;

        if matches!(column, Todos::CreatedAt) {
            let backfilled = todo::Entity::update_many()
                .col_expr(todo::Column::CreatedAt, Expr::value(Utc::now()))
                .filter(todo::Column::CreatedAt.is_null())
                .exec(db)
                .await?;
            tracing::info!(rows = backfilled.rows_affected, "Backfilled todos.created_at");
        }
        sync.added_columns.push(name);
    }

    if !sync.added_columns.is_empty() {
        tracing::info!(columns = ?sync.added_columns, "Added missing todos columns");
    }
    Ok(sync)
}

async fn missing_columns(manager: &SchemaManager<'_>) -> Result<Vec<Todos>, DbErr> {
    let mut missing = Vec::new();
    for column in [Todos::Priority, Todos::DueDate, Todos::CreatedAt] {
        if !manager.has_column(TABLE, column_name(&column)).await? {
            missing.push(column);
        }
    }
    Ok(missing)
}

fn column_name(column: &Todos) -> &'static str {
    match column {
        Todos::Table => TABLE,
        Todos::Id => "id",
        Todos::Title => "title",
        Todos::Done => "done",
        Todos::Priority => "priority",
        Todos::DueDate => "due_date",
        Todos::CreatedAt => "created_at",
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}
