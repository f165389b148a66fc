use serde::{Deserialize, Serialize};
use tokio_postgres::Client;

use crate::error::{EngineError, EngineResult};
use crate::value::LogicalType;

/// A non-owning reference to another table's column. Records a dependency,
/// not an ownership edge; nothing cascades through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    pub table: String,
    pub column: String,
}

/// One column as it travels over the wire and lives in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    #[serde(rename = "isPrimary", default)]
    pub is_primary: bool,
    #[serde(rename = "isForeignKey", default)]
    pub is_foreign_key: bool,
    #[serde(rename = "foreignKey", default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyReference>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            is_primary: false,
            is_foreign_key: false,
            foreign_key: None,
        }
    }

    /// The implicit primary key every table starts with.
    pub fn implicit_primary_key() -> Self {
        Self {
            name: "id".to_string(),
            logical_type: LogicalType::Integer,
            is_primary: true,
            is_foreign_key: false,
            foreign_key: None,
        }
    }
}

/// A table's current shape: name plus columns in DDL order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is_primary)
    }
}

/// Ordered table names in the given schema, re-read from the store on every
/// call so external DDL never leaves a stale picture.
pub async fn list_tables(client: &Client, schema: &str) -> EngineResult<Vec<String>> {
    let rows = client
        .query(
            r#"
            SELECT c.relname as name
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
              AND c.relkind = 'r'
            ORDER BY c.relname
            "#,
            &[&schema],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

/// Introspect one table into a [`TableDefinition`], or fail `UnknownTable`.
pub async fn describe(client: &Client, schema: &str, table: &str) -> EngineResult<TableDefinition> {
    let rows = client
        .query(
            r#"
            SELECT
                c.column_name as name,
                c.data_type,
                EXISTS (
                    SELECT 1
                    FROM information_schema.key_column_usage kcu
                    JOIN information_schema.table_constraints tc
                        ON tc.constraint_name = kcu.constraint_name
                        AND tc.table_schema = kcu.table_schema
                    WHERE kcu.table_schema = c.table_schema
                      AND kcu.table_name = c.table_name
                      AND kcu.column_name = c.column_name
                      AND tc.constraint_type = 'PRIMARY KEY'
                ) as is_primary_key
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
            "#,
            &[&schema, &table],
        )
        .await?;

    if rows.is_empty() {
        return Err(EngineError::UnknownTable(table.to_string()));
    }

    let mut columns = fold_column_rows(
        rows.iter()
            .map(|row| (row.get("name"), row.get("data_type"), row.get("is_primary_key")))
            .collect(),
    );

    for (column, target) in foreign_keys(client, schema, table).await? {
        if let Some(def) = columns.iter_mut().find(|c| c.name == column) {
            def.is_foreign_key = true;
            def.foreign_key = Some(target);
        }
    }

    Ok(TableDefinition {
        name: table.to_string(),
        columns,
    })
}

/// Collapse introspected `(name, data_type, is_primary)` rows into column
/// definitions. A column sitting in more than one key constraint may come
/// back once per constraint; it must appear exactly once here, keeping its
/// first position and any primary flag.
fn fold_column_rows(rows: Vec<(String, String, bool)>) -> Vec<ColumnDefinition> {
    let mut columns: Vec<ColumnDefinition> = Vec::with_capacity(rows.len());
    for (name, data_type, is_primary) in rows {
        if let Some(existing) = columns.iter_mut().find(|c| c.name == name) {
            existing.is_primary |= is_primary;
            continue;
        }
        let mut column = ColumnDefinition::new(name, LogicalType::from_store_type(&data_type));
        column.is_primary = is_primary;
        columns.push(column);
    }
    columns
}

/// Foreign keys declared on `table`, as (column, target) pairs.
async fn foreign_keys(
    client: &Client,
    schema: &str,
    table: &str,
) -> EngineResult<Vec<(String, ForeignKeyReference)>> {
    let rows = client
        .query(
            r#"
            SELECT
                kcu.column_name as name,
                ccu.table_name as foreign_table,
                ccu.column_name as foreign_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = $1
              AND tc.table_name = $2
            "#,
            &[&schema, &table],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get("name"),
                ForeignKeyReference {
                    table: row.get("foreign_table"),
                    column: row.get("foreign_column"),
                },
            )
        })
        .collect())
}

/// Tables (other than `table` itself) holding a foreign key into `table`.
/// Non-empty means a DROP must be rejected.
pub async fn referencing_tables(
    client: &Client,
    schema: &str,
    table: &str,
) -> EngineResult<Vec<String>> {
    let rows = client
        .query(
            r#"
            SELECT DISTINCT tc.table_name as name
            FROM information_schema.table_constraints tc
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND ccu.table_schema = $1
              AND ccu.table_name = $2
              AND tc.table_name <> $2
            ORDER BY tc.table_name
            "#,
            &[&schema, &table],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

/// Whether the table currently holds any rows. The identifier must already
/// be validated: table names cannot be parameter-bound. Qualified with the
/// schema so it reads the same table the rest of the catalog describes.
pub async fn has_rows(client: &Client, schema: &str, table: &str) -> EngineResult<bool> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {schema}.{table} LIMIT 1) as nonempty");
    let row = client.query_one(&sql, &[]).await?;
    Ok(row.get("nonempty"))
}
