use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::catalog::{self, ColumnDefinition, TableDefinition};
use crate::error::{EngineError, EngineResult};
use crate::ident;
use crate::sql::dml::Statement;
use crate::sql::join::JoinSpecification;
use crate::sql::{ddl, dml, join};
use crate::value::{self, param_refs, Row};

/// Rows returned by unbounded reads are capped, matching the display layer's
/// appetite rather than the table size.
const DEFAULT_FETCH_LIMIT: u32 = 100;

/// `get_table` response shape: the table's current definition plus its rows.
#[derive(Debug, Serialize)]
pub struct TableData {
    pub id: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Row>,
}

/// The translation engine: turns generic table/column/row/join descriptors
/// into single parameterized statements against a pooled PostgreSQL
/// connection, and shapes results back into generic rows.
///
/// The schema is never cached here; every schema-read introspects the store,
/// so external DDL or a crash mid-operation cannot leave a stale picture.
pub struct Engine {
    pool: deadpool_postgres::Pool,
    schema: String,
    fetch_limit: u32,
}

impl Engine {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self {
            pool,
            schema: String::from("public"),
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    /// Target a schema other than `public`. The name is engine-owned
    /// configuration, not request input: it scopes introspection AND
    /// qualifies every emitted statement, so the catalog and the statements
    /// always see the same tables.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit;
        self
    }

    async fn client(&self) -> EngineResult<deadpool_postgres::Object> {
        Ok(self.pool.get().await?)
    }

    /// Current table names, straight from the store's catalog.
    pub async fn list_tables(&self) -> EngineResult<Vec<String>> {
        let client = self.client().await?;
        catalog::list_tables(&client, &self.schema).await
    }

    /// A table's definition plus its rows, ordered by primary key.
    pub async fn get_table(&self, name: &str) -> EngineResult<TableData> {
        ident::validate(name)?;
        let client = self.client().await?;
        let table = catalog::describe(&client, &self.schema, name).await?;
        let rows = self.fetch_rows(&client, &table).await?;
        Ok(TableData {
            id: table.name.clone(),
            name: table.name.clone(),
            columns: table.columns,
            rows,
        })
    }

    /// Create a table from a free-form label and user columns. The implicit
    /// `id` primary key always leads; user columns follow in request order.
    pub async fn create_table(
        &self,
        label: &str,
        columns: &[ColumnDefinition],
    ) -> EngineResult<TableDefinition> {
        let name = ident::canonicalize_table_label(label)?;

        for (i, col) in columns.iter().enumerate() {
            ident::validate(&col.name)?;
            if col.name == "id" || columns[..i].iter().any(|c| c.name == col.name) {
                return Err(EngineError::DuplicateColumn {
                    table: name.clone(),
                    column: col.name.clone(),
                });
            }
            if col.is_primary {
                return Err(EngineError::UnsupportedOperation(format!(
                    "table {name:?} gets an implicit primary key; column {:?} cannot be another",
                    col.name
                )));
            }
        }

        let client = self.client().await?;
        if catalog::list_tables(&client, &self.schema)
            .await?
            .contains(&name)
        {
            return Err(EngineError::DuplicateTable(name));
        }
        for col in columns {
            if col.is_foreign_key {
                self.resolve_foreign_target(&client, col).await?;
            }
        }

        let sql = ddl::create_table(&self.schema, &name, columns);
        debug!(%sql, "creating table");
        client.execute(&sql, &[]).await.map_err(EngineError::from)?;
        catalog::describe(&client, &self.schema, &name).await
    }

    /// Add one column. All validation (duplicate name, foreign target,
    /// primary-key feasibility) happens before the single ALTER, so a
    /// failure leaves the table untouched.
    pub async fn add_column(
        &self,
        table: &str,
        column: &ColumnDefinition,
    ) -> EngineResult<TableDefinition> {
        ident::validate(table)?;
        ident::validate(&column.name)?;

        let client = self.client().await?;
        let existing = catalog::describe(&client, &self.schema, table).await?;
        if existing.column(&column.name).is_some() {
            return Err(EngineError::DuplicateColumn {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        if column.is_primary {
            if existing.primary_key().is_some() {
                return Err(EngineError::UnsupportedOperation(format!(
                    "table {table:?} already has a primary key"
                )));
            }
            if catalog::has_rows(&client, &self.schema, table).await? {
                return Err(EngineError::UnsupportedOperation(format!(
                    "cannot add a primary key to populated table {table:?}"
                )));
            }
        }
        if column.is_foreign_key {
            self.resolve_foreign_target(&client, column).await?;
        }

        let sql = ddl::add_column(&self.schema, table, column);
        debug!(%sql, "adding column");
        client.execute(&sql, &[]).await.map_err(EngineError::from)?;
        catalog::describe(&client, &self.schema, table).await
    }

    /// Drop a table, refusing while any other table's foreign key targets it.
    pub async fn drop_table(&self, name: &str) -> EngineResult<()> {
        ident::validate(name)?;
        let client = self.client().await?;
        catalog::describe(&client, &self.schema, name).await?;

        let referencing = catalog::referencing_tables(&client, &self.schema, name).await?;
        if !referencing.is_empty() {
            return Err(EngineError::ReferencedByForeignKey {
                table: name.to_string(),
                referencing,
            });
        }

        let sql = ddl::drop_table(&self.schema, name);
        debug!(%sql, "dropping table");
        client.execute(&sql, &[]).await.map_err(|err| {
            // backstop for a foreign key added between the check and the
            // drop: the store rejects with dependent_objects_still_exist
            match EngineError::from(err) {
                EngineError::Store {
                    sqlstate: Some(ref code),
                    ..
                } if code == "2BP01" => EngineError::ReferencedByForeignKey {
                    table: name.to_string(),
                    referencing: vec![],
                },
                other => other,
            }
        })?;
        Ok(())
    }

    /// Insert one row. The primary key never enters the write set; Null
    /// cells are omitted so store defaults apply.
    pub async fn insert_row(&self, table: &str, data: &Map<String, Json>) -> EngineResult<Row> {
        ident::validate(table)?;
        let client = self.client().await?;
        let def = catalog::describe(&client, &self.schema, table).await?;

        let cells = build_write_set(&def, data, WriteMode::Insert)?;
        let stmt = dml::insert(&self.schema, table, cells);
        let rows = self.execute(&client, &stmt).await?;
        rows.first()
            .map(Row::from_store)
            .ok_or_else(|| EngineError::Store {
                sqlstate: None,
                message: String::from("insert returned no row"),
            })
    }

    /// Partial update: only supplied columns change; an explicit empty value
    /// clears the column to NULL. The primary key itself is never updatable.
    pub async fn update_row(
        &self,
        table: &str,
        id: i64,
        data: &Map<String, Json>,
    ) -> EngineResult<Row> {
        ident::validate(table)?;
        let client = self.client().await?;
        let def = catalog::describe(&client, &self.schema, table).await?;
        let pk = def
            .primary_key()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| String::from("id"));

        let unknown_row = || EngineError::UnknownRow {
            table: table.to_string(),
            id,
        };

        let cells = build_write_set(&def, data, WriteMode::Update)?;
        if cells.is_empty() {
            // nothing to change: read the row back so the caller still gets
            // its current state (or UnknownRow)
            let sql = format!(
                "SELECT * FROM {}.{} WHERE {} = $1::bigint",
                self.schema, table, pk
            );
            let rows = client
                .query(&sql, &[&id])
                .await
                .map_err(EngineError::from)?;
            return rows.first().map(Row::from_store).ok_or_else(unknown_row);
        }

        let stmt = dml::update(&self.schema, table, &pk, id, cells);
        let rows = self.execute(&client, &stmt).await?;
        rows.first().map(Row::from_store).ok_or_else(unknown_row)
    }

    /// All rows of a table, ordered by primary key ascending.
    pub async fn fetch_all(&self, table: &str) -> EngineResult<Vec<Row>> {
        ident::validate(table)?;
        let client = self.client().await?;
        let def = catalog::describe(&client, &self.schema, table).await?;
        self.fetch_rows(&client, &def).await
    }

    /// Execute a declarative two-table inner join. Both key columns are
    /// checked against the live schema so a missing column fails with a
    /// typed error before any statement is built.
    pub async fn run_join(&self, spec: &JoinSpecification) -> EngineResult<Vec<Row>> {
        ident::validate(&spec.left_table)?;
        ident::validate(&spec.right_table)?;
        ident::validate(&spec.left_key)?;
        ident::validate(&spec.right_key)?;

        let client = self.client().await?;
        let left = catalog::describe(&client, &self.schema, &spec.left_table).await?;
        let right = catalog::describe(&client, &self.schema, &spec.right_table).await?;

        for (table, key) in [(&left, &spec.left_key), (&right, &spec.right_key)] {
            if table.column(key).is_none() {
                return Err(EngineError::UnknownColumn {
                    table: table.name.clone(),
                    column: key.clone(),
                });
            }
        }

        let sql = join::build(spec, &left, &right, &self.schema, self.fetch_limit);
        debug!(%sql, "running join");
        let rows = client.query(&sql, &[]).await.map_err(EngineError::from)?;
        Ok(rows.iter().map(Row::from_store).collect())
    }

    async fn fetch_rows(
        &self,
        client: &tokio_postgres::Client,
        def: &TableDefinition,
    ) -> EngineResult<Vec<Row>> {
        let pk = def
            .primary_key()
            .or_else(|| def.columns.first())
            .map(|c| c.name.as_str())
            .unwrap_or("id");
        let sql = dml::select_all(&self.schema, &def.name, pk, self.fetch_limit);
        debug!(%sql, "fetching rows");
        let rows = client.query(&sql, &[]).await.map_err(EngineError::from)?;
        Ok(rows.iter().map(Row::from_store).collect())
    }

    async fn execute(
        &self,
        client: &tokio_postgres::Client,
        stmt: &Statement,
    ) -> EngineResult<Vec<tokio_postgres::Row>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "executing");
        client
            .query(&stmt.sql, &param_refs(&stmt.params))
            .await
            .map_err(EngineError::from)
    }

    /// A foreign-key column is only admitted when its target table and
    /// column resolve in the live schema.
    async fn resolve_foreign_target(
        &self,
        client: &tokio_postgres::Client,
        column: &ColumnDefinition,
    ) -> EngineResult<()> {
        let Some(fk) = &column.foreign_key else {
            return Err(EngineError::UnsupportedOperation(format!(
                "column {:?} is flagged as a foreign key but names no target",
                column.name
            )));
        };
        ident::validate(&fk.table)?;
        ident::validate(&fk.column)?;

        let unknown = || EngineError::UnknownForeignTarget {
            table: fk.table.clone(),
            column: fk.column.clone(),
        };
        match catalog::describe(client, &self.schema, &fk.table).await {
            Ok(target) if target.column(&fk.column).is_some() => Ok(()),
            Ok(_) => Err(unknown()),
            Err(EngineError::UnknownTable(_)) => Err(unknown()),
            Err(other) => Err(other),
        }
    }
}

enum WriteMode {
    Insert,
    Update,
}

/// Assemble the coerced write set for an insert or update.
///
/// Cells follow the table's column order regardless of the order keys arrive
/// in. The primary key is skipped in both modes. A Null cell (empty or null
/// raw value) is omitted on insert but kept on update, where it binds NULL.
fn build_write_set(
    table: &TableDefinition,
    data: &Map<String, Json>,
    mode: WriteMode,
) -> EngineResult<Vec<(String, value::SqlParam)>> {
    let pk = table.primary_key().map(|c| c.name.as_str());
    for key in data.keys() {
        if Some(key.as_str()) != pk && table.column(key).is_none() {
            return Err(EngineError::UnknownColumn {
                table: table.name.clone(),
                column: key.clone(),
            });
        }
    }

    let mut cells = Vec::new();
    for col in &table.columns {
        if col.is_primary {
            continue;
        }
        let Some(raw) = data.get(&col.name) else {
            continue;
        };
        let value = value::coerce(&col.name, col.logical_type, raw)?;
        if value.is_null() && matches!(mode, WriteMode::Insert) {
            continue;
        }
        cells.push((col.name.clone(), value.to_param(col.logical_type)));
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{LogicalType, SqlParam};
    use serde_json::json;

    fn products() -> TableDefinition {
        TableDefinition {
            name: "products".into(),
            columns: vec![
                ColumnDefinition::implicit_primary_key(),
                ColumnDefinition::new("label", LogicalType::Text),
                ColumnDefinition::new("price", LogicalType::Integer),
                ColumnDefinition::new("tags", LogicalType::Json),
            ],
        }
    }

    fn data(v: Json) -> Map<String, Json> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_write_set_follows_column_order() {
        let cells = build_write_set(
            &products(),
            &data(json!({"price": "19", "label": "mug"})),
            WriteMode::Insert,
        )
        .unwrap();
        let names: Vec<&str> = cells.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["label", "price"]);
        assert!(matches!(cells[1].1, SqlParam::Int(Some(19))));
    }

    #[test]
    fn test_write_set_skips_primary_key() {
        let cells = build_write_set(
            &products(),
            &data(json!({"id": 99, "price": 5})),
            WriteMode::Insert,
        )
        .unwrap();
        let names: Vec<&str> = cells.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["price"]);
    }

    #[test]
    fn test_insert_omits_empty_cells_but_update_binds_null() {
        let payload = data(json!({"label": "", "price": 3}));
        let cells = build_write_set(&products(), &payload, WriteMode::Insert).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].0, "price");

        let cells = build_write_set(&products(), &payload, WriteMode::Update).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(matches!(cells[0].1, SqlParam::Text(None)));
    }

    #[test]
    fn test_write_set_rejects_unknown_columns() {
        let err = build_write_set(
            &products(),
            &data(json!({"colour": "red"})),
            WriteMode::Insert,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn { column, .. } if column == "colour"));
    }

    #[test]
    fn test_write_set_surfaces_type_mismatch() {
        let err = build_write_set(
            &products(),
            &data(json!({"price": "abc"})),
            WriteMode::Insert,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { column, .. } if column == "price"));
    }

    #[test]
    fn test_write_set_parses_json_text() {
        let cells = build_write_set(
            &products(),
            &data(json!({"tags": "[\"sale\", \"new\"]"})),
            WriteMode::Insert,
        )
        .unwrap();
        assert!(matches!(&cells[0].1, SqlParam::Json(Some(v)) if v == &json!(["sale", "new"])));
    }
}
