use crate::catalog::ColumnDefinition;

/// CREATE TABLE with the implicit `id` primary key leading, then the user
/// columns in request order. Statements are schema-qualified so they hit the
/// same tables the catalog describes, regardless of `search_path`.
pub fn create_table(schema: &str, table: &str, columns: &[ColumnDefinition]) -> String {
    let mut defs = vec!["id SERIAL PRIMARY KEY".to_string()];
    for col in columns {
        defs.push(column_clause(schema, col, false));
    }
    format!("CREATE TABLE {}.{} ({})", schema, table, defs.join(", "))
}

/// ALTER TABLE ... ADD COLUMN. `as_primary` is only ever true for an empty
/// table; the engine rejects the populated case up front.
pub fn add_column(schema: &str, table: &str, column: &ColumnDefinition) -> String {
    format!(
        "ALTER TABLE {}.{} ADD COLUMN {}",
        schema,
        table,
        column_clause(schema, column, column.is_primary)
    )
}

/// Plain DROP TABLE. No CASCADE: the engine refuses the drop while foreign
/// keys still point at the table.
pub fn drop_table(schema: &str, table: &str) -> String {
    format!("DROP TABLE {schema}.{table}")
}

fn column_clause(schema: &str, col: &ColumnDefinition, as_primary: bool) -> String {
    let mut clause = format!("{} {}", col.name, col.logical_type.store_type());
    if as_primary {
        clause.push_str(" PRIMARY KEY");
    }
    if col.is_foreign_key {
        if let Some(fk) = &col.foreign_key {
            clause.push_str(&format!(" REFERENCES {}.{}({})", schema, fk.table, fk.column));
        }
    }
    clause
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::LogicalType;

    #[test]
    fn test_create_table_leads_with_implicit_pk() {
        let sql = create_table("public", "products", &[]);
        assert_eq!(sql, "CREATE TABLE public.products (id SERIAL PRIMARY KEY)");

        let cols = vec![
            ColumnDefinition::new("label", LogicalType::Text),
            ColumnDefinition::new("price", LogicalType::Integer),
        ];
        let sql = create_table("public", "products", &cols);
        assert_eq!(
            sql,
            "CREATE TABLE public.products (id SERIAL PRIMARY KEY, label TEXT, price INTEGER)"
        );
    }

    #[test]
    fn test_create_table_with_foreign_key() {
        let mut col = ColumnDefinition::new("customer_id", LogicalType::Integer);
        col.is_foreign_key = true;
        col.foreign_key = Some(crate::catalog::ForeignKeyReference {
            table: "customers".into(),
            column: "id".into(),
        });
        let sql = create_table("public", "orders", &[col]);
        assert_eq!(
            sql,
            "CREATE TABLE public.orders (id SERIAL PRIMARY KEY, \
             customer_id INTEGER REFERENCES public.customers(id))"
        );
    }

    #[test]
    fn test_add_column_variants() {
        let col = ColumnDefinition::new("born_on", LogicalType::Date);
        assert_eq!(
            add_column("public", "people", &col),
            "ALTER TABLE public.people ADD COLUMN born_on DATE"
        );

        let mut pk = ColumnDefinition::new("code", LogicalType::Integer);
        pk.is_primary = true;
        assert_eq!(
            add_column("public", "people", &pk),
            "ALTER TABLE public.people ADD COLUMN code INTEGER PRIMARY KEY"
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(drop_table("public", "products"), "DROP TABLE public.products");
    }

    #[test]
    fn test_configured_schema_scopes_every_statement() {
        let col = ColumnDefinition::new("total", LogicalType::Integer);
        assert_eq!(
            create_table("sales", "orders", &[col.clone()]),
            "CREATE TABLE sales.orders (id SERIAL PRIMARY KEY, total INTEGER)"
        );
        assert_eq!(
            add_column("sales", "orders", &col),
            "ALTER TABLE sales.orders ADD COLUMN total INTEGER"
        );
        assert_eq!(drop_table("sales", "orders"), "DROP TABLE sales.orders");
    }
}
