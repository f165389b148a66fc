use crate::value::SqlParam;

/// One parameterized statement ready for execution.
#[derive(Debug)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// INSERT with every supplied cell bound as a parameter, returning the
/// stored row (the store fills the primary key and any defaults).
pub fn insert(schema: &str, table: &str, cells: Vec<(String, SqlParam)>) -> Statement {
    if cells.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {schema}.{table} DEFAULT VALUES RETURNING *"),
            params: vec![],
        };
    }

    let columns: Vec<&str> = cells.iter().map(|(name, _)| name.as_str()).collect();
    let placeholders: Vec<String> = (1..=cells.len()).map(|n| format!("${n}")).collect();
    let sql = format!(
        "INSERT INTO {}.{} ({}) VALUES ({}) RETURNING *",
        schema,
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    Statement {
        sql,
        params: cells.into_iter().map(|(_, p)| p).collect(),
    }
}

/// Partial UPDATE: only the supplied cells enter the SET list; the primary
/// key is the final parameter. The key binds as bigint and the comparison
/// promotes, so integer and bigint key columns both match without a driver
/// type error. RETURNING * lets the caller detect a missing row without a
/// second round-trip.
pub fn update(
    schema: &str,
    table: &str,
    pk_column: &str,
    id: i64,
    cells: Vec<(String, SqlParam)>,
) -> Statement {
    let assignments: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ${}", name, i + 1))
        .collect();
    let sql = format!(
        "UPDATE {}.{} SET {} WHERE {} = ${}::bigint RETURNING *",
        schema,
        table,
        assignments.join(", "),
        pk_column,
        cells.len() + 1
    );
    let mut params: Vec<SqlParam> = cells.into_iter().map(|(_, p)| p).collect();
    params.push(SqlParam::BigInt(Some(id)));
    Statement { sql, params }
}

/// SELECT * ordered by the primary key for deterministic display.
pub fn select_all(schema: &str, table: &str, pk_column: &str, limit: u32) -> String {
    format!("SELECT * FROM {schema}.{table} ORDER BY {pk_column} ASC LIMIT {limit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_binds_every_cell() {
        let stmt = insert(
            "public",
            "products",
            vec![
                ("label".into(), SqlParam::Text(Some("mug".into()))),
                ("price".into(), SqlParam::Int(Some(19))),
            ],
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO public.products (label, price) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_insert_empty_write_set_uses_defaults() {
        let stmt = insert("public", "products", vec![]);
        assert_eq!(
            stmt.sql,
            "INSERT INTO public.products DEFAULT VALUES RETURNING *"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_update_is_partial_and_pk_is_last_param() {
        let stmt = update(
            "public",
            "products",
            "id",
            7,
            vec![("price".into(), SqlParam::Int(Some(25)))],
        );
        assert_eq!(
            stmt.sql,
            "UPDATE public.products SET price = $1 WHERE id = $2::bigint RETURNING *"
        );
        assert_eq!(stmt.params.len(), 2);
        assert!(matches!(stmt.params[1], SqlParam::BigInt(Some(7))));
    }

    #[test]
    fn test_update_key_binds_full_range() {
        // bigint primary keys from externally created tables must not
        // truncate through the binding
        let big = i64::from(i32::MAX) + 1;
        let stmt = update(
            "public",
            "events",
            "id",
            big,
            vec![("label".into(), SqlParam::Text(None))],
        );
        assert!(matches!(stmt.params[1], SqlParam::BigInt(Some(v)) if v == big));
        assert!(stmt.sql.contains("WHERE id = $2::bigint"));
    }

    #[test]
    fn test_update_multiple_cells_numbering() {
        let stmt = update(
            "public",
            "products",
            "id",
            1,
            vec![
                ("label".into(), SqlParam::Text(None)),
                ("price".into(), SqlParam::Int(Some(3))),
            ],
        );
        assert_eq!(
            stmt.sql,
            "UPDATE public.products SET label = $1, price = $2 WHERE id = $3::bigint RETURNING *"
        );
    }

    #[test]
    fn test_select_all_orders_by_pk() {
        assert_eq!(
            select_all("public", "products", "id", 100),
            "SELECT * FROM public.products ORDER BY id ASC LIMIT 100"
        );
        assert_eq!(
            select_all("sales", "orders", "id", 25),
            "SELECT * FROM sales.orders ORDER BY id ASC LIMIT 25"
        );
    }
}
