use serde::{Deserialize, Serialize};

use crate::catalog::TableDefinition;

/// Declarative two-table equality join, constructed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpecification {
    #[serde(rename = "leftTable")]
    pub left_table: String,
    #[serde(rename = "rightTable")]
    pub right_table: String,
    #[serde(rename = "leftKey")]
    pub left_key: String,
    #[serde(rename = "rightKey")]
    pub right_key: String,
}

/// Build the INNER JOIN select over two introspected tables. The FROM
/// clause is schema-qualified so the statement reads the same tables the
/// catalog described; column references stay bare-table-qualified (the
/// relation keeps its bare name inside the query).
///
/// Collision rule (consumers match columns by name, so it must be stable):
/// left-table columns keep their bare names; a right-table column whose name
/// also exists on the left is projected as `<right_table>_<column>`. Both
/// `id` columns therefore always survive with distinct names. Aliases longer
/// than 63 bytes are truncated by the store itself.
pub fn build(
    spec: &JoinSpecification,
    left: &TableDefinition,
    right: &TableDefinition,
    schema: &str,
    limit: u32,
) -> String {
    let mut projections = Vec::with_capacity(left.columns.len() + right.columns.len());
    for col in &left.columns {
        projections.push(format!("{}.{}", left.name, col.name));
    }
    for col in &right.columns {
        if left.column(&col.name).is_some() {
            projections.push(format!(
                "{}.{} AS {}_{}",
                right.name, col.name, right.name, col.name
            ));
        } else {
            projections.push(format!("{}.{}", right.name, col.name));
        }
    }

    let mut sql = format!(
        "SELECT {} FROM {}.{} INNER JOIN {}.{} ON {}.{} = {}.{}",
        projections.join(", "),
        schema,
        left.name,
        schema,
        right.name,
        left.name,
        spec.left_key,
        right.name,
        spec.right_key
    );

    // deterministic result order: left pk first, right pk as tiebreaker
    let mut order = Vec::new();
    if let Some(pk) = left.primary_key() {
        order.push(format!("{}.{}", left.name, pk.name));
    }
    if let Some(pk) = right.primary_key() {
        order.push(format!("{}.{}", right.name, pk.name));
    }
    if !order.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    sql.push_str(&format!(" LIMIT {limit}"));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDefinition;
    use crate::value::LogicalType;

    fn table(name: &str, extra: &[&str]) -> TableDefinition {
        let mut columns = vec![ColumnDefinition::implicit_primary_key()];
        for col in extra {
            columns.push(ColumnDefinition::new(*col, LogicalType::Text));
        }
        TableDefinition {
            name: name.into(),
            columns,
        }
    }

    fn spec() -> JoinSpecification {
        JoinSpecification {
            left_table: "orders".into(),
            right_table: "customers".into(),
            left_key: "customer_id".into(),
            right_key: "id".into(),
        }
    }

    #[test]
    fn test_colliding_right_columns_are_prefixed() {
        let left = table("orders", &["customer_id"]);
        let right = table("customers", &["name"]);
        let sql = build(&spec(), &left, &right, "public", 100);
        assert_eq!(
            sql,
            "SELECT orders.id, orders.customer_id, customers.id AS customers_id, \
             customers.name \
             FROM public.orders INNER JOIN public.customers \
             ON orders.customer_id = customers.id \
             ORDER BY orders.id, customers.id LIMIT 100"
        );
    }

    #[test]
    fn test_shared_non_key_columns_also_disambiguate() {
        let left = table("orders", &["name"]);
        let right = table("customers", &["name"]);
        let sql = build(&spec(), &left, &right, "public", 50);
        assert!(sql.contains("customers.id AS customers_id"));
        assert!(sql.contains("customers.name AS customers_name"));
        assert!(sql.contains("orders.name,"));
        assert!(sql.ends_with("LIMIT 50"));
    }

    #[test]
    fn test_join_reads_from_configured_schema() {
        let left = table("orders", &["customer_id"]);
        let right = table("customers", &["name"]);
        let sql = build(&spec(), &left, &right, "sales", 100);
        assert!(sql.contains("FROM sales.orders INNER JOIN sales.customers"));
    }

    #[test]
    fn test_wire_shape() {
        let parsed: JoinSpecification = serde_json::from_str(
            r#"{"leftTable": "orders", "rightTable": "customers",
                "leftKey": "customer_id", "rightKey": "id"}"#,
        )
        .unwrap();
        assert_eq!(parsed, spec());
    }
}
