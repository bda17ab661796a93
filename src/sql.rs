//! SQL text generation for validated requests.

use crate::error::Result;
use crate::models::Value;
use crate::request::{
    validate_table, InsertRequest, Projection, Request, SelectRequest, UpdateRequest,
    UpdateTarget,
};

/// A statement ready to execute: SQL with `?` placeholders plus bound values
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Build the statement for `request` against `table`
pub fn build(table: &str, request: &Request) -> Result<Statement> {
    validate_table(table)?;
    Ok(match request {
        Request::Insert(insert) => build_insert(table, insert),
        Request::Update(update) => build_update(table, update),
        Request::Select(select) => build_select(table, select),
    })
}

fn build_insert(table: &str, insert: &InsertRequest) -> Statement {
    let values = insert.values();
    if values.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {table} DEFAULT VALUES"),
            params: Vec::new(),
        };
    }

    let columns = values
        .iter()
        .map(|(column, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");

    Statement {
        sql: format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
        params: values.iter().map(|(_, value)| value.clone()).collect(),
    }
}

fn build_update(table: &str, update: &UpdateRequest) -> Statement {
    let set_clause = update
        .assignments()
        .iter()
        .map(|(column, _)| format!("{column}=?"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params: Vec<Value> = update
        .assignments()
        .iter()
        .map(|(_, value)| value.clone())
        .collect();

    let where_clause = match update.target() {
        UpdateTarget::ById(id) => {
            params.push(Value::Integer(*id));
            "id=?".to_string()
        }
        UpdateTarget::ByPredicate { filter, .. } => {
            params.extend(filter.iter().map(|(_, value)| value.clone()));
            filter
                .iter()
                .map(|(column, _)| format!("{column} = ?"))
                .collect::<Vec<_>>()
                .join(" AND ")
        }
    };

    Statement {
        sql: format!("UPDATE {table} SET {set_clause} WHERE {where_clause}"),
        params,
    }
}

fn build_select(table: &str, select: &SelectRequest) -> Statement {
    let columns = match select.projection() {
        Projection::All => "*".to_string(),
        Projection::Columns(columns) => columns.join(", "),
    };

    let mut terms = Vec::new();
    let mut params = Vec::new();
    for (column, value) in select.filters() {
        terms.push(format!("{column} = ?"));
        params.push(value.clone());
    }
    for condition in select.conditions() {
        terms.push(format!("{} {} ?", condition.column, condition.op));
        params.push(condition.value.clone());
    }

    let mut sql = format!("SELECT {columns} FROM {table}");
    if !terms.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&terms.join(" AND "));
    }
    if !select.order_by().is_empty() {
        let order = select
            .order_by()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }
    // u32 from a validated request, so safe to inline
    if let Some(limit) = select.limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Statement { sql, params }
}
