//! Typed table requests and the parser for the dynamic JSON request shape.
//!
//! Every request is validated when it is built: table and column names must
//! be plain identifiers, operators come from a closed set, and `LIMIT` is a
//! bounded integer. Values are always bound as parameters, so only the
//! identifiers checked here ever reach the SQL text.

use crate::error::{AccessError, Result};
use crate::models::Value;
use serde_json::Map;
use std::fmt;
use std::str::FromStr;

const MODE_KEY: &str = "modo";
const ID_KEY: &str = "id";
const WHERE_KEY: &str = "WHERE";
const COLUMNS_KEYS: [&str; 2] = ["COLUNAS", "columns"];
const LIMIT_KEY: &str = "LIMIT";
const ORDER_BY_KEY: &str = "ORDER_BY";
const FILTER_KEYS: [&str; 2] = ["filtros", "filters"];

/// Operation selector of the dynamic request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Save,
    Read,
}

impl FromStr for Mode {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "save" | "salvar" => Ok(Mode::Save),
            "read" | "ler" => Ok(Mode::Read),
            _ => Err(AccessError::InvalidMode(s.to_string())),
        }
    }
}

/// Comparison operator of an advanced select condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(AccessError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `column op ?` term of a select predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

/// Columns returned by a select
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One `column [ASC|DESC]` term of an ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Option<Direction>,
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(Direction::Asc) => write!(f, "{} ASC", self.column),
            Some(Direction::Desc) => write!(f, "{} DESC", self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Parse an ORDER BY expression such as `"datahora ASC, id"`
pub fn parse_order_by(expr: &str) -> Result<Vec<OrderTerm>> {
    let invalid = || AccessError::InvalidOrderBy(expr.to_string());
    let mut terms = Vec::new();

    for part in expr.split(',') {
        let mut words = part.split_whitespace();
        let column = words.next().ok_or_else(invalid)?;
        if !is_identifier(column) {
            return Err(invalid());
        }
        let direction = match words.next().map(str::to_uppercase).as_deref() {
            None => None,
            Some("ASC") => Some(Direction::Asc),
            Some("DESC") => Some(Direction::Desc),
            Some(_) => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }
        terms.push(OrderTerm {
            column: column.to_string(),
            direction,
        });
    }

    Ok(terms)
}

/// Whether `name` is a plain (optionally `schema.`-qualified) SQL identifier
pub fn is_identifier(name: &str) -> bool {
    let part_ok = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2 && parts.into_iter().all(part_ok)
}

pub fn validate_table(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(AccessError::InvalidTable(name.to_string()))
    }
}

fn validate_column(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(AccessError::InvalidIdentifier(name.to_string()))
    }
}

fn collect_pairs<I, K, V>(pairs: I) -> Result<Vec<(String, Value)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| {
            let column = k.into();
            validate_column(&column)?;
            Ok((column, v.into()))
        })
        .collect()
}

/// Plain INSERT of column=value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertRequest {
    values: Vec<(String, Value)>,
}

impl InsertRequest {
    pub fn new<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Ok(Self {
            values: collect_pairs(values)?,
        })
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

/// Row selection of an UPDATE
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTarget {
    /// `WHERE id=?`
    ById(i64),
    /// Every pair ANDed together; `id` is only echoed back to the caller
    ByPredicate {
        filter: Vec<(String, Value)>,
        id: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    assignments: Vec<(String, Value)>,
    target: UpdateTarget,
}

impl UpdateRequest {
    pub fn by_id<I, K, V>(id: i64, assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::build(assignments, UpdateTarget::ById(id))
    }

    pub fn by_predicate<I, K, V, F, FK, FV>(filter: F, assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        F: IntoIterator<Item = (FK, FV)>,
        FK: Into<String>,
        FV: Into<Value>,
    {
        let filter = collect_pairs(filter)?;
        if filter.is_empty() {
            return Err(AccessError::InvalidRequest(
                "custom WHERE must name at least one column".to_string(),
            ));
        }
        Self::build(assignments, UpdateTarget::ByPredicate { filter, id: None })
    }

    /// Id reported back by a predicate update
    pub fn with_reported_id(mut self, reported: i64) -> Self {
        if let UpdateTarget::ByPredicate { id, .. } = &mut self.target {
            *id = Some(reported);
        }
        self
    }

    fn build<I, K, V>(assignments: I, target: UpdateTarget) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let assignments: Vec<(String, Value)> = collect_pairs(assignments)?
            .into_iter()
            .filter(|(column, _)| column != ID_KEY)
            .collect();
        if assignments.is_empty() {
            return Err(AccessError::EmptyUpdate(match &target {
                UpdateTarget::ById(id) => format!("id {id}"),
                UpdateTarget::ByPredicate { .. } => "custom WHERE".to_string(),
            }));
        }
        Ok(Self {
            assignments,
            target,
        })
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn target(&self) -> &UpdateTarget {
        &self.target
    }

    /// Value returned to the caller after the update runs
    pub fn reported_id(&self) -> i64 {
        match &self.target {
            UpdateTarget::ById(id) => *id,
            UpdateTarget::ByPredicate { id, .. } => id.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectRequest {
    filters: Vec<(String, Value)>,
    conditions: Vec<Condition>,
    projection: Projection,
    order_by: Vec<OrderTerm>,
    limit: Option<u32>,
}

impl SelectRequest {
    pub fn builder() -> SelectBuilder {
        SelectBuilder::default()
    }

    /// Equality filters, in request order
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// Operator conditions, applied after the equality filters
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn order_by(&self) -> &[OrderTerm] {
        &self.order_by
    }

    /// Row cap; `None` when unlimited
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Whether the caller gets a single row instead of a sequence
    pub fn wants_single_row(&self) -> bool {
        self.limit == Some(1)
    }
}

/// Collects select parts; everything is validated in [`SelectBuilder::build`]
#[derive(Debug, Default)]
pub struct SelectBuilder {
    filters: Vec<(String, Value)>,
    conditions: Vec<(String, String, Value)>,
    columns: Option<Vec<String>>,
    order_by: Option<String>,
    limit: Option<u32>,
}

impl SelectBuilder {
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn condition(
        mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions
            .push((column.into(), op.into(), value.into()));
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    /// `0` means no limit
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<SelectRequest> {
        for (column, _) in &self.filters {
            validate_column(column)?;
        }

        let conditions = self
            .conditions
            .into_iter()
            .map(|(column, op, value)| {
                validate_column(&column)?;
                Ok(Condition {
                    column,
                    op: op.parse()?,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let projection = match self.columns {
            None => Projection::All,
            Some(columns) if columns.is_empty() || columns.iter().any(|c| c == "*") => {
                Projection::All
            }
            Some(columns) => {
                for column in &columns {
                    validate_column(column)?;
                }
                Projection::Columns(columns)
            }
        };

        let order_by = match self.order_by.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(expr) => parse_order_by(expr)?,
        };

        Ok(SelectRequest {
            filters: self.filters,
            conditions,
            projection,
            order_by,
            limit: self.limit.filter(|&n| n > 0),
        })
    }
}

/// A validated table request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Insert(InsertRequest),
    Update(UpdateRequest),
    Select(SelectRequest),
}

impl Request {
    /// Parse the dynamic request shape.
    ///
    /// `modo` picks save (the default) or read. On save, a non-empty
    /// `WHERE` object or an `id` outside {null, "", 0} makes an UPDATE;
    /// anything else is an INSERT. On read, every non-reserved key is an
    /// equality filter.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            AccessError::InvalidRequest("request must be a JSON object".to_string())
        })?;

        match mode_of(object)? {
            Mode::Save => parse_save(object),
            Mode::Read => parse_select(object).map(Request::Select),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Insert(_) => "insert",
            Request::Update(_) => "update",
            Request::Select(_) => "select",
        }
    }
}

impl From<InsertRequest> for Request {
    fn from(r: InsertRequest) -> Self {
        Request::Insert(r)
    }
}

impl From<UpdateRequest> for Request {
    fn from(r: UpdateRequest) -> Self {
        Request::Update(r)
    }
}

impl From<SelectRequest> for Request {
    fn from(r: SelectRequest) -> Self {
        Request::Select(r)
    }
}

type JsonObject = Map<String, serde_json::Value>;

fn mode_of(object: &JsonObject) -> Result<Mode> {
    match object.get(MODE_KEY) {
        None | Some(serde_json::Value::Null) => Ok(Mode::Save),
        Some(serde_json::Value::String(s)) => s.parse(),
        Some(other) => Err(AccessError::InvalidMode(other.to_string())),
    }
}

fn is_select_only_key(key: &str) -> bool {
    COLUMNS_KEYS.contains(&key)
        || FILTER_KEYS.contains(&key)
        || key == LIMIT_KEY
        || key == ORDER_BY_KEY
}

fn parse_save(object: &JsonObject) -> Result<Request> {
    if let Some(key) = object.keys().find(|k| is_select_only_key(k)) {
        return Err(AccessError::InvalidRequest(format!(
            "'{key}' is only valid in read mode"
        )));
    }

    let custom_where = match object.get(WHERE_KEY) {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Object(filter)) if filter.is_empty() => None,
        Some(serde_json::Value::Object(filter)) => Some(scalar_pairs(filter.iter())?),
        Some(other) => {
            return Err(AccessError::InvalidRequest(format!(
                "WHERE must be an object, got {other}"
            )))
        }
    };

    let id = object.get(ID_KEY).map(Value::try_from).transpose()?;
    let id = id.filter(|v| !v.is_absent_id());

    let assignments = scalar_pairs(
        object
            .iter()
            .filter(|(k, _)| *k != MODE_KEY && *k != WHERE_KEY && *k != ID_KEY),
    )?;

    let id = id
        .map(|id| {
            id.as_i64().ok_or_else(|| {
                AccessError::InvalidRequest(format!("id must be an integer, got {id}"))
            })
        })
        .transpose()?;

    match (custom_where, id) {
        (Some(filter), id) => UpdateRequest::by_predicate(filter, assignments)
            .map(|r| r.with_reported_id(id.unwrap_or(0)))
            .map(Request::Update),
        (None, Some(id)) => UpdateRequest::by_id(id, assignments).map(Request::Update),
        (None, None) => InsertRequest::new(assignments).map(Request::Insert),
    }
}

fn parse_select(object: &JsonObject) -> Result<SelectRequest> {
    let mut builder = SelectRequest::builder();

    for (key, value) in object {
        let key = key.as_str();
        if key == MODE_KEY {
            continue;
        }
        if COLUMNS_KEYS.contains(&key) {
            builder = builder.columns(parse_columns(value)?);
        } else if FILTER_KEYS.contains(&key) {
            for (column, op, value) in parse_triples(value)? {
                builder = builder.condition(column, op, value);
            }
        } else if key == LIMIT_KEY {
            if let Some(limit) = parse_limit(value)? {
                builder = builder.limit(limit);
            }
        } else if key == ORDER_BY_KEY {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(expr) => builder = builder.order_by(expr.clone()),
                other => return Err(AccessError::InvalidOrderBy(other.to_string())),
            }
        } else {
            builder = builder.filter(key, Value::try_from(value)?);
        }
    }

    builder.build()
}

fn scalar_pairs<'a, I>(pairs: I) -> Result<Vec<(String, Value)>>
where
    I: Iterator<Item = (&'a String, &'a serde_json::Value)>,
{
    pairs
        .map(|(k, v)| Ok((k.clone(), Value::try_from(v)?)))
        .collect()
}

fn parse_columns(value: &serde_json::Value) -> Result<Vec<String>> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    AccessError::InvalidRequest(format!("column names must be strings, got {item}"))
                })
            })
            .collect(),
        other => Err(AccessError::InvalidRequest(format!(
            "columns must be a list of names, got {other}"
        ))),
    }
}

fn parse_triples(value: &serde_json::Value) -> Result<Vec<(String, String, Value)>> {
    let items = value.as_array().ok_or_else(|| {
        AccessError::InvalidRequest(format!("filters must be a list, got {value}"))
    })?;

    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([serde_json::Value::String(column), serde_json::Value::String(op), value]) => {
                Ok((column.clone(), op.clone(), Value::try_from(value)?))
            }
            _ => Err(AccessError::InvalidRequest(format!(
                "filter must be [column, operator, value], got {item}"
            ))),
        })
        .collect()
}

fn parse_limit(value: &serde_json::Value) -> Result<Option<u32>> {
    let invalid = || AccessError::InvalidLimit {
        value: value.to_string(),
    };
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => {
            let n = n.as_u64().ok_or_else(invalid)?;
            u32::try_from(n).map(Some).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}
