//! Query pipeline
//!
//! Composes a base read with filter, sort, projection and pagination into one
//! deferred read against SQLite. Stages are applied in a fixed order
//! (filter → sort → projection → pagination) and the built read runs once;
//! store errors are returned to the caller unchanged.
//!
//! Defaults:
//! - sort: `createdAt` ascending; every sort ends with `id` ascending so page
//!   windows are stable across identical keys
//! - projection: every declared field except hidden ones (`version`, `active`)
//! - pagination: page 1, limit 100, limit clamped to [`MAX_PAGE_LIMIT`]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use super::filter::{translate, Filter, FilterValue, Predicate};
use super::schema::{FieldDef, FieldType, ResourceSchema};
use crate::Result;

/// Raw client query parameters
pub type QueryParams = BTreeMap<String, String>;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;
/// Hard ceiling on `limit`
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// The unfiltered read a pipeline starts from
///
/// Scope predicates are supplied by the server (route parameters, soft-delete
/// flags), not by the client, so they may name hidden fields.
#[derive(Debug, Clone)]
pub struct BaseRead {
    schema: &'static ResourceSchema,
    scope: Vec<Predicate>,
}

impl BaseRead {
    pub fn new(schema: &'static ResourceSchema) -> Self {
        Self {
            schema,
            scope: Vec::new(),
        }
    }

    /// Read of the single document with `id`
    pub fn by_id(schema: &'static ResourceSchema, id: &str) -> Self {
        Self::new(schema).scoped("id", FilterValue::Text(id.to_string()))
    }

    pub fn scoped(mut self, field: &str, value: FilterValue) -> Self {
        self.scope.push(Predicate::eq(field, value));
        self
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static FieldDef,
    pub descending: bool,
}

/// Skip/take window derived from `page` and `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageWindow {
    /// Parse raw `page`/`limit`; unusable values fall back to the defaults
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn take(&self) -> i64 {
        self.limit
    }
}

/// Builder over a [`BaseRead`]
#[derive(Debug, Clone)]
pub struct QueryPipeline {
    base: BaseRead,
    filter: Filter,
    sort: Vec<SortKey>,
    projection: Vec<&'static FieldDef>,
    window: Option<PageWindow>,
}

impl QueryPipeline {
    pub fn new(base: BaseRead) -> Self {
        let schema = base.schema;
        Self {
            base,
            filter: Filter::default(),
            sort: parse_sort(schema, None),
            projection: parse_projection(schema, None),
            window: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, spec: Option<&str>) -> Self {
        self.sort = parse_sort(self.base.schema, spec);
        self
    }

    pub fn project(mut self, spec: Option<&str>) -> Self {
        self.projection = parse_projection(self.base.schema, spec);
        self
    }

    pub fn paginate(mut self, window: PageWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn build(self) -> ExecutableRead {
        ExecutableRead {
            schema: self.base.schema,
            scope: self.base.scope,
            filter: self.filter.predicates,
            sort: self.sort,
            projection: self.projection,
            window: self.window,
        }
    }
}

/// Build the full list read for `base` from client parameters
pub fn build_query(base: BaseRead, params: &QueryParams) -> ExecutableRead {
    let filter = translate(params, base.schema);
    QueryPipeline::new(base)
        .filter(filter)
        .sort(params.get("sort").map(String::as_str))
        .project(params.get("fields").map(String::as_str))
        .paginate(PageWindow::from_params(
            params.get("page").map(String::as_str),
            params.get("limit").map(String::as_str),
        ))
        .build()
}

/// A composed read, ready to run against the store
#[derive(Debug, Clone)]
pub struct ExecutableRead {
    schema: &'static ResourceSchema,
    scope: Vec<Predicate>,
    filter: Vec<Predicate>,
    sort: Vec<SortKey>,
    projection: Vec<&'static FieldDef>,
    window: Option<PageWindow>,
}

impl ExecutableRead {
    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    pub fn window(&self) -> Option<PageWindow> {
        self.window
    }

    /// Generated SQL with `?` placeholders
    pub fn sql(&self) -> String {
        self.select_builder().into_sql()
    }

    /// Number of documents matching scope and filter, ignoring the window
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(self.schema.table);
        self.push_where(&mut qb);
        let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
        Ok(total)
    }

    /// Run the read and return the documents in sort order
    pub async fn execute(self, pool: &SqlitePool) -> Result<Vec<Value>> {
        let mut qb = self.select_builder();
        let rows = qb.build().fetch_all(pool).await?;
        rows.iter()
            .map(|row| row_to_document(row, &self.projection).map_err(Into::into))
            .collect()
    }

    /// Run the read and return the first document, if any
    pub async fn fetch_optional(self, pool: &SqlitePool) -> Result<Option<Value>> {
        let mut qb = self.select_builder();
        let row = qb.build().fetch_optional(pool).await?;
        match row {
            Some(row) => Ok(Some(row_to_document(&row, &self.projection)?)),
            None => Ok(None),
        }
    }

    fn select_builder(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        {
            let mut columns = qb.separated(", ");
            for field in &self.projection {
                columns.push(field.column);
            }
        }
        qb.push(" FROM ");
        qb.push(self.schema.table);

        self.push_where(&mut qb);

        qb.push(" ORDER BY ");
        {
            let mut keys = qb.separated(", ");
            for key in &self.sort {
                keys.push(key.field.column);
                keys.push_unseparated(if key.descending { " DESC" } else { " ASC" });
            }
        }

        if let Some(window) = self.window {
            qb.push(" LIMIT ");
            qb.push_bind(window.take());
            qb.push(" OFFSET ");
            qb.push_bind(window.skip());
        }

        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        let scope = self
            .scope
            .iter()
            .map(|p| (p, self.schema.field(&p.field)));
        let filter = self
            .filter
            .iter()
            .map(|p| (p, self.schema.filterable(&p.field)));

        for (i, (predicate, field)) in scope.chain(filter).enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match field {
                Some(field) => {
                    qb.push(field.column);
                    qb.push(" ");
                    qb.push(predicate.op.sql());
                    qb.push(" ");
                    match &predicate.value {
                        FilterValue::Integer(v) => qb.push_bind(*v),
                        FilterValue::Real(v) => qb.push_bind(*v),
                        FilterValue::Text(v) => qb.push_bind(v.clone()),
                    };
                }
                None => {
                    // No declared field by that name: a missing field never matches
                    qb.push("0 = 1");
                }
            }
        }
    }
}

/// Parse a comma-separated sort spec; `-field` sorts descending
fn parse_sort(schema: &'static ResourceSchema, spec: Option<&str>) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = Vec::new();

    for token in spec.unwrap_or("").split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let (name, descending) = match token.strip_prefix('-') {
            Some(name) => (name, true),
            None => (token, false),
        };
        match schema.field(name) {
            Some(field) if !keys.iter().any(|k| k.field.name == field.name) => {
                keys.push(SortKey { field, descending })
            }
            Some(_) => {}
            None => debug!("Ignoring unknown sort field '{}' on {}", name, schema.collection),
        }
    }

    if keys.is_empty() {
        if let Some(created) = schema.field("createdAt") {
            keys.push(SortKey {
                field: created,
                descending: false,
            });
        }
    }

    let id = schema.id_field();
    if !keys.iter().any(|k| k.field.name == id.name) {
        keys.push(SortKey {
            field: id,
            descending: false,
        });
    }

    keys
}

/// Parse a comma-separated projection spec
///
/// Inclusion entries (`name,price`) select those fields; when every entry is
/// an exclusion (`-description`) the default projection minus those fields is
/// returned. `id` is always included.
fn parse_projection(schema: &'static ResourceSchema, spec: Option<&str>) -> Vec<&'static FieldDef> {
    let tokens: Vec<&str> = spec
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return schema.default_projection();
    }

    let id = schema.id_field();
    let includes: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !t.starts_with('-'))
        .collect();

    if includes.is_empty() {
        let excluded: Vec<&str> = tokens.iter().map(|t| &t[1..]).collect();
        return schema
            .default_projection()
            .into_iter()
            .filter(|f| f.name == id.name || !excluded.contains(&f.name))
            .collect();
    }

    let mut fields = vec![id];
    for name in includes {
        match schema.field(name) {
            Some(field) if !fields.iter().any(|f| f.name == field.name) => fields.push(field),
            Some(_) => {}
            None => debug!(
                "Ignoring unknown projection field '{}' on {}",
                name, schema.collection
            ),
        }
    }
    fields
}

fn row_to_document(row: &SqliteRow, projection: &[&FieldDef]) -> std::result::Result<Value, sqlx::Error> {
    let mut doc = Map::with_capacity(projection.len());
    for field in projection {
        let value = match field.ty {
            FieldType::Text => row
                .try_get::<Option<String>, _>(field.column)?
                .map(Value::String)
                .unwrap_or(Value::Null),
            FieldType::Integer => row
                .try_get::<Option<i64>, _>(field.column)?
                .map(|v| json!(v))
                .unwrap_or(Value::Null),
            FieldType::Real => row
                .try_get::<Option<f64>, _>(field.column)?
                .map(|v| json!(v))
                .unwrap_or(Value::Null),
            FieldType::Boolean => row
                .try_get::<Option<bool>, _>(field.column)?
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            FieldType::Timestamp => match row.try_get::<Option<DateTime<Utc>>, _>(field.column)? {
                Some(ts) => serde_json::to_value(ts).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                None => Value::Null,
            },
            FieldType::List => match row.try_get::<Option<String>, _>(field.column)? {
                Some(text) => serde_json::from_str(&text).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                None => Value::Array(Vec::new()),
            },
        };
        doc.insert(field.name.to_string(), value);
    }
    Ok(Value::Object(doc))
}
