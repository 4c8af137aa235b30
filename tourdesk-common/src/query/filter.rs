//! Filter translation
//!
//! Turns a flat map of client query parameters into predicates:
//! - `field=value` becomes an equality predicate
//! - `field[gt|gte|lt|lte]=value` becomes a range predicate
//!
//! Only the four range suffixes are ever placed in operator position. Any other
//! bracketed key (`price[ne]`, `price[$where]`) stays a literal field name, which
//! no schema declares, so it can only ever match nothing.

use std::collections::BTreeMap;

use super::schema::{FieldType, ResourceSchema};

/// Shape and pagination directives, never predicates
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            _ => None,
        }
    }

    /// SQL spelling of the operator
    pub fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: Comparison,
    pub value: FilterValue,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            op: Comparison::Eq,
            value,
        }
    }
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Translate query parameters into a filter for `schema`
///
/// Never fails. Values that cannot be coerced to a numeric field's type are
/// kept as literal text equality, which matches zero rows.
pub fn translate(params: &BTreeMap<String, String>, schema: &ResourceSchema) -> Filter {
    let predicates = params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
        .map(|(key, raw)| {
            let (field, op) = split_operator(key);
            let ty = schema.filterable(field).map(|f| f.ty);
            match coerce(raw, ty) {
                Some(value) => Predicate {
                    field: field.to_string(),
                    op,
                    value,
                },
                None => Predicate::eq(field, FilterValue::Text(raw.clone())),
            }
        })
        .collect();

    Filter { predicates }
}

/// Split `field[op]` into its parts when `op` is a supported suffix
fn split_operator(key: &str) -> (&str, Comparison) {
    if let Some(open) = key.find('[') {
        if let Some(inner) = key[open + 1..].strip_suffix(']') {
            if let Some(op) = Comparison::from_suffix(inner) {
                if open > 0 {
                    return (&key[..open], op);
                }
            }
        }
    }
    (key, Comparison::Eq)
}

/// Coerce a raw value for a field type; `None` when a numeric coercion fails
fn coerce(raw: &str, ty: Option<FieldType>) -> Option<FilterValue> {
    let trimmed = raw.trim();
    match ty {
        Some(FieldType::Integer) => trimmed
            .parse::<i64>()
            .ok()
            .map(FilterValue::Integer)
            .or_else(|| parse_finite(trimmed).map(FilterValue::Real)),
        Some(FieldType::Real) => parse_finite(trimmed).map(FilterValue::Real),
        Some(FieldType::Boolean) => match trimmed {
            "true" | "1" => Some(FilterValue::Integer(1)),
            "false" | "0" => Some(FilterValue::Integer(0)),
            _ => None,
        },
        Some(FieldType::Text) | Some(FieldType::Timestamp) | Some(FieldType::List) | None => {
            Some(FilterValue::Text(raw.to_string()))
        }
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
