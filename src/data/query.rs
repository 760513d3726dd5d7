use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::data::{constants::op, record, Error, Record};
use crate::Result;

/// A single comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Contains(Value),
    Exists(bool),
}

/// Structural query over records.
///
/// Parsed from mongo-style documents: `{"status": "open"}` is an equality
/// clause, `{"rank": {"$gte": 3}}` an operator clause, and several keys in one
/// document are AND-combined.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Query {
    #[default]
    All,
    Field {
        field: String,
        condition: Condition,
    },
    And(Vec<Query>),
    Or(Vec<Query>),
}

impl Query {
    /// Equality clause on a single field
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Field {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    pub fn parse(document: &Value) -> Result<Self> {
        match document {
            Value::Null => Ok(Query::All),
            Value::Object(map) => Self::from_record(map),
            other => Err(Error::InvalidQuery(format!(
                "query document must be an object, got {}",
                other
            ))),
        }
    }

    pub fn from_record(document: &Record) -> Result<Self> {
        let mut clauses = Vec::with_capacity(document.len());

        for (key, value) in document {
            let clause = match key.as_str() {
                op::AND => Query::And(Self::parse_list(key, value)?),
                op::OR => Query::Or(Self::parse_list(key, value)?),
                _ => Self::clause(key, value)?,
            };
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => Query::All,
            1 => clauses.remove(0),
            _ => Query::And(clauses),
        })
    }

    fn parse_list(key: &str, value: &Value) -> Result<Vec<Query>> {
        value
            .as_array()
            .ok_or_else(|| Error::InvalidQuery(format!("{} expects an array", key)))?
            .iter()
            .map(Self::parse)
            .collect()
    }

    /// One field clause: a literal value means equality, an object of
    /// `$`-prefixed keys is a set of AND-combined operators.
    pub fn clause(field: &str, value: &Value) -> Result<Query> {
        let operators = match value {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
            _ => return Ok(Query::eq(field, value.clone())),
        };

        let mut clauses = operators
            .iter()
            .map(|(name, operand)| {
                Ok(Query::Field {
                    field: field.to_string(),
                    condition: Condition::parse(name, operand)?,
                })
            })
            .collect::<Result<Vec<Query>>>()?;

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Query::And(clauses)
        })
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Query::All => true,
            Query::Field { field, condition } => condition.matches(record.get(field)),
            Query::And(queries) => queries.iter().all(|q| q.matches(record)),
            Query::Or(queries) => queries.iter().any(|q| q.matches(record)),
        }
    }

    /// The `(field, value)` pair when this query is a plain equality clause
    pub fn as_equality(&self) -> Option<(&str, &Value)> {
        match self {
            Query::Field {
                field,
                condition: Condition::Eq(value),
            } => Some((field.as_str(), value)),
            _ => None,
        }
    }
}

impl TryFrom<Value> for Query {
    type Error = Error;

    fn try_from(document: Value) -> Result<Self> {
        Query::parse(&document)
    }
}

impl Condition {
    fn parse(name: &str, operand: &Value) -> Result<Self> {
        let condition = match name {
            op::EQ => Condition::Eq(operand.clone()),
            op::NE => Condition::Ne(operand.clone()),
            op::GT => Condition::Gt(operand.clone()),
            op::GTE => Condition::Gte(operand.clone()),
            op::LT => Condition::Lt(operand.clone()),
            op::LTE => Condition::Lte(operand.clone()),
            op::IN => Condition::In(Self::operand_list(name, operand)?),
            op::NIN => Condition::Nin(Self::operand_list(name, operand)?),
            op::CONTAINS => Condition::Contains(operand.clone()),
            op::EXISTS => Condition::Exists(operand.as_bool().ok_or_else(|| {
                Error::InvalidQuery(format!("{} expects a boolean", name))
            })?),
            other => return Err(Error::InvalidQuery(format!("unknown operator {}", other))),
        };
        Ok(condition)
    }

    fn operand_list(name: &str, operand: &Value) -> Result<Vec<Value>> {
        operand
            .as_array()
            .cloned()
            .ok_or_else(|| Error::InvalidQuery(format!("{} expects an array", name)))
    }

    /// Evaluate against a field value. `None` means the field is absent.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Condition::Exists(expected), value) => value.is_some() == *expected,
            (Condition::Ne(operand), None) => !operand.is_null(),
            (Condition::Nin(_), None) => true,
            (_, None) => false,
            (Condition::Eq(operand), Some(value)) => values_equal(value, operand),
            (Condition::Ne(operand), Some(value)) => !values_equal(value, operand),
            (Condition::Gt(operand), Some(value)) => {
                compare_same_kind(value, operand) == Some(Ordering::Greater)
            }
            (Condition::Gte(operand), Some(value)) => matches!(
                compare_same_kind(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            (Condition::Lt(operand), Some(value)) => {
                compare_same_kind(value, operand) == Some(Ordering::Less)
            }
            (Condition::Lte(operand), Some(value)) => matches!(
                compare_same_kind(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            (Condition::In(options), Some(value)) => options.iter().any(|o| values_equal(value, o)),
            (Condition::Nin(options), Some(value)) => !options.iter().any(|o| values_equal(value, o)),
            (Condition::Contains(operand), Some(value)) => match (value, operand) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), operand) => items.iter().any(|item| values_equal(item, operand)),
                _ => false,
            },
        }
    }
}

/// Equality with numbers compared by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Ordering::Equal,
        _ => a == b,
    }
}

/// Integers compare exactly; only a float on either side goes through `f64`.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x.cmp(&y);
    }
    if !x.is_f64() && !y.is_f64() {
        // one side negative, the other above i64::MAX
        return if x.is_u64() { Ordering::Greater } else { Ordering::Less };
    }
    x.as_f64()
        .zip(y.as_f64())
        .and_then(|(x, y)| x.partial_cmp(&y))
        .unwrap_or(Ordering::Equal)
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    if kind_rank(a) != kind_rank(b) {
        return None;
    }
    Some(compare(a, b))
}

/// Total order used by sorts: null < bool < number < string < array < object.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Compare two records on one attribute. Absent and null fields sort first.
pub fn compare_field(a: &Record, b: &Record, attribute: &str) -> Ordering {
    match (record::field(a, attribute), record::field(b, attribute)) {
        (Some(x), Some(y)) => compare(x, y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
