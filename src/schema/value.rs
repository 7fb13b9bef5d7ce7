//! Value schemas and validation.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};

/// A single validation problem found while checking a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Dotted path to the offending value (`""` for the root).
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Outcome of validating a single raw parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// No value was supplied and the schema requires one.
    Missing,
    /// A value was supplied but did not satisfy the schema.
    Invalid(Vec<SchemaIssue>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    min_len: Option<usize>,
    max_len: Option<usize>,
    one_of: Option<Vec<String>>,
}

impl StringSchema {
    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    pub fn max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn optional(self) -> Schema {
        Schema::from(self).optional()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
}

impl NumberSchema {
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn optional(self) -> Schema {
        Schema::from(self).optional()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    items: Box<Schema>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

impl ArraySchema {
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn optional(self) -> Schema {
        Schema::from(self).optional()
    }
}

/// An object schema: a set of named fields, each with its own schema.
///
/// Fields are kept in a sorted map so that two compositions of the same
/// inputs always compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: BTreeMap<String, Schema>,
}

impl ObjectSchema {
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.fields.insert(name.into(), schema.into());
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, Schema> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Adds every field of `outer` that this schema does not already declare.
    pub fn absorb_outer(&mut self, outer: &ObjectSchema) {
        for (name, schema) in &outer.fields {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| schema.clone());
        }
    }

    pub fn optional(self) -> Schema {
        Schema::from(self).optional()
    }

    /// Validates `value` and returns the projection onto declared fields.
    pub fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let mut issues = Vec::new();
        let projected = check_object(self, value, "", &mut issues);
        if issues.is_empty() {
            Ok(projected)
        } else {
            Err(issues)
        }
    }

    /// Like [`validate`](Self::validate) for form-encoded bodies, where every
    /// field arrives as text and is coerced to its declared type first.
    pub fn validate_form(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let Value::Object(map) = value else {
            return self.validate(value);
        };
        let mut coerced = map.clone();
        let mut issues = Vec::new();
        for (name, field) in &self.fields {
            if let Some(raw) = map.get(name) {
                match coerce_form_field(field, raw) {
                    Ok(v) => {
                        coerced.insert(name.clone(), v);
                    }
                    Err(found) => issues.extend(found.into_iter().map(|mut issue| {
                        issue.path = if issue.path.is_empty() {
                            name.clone()
                        } else {
                            join(name, &issue.path)
                        };
                        issue
                    })),
                }
            }
        }
        if !issues.is_empty() {
            return Err(issues);
        }
        self.validate(&Value::Object(coerced))
    }
}

/// Structural schema for request data.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    String(StringSchema),
    Number(NumberSchema),
    Boolean,
    Array(ArraySchema),
    Object(ObjectSchema),
    Optional(Box<Schema>),
}

pub fn any() -> Schema {
    Schema::Any
}

pub fn string() -> StringSchema {
    StringSchema::default()
}

pub fn number() -> NumberSchema {
    NumberSchema::default()
}

pub fn integer() -> NumberSchema {
    NumberSchema {
        integer: true,
        ..NumberSchema::default()
    }
}

pub fn boolean() -> Schema {
    Schema::Boolean
}

pub fn array(items: impl Into<Schema>) -> ArraySchema {
    ArraySchema {
        items: Box::new(items.into()),
        min_items: None,
        max_items: None,
    }
}

pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

impl From<StringSchema> for Schema {
    fn from(s: StringSchema) -> Self {
        Schema::String(s)
    }
}

impl From<NumberSchema> for Schema {
    fn from(s: NumberSchema) -> Self {
        Schema::Number(s)
    }
}

impl From<ArraySchema> for Schema {
    fn from(s: ArraySchema) -> Self {
        Schema::Array(s)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(s: ObjectSchema) -> Self {
        Schema::Object(s)
    }
}

impl Schema {
    /// Wraps the schema so that an absent value is accepted.
    pub fn optional(self) -> Schema {
        match self {
            Schema::Optional(_) => self,
            other => Schema::Optional(Box::new(other)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Schema::Optional(_))
    }

    /// Validates a JSON value, returning the projected value on success.
    pub fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let mut issues = Vec::new();
        let out = check(self, value, "", &mut issues);
        if issues.is_empty() {
            Ok(out)
        } else {
            Err(issues)
        }
    }

    /// Validates a raw string parameter (header, cookie, url or query value).
    ///
    /// `Ok(None)` means the parameter is optional and was not supplied.
    pub fn validate_param(&self, raw: Option<&str>) -> Result<Option<Value>, ParamError> {
        let inner = match self {
            Schema::Optional(inner) => match raw {
                None => return Ok(None),
                Some(_) => inner.as_ref(),
            },
            other => other,
        };
        let Some(raw) = raw else {
            return Err(ParamError::Missing);
        };
        let coerced = coerce_param(inner, raw).map_err(ParamError::Invalid)?;
        inner.validate(&coerced).map(Some).map_err(ParamError::Invalid)
    }
}

fn coerce_param(schema: &Schema, raw: &str) -> Result<Value, Vec<SchemaIssue>> {
    match schema {
        Schema::Number(_) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(Value::from(n as i64))
                } else {
                    Number::from_f64(n).map(Value::Number)
                }
            })
            .ok_or_else(|| vec![SchemaIssue::new("", format!("expected a number, received \"{raw}\""))]),
        Schema::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(vec![SchemaIssue::new(
                "",
                format!("expected a boolean, received \"{raw}\""),
            )]),
        },
        Schema::Array(array) => raw
            .split(',')
            .map(|item| coerce_param(&array.items, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Schema::Object(_) => serde_json::from_str(raw)
            .map_err(|_| vec![SchemaIssue::new("", "expected a JSON object")]),
        Schema::Optional(inner) => coerce_param(inner, raw),
        Schema::Any | Schema::String(_) => Ok(Value::String(raw.to_string())),
    }
}

// Repeated multipart fields arrive as an array of strings.
fn coerce_form_field(schema: &Schema, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    match (schema, value) {
        (Schema::Optional(inner), _) => coerce_form_field(inner, value),
        (_, Value::String(raw)) => coerce_param(schema, raw),
        (Schema::Array(array), Value::Array(items)) => {
            let mut coerced = Vec::with_capacity(items.len());
            let mut issues = Vec::new();
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(raw) => match coerce_param(&array.items, raw) {
                        Ok(v) => coerced.push(v),
                        Err(found) => issues.extend(found.into_iter().map(|mut issue| {
                            issue.path = if issue.path.is_empty() {
                                index.to_string()
                            } else {
                                join(&index.to_string(), &issue.path)
                            };
                            issue
                        })),
                    },
                    other => coerced.push(other.clone()),
                }
            }
            if issues.is_empty() {
                Ok(Value::Array(coerced))
            } else {
                Err(issues)
            }
        }
        _ => Ok(value.clone()),
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check(schema: &Schema, value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Value {
    match schema {
        Schema::Any => value.clone(),
        Schema::Optional(inner) => {
            if value.is_null() {
                Value::Null
            } else {
                check(inner, value, path, issues)
            }
        }
        Schema::Boolean => {
            if !value.is_boolean() {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected boolean, received {}", type_name(value)),
                ));
            }
            value.clone()
        }
        Schema::String(rules) => {
            let Some(s) = value.as_str() else {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected string, received {}", type_name(value)),
                ));
                return value.clone();
            };
            let len = s.chars().count();
            if let Some(min) = rules.min_len {
                if len < min {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must contain at least {min} character(s)"),
                    ));
                }
            }
            if let Some(max) = rules.max_len {
                if len > max {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must contain at most {max} character(s)"),
                    ));
                }
            }
            if let Some(allowed) = &rules.one_of {
                if !allowed.iter().any(|a| a == s) {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must be one of: {}", allowed.join(", ")),
                    ));
                }
            }
            value.clone()
        }
        Schema::Number(rules) => {
            let Some(n) = value.as_f64() else {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected number, received {}", type_name(value)),
                ));
                return value.clone();
            };
            if rules.integer && n.fract() != 0.0 {
                issues.push(SchemaIssue::new(path, "expected integer, received float"));
            }
            if let Some(min) = rules.min {
                if n < min {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must be greater than or equal to {min}"),
                    ));
                }
            }
            if let Some(max) = rules.max {
                if n > max {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must be less than or equal to {max}"),
                    ));
                }
            }
            value.clone()
        }
        Schema::Array(rules) => {
            let Some(items) = value.as_array() else {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected array, received {}", type_name(value)),
                ));
                return value.clone();
            };
            if let Some(min) = rules.min_items {
                if items.len() < min {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must contain at least {min} element(s)"),
                    ));
                }
            }
            if let Some(max) = rules.max_items {
                if items.len() > max {
                    issues.push(SchemaIssue::new(
                        path,
                        format!("must contain at most {max} element(s)"),
                    ));
                }
            }
            Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| check(&rules.items, item, &join(path, &i.to_string()), issues))
                    .collect(),
            )
        }
        Schema::Object(object) => check_object(object, value, path, issues),
    }
}

fn check_object(
    schema: &ObjectSchema,
    value: &Value,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Value {
    let Some(map) = value.as_object() else {
        issues.push(SchemaIssue::new(
            path,
            format!("expected object, received {}", type_name(value)),
        ));
        return value.clone();
    };
    let mut projected = Map::new();
    for (name, field) in &schema.fields {
        let field_path = join(path, name);
        match map.get(name) {
            Some(v) => {
                projected.insert(name.clone(), check(field, v, &field_path, issues));
            }
            None if field.is_optional() => {}
            None => issues.push(SchemaIssue::new(&field_path, "required")),
        }
    }
    Value::Object(projected)
}
