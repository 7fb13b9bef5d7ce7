//! Schema composition across scope layers.
//!
//! # Responsibilities
//! - Merge schemas contributed by a route and the scopes around it
//!   (controllers, guards, interceptors) into one set per field group
//!
//! # Design Decisions
//! - Inner (closer to the route) declarations win on key collision
//! - Outer scopes only ever add keys; nothing is dropped
//! - A group nobody declares stays `None` and is skipped by the forger
//! - Pure function of its inputs: composing twice gives equal results

use std::collections::BTreeMap;

use super::value::{ObjectSchema, Schema};

/// Key → schema map used for headers, cookies, url params and query params.
pub type ParamSchema = BTreeMap<String, Schema>;

/// Field name → upload rule.
pub type FilesSchema = BTreeMap<String, FileRule>;

/// Constraints on the files uploaded under one multipart field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRule {
    pub required: bool,
    pub max_count: Option<usize>,
}

impl FileRule {
    pub fn required() -> Self {
        Self {
            required: true,
            max_count: None,
        }
    }

    pub fn optional() -> Self {
        Self {
            required: false,
            max_count: None,
        }
    }

    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = Some(n);
        self
    }
}

/// Schemas for every field group of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    pub body: Option<ObjectSchema>,
    pub headers: Option<ParamSchema>,
    pub cookies: Option<ParamSchema>,
    pub url_params: Option<ParamSchema>,
    pub query_params: Option<ParamSchema>,
    pub files: Option<FilesSchema>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.headers.is_none()
            && self.cookies.is_none()
            && self.url_params.is_none()
            && self.query_params.is_none()
            && self.files.is_none()
    }

    pub fn body(mut self, schema: ObjectSchema) -> Self {
        match &mut self.body {
            Some(existing) => {
                let mut merged = schema;
                merged.absorb_outer(existing);
                *existing = merged;
            }
            None => self.body = Some(schema),
        }
        self
    }

    /// Declares a header. Header names are case-insensitive and stored lower-cased.
    pub fn header(mut self, name: impl AsRef<str>, schema: impl Into<Schema>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.as_ref().to_ascii_lowercase(), schema.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.cookies
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema.into());
        self
    }

    pub fn url_param(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.url_params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.query_params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema.into());
        self
    }

    pub fn file(mut self, name: impl Into<String>, rule: FileRule) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), rule);
        self
    }

    /// Merges a scope that encloses `self`.
    ///
    /// `self` is the inner layer: its keys win; `outer` only fills gaps.
    pub fn absorb_outer(&mut self, outer: &SchemaSet) {
        match (&mut self.body, &outer.body) {
            (Some(inner), Some(outer)) => inner.absorb_outer(outer),
            (None, Some(outer)) => self.body = Some(outer.clone()),
            _ => {}
        }
        merge_keys(&mut self.headers, &outer.headers);
        merge_keys(&mut self.cookies, &outer.cookies);
        merge_keys(&mut self.url_params, &outer.url_params);
        merge_keys(&mut self.query_params, &outer.query_params);
        merge_keys(&mut self.files, &outer.files);
    }
}

fn merge_keys<V: Clone>(inner: &mut Option<BTreeMap<String, V>>, outer: &Option<BTreeMap<String, V>>) {
    let Some(outer) = outer else {
        return;
    };
    let inner = inner.get_or_insert_with(BTreeMap::new);
    for (key, value) in outer {
        inner.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Composes a route's own schemas with its enclosing scopes.
///
/// `scopes` is ordered outer-to-inner; the route itself is the innermost layer.
pub fn compose(route: &SchemaSet, scopes: &[&SchemaSet]) -> SchemaSet {
    let mut merged = route.clone();
    for scope in scopes.iter().rev() {
        merged.absorb_outer(scope);
    }
    merged
}
