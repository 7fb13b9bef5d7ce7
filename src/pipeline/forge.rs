//! Request forging: raw transport input + composed schemas → [`Request`].
//!
//! # Data Flow
//! ```text
//! method, uri, headers, body stream, matched url params
//!     → body (decode only when a body or files schema exists, then validate)
//!     → files (presence and count per declared field)
//!     → headers → cookies → url params → query params
//!     → Request
//! ```
//!
//! # Design Decisions
//! - First failure wins; later groups are not inspected
//! - Headers keep undeclared entries; every other parsed group only holds
//!   declared keys
//! - Missing and invalid values are distinct failures

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, request::Parts};
use serde_json::{Map, Value};

use crate::config::RouteLimits;
use crate::container::ServiceScope;
use crate::http::error::{ParamLocation, ValidationFailure};
use crate::http::parse::{self, parse_cookies, parse_query};
use crate::http::{HttpError, Request};
use crate::schema::{FilesSchema, ParamError, ParamSchema, SchemaIssue, SchemaSet};

/// Builds the pipeline request, validating every declared field group.
pub async fn forge_request(
    parts: &Parts,
    body: Body,
    url_params: &HashMap<String, String>,
    schemas: &SchemaSet,
    limits: &RouteLimits,
    scope: Arc<ServiceScope>,
) -> Result<Request, HttpError> {
    let mut request = Request::new(
        parts.method.clone(),
        parts.uri.clone(),
        &parts.headers,
        scope,
    );

    if schemas.body.is_some() || schemas.files.is_some() {
        let decoded =
            parse::decode_body(body, &parts.headers, schemas.files.is_some(), limits).await?;

        if let Some(schema) = &schemas.body {
            let validated = if decoded.form_encoded {
                schema.validate_form(&decoded.payload)
            } else {
                schema.validate(&decoded.payload)
            };
            let value = validated.map_err(|issues| ValidationFailure::Body { issues })?;
            request.body = Some(value);
        }

        if let Some(rules) = &schemas.files {
            request.files = Some(check_files(rules, decoded.files)?);
        }
    }

    if let Some(schema) = &schemas.headers {
        let validated = validate_params(ParamLocation::Header, schema, |key| {
            request.headers.get(key).and_then(Value::as_str)
        })?;
        request.headers.extend(validated);
    }

    if let Some(schema) = &schemas.cookies {
        // HTTP/2 clients send one `cookie` header per pair.
        let joined = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let raw = parse_cookies(&joined);
        request.cookies = Some(validate_params(ParamLocation::Cookie, schema, |key| {
            raw.get(key).map(String::as_str)
        })?);
    }

    if let Some(schema) = &schemas.url_params {
        request.url_params = Some(validate_params(ParamLocation::UrlParam, schema, |key| {
            url_params.get(key).map(String::as_str)
        })?);
    }

    if let Some(schema) = &schemas.query_params {
        let raw = parse_query(parts.uri.query().unwrap_or_default());
        request.query_params = Some(validate_params(ParamLocation::QueryParam, schema, |key| {
            raw.get(key).map(String::as_str)
        })?);
    }

    Ok(request)
}

fn validate_params<'a, F>(
    location: ParamLocation,
    schema: &ParamSchema,
    lookup: F,
) -> Result<Map<String, Value>, ValidationFailure>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = Map::new();
    for (key, field) in schema {
        match field.validate_param(lookup(key)) {
            Ok(Some(value)) => {
                out.insert(key.clone(), value);
            }
            Ok(None) => {}
            Err(ParamError::Missing) => {
                return Err(ValidationFailure::Missing {
                    location,
                    key: key.clone(),
                })
            }
            Err(ParamError::Invalid(issues)) => {
                return Err(ValidationFailure::Invalid {
                    location,
                    key: key.clone(),
                    issues,
                })
            }
        }
    }
    Ok(out)
}

fn check_files(
    rules: &FilesSchema,
    mut uploaded: HashMap<String, Vec<parse::UploadedFile>>,
) -> Result<HashMap<String, Vec<parse::UploadedFile>>, ValidationFailure> {
    let mut out = HashMap::new();
    for (name, rule) in rules {
        let files = uploaded.remove(name).unwrap_or_default();
        if files.is_empty() {
            if rule.required {
                return Err(ValidationFailure::Missing {
                    location: ParamLocation::File,
                    key: name.clone(),
                });
            }
            continue;
        }
        if let Some(max) = rule.max_count {
            if files.len() > max {
                return Err(ValidationFailure::Invalid {
                    location: ParamLocation::File,
                    key: name.clone(),
                    issues: vec![SchemaIssue {
                        path: String::new(),
                        message: format!("expected at most {max} files, received {}", files.len()),
                    }],
                });
            }
        }
        out.insert(name.clone(), files);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ServiceRegistry;
    use crate::schema::{boolean, integer, object, string, FileRule};
    use axum::http::Request as HttpRequest;
    use serde_json::json;

    fn scope() -> Arc<ServiceScope> {
        Arc::new(ServiceScope::new(Arc::new(ServiceRegistry::new()), None))
    }

    async fn forge(
        request: HttpRequest<Body>,
        url_params: &[(&str, &str)],
        schemas: &SchemaSet,
    ) -> Result<Request, HttpError> {
        let (parts, body) = request.into_parts();
        let params = url_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        forge_request(
            &parts,
            body,
            &params,
            schemas,
            &RouteLimits::default(),
            scope(),
        )
        .await
    }

    #[tokio::test]
    async fn test_body_is_validated_and_projected() {
        let schemas = SchemaSet::new().body(object().field("name", string().min_len(2)));
        let request = HttpRequest::post("/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"ada","extra":true}"#))
            .unwrap();
        let forged = forge(request, &[], &schemas).await.unwrap();
        assert_eq!(forged.body, Some(json!({"name": "ada"})));
    }

    #[tokio::test]
    async fn test_body_failure_is_reported() {
        let schemas = SchemaSet::new().body(object().field("name", string().min_len(4)));
        let request = HttpRequest::post("/")
            .body(Body::from(r#"{"name":"ab"}"#))
            .unwrap();
        let err = forge(request, &[], &schemas).await.unwrap_err();
        assert!(err.to_string().starts_with("Incorrect body arguments!"));
    }

    #[tokio::test]
    async fn test_no_schema_no_decoding() {
        let request = HttpRequest::post("/")
            .header("content-type", "application/unknown")
            .body(Body::from("garbage"))
            .unwrap();
        let forged = forge(request, &[], &SchemaSet::new()).await.unwrap();
        assert!(forged.body.is_none());
    }

    #[tokio::test]
    async fn test_urlencoded_fields_are_coerced() {
        let schemas = SchemaSet::new().body(
            object()
                .field("age", integer())
                .field("admin", boolean()),
        );
        let request = HttpRequest::post("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("age=42&admin=true"))
            .unwrap();
        let forged = forge(request, &[], &schemas).await.unwrap();
        assert_eq!(forged.body, Some(json!({"age": 42, "admin": true})));
    }

    #[tokio::test]
    async fn test_headers_missing_vs_invalid() {
        let schemas = SchemaSet::new().header("x-count", integer());

        let missing = HttpRequest::get("/").body(Body::empty()).unwrap();
        let err = forge(missing, &[], &schemas).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationFailure::Missing { .. })
        ));
        assert!(err.to_string().contains("to be present"));

        let invalid = HttpRequest::get("/")
            .header("x-count", "many")
            .body(Body::empty())
            .unwrap();
        let err = forge(invalid, &[], &schemas).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationFailure::Invalid { .. })
        ));
        assert!(err.to_string().contains("could not be validated"));
    }

    #[tokio::test]
    async fn test_headers_keep_undeclared_and_overlay_validated() {
        let schemas = SchemaSet::new().header("x-count", integer());
        let request = HttpRequest::get("/")
            .header("x-count", "3")
            .header("x-other", "kept")
            .body(Body::empty())
            .unwrap();
        let forged = forge(request, &[], &schemas).await.unwrap();
        assert_eq!(forged.header("x-count"), Some(&json!(3)));
        assert_eq!(forged.header_str("x-other"), Some("kept"));
    }

    #[tokio::test]
    async fn test_cookies_query_and_url_only_hold_declared_keys() {
        let schemas = SchemaSet::new()
            .cookie("session", string())
            .query_param("page", integer())
            .url_param("id", integer());
        let request = HttpRequest::get("/items/7?page=2&sort=asc")
            .header("cookie", "session=abc; theme=dark")
            .body(Body::empty())
            .unwrap();
        let forged = forge(request, &[("id", "7"), ("other", "x")], &schemas)
            .await
            .unwrap();
        assert_eq!(forged.cookies, Some(json!({"session": "abc"}).as_object().unwrap().clone()));
        assert_eq!(forged.query_params, Some(json!({"page": 2}).as_object().unwrap().clone()));
        assert_eq!(forged.url_params, Some(json!({"id": 7}).as_object().unwrap().clone()));
    }

    #[tokio::test]
    async fn test_cookies_split_across_headers() {
        let schemas = SchemaSet::new()
            .cookie("sid", string())
            .cookie("theme", string());
        let request = HttpRequest::get("/")
            .header("cookie", "sid=abc")
            .header("cookie", "theme=dark")
            .body(Body::empty())
            .unwrap();
        let forged = forge(request, &[], &schemas).await.unwrap();
        assert_eq!(
            forged.cookies,
            Some(json!({"sid": "abc", "theme": "dark"}).as_object().unwrap().clone())
        );
    }

    #[tokio::test]
    async fn test_required_file_missing() {
        let schemas = SchemaSet::new().file("avatar", FileRule::required());
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--XyZ--\r\n";
        let request = HttpRequest::post("/")
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(Body::from(body))
            .unwrap();
        let err = forge(request, &[], &schemas).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationFailure::Missing { location: ParamLocation::File, .. })
        ));
    }

    #[tokio::test]
    async fn test_multipart_without_boundary() {
        let schemas = SchemaSet::new().body(object().field("a", string()));
        let request = HttpRequest::post("/")
            .header("content-type", "multipart/form-data")
            .body(Body::from("x"))
            .unwrap();
        let err = forge(request, &[], &schemas).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("boundary"));
    }
}
