//! URL pattern translation.
//!
//! # Responsibilities
//! - Accept `:name`, optional `:name?` and trailing `*` segments
//! - Translate them to the transport router's `{name}` / `{*wildcard}` syntax
//!
//! # Design Decisions
//! - Optional segments expand into one path per present/absent combination
//! - A wildcard is only valid as the last segment
//! - Trailing slashes are ignored: every non-root, non-wildcard path is
//!   also registered with a trailing `/`

/// Name under which a `*` segment's match is exposed.
pub const WILDCARD_PARAM: &str = "wildcard";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, optional: bool },
    Wildcard,
}

/// Adds a leading `/` and turns an empty pattern into `/`.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn segments(pattern: &str) -> Vec<Segment> {
    normalize(pattern)
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s == "*" {
                Segment::Wildcard
            } else if let Some(param) = s.strip_prefix(':') {
                match param.strip_suffix('?') {
                    Some(name) => Segment::Param {
                        name: name.to_string(),
                        optional: true,
                    },
                    None => Segment::Param {
                        name: param.to_string(),
                        optional: false,
                    },
                }
            } else {
                Segment::Literal(s.to_string())
            }
        })
        .collect()
}

/// Names of every parameter the pattern can capture.
pub fn param_names(pattern: &str) -> Vec<String> {
    segments(pattern)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name),
            Segment::Wildcard => Some(WILDCARD_PARAM.to_string()),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Paths to register on the transport router for `pattern`.
pub fn to_router_paths(pattern: &str) -> Vec<String> {
    let mut variants: Vec<Vec<String>> = vec![Vec::new()];
    for segment in segments(pattern) {
        match segment {
            Segment::Literal(text) => variants.iter_mut().for_each(|v| v.push(text.clone())),
            Segment::Param {
                name,
                optional: false,
            } => variants
                .iter_mut()
                .for_each(|v| v.push(format!("{{{name}}}"))),
            Segment::Param {
                name,
                optional: true,
            } => {
                let with: Vec<Vec<String>> = variants
                    .iter()
                    .cloned()
                    .map(|mut v| {
                        v.push(format!("{{{name}}}"));
                        v
                    })
                    .collect();
                variants.extend(with);
            }
            Segment::Wildcard => {
                variants
                    .iter_mut()
                    .for_each(|v| v.push(format!("{{*{WILDCARD_PARAM}}}")));
                break;
            }
        }
    }

    let mut paths: Vec<String> = variants
        .into_iter()
        .map(|v| format!("/{}", v.join("/")))
        .flat_map(|path| {
            let slashed = (path != "/" && !path.contains("{*")).then(|| format!("{path}/"));
            std::iter::once(path).chain(slashed)
        })
        .collect();
    paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    paths.dedup();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_named() {
        assert_eq!(
            to_router_paths("users/:id/posts"),
            vec!["/users/{id}/posts", "/users/{id}/posts/"]
        );
        assert_eq!(to_router_paths(""), vec!["/"]);
        assert_eq!(param_names("/users/:id/posts/:post"), vec!["id", "post"]);
    }

    #[test]
    fn test_optional_expands() {
        assert_eq!(
            to_router_paths("/users/:id?"),
            vec!["/users", "/users/", "/users/{id}", "/users/{id}/"]
        );
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(to_router_paths("/static/*"), vec!["/static/{*wildcard}"]);
        assert_eq!(param_names("/static/*"), vec!["wildcard"]);
    }
}
