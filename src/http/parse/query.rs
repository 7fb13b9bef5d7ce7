//! Query string parsing.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// Decodes a query string. Repeated keys are joined with `,` so that array
/// schemas see every value.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert_with(|| value.clone().into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_keys_join() {
        let params = parse_query("id=1&id=2&q=rust+lang&empty=");
        assert_eq!(params["id"], "1,2");
        assert_eq!(params["q"], "rust lang");
        assert_eq!(params["empty"], "");
    }
}
