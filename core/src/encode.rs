//! `application/x-www-form-urlencoded` encoding for query strings and form bodies.
//!
//! Each key and value is percent-encoded on its own (space becomes `+`,
//! reserved characters are escaped). A pair that cannot be encoded is
//! skipped and logged; the remaining pairs are still emitted. Callers rely on
//! this: one bad parameter never aborts a request.

use url::form_urlencoded::byte_serialize;

use crate::error::EncodeError;

/// Encode a single `key=value` pair.
pub fn encode_pair(key: &str, value: &str) -> Result<String, EncodeError> {
    if key.is_empty() {
        return Err(EncodeError::EmptyKey);
    }
    if key.contains('\0') {
        return Err(EncodeError::NulByte {
            key: key.to_string(),
            part: "key",
        });
    }
    if value.contains('\0') {
        return Err(EncodeError::NulByte {
            key: key.to_string(),
            part: "value",
        });
    }
    Ok(format!("{}={}", escape(key), escape(value)))
}

fn escape(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// Encode every pair and join the survivors with `&`.
pub fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut encoded = Vec::new();
    for (key, value) in pairs {
        match encode_pair(key, value) {
            Ok(pair) => encoded.push(pair),
            Err(e) => log::warn!("skipping pair that failed to encode: {e}"),
        }
    }
    encoded.join("&")
}

/// Append an encoded query string to `url`.
///
/// Uses `?` unless `url` already carries a query, in which case `&`. A
/// fragment stays at the end, after the query.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let separator = match base.find('?') {
        Some(i) if i + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    format!("{base}{separator}{query}{fragment}")
}
