//! Validated per-request parameters: timeout, trace id, and tags.
//!
//! The service accepts a small amount of caller-supplied metadata per
//! request. Tags are bounded both in count and in shape; violations are
//! rejected at construction so a bad tag never reaches the wire.

use crate::error::{FaunaError, FaunaResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Maximum number of tags attached to one request.
pub const MAX_TAGS: usize = 25;
/// Maximum tag key length in characters.
pub const MAX_TAG_KEY_LEN: usize = 40;
/// Maximum tag value length in characters.
pub const MAX_TAG_VALUE_LEN: usize = 80;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("static pattern"));

/// Optional metadata attached to a single request.
///
/// Successfully constructed parameters are immutable. The tag map is typed,
/// so the "null map" failure mode of looser APIs cannot be expressed here;
/// an absent map is simply empty.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    timeout: Option<Duration>,
    trace_id: Option<String>,
    tags: BTreeMap<String, String>,
}

impl RequestParameters {
    /// Build parameters, validating every tag.
    ///
    /// The first violation fails with `InvalidArgument` naming the offending
    /// key or value.
    pub fn new(
        timeout: Option<Duration>,
        trace_id: Option<String>,
        tags: BTreeMap<String, String>,
    ) -> FaunaResult<Self> {
        if tags.len() > MAX_TAGS {
            return Err(FaunaError::invalid_argument(format!(
                "request cannot carry more than {} tags, got {}",
                MAX_TAGS,
                tags.len()
            )));
        }

        let mut validated = BTreeMap::new();
        for (key, value) in tags {
            let key = validate_tag(&key, "tag key", MAX_TAG_KEY_LEN)?;
            let value = validate_tag(&value, "tag value", MAX_TAG_VALUE_LEN)?;
            validated.insert(key, value);
        }

        Ok(Self {
            timeout,
            trace_id,
            tags: validated,
        })
    }

    /// Parameters carrying only an optional timeout and no tags.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            trace_id: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Render the tag map as the `x-fauna-tags` header value, `k=v,k2=v2`.
    pub fn tags_header_value(&self) -> Option<String> {
        if self.tags.is_empty() {
            return None;
        }
        Some(
            self.tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

fn validate_tag(raw: &str, what: &str, max_len: usize) -> FaunaResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FaunaError::invalid_argument(format!("{} must not be blank", what)));
    }
    if trimmed.chars().count() > max_len {
        return Err(FaunaError::invalid_argument(format!(
            "{} '{}' exceeds {} characters",
            what, trimmed, max_len
        )));
    }
    if !TAG_PATTERN.is_match(trimmed) {
        return Err(FaunaError::invalid_argument(format!(
            "{} '{}' contains non-word characters",
            what, trimmed
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tags(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_timeout_keeps_timeout_and_no_tags() {
        let timeout = Duration::from_millis(1500);
        let params = RequestParameters::from_timeout(Some(timeout));
        assert_eq!(params.timeout(), Some(timeout));
        assert!(params.tags().is_empty());
        assert!(params.trace_id().is_none());
    }

    #[test]
    fn key_length_boundary() {
        let at_limit = "k".repeat(MAX_TAG_KEY_LEN);
        assert!(RequestParameters::new(None, None, tags(&[(&at_limit, "v")])).is_ok());

        let over_limit = "k".repeat(MAX_TAG_KEY_LEN + 1);
        let err = RequestParameters::new(None, None, tags(&[(&over_limit, "v")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn value_length_boundary() {
        let at_limit = "v".repeat(MAX_TAG_VALUE_LEN);
        assert!(RequestParameters::new(None, None, tags(&[("k", &at_limit)])).is_ok());

        let over_limit = "v".repeat(MAX_TAG_VALUE_LEN + 1);
        let err = RequestParameters::new(None, None, tags(&[("k", &over_limit)])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn tag_count_boundary() {
        let at_limit: BTreeMap<_, _> = (0..MAX_TAGS)
            .map(|i| (format!("key{}", i), "v".to_string()))
            .collect();
        assert!(RequestParameters::new(None, None, at_limit).is_ok());

        let over_limit: BTreeMap<_, _> = (0..MAX_TAGS + 1)
            .map(|i| (format!("key{}", i), "v".to_string()))
            .collect();
        let err = RequestParameters::new(None, None, over_limit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn non_word_value_is_named_in_message() {
        let err = RequestParameters::new(None, None, tags(&[("key", "bad value!")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("bad value!"));
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = RequestParameters::new(None, None, tags(&[("   ", "v")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn tags_render_in_sorted_order() {
        let params =
            RequestParameters::new(None, None, tags(&[("zeta", "1"), ("alpha", "2")])).unwrap();
        assert_eq!(params.tags_header_value().unwrap(), "alpha=2,zeta=1");
        assert!(RequestParameters::default().tags_header_value().is_none());
    }
}
