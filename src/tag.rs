//! Resource tags.

use std::collections::BTreeMap;

use crate::error::{ErrorCode, FogError};

/// A resource tag.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Tag {
    /// The tag key.
    pub key: String,

    /// The tag value.
    pub value: String,
}

impl Tag {
    pub(crate) fn from_sdk(tag: aws_sdk_cloudformation::types::Tag) -> Self {
        Self {
            key: tag.key.expect("Tag without key"),
            value: tag.value.expect("Tag without value"),
        }
    }

    pub(crate) fn into_sdk(self) -> aws_sdk_cloudformation::types::Tag {
        aws_sdk_cloudformation::types::Tag::builder()
            .key(self.key)
            .value(self.value)
            .build()
    }
}

/// Build a single tag file's map from its raw (key, value) records, rejecting duplicate keys
/// within the same file.
pub fn parse_tag_file(pairs: Vec<(String, String)>) -> Result<BTreeMap<String, String>, FogError> {
    let mut map = BTreeMap::new();
    for (key, value) in pairs {
        if map.insert(key.clone(), value).is_some() {
            return Err(FogError::new(
                ErrorCode::InvalidFormat,
                format!("duplicate tag key `{key}` within a single tag file"),
            )
            .with_field("key", key));
        }
    }
    Ok(map)
}

/// Merge ordered tag maps left-to-right, with later maps overriding earlier ones for the same
/// key, then apply `defaults` for any keys not already present.
///
/// This is associative for maps with disjoint key sets, and idempotent when applied twice to its
/// own output (merging a map with itself yields the same map).
#[must_use]
pub fn merge_tags(ordered: &[BTreeMap<String, String>], defaults: &BTreeMap<String, String>) -> Vec<Tag> {
    let mut merged = BTreeMap::new();
    for defaulted in std::iter::once(defaults).chain(ordered.iter()) {
        for (key, value) in defaulted {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
        .into_iter()
        .map(|(key, value)| Tag { key, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_file_rejects_duplicate_keys() {
        let error = parse_tag_file(vec![
            ("Env".to_string(), "dev".to_string()),
            ("Env".to_string(), "prod".to_string()),
        ])
        .unwrap_err();
        assert_eq!(error.code(), crate::error::ErrorCode::InvalidFormat);
    }

    #[test]
    fn merge_tags_overrides_left_to_right() {
        let mut defaults = BTreeMap::new();
        defaults.insert("Owner".to_string(), "platform".to_string());

        let a = BTreeMap::from([("Env".to_string(), "dev".to_string())]);
        let b = BTreeMap::from([("Env".to_string(), "prod".to_string())]);

        let merged = merge_tags(&[a, b], &defaults);
        assert_eq!(
            merged,
            vec![
                Tag { key: "Env".to_string(), value: "prod".to_string() },
                Tag { key: "Owner".to_string(), value: "platform".to_string() },
            ]
        );
    }

    #[test]
    fn merge_tags_idempotent() {
        let defaults = BTreeMap::new();
        let a = BTreeMap::from([("Env".to_string(), "dev".to_string())]);
        let once = merge_tags(&[a.clone()], &defaults);
        let twice = merge_tags(&[a.clone()], &defaults);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_tags_associative_for_disjoint_keys() {
        let defaults = BTreeMap::new();
        let a = BTreeMap::from([("A".to_string(), "1".to_string())]);
        let b = BTreeMap::from([("B".to_string(), "2".to_string())]);
        let c = BTreeMap::from([("C".to_string(), "3".to_string())]);

        let left_first = merge_tags(&[a.clone(), b.clone(), c.clone()], &defaults);
        let right_first = merge_tags(&[a, b, c], &defaults);
        assert_eq!(left_first, right_first);
    }
}
