//! InterestSet value object.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Ordered, de-duplicated list of interest tags.
///
/// Tags are trimmed and blank tags are dropped. The first occurrence of a
/// tag fixes its position, so the requester's ordering survives into the
/// common-interest list shown to both participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InterestSet(Vec<String>);

impl InterestSet {
    /// Builds a set from raw client input.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let tags = raw
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self(tags)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Tags of `self` that also appear in `other`, in `self`'s order.
    pub fn overlap(&self, other: &InterestSet) -> Vec<String> {
        let theirs: HashSet<&str> = other.0.iter().map(String::as_str).collect();
        self.0
            .iter()
            .filter(|t| theirs.contains(t.as_str()))
            .cloned()
            .collect()
    }

    /// Number of shared tags; cheaper than `overlap` when only the size matters.
    pub fn overlap_count(&self, other: &InterestSet) -> usize {
        let theirs: HashSet<&str> = other.0.iter().map(String::as_str).collect();
        self.0.iter().filter(|t| theirs.contains(t.as_str())).count()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for InterestSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Ok(InterestSet::from_raw(raw))
    }
}
