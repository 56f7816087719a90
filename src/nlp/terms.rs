//! Protected terms and synonym groups
//!
//! Both tables are immutable configuration objects: they are built once,
//! handed to the extractor / coverage scorer at construction, and never
//! mutated during scoring.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Protected terms
// ============================================================================

/// Domain phrases that generic segmentation must never split.
///
/// Lookup is longest-match-first: when several terms start at the same
/// position, the longest one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ProtectedTermSet {
    /// Terms in insertion order (deduplicated)
    terms: Vec<String>,
    /// First char -> term indices, longest term first
    by_first_char: FxHashMap<char, Vec<usize>>,
}

impl ProtectedTermSet {
    /// Build a set from a list of terms. Blank entries are ignored.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for term in terms {
            set.insert(term.into());
        }
        set
    }

    /// Empty set
    pub fn empty() -> Self {
        Self::default()
    }

    fn insert(&mut self, term: String) {
        let term = term.trim().to_string();
        let Some(first) = term.chars().next() else {
            return;
        };
        if self.terms.contains(&term) {
            return;
        }

        let idx = self.terms.len();
        self.terms.push(term);

        let bucket = self.by_first_char.entry(first).or_default();
        bucket.push(idx);
        let terms = &self.terms;
        bucket.sort_by(|&a, &b| {
            terms[b]
                .len()
                .cmp(&terms[a].len())
                .then_with(|| terms[a].cmp(&terms[b]))
        });
    }

    /// Return a new set containing these terms plus `extra`.
    pub fn union<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = self.clone();
        for term in extra {
            set.insert(term.into());
        }
        set
    }

    /// The longest protected term that `text` starts with, if any.
    pub fn longest_prefix_of<'s>(&'s self, text: &str) -> Option<&'s str> {
        let first = text.chars().next()?;
        self.by_first_char.get(&first)?.iter().find_map(|&idx| {
            let term = self.terms[idx].as_str();
            text.starts_with(term).then_some(term)
        })
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Work-permit / contractor-safety vocabulary.
    pub fn work_permit() -> Self {
        Self::new([
            "工作許可證",
            "施工轄區",
            "包商名稱",
            "作業內容",
            "承包商現場負責人",
            "工安業務主管",
            "施工人員",
            "煙火管制區",
            "電焊",
            "切割",
            "烘烤",
        ])
    }

    /// Occupational-injury reporting and compensation vocabulary.
    pub fn occupational_injury() -> Self {
        Self::new([
            "職業災害",
            "通報",
            "勞動檢查機構",
            "死亡災害",
            "永久全失能",
            "住院治療",
            "8小時",
            "職業安全衛生",
            "職業病",
            "職業傷害",
            "復工",
            "補助",
        ])
    }
}

impl From<Vec<String>> for ProtectedTermSet {
    fn from(terms: Vec<String>) -> Self {
        Self::new(terms)
    }
}

impl From<ProtectedTermSet> for Vec<String> {
    fn from(set: ProtectedTermSet) -> Self {
        set.terms
    }
}

// ============================================================================
// Synonym groups
// ============================================================================

/// Canonical keyword -> acceptable surface variants.
///
/// Only the coverage scorer consults these; extraction output is never
/// rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl SynonymGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add (or extend) the group for `canonical`
    pub fn with_group<I, S>(mut self, canonical: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.groups.entry(canonical.into()).or_default();
        for variant in variants {
            let variant = variant.into();
            if !variant.is_empty() && !entry.contains(&variant) {
                entry.push(variant);
            }
        }
        self
    }

    /// Variants registered for exactly this canonical keyword
    pub fn variants(&self, canonical: &str) -> &[String] {
        self.groups
            .get(canonical)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Groups whose canonical key occurs inside `keyword`
    pub fn groups_within<'s>(
        &'s self,
        keyword: &'s str,
    ) -> impl Iterator<Item = (&'s str, &'s [String])> + 's {
        self.groups
            .iter()
            .filter(move |(canonical, _)| keyword.contains(canonical.as_str()))
            .map(|(canonical, variants)| (canonical.as_str(), variants.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Synonyms used with [`ProtectedTermSet::work_permit`].
    pub fn work_permit() -> Self {
        Self::new()
            .with_group("包商", ["承包商", "廠商", "承攬商"])
            .with_group("負責人", ["主管", "管理人", "聯絡人"])
            .with_group("工安", ["安全", "職安", "工業安全"])
            .with_group("許可證", ["許可", "證明", "核准"])
    }

    /// Synonyms used with [`ProtectedTermSet::occupational_injury`].
    pub fn occupational_injury() -> Self {
        Self::new()
            .with_group("職災", ["職業災害", "職業傷害", "工傷"])
            .with_group("通報", ["報告", "申報", "告知"])
            .with_group("補助", ["補貼", "津貼", "給付"])
            .with_group("復工", ["返回工作", "重返職場", "回到崗位"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let set = ProtectedTermSet::new(["許可", "許可證", "許可證明"]);
        assert_eq!(set.longest_prefix_of("許可證明文件"), Some("許可證明"));
        assert_eq!(set.longest_prefix_of("許可證要"), Some("許可證"));
        assert_eq!(set.longest_prefix_of("許可"), Some("許可"));
        assert_eq!(set.longest_prefix_of("申請"), None);
        assert_eq!(set.longest_prefix_of(""), None);
    }

    #[test]
    fn test_blank_and_duplicate_terms_ignored() {
        let set = ProtectedTermSet::new(["電焊", "  ", "", "電焊"]);
        assert_eq!(set.len(), 1);
        assert!(set.contains("電焊"));
    }

    #[test]
    fn test_union_keeps_original_untouched() {
        let base = ProtectedTermSet::new(["電焊"]);
        let extended = base.union(["切割"]);
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn test_protected_terms_serde_roundtrip_keeps_lookup() {
        let set = ProtectedTermSet::work_permit();
        let json = serde_json::to_string(&set).unwrap();
        let back: ProtectedTermSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.longest_prefix_of("工作許可證"), Some("工作許可證"));
    }

    #[test]
    fn test_synonym_lookup() {
        let groups = SynonymGroups::work_permit();
        assert_eq!(groups.variants("包商"), ["承包商", "廠商", "承攬商"]);
        assert!(groups.variants("包商名稱").is_empty());

        let within: Vec<&str> = groups.groups_within("包商名稱").map(|(k, _)| k).collect();
        assert_eq!(within, vec!["包商"]);
    }

    #[test]
    fn test_synonyms_deserialize_from_map() {
        let groups: SynonymGroups =
            serde_json::from_str(r#"{"PPE": ["personal protective equipment"]}"#).unwrap();
        assert_eq!(groups.variants("PPE").len(), 1);
    }
}
