//! Entity domain model.
//!
//! # Responsibility
//! - Define the single persisted record type and its write-side shapes.
//! - Own field validation and the derived projections (`slug`, tags).
//!
//! # Invariants
//! - `id` is assigned by storage and never reused for another entity.
//! - `category` and `name` are never blank.
//! - `created_at` is never rewritten after insert.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid slug separator regex"));

const SLUG_MAX_CHARS: usize = 200;

/// Open-ended structured attributes attached to an entity.
///
/// `BTreeMap` keeps serialization order stable across writes.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Storage-assigned identifier. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Canonical persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Free-form label such as `person` or `website`.
    pub category: String,
    pub name: String,
    /// Derived from `name` on every write; not user editable.
    pub slug: String,
    pub notes: String,
    /// Normalized: lowercase, deduplicated, sorted.
    pub tags: Vec<String>,
    pub attributes: Attributes,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Entity {
    /// Text used for fuzzy ranking: name, notes, tags and attribute values.
    pub fn match_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if !self.notes.is_empty() {
            parts.push(self.notes.clone());
        }
        parts.extend(self.tags.iter().cloned());
        for value in self.attributes.values() {
            push_value_text(value, &mut parts);
        }
        parts.join(" ")
    }

    /// Lowercased haystack over the full-text columns: name, notes, tags and
    /// attribute keys and values. JSON syntax is never part of it.
    pub fn search_haystack(&self) -> String {
        let mut parts = vec![self.name.clone(), self.notes.clone()];
        parts.extend(self.tags.iter().cloned());
        for (key, value) in &self.attributes {
            parts.push(key.clone());
            push_value_text(value, &mut parts);
        }
        parts.join("\n").to_lowercase()
    }

    /// Returns whether every whitespace token of `query` occurs in a
    /// searchable field, ignoring case.
    pub fn contains_all_tokens(&self, query: &str) -> bool {
        let haystack = self.search_haystack();
        let mut tokens = query.split_whitespace().peekable();
        if tokens.peek().is_none() {
            return false;
        }
        tokens.all(|token| haystack.contains(&token.to_lowercase()))
    }

    pub(crate) fn validate(&self) -> Result<(), EntityValidationError> {
        validate_fields(&self.category, &self.name, &self.attributes)
    }
}

/// Write model for `add`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntity {
    pub category: String,
    pub name: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub attributes: Attributes,
}

impl NewEntity {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Checks required fields before any storage work happens.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        validate_fields(&self.category, &self.name, &self.attributes)
    }
}

/// Partial update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityChanges {
    pub category: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Replaces the whole attribute map.
    pub attributes: Option<Attributes>,
}

impl EntityChanges {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.name.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
            && self.attributes.is_none()
    }

    /// Applies the changes to `entity`, refreshing derived fields.
    pub fn apply_to(&self, entity: &mut Entity) {
        if let Some(category) = &self.category {
            entity.category = category.clone();
        }
        if let Some(name) = &self.name {
            entity.name = name.clone();
            entity.slug = slugify(name);
        }
        if let Some(notes) = &self.notes {
            entity.notes = notes.clone();
        }
        if let Some(tags) = &self.tags {
            entity.tags = normalize_tags(tags);
        }
        if let Some(attributes) = &self.attributes {
            entity.attributes = attributes.clone();
        }
    }
}

/// Field-level validation failures. Recoverable by asking the user again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    EmptyCategory,
    EmptyName,
    EmptyAttributeKey,
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCategory => write!(f, "category must not be empty"),
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::EmptyAttributeKey => write!(f, "attribute names must not be empty"),
        }
    }
}

impl Error for EntityValidationError {}

fn validate_fields(
    category: &str,
    name: &str,
    attributes: &Attributes,
) -> Result<(), EntityValidationError> {
    if category.trim().is_empty() {
        return Err(EntityValidationError::EmptyCategory);
    }
    if name.trim().is_empty() {
        return Err(EntityValidationError::EmptyName);
    }
    if attributes.keys().any(|key| key.trim().is_empty()) {
        return Err(EntityValidationError::EmptyAttributeKey);
    }
    Ok(())
}

/// Appends the user-visible text of `value`: strings verbatim, scalars in
/// their display form, containers flattened. `null` contributes nothing.
fn push_value_text(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Bool(flag) => out.push(flag.to_string()),
        serde_json::Value::Number(number) => out.push(number.to_string()),
        serde_json::Value::String(text) => out.push(text.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                push_value_text(item, out);
            }
        }
        serde_json::Value::Object(fields) => {
            for (key, item) in fields {
                out.push(key.clone());
                push_value_text(item, out);
            }
        }
    }
}

/// Lowercase, hyphen-separated form of `name`, capped at 200 chars.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    replaced
        .trim_matches('-')
        .chars()
        .take(SLUG_MAX_CHARS)
        .collect()
}

/// Normalizes one tag value. Blank input yields `None`.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
///
/// Commas separate tags on disk, so a value containing one becomes several
/// tags.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for tag in tags {
        normalized.extend(tag.as_ref().split(',').filter_map(normalize_tag));
    }
    normalized.into_iter().collect()
}

/// Splits comma-separated tag input, as typed in the shell or stored on disk.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    normalize_tags([raw])
}
