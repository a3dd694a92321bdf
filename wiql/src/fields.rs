//! Field metadata: the externally supplied schema the
//! [`ErrorChecker`](crate::ErrorChecker) validates against and the formatter
//! uses for canonical casing.
//!
//! The shapes deserialize from the work item tracking REST payload
//! (`referenceName`, `name`, `type`), either as a bare array or wrapped in a
//! `{"count": .., "value": [..]}` envelope. Entries that do not describe a
//! queryable field (an unknown `type`, a missing name) are skipped with a
//! warning.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    #[serde(alias = "String", alias = "picklistString", alias = "identity")]
    String,
    #[serde(alias = "PlainText")]
    PlainText,
    #[serde(alias = "Html")]
    Html,
    #[serde(alias = "Integer", alias = "picklistInteger")]
    Integer,
    #[serde(alias = "Double", alias = "picklistDouble")]
    Double,
    #[serde(alias = "DateTime")]
    DateTime,
    #[serde(alias = "Boolean")]
    Boolean,
    #[serde(alias = "Guid")]
    Guid,
    #[serde(alias = "TreePath")]
    TreePath,
    #[serde(alias = "History")]
    History,
}

impl FieldType {
    /// Types that `CONTAINS`, `CONTAINS WORDS` and `LIKE` apply to.
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::PlainText | Self::Html)
    }

    /// Types with a meaningful `< <= > >=`.
    pub fn is_ordinal(self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Double | Self::DateTime | Self::String
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub reference_name: String,
    #[serde(rename = "name", alias = "displayName")]
    pub display_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldMetadata {
    pub fn new(reference_name: &str, display_name: &str, field_type: FieldType) -> Self {
        Self {
            reference_name: reference_name.to_owned(),
            display_name: display_name.to_owned(),
            field_type,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldsPayload {
    List(Vec<serde_json::Value>),
    Envelope { value: Vec<serde_json::Value> },
}

/// A read-only, insertion-ordered set of fields with case-insensitive lookup
/// by reference name or display name.
///
/// Reference names take precedence over display names, and the first field
/// wins when two share a name.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    by_reference: IndexMap<String, FieldMetadata>,
    by_display: HashMap<String, usize>,
}

impl FieldSet {
    pub fn new(fields: impl IntoIterator<Item = FieldMetadata>) -> Self {
        let mut set = Self::default();
        for field in fields {
            let key = field.reference_name.to_lowercase();
            if set.by_reference.contains_key(&key) {
                continue;
            }
            let display = field.display_name.to_lowercase();
            let (idx, _) = set.by_reference.insert_full(key, field);
            set.by_display.entry(display).or_insert(idx);
        }
        set
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries = match serde_json::from_str::<FieldsPayload>(json)? {
            FieldsPayload::List(entries) | FieldsPayload::Envelope { value: entries } => entries,
        };
        let fields = entries.into_iter().filter_map(|entry| {
            match serde_json::from_value::<FieldMetadata>(entry) {
                Ok(field) => Some(field),
                Err(err) => {
                    log::warn!("skipping field metadata entry: {err}");
                    None
                }
            }
        });
        Ok(Self::new(fields))
    }

    pub fn len(&self) -> usize {
        self.by_reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.by_reference.values()
    }

    pub fn resolve(&self, name: &str) -> Option<&FieldMetadata> {
        self.resolve_spelling(name).map(|(field, _)| field)
    }

    /// Resolves `name` and returns the field with the canonical spelling of
    /// whichever of its names matched.
    pub fn resolve_spelling(&self, name: &str) -> Option<(&FieldMetadata, &str)> {
        let key = name.trim().to_lowercase();
        if let Some(field) = self.by_reference.get(&key) {
            return Some((field, field.reference_name.as_str()));
        }
        let idx = *self.by_display.get(&key)?;
        let (_, field) = self.by_reference.get_index(idx)?;
        Some((field, field.display_name.as_str()))
    }
}

impl FromIterator<FieldMetadata> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldMetadata>>(iter: I) -> Self {
        Self::new(iter)
    }
}
