// src/record.rs
//
// One bibliographic unit under enrichment, plus the rules for changing it:
// - a field holding a value is never replaced (existing values are authoritative)
// - status only moves forward

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of demographic attributes pulled from the demographic registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    BirthYear,
    Gender,
    Affiliation,
    Department,
    Rank,
    Field,
    AlmaMater,
    Degree,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::BirthYear,
        Attribute::Gender,
        Attribute::Affiliation,
        Attribute::Department,
        Attribute::Rank,
        Attribute::Field,
        Attribute::AlmaMater,
        Attribute::Degree,
    ];

    /// Canonical column name.
    pub fn key(self) -> &'static str {
        match self {
            Attribute::BirthYear => "birth_year",
            Attribute::Gender => "gender",
            Attribute::Affiliation => "affiliation",
            Attribute::Department => "department",
            Attribute::Rank => "rank",
            Attribute::Field => "field",
            Attribute::AlmaMater => "alma_mater",
            Attribute::Degree => "degree",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a record stands in the pipeline.
///
/// ```text
/// unresolved ─┬─> identity_resolved ─┬─> attributes_resolved
///             │                      ├─> no_attributes
///             │                      └─> failed
///             ├─> no_identity
///             └─> failed ──(retry)──> attributes_resolved | no_attributes | no_identity
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unresolved,
    IdentityResolved,
    NoIdentity,
    AttributesResolved,
    NoAttributes,
    Failed,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Unresolved,
        Status::IdentityResolved,
        Status::NoIdentity,
        Status::AttributesResolved,
        Status::NoAttributes,
        Status::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unresolved => "unresolved",
            Status::IdentityResolved => "identity_resolved",
            Status::NoIdentity => "no_identity",
            Status::AttributesResolved => "attributes_resolved",
            Status::NoAttributes => "no_attributes",
            Status::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::AttributesResolved | Status::NoAttributes | Status::NoIdentity | Status::Failed
        )
    }

    /// Staying put is always allowed; everything else must move forward.
    pub fn can_advance_to(self, next: Status) -> bool {
        use Status::*;
        if self == next {
            return true;
        }
        match self {
            Unresolved => true,
            IdentityResolved => matches!(next, AttributesResolved | NoAttributes | Failed),
            Failed => matches!(next, AttributesResolved | NoAttributes | NoIdentity),
            NoIdentity | AttributesResolved | NoAttributes => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Status::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| format!("unknown status {t:?}"))
    }
}

/// Addressable enrichment fields of a record (everything except id and status).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    LocalAuthorId,
    CrossRegistryId,
    AuthorNameRaw,
    AuthorNameNative,
    Attr(Attribute),
}

impl Field {
    pub fn all() -> impl Iterator<Item = Field> {
        [
            Field::LocalAuthorId,
            Field::CrossRegistryId,
            Field::AuthorNameRaw,
            Field::AuthorNameNative,
        ]
        .into_iter()
        .chain(Attribute::ALL.into_iter().map(Field::Attr))
    }

    pub fn key(self) -> &'static str {
        match self {
            Field::LocalAuthorId => "local_author_id",
            Field::CrossRegistryId => "cross_registry_id",
            Field::AuthorNameRaw => "author_name_raw",
            Field::AuthorNameNative => "author_name_native",
            Field::Attr(a) => a.key(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub record_id: String,
    pub local_author_id: Option<String>,
    pub cross_registry_id: Option<String>,
    pub author_name_raw: Option<String>,
    pub author_name_native: Option<String>,
    pub attributes: BTreeMap<Attribute, Option<String>>,
    pub status: Status,
}

/// A field that already holds a different value than the one proposed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub field: Field,
    pub existing: String,
    pub proposed: String,
}

impl Record {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            local_author_id: None,
            cross_registry_id: None,
            author_name_raw: None,
            author_name_native: None,
            attributes: Attribute::ALL.into_iter().map(|a| (a, None)).collect(),
            status: Status::Unresolved,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::LocalAuthorId => self.local_author_id.as_deref(),
            Field::CrossRegistryId => self.cross_registry_id.as_deref(),
            Field::AuthorNameRaw => self.author_name_raw.as_deref(),
            Field::AuthorNameNative => self.author_name_native.as_deref(),
            Field::Attr(a) => self.attribute(a),
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::LocalAuthorId => &mut self.local_author_id,
            Field::CrossRegistryId => &mut self.cross_registry_id,
            Field::AuthorNameRaw => &mut self.author_name_raw,
            Field::AuthorNameNative => &mut self.author_name_native,
            Field::Attr(a) => self.attributes.entry(a).or_insert(None),
        }
    }

    pub fn attribute(&self, a: Attribute) -> Option<&str> {
        self.attributes.get(&a).and_then(|v| v.as_deref())
    }

    /// Filled from the persisted row at load time; bypasses the merge rules.
    pub(crate) fn load_field(&mut self, field: Field, value: String) {
        let slot = self.slot_mut(field);
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Every conflicting field of `patch`, without touching the record.
    pub fn conflicts(&self, patch: &RecordPatch) -> Vec<Conflict> {
        patch
            .iter()
            .filter_map(|(field, proposed)| match self.get(field) {
                Some(existing) if existing != proposed => Some(Conflict {
                    field,
                    existing: s!(existing),
                    proposed: s!(proposed),
                }),
                _ => None,
            })
            .collect()
    }

    /// Fill empty fields from `patch`. All-or-nothing: on the first conflict the
    /// record is left untouched. Returns how many fields changed.
    pub fn apply(&mut self, patch: &RecordPatch) -> Result<usize, Conflict> {
        if let Some(c) = self.conflicts(patch).into_iter().next() {
            return Err(c);
        }
        let mut changed = 0;
        for (field, value) in patch.iter() {
            let slot = self.slot_mut(field);
            if slot.is_none() {
                *slot = Some(s!(value));
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Move status forward. Returns whether it changed; a regression is
    /// refused with the current status.
    pub fn advance(&mut self, next: Status) -> Result<bool, Status> {
        if !self.status.can_advance_to(next) {
            return Err(self.status);
        }
        let changed = self.status != next;
        self.status = next;
        Ok(changed)
    }

    /// Cross id, birth year and gender all known.
    pub fn is_complete(&self) -> bool {
        self.cross_registry_id.is_some()
            && self.attribute(Attribute::BirthYear).is_some()
            && self.attribute(Attribute::Gender).is_some()
    }
}

/// Partial field values proposed by a resolver. Blank values are dropped on insert.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    values: BTreeMap<Field, String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: impl AsRef<str>) -> &mut Self {
        let v = value.as_ref().trim();
        if !v.is_empty() {
            self.values.insert(field, s!(v));
        }
        self
    }

    pub fn set_opt(&mut self, field: Field, value: Option<impl AsRef<str>>) -> &mut Self {
        if let Some(v) = value {
            self.set(field, v);
        }
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every value the record already holds. Returns the dropped values
    /// that disagreed with the record so the caller can report them.
    pub fn retain_missing(&mut self, record: &Record) -> Vec<Conflict> {
        let conflicts = record.conflicts(self);
        self.values.retain(|f, _| record.get(*f).is_none());
        conflicts
    }
}
