// src/extract.rs
//
// Result-grid attribute extraction. The demographic registry renders its
// result grid as cells tagged with a per-column class token; the header row
// uses the same token, so every column read yields header, data and padding
// cells mixed together. `pick` chooses the value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::html;
use crate::record::Attribute;
use crate::session::Document;

/// Validation applied to a candidate cell value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Every character is an ASCII digit.
    Digits,
    /// Value is one of a closed set.
    OneOf { values: Vec<String> },
}

impl Constraint {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Constraint::Digits => value.chars().all(|c| c.is_ascii_digit()),
            Constraint::OneOf { values } => values.iter().any(|v| v == value),
        }
    }
}

/// How to find one attribute in the result grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub attribute: Attribute,
    /// Class token carried by the attribute's cells.
    pub marker: String,
    /// Header labels the column may show; never accepted as values.
    pub headers: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// First candidate that is non-empty, is not a header label, and passes every
/// constraint. Candidates are trimmed before any check.
pub fn pick<S: AsRef<str>>(
    candidates: &[S],
    headers: &[String],
    constraints: &[Constraint],
) -> Option<String> {
    candidates
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .filter(|c| !headers.iter().any(|h| h == c))
        .find(|c| constraints.iter().all(|k| k.accepts(c)))
        .map(str::to_string)
}

/// Text of every cell carrying `marker`, in document order.
pub fn column(doc: &Document, marker: &str) -> Vec<String> {
    html::elements_with_class(&doc.html, "td", marker)
        .iter()
        .map(|td| td.text())
        .collect()
}

pub fn extract(doc: &Document, spec: &FieldSpec) -> Option<String> {
    pick(&column(doc, &spec.marker), &spec.headers, &spec.constraints)
}

/// Every configured attribute. Missing ones map to `None`.
pub fn extract_all(doc: &Document, specs: &[FieldSpec]) -> BTreeMap<Attribute, Option<String>> {
    specs
        .iter()
        .map(|spec| (spec.attribute, extract(doc, spec)))
        .collect()
}
