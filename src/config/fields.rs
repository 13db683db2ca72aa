// src/config/fields.rs
//
// Default attribute specs for the demographic result grid, plus the TOML
// override shape. Overrides replace only what they name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extract::{Constraint, FieldSpec};
use crate::record::Attribute;

fn spec(attribute: Attribute, marker: &str, headers: &[&str], constraints: Vec<Constraint>) -> FieldSpec {
    FieldSpec {
        attribute,
        marker: s!(marker),
        headers: headers.iter().map(|h| s!(*h)).collect(),
        constraints,
    }
}

#[rustfmt::skip]
pub fn default_field_specs() -> Vec<FieldSpec> {
    use Attribute::*;
    vec![
        spec(BirthYear,   "HideCol0C3",  &["출생년도"], vec![Constraint::Digits]),
        spec(Gender,      "HideCol0C7",  &["성별"], vec![Constraint::OneOf { values: vec![s!("남"), s!("여")] }]),
        spec(Affiliation, "HideCol0C8",  &["소속대학/기관"], vec![]),
        spec(Department,  "HideCol0C9",  &["부서", "소속학과"], vec![]),
        spec(Rank,        "HideCol0C10", &["직급"], vec![]),
        spec(Field,       "HideCol0C11", &["전공분야"], vec![]),
        spec(AlmaMater,   "HideCol0C12", &["출신학교"], vec![]),
        spec(Degree,      "HideCol0C13", &["취득학위"], vec![]),
    ]
}

/// Partial override of one attribute's spec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOverride {
    pub marker: Option<String>,
    pub headers: Option<Vec<String>>,
    pub constraints: Option<Vec<Constraint>>,
}

/// `[fields.<attribute>]` tables keyed by attribute.
pub type FieldOverrides = BTreeMap<Attribute, FieldOverride>;

/// Defaults with `overrides` laid over them.
pub fn field_specs(overrides: &FieldOverrides) -> Vec<FieldSpec> {
    let mut specs = default_field_specs();
    for spec in specs.iter_mut() {
        let Some(o) = overrides.get(&spec.attribute) else { continue };
        if let Some(m) = &o.marker {
            spec.marker = m.clone();
        }
        if let Some(h) = &o.headers {
            spec.headers = h.clone();
        }
        if let Some(c) = &o.constraints {
            spec.constraints = c.clone();
        }
    }
    specs
}
