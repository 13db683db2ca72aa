// src/specs/search.rs

use std::collections::BTreeMap;

use crate::config::options::SearchOptions;
use crate::extract::{self, FieldSpec};
use crate::record::Attribute;
use crate::session::Document;

/// Whether the grid shows a data row: some probe cell is filled and is not
/// the header. Constraints are for reading values, not for this check.
pub fn has_data(doc: &Document, probe: &FieldSpec) -> bool {
    extract::pick(&extract::column(doc, &probe.marker), &probe.headers, &[]).is_some()
}

/// Every configured attribute; each absence is independent.
pub fn attributes(doc: &Document, specs: &[FieldSpec]) -> BTreeMap<Attribute, Option<String>> {
    extract::extract_all(doc, specs)
}

/// The researcher name the registry shows for the hit.
pub fn registry_name(doc: &Document, search: &SearchOptions) -> Option<String> {
    extract::pick(
        &extract::column(doc, &search.name_marker),
        std::slice::from_ref(&search.name_header),
        &[],
    )
}
