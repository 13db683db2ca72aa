// src/specs/profile.rs

use crate::config::options::ArticleRoutes;
use crate::core::html::{self, text_keep_breaks};
use crate::core::sanitize::normalize_id;
use crate::session::Document;

pub fn profile_path(routes: &ArticleRoutes, author_id: &str, record_id: Option<&str>) -> String {
    match record_id {
        Some(r) => routes.author_profile.replace("{author}", author_id).replace("{record}", r),
        None => routes.author_profile_only.replace("{author}", author_id),
    }
}

/// Cross-registry id from the profile's hidden input. Looked up by `id`, then
/// by `name`, then any hidden input whose id or name ends in the key's last
/// segment. An empty value means the author is not linked.
pub fn cross_registry_id(doc: &Document, field: &str) -> Option<String> {
    let inputs = doc.elements("input");
    let suffix = field.rsplit('.').next().unwrap_or(field);

    let by_id = || inputs.iter().find(|i| i.tag.id() == Some(field));
    let by_name = || inputs.iter().find(|i| i.attr("name") == Some(field));
    let by_suffix = || {
        inputs.iter().find(|i| {
            let hidden = i.attr("type").map(|t| t.eq_ignore_ascii_case("hidden")).unwrap_or(false);
            hidden && [i.tag.id(), i.attr("name")].into_iter().flatten().any(|k| k.contains(suffix))
        })
    };

    let input = by_id().or_else(by_name).or_else(by_suffix)?;
    let value = normalize_id(input.attr("value").unwrap_or(""));
    if value.is_empty() { None } else { Some(value) }
}

/// Author name from the profile heading; `selectors` are `tag.class` pairs
/// tried in order.
pub fn author_name(doc: &Document, selectors: &[String]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        let (tag, class) = sel.split_once('.')?;
        html::elements_with_class(&doc.html, tag, class)
            .first()
            .map(|e| text_keep_breaks(e.inner))
            .filter(|t| !t.is_empty())
    })
}
