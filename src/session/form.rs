// src/session/form.rs
//
// Form model for the HTTP session: what a browser would submit from a page.

use crate::core::html::{self, Tag};

use super::FieldRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormInput {
    pub tag: Tag,
    pub value: String,
    pub visible: bool,
}

impl FormInput {
    fn from_tag(tag: Tag, inner_text: Option<String>) -> Self {
        let value = inner_text.or_else(|| tag.attr("value").map(str::to_string)).unwrap_or_default();
        let visible = is_visible(&tag);
        Self { tag, value, visible }
    }

    pub fn name(&self) -> Option<&str> {
        self.tag.attr("name").filter(|n| !n.is_empty())
    }

    fn kind(&self) -> String {
        html::to_lower(self.tag.attr("type").unwrap_or("text"))
    }

    /// Whether the value goes out with the form.
    fn is_submitted(&self) -> bool {
        if self.name().is_none() || self.tag.has_attr("disabled") {
            return false;
        }
        match self.kind().as_str() {
            "submit" | "button" | "image" | "reset" | "file" => false,
            "checkbox" | "radio" => self.tag.has_attr("checked"),
            _ => true,
        }
    }
}

/// Not `type=hidden`, not `display:none`/`visibility:hidden`, no `hidden` attribute.
pub fn is_visible(tag: &Tag) -> bool {
    if tag.has_attr("hidden") {
        return false;
    }
    if tag.attr("type").map(|t| t.eq_ignore_ascii_case("hidden")).unwrap_or(false) {
        return false;
    }
    let style: String = tag
        .attr("style")
        .map(html::to_lower)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    !(style.contains("display:none") || style.contains("visibility:hidden"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Form {
    pub action: Option<String>,
    pub method: Method,
    pub inputs: Vec<FormInput>,
}

impl Form {
    fn from_parts(open: Option<&Tag>, inner: &str) -> Self {
        let action = open.and_then(|t| t.attr("action")).filter(|a| !a.trim().is_empty()).map(str::to_string);
        let method = match open.and_then(|t| t.attr("method")) {
            Some(m) if m.eq_ignore_ascii_case("post") => Method::Post,
            _ => Method::Get,
        };

        let mut inputs: Vec<(usize, FormInput)> = html::elements(inner, "input")
            .into_iter()
            .map(|e| (e.start, FormInput::from_tag(e.tag, None)))
            .collect();
        inputs.extend(
            html::elements(inner, "textarea")
                .into_iter()
                .map(|e| (e.start, FormInput::from_tag(e.tag, Some(e.inner.to_string())))),
        );
        inputs.sort_by_key(|(at, _)| *at);

        Self { action, method, inputs: inputs.into_iter().map(|(_, i)| i).collect() }
    }

    pub fn has(&self, field: &FieldRef) -> bool {
        self.inputs.iter().any(|i| field.matches(&i.tag))
    }

    pub fn matching(&self, field: &FieldRef) -> impl Iterator<Item = &FormInput> {
        self.inputs.iter().filter(move |i| field.matches(&i.tag))
    }

    pub fn matching_mut<'a>(&'a mut self, field: &'a FieldRef) -> impl Iterator<Item = &'a mut FormInput> {
        self.inputs.iter_mut().filter(move |i| field.matches(&i.tag))
    }

    /// Name/value pairs a submit would send, in document order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.inputs
            .iter()
            .filter(|i| i.is_submitted())
            .filter_map(|i| i.name().map(|n| (s!(n), i.value.clone())))
            .collect()
    }
}

/// Every `<form>` in `doc`. Inputs outside any form are gathered into a
/// trailing action-less form so they stay addressable.
pub fn forms(doc: &str) -> Vec<Form> {
    let mut out: Vec<Form> = html::elements(doc, "form")
        .into_iter()
        .map(|e| Form::from_parts(Some(&e.tag), e.inner))
        .collect();

    let all = Form::from_parts(None, doc);
    let owned: usize = out.iter().map(|f| f.inputs.len()).sum();
    if all.inputs.len() > owned {
        let stray: Vec<FormInput> = all
            .inputs
            .into_iter()
            .filter(|i| !out.iter().any(|f| f.inputs.contains(i)))
            .collect();
        if !stray.is_empty() {
            out.push(Form { action: None, method: Method::Get, inputs: stray });
        }
    }
    out
}
