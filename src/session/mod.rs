// src/session/mod.rs
//! # Registry sessions
//!
//! A `Session` is one authenticated, stateful connection to a registry. It
//! owns the navigation state (current document, active frame, pending form
//! values, pending dialog) and exposes the primitives the resolvers drive.
//!
//! ## Rules every implementation follows
//! - `navigate` blocks until the view's readiness marker is seen or the
//!   bounded wait elapses (`SessionError::NavigationTimeout`). It discards any
//!   unsubmitted form values.
//! - While a dialog is pending, every operation other than
//!   `dismiss_interstitial` fails with `SessionError::Interstitial`.
//! - `fill` in `InputMode::Keystroke` only lands in inputs a user could see.
//!
//! The reqwest-backed implementation lives in `http`; tests drive the
//! resolvers through scripted doubles of the same trait.

use std::time::Duration;

use crate::core::html;
use crate::error::SessionError;

pub mod form;
pub mod http;

pub use http::HttpSession;

/// A fetched page (or frame).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self { url: url.into(), html: html.into() }
    }

    /// Case-insensitive substring test.
    pub fn contains(&self, needle: &str) -> bool {
        html::to_lower(&self.html).contains(&html::to_lower(needle))
    }

    pub fn elements(&self, tag: &str) -> Vec<html::Element<'_>> {
        html::elements(&self.html, tag)
    }
}

/// Addresses an input: `#id` or a bare `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRef {
    Id(String),
    Name(String),
}

impl FieldRef {
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('#') {
            Some(id) => FieldRef::Id(s!(id)),
            None => FieldRef::Name(s!(s)),
        }
    }

    pub fn matches(&self, tag: &html::Tag) -> bool {
        match self {
            FieldRef::Id(id) => tag.id() == Some(id.as_str()),
            FieldRef::Name(name) => tag.attr("name") == Some(name.as_str()),
        }
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRef::Id(id) => write!(f, "#{id}"),
            FieldRef::Name(name) => f.write_str(name),
        }
    }
}

/// One input element as the session currently holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputState {
    pub value: String,
    pub visible: bool,
}

/// Which of several same-addressed inputs a fill lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillTarget {
    /// Document order, first match (what a scripted value set hits).
    First,
    /// Only the inputs a user could see.
    Visible,
    All,
}

/// How a value is entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Set the value property directly.
    Scripted,
    /// Clear and type key by key. Slower, but lands where a user would.
    Keystroke,
}

pub trait Session {
    /// Short registry name for logs and errors.
    fn registry(&self) -> &str;

    /// Go to `target` (absolute URL or path on the registry) and wait for it.
    fn navigate(&mut self, target: &str) -> Result<Document, SessionError>;

    /// The active document: the current frame when one is entered.
    fn document(&self) -> Result<Document, SessionError>;

    /// Scope reads and form operations to a frame of the current page.
    fn enter_frame(&mut self, selector: &str) -> Result<(), SessionError>;

    fn leave_frame(&mut self);

    /// Accept a pending blocking dialog. Returns whether there was one.
    fn dismiss_interstitial(&mut self) -> Result<bool, SessionError>;

    /// Every input matching `field`, in document order.
    fn inputs(&self, field: &FieldRef) -> Result<Vec<InputState>, SessionError>;

    /// Enter `value`. Returns how many inputs now hold it.
    fn fill(
        &mut self,
        field: &FieldRef,
        value: &str,
        target: FillTarget,
        mode: InputMode,
    ) -> Result<usize, SessionError>;

    /// Run a page action (e.g. the search) on the active form.
    fn trigger(&mut self, action: &str) -> Result<Document, SessionError>;

    /// Block for `d`. Doubles override this to keep tests instant.
    fn settle(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_ref_parses_id_and_name() {
        assert_eq!(FieldRef::parse("#txtSearchRschrRegNo"), FieldRef::Id(s!("txtSearchRschrRegNo")));
        assert_eq!(FieldRef::parse("txtKorNm"), FieldRef::Name(s!("txtKorNm")));
        assert_eq!(FieldRef::parse("#uid").to_string(), "#uid");
    }

    #[test]
    fn document_contains_ignores_ascii_case() {
        let d = Document::new("u", "<A HREF='x'>로그아웃</A>");
        assert!(d.contains("<a href"));
        assert!(d.contains("로그아웃"));
    }
}
