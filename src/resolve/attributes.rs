// src/resolve/attributes.rs
//
// Demographic registry search: cross-registry id (+ native name) -> attributes.
//
// Per invocation:
//
//   SearchInput(mode) -> SearchSubmitted -> ResultCheck -> ResultFound
//                              |                 |
//        dialog after submit:  |                 | empty grid, first time:
//        re-enter by keystroke +                 + RetrySearch -> SearchInput(Keystroke)
//
// A dialog anywhere else surfaces as `SessionError::Interstitial`; the whole
// invocation is retried once from SearchInput and a second one aborts.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::options::SearchOptions;
use crate::core::sanitize::normalize_name;
use crate::error::SessionError;
use crate::extract::FieldSpec;
use crate::record::Attribute;
use crate::session::{Document, FieldRef, FillTarget, InputMode, Session};
use crate::specs::search;

/// What a successful search yielded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeHit {
    pub values: BTreeMap<Attribute, Option<String>>,
    /// Name column of the hit, for the mismatch check.
    pub registry_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(AttributeHit),
    /// Queried fine; the registry has no match.
    NoResult,
    /// The query could not be completed.
    Aborted(String),
}

#[derive(Debug)]
enum State {
    SearchInput(InputMode),
    SearchSubmitted,
    ResultCheck,
    RetrySearch,
    ResultFound(Document),
}

pub struct AttributeResolver<'a> {
    session: &'a mut dyn Session,
    search: &'a SearchOptions,
    specs: &'a [FieldSpec],
    probe: Option<&'a FieldSpec>,
}

impl<'a> AttributeResolver<'a> {
    /// Data presence is probed on the birth-year field.
    pub fn new(session: &'a mut dyn Session, search: &'a SearchOptions, specs: &'a [FieldSpec]) -> Self {
        let probe = specs.iter().find(|s| s.attribute == Attribute::BirthYear).or(specs.first());
        Self { session, search, specs, probe }
    }

    pub fn resolve(&mut self, cross_id: &str, native_name: Option<&str>) -> Result<SearchOutcome, SessionError> {
        let name = native_name.map(str::trim).filter(|n| !n.is_empty());
        if name.is_none() {
            logd!("Attributes: {} has no native name, searching by id only", cross_id);
        }

        let mut retried_empty = false;
        let mut interrupted = false;
        loop {
            match self.invoke(cross_id, name, &mut retried_empty) {
                Ok(outcome) => return Ok(outcome),
                Err(SessionError::Interstitial(text)) => {
                    self.session.dismiss_interstitial()?;
                    if interrupted {
                        logw!("Attributes: {} interrupted twice ({}), giving up", cross_id, text);
                        return Ok(SearchOutcome::Aborted(text));
                    }
                    logw!("Attributes: {} interrupted by dialog ({}), retrying", cross_id, text);
                    interrupted = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn invoke(
        &mut self,
        cross_id: &str,
        name: Option<&str>,
        retried_empty: &mut bool,
    ) -> Result<SearchOutcome, SessionError> {
        let mut state = State::SearchInput(InputMode::Scripted);
        let mut settle = Duration::from_millis(self.search.settle_ms);
        let mut keyed_after_dialog = false;

        loop {
            state = match state {
                State::SearchInput(mode) => {
                    if self.session.dismiss_interstitial()? {
                        logd!("Attributes: dialog dismissed before input");
                    }
                    self.enter(cross_id, name, mode)?;
                    State::SearchSubmitted
                }
                State::SearchSubmitted => {
                    self.session.trigger(&self.search.action)?;
                    self.session.settle(settle);
                    if self.session.dismiss_interstitial()? {
                        if keyed_after_dialog {
                            return Err(SessionError::Interstitial(s!("dialog after keyed resubmit")));
                        }
                        logd!("Attributes: {} dialog after submit, re-entering by keystroke", cross_id);
                        keyed_after_dialog = true;
                        settle = Duration::from_millis(self.search.retry_settle_ms);
                        State::SearchInput(InputMode::Keystroke)
                    } else {
                        State::ResultCheck
                    }
                }
                State::ResultCheck => {
                    let doc = self.session.document()?;
                    let has_data = match self.probe {
                        Some(p) => search::has_data(&doc, p),
                        None => false,
                    };
                    if has_data {
                        State::ResultFound(doc)
                    } else if !*retried_empty {
                        *retried_empty = true;
                        logf!("Attributes: {} no rows, searching once more", cross_id);
                        State::RetrySearch
                    } else {
                        logf!("Attributes: {} no rows after retry", cross_id);
                        return Ok(SearchOutcome::NoResult);
                    }
                }
                State::RetrySearch => {
                    settle = Duration::from_millis(self.search.retry_settle_ms);
                    State::SearchInput(InputMode::Keystroke)
                }
                State::ResultFound(doc) => {
                    let values = search::attributes(&doc, self.specs);
                    let registry_name = search::registry_name(&doc, self.search);
                    if let (Some(ours), Some(theirs)) = (name, registry_name.as_deref()) {
                        if normalize_name(theirs) != ours {
                            logw!("Attributes: {} registry shows name {:?}, expected {:?}", cross_id, theirs, ours);
                        }
                    }
                    let found = values.values().filter(|v| v.is_some()).count();
                    logf!("Attributes: {} {} of {} fields", cross_id, found, values.len());
                    return Ok(SearchOutcome::Found(AttributeHit { values, registry_name }));
                }
            };
        }
    }

    /// Fill both search fields. The name input may be duplicated (hidden and
    /// visible); the value must end up in a visible one.
    fn enter(&mut self, cross_id: &str, name: Option<&str>, mode: InputMode) -> Result<(), SessionError> {
        let name_field = FieldRef::parse(&self.search.name_field);
        let id_field = FieldRef::parse(&self.search.id_field);

        match (name, mode) {
            (Some(name), InputMode::Scripted) => {
                self.session.fill(&name_field, name, FillTarget::First, InputMode::Scripted)?;
                if !self.visible_holds(&name_field, name)? {
                    logd!("Attributes: name missed the visible input, typing it");
                    self.session.fill(&name_field, name, FillTarget::Visible, InputMode::Keystroke)?;
                }
                if !self.visible_holds(&name_field, name)? {
                    logd!("Attributes: no visible name input, setting every copy");
                    self.session.fill(&name_field, name, FillTarget::All, InputMode::Scripted)?;
                }
            }
            (Some(name), InputMode::Keystroke) => {
                if self.session.fill(&name_field, name, FillTarget::Visible, InputMode::Keystroke)? == 0 {
                    self.session.fill(&name_field, name, FillTarget::All, InputMode::Scripted)?;
                }
            }
            // Clear a name left over from the previous search.
            (None, _) => match self.session.fill(&name_field, "", FillTarget::All, InputMode::Scripted) {
                Ok(_) | Err(SessionError::ElementNotFound(_)) => {}
                Err(e) => return Err(e),
            },
        }

        if self.session.fill(&id_field, cross_id, FillTarget::First, mode)? == 0 {
            self.session.fill(&id_field, cross_id, FillTarget::All, InputMode::Scripted)?;
        }
        Ok(())
    }

    fn visible_holds(&self, field: &FieldRef, value: &str) -> Result<bool, SessionError> {
        Ok(self
            .session
            .inputs(field)?
            .iter()
            .any(|i| i.visible && i.value == value))
    }
}
