// src/resolve/identity.rs
//
// Bibliographic registry: record id -> first author's local id, display name
// and (when linked) cross-registry id.

use crate::config::options::ArticleRoutes;
use crate::error::SessionError;
use crate::session::{Document, Session};
use crate::specs::{article, profile};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub local_author_id: String,
    /// `None`: the author is known but not linked to the demographic registry.
    pub cross_registry_id: Option<String>,
    pub author_name_raw: Option<String>,
    /// Record id the registry's own link used for the profile, when it differs.
    pub record_id_override: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityOutcome {
    Found(Identity),
    /// The record lists no author reference.
    NotFound,
}

pub struct IdentityResolver<'a> {
    session: &'a mut dyn Session,
    routes: &'a ArticleRoutes,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(session: &'a mut dyn Session, routes: &'a ArticleRoutes) -> Self {
        Self { session, routes }
    }

    /// Detail view, first author link, then that author's profile.
    pub fn resolve(&mut self, record_id: &str) -> Result<IdentityOutcome, SessionError> {
        let detail = self.visit(&article::detail_path(self.routes, record_id))?;
        if let Some(t) = article::title(&detail) {
            logd!("Identity: {} \"{}\"", record_id, t);
        }

        let Some(link) = article::first_author(&detail, self.routes) else {
            logf!("Identity: {} lists no author link", record_id);
            return Ok(IdentityOutcome::NotFound);
        };

        let record_override = link.record_override.filter(|r| r != record_id);
        if let Some(r) = &record_override {
            logd!("Identity: {} author link points at record {}", record_id, r);
        }
        let profile_record = record_override.as_deref().unwrap_or(record_id);

        let page = self.visit(&profile::profile_path(self.routes, &link.local_author_id, Some(profile_record)))?;
        let cross_registry_id = profile::cross_registry_id(&page, &self.routes.cross_id_field);

        match &cross_registry_id {
            Some(cid) => logf!("Identity: {} author {} -> cross id {}", record_id, link.local_author_id, cid),
            None => logf!("Identity: {} author {} has no cross id", record_id, link.local_author_id),
        }

        Ok(IdentityOutcome::Found(Identity {
            local_author_id: link.local_author_id,
            cross_registry_id,
            author_name_raw: Some(link.name_raw).filter(|n| !n.is_empty()),
            record_id_override: record_override,
        }))
    }

    /// Author-keyed tables: straight to the profile, name from its heading.
    pub fn resolve_author(&mut self, local_author_id: &str) -> Result<IdentityOutcome, SessionError> {
        let page = self.visit(&profile::profile_path(self.routes, local_author_id, None))?;
        let cross_registry_id = profile::cross_registry_id(&page, &self.routes.cross_id_field);
        let author_name_raw = profile::author_name(&page, &self.routes.profile_name);

        if cross_registry_id.is_none() && author_name_raw.is_none() {
            logf!("Identity: author {} profile shows neither name nor cross id", local_author_id);
            return Ok(IdentityOutcome::NotFound);
        }
        Ok(IdentityOutcome::Found(Identity {
            local_author_id: s!(local_author_id),
            cross_registry_id,
            author_name_raw,
            record_id_override: None,
        }))
    }

    /// Navigate with a dialog check on both sides. A dialog raised by the
    /// page itself costs one more visit; a second one is an interruption.
    fn visit(&mut self, target: &str) -> Result<Document, SessionError> {
        if self.session.dismiss_interstitial()? {
            logd!("Identity: dialog dismissed before {}", target);
        }
        self.session.navigate(target)?;
        if self.session.dismiss_interstitial()? {
            logw!("Identity: dialog on {}, visiting again", target);
            self.session.navigate(target)?;
        }
        self.session.document()
    }
}
