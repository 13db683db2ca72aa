// src/session/http.rs
//
// reqwest-backed Session. Pages are fetched whole; "readiness" means the
// configured marker is present in the body, re-fetched on an interval until
// the bounded wait runs out. Dialogs are recognized in the fetched markup
// (script alerts, configured markers) and block the session until dismissed.
// A bare alert response (no form, or one that sends the browser back) leaves
// the page underneath in place; closing it returns to that page.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use url::Url;

use super::form::{self, Form, Method};
use super::{Document, FieldRef, FillTarget, InputMode, InputState, Session};
use crate::config::options::{Credentials, InterstitialRule, LoginOptions, SessionOptions};
use crate::core::html;
use crate::core::net;
use crate::core::sanitize::file_fragment;
use crate::error::{AuthError, SessionError};

#[derive(Clone, Debug)]
struct Pending {
    text: String,
    dismiss_path: Option<String>,
    /// The response only carried the dialog; the previous page stays active.
    in_place: bool,
}

/// Which document a freshly fetched page replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Current,
    Top,
    Frame,
}

pub struct HttpSession {
    name: String,
    opts: SessionOptions,
    base: Url,
    client: Client,
    page: Document,
    frame: Option<Document>,
    forms: Vec<Form>,
    active_form: Option<usize>,
    pending: Option<Pending>,
    debug_dir: Option<PathBuf>,
}

impl HttpSession {
    /// Unauthenticated session against `opts.base_url`.
    pub fn new(name: &str, opts: SessionOptions) -> Result<Self, SessionError> {
        let base = Url::parse(&opts.base_url)?;
        let client = net::client(&opts)?;
        Ok(Self {
            name: s!(name),
            opts,
            base,
            client,
            page: Document::default(),
            frame: None,
            forms: Vec::new(),
            active_form: None,
            pending: None,
            debug_dir: None,
        })
    }

    /// Pages that fail during login are written here.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Log in and walk to the working view.
    pub fn open(
        name: &str,
        opts: SessionOptions,
        login: &LoginOptions,
        credentials: Option<&Credentials>,
        debug_dir: Option<PathBuf>,
    ) -> Result<Self, AuthError> {
        let credentials = credentials.ok_or_else(|| AuthError::MissingCredentials { registry: s!(name) })?;
        let mut session = Self::new(name, opts).map_err(|source| AuthError::Session { registry: s!(name), source })?;
        session.debug_dir = debug_dir;
        session.login(login, credentials)?;
        Ok(session)
    }

    /* ---------------- Login ---------------- */

    fn login(&mut self, login: &LoginOptions, credentials: &Credentials) -> Result<(), AuthError> {
        let user_field = FieldRef::parse(&login.user_field);
        let password_field = FieldRef::parse(&login.password_field);

        self.navigate(&login.entry_path).map_err(|e| self.auth_err("entry", e))?;
        if self.dismiss_interstitial().map_err(|e| self.auth_err("entry", e))? {
            logd!("Login: {} notice dismissed", self.name);
        }

        // Form may take a while to show up; re-fetch until it does.
        let form_page = login.form_path.as_deref().unwrap_or(&login.entry_path).to_string();
        let wait = Duration::from_millis(login.form_wait_ms);
        let started = Instant::now();
        let mut first = true;
        loop {
            if login.form_path.is_some() || !first {
                self.navigate(&form_page).map_err(|e| self.auth_err("form", e))?;
                self.dismiss_interstitial().map_err(|e| self.auth_err("form", e))?;
            }
            first = false;
            if self.forms.iter().any(|f| f.has(&user_field)) {
                break;
            }
            if started.elapsed() >= wait {
                self.dump("login_form");
                return Err(AuthError::FormNotFound { registry: self.name.clone(), waited: started.elapsed() });
            }
            std::thread::sleep(Duration::from_millis(self.opts.poll_interval_ms));
        }

        self.fill(&user_field, &credentials.user, FillTarget::All, InputMode::Scripted)
            .map_err(|e| self.auth_err("login_form", e))?;
        self.fill(&password_field, &credentials.password, FillTarget::All, InputMode::Scripted)
            .map_err(|e| self.auth_err("login_form", e))?;
        self.submit(None).map_err(|e| self.auth_err("login_submit", e))?;

        // Password-change prompt or a login alert.
        if self.dismiss_interstitial().map_err(|e| self.auth_err("login_submit", e))? {
            logd!("Login: {} post-login dialog dismissed", self.name);
        }

        self.navigate(&login.entry_path).map_err(|e| self.auth_err("login_result", e))?;
        self.dismiss_interstitial().map_err(|e| self.auth_err("login_result", e))?;
        let still_out = login
            .unauthenticated_marker
            .as_deref()
            .map(|m| self.page.contains(m))
            .unwrap_or(false);
        let not_in = login
            .authenticated_marker
            .as_deref()
            .map(|m| !self.page.contains(m))
            .unwrap_or(false);
        if still_out || not_in {
            self.dump("login_result");
            return Err(AuthError::Rejected { registry: self.name.clone() });
        }
        logf!("Login: {} authenticated", self.name);

        for token in &login.menu_path {
            let target = menu_target(&self.page, token).ok_or_else(|| {
                self.dump(&join!("menu_", token));
                self.auth_err("menu", SessionError::ElementNotFound(join!(".", token)))
            })?;
            logd!("Login: {} menu {} -> {}", self.name, token, target);
            self.navigate(&target).map_err(|e| self.auth_err("menu", e))?;
            self.dismiss_interstitial().map_err(|e| self.auth_err("menu", e))?;
        }

        if let Some(frame) = &login.frame {
            self.enter_frame(frame).map_err(|e| {
                self.dump("frame");
                self.auth_err("frame", e)
            })?;
        }
        Ok(())
    }

    fn auth_err(&self, step: &str, source: SessionError) -> AuthError {
        logw!("Login: {} failed at {}: {}", self.name, step, source);
        AuthError::Session { registry: self.name.clone(), source }
    }

    /// Write the active document to the debug directory.
    fn dump(&self, step: &str) {
        let Some(dir) = &self.debug_dir else { return };
        let doc = self.frame.as_ref().unwrap_or(&self.page);
        let path = dir.join(format!("{}_{}.html", file_fragment(&self.name), file_fragment(step)));
        let res = fs::create_dir_all(dir).and_then(|_| fs::write(&path, &doc.html));
        match res {
            Ok(()) => logd!("Debug: page written to {}", path.display()),
            Err(e) => logw!("Debug: could not write {}: {}", path.display(), e),
        }
    }

    /* ---------------- Fetching ---------------- */

    fn ensure_clear(&self) -> Result<(), SessionError> {
        match &self.pending {
            Some(p) => Err(SessionError::Interstitial(p.text.clone())),
            None => Ok(()),
        }
    }

    /// `target` against the active document, or the registry base before any page.
    fn resolve(&self, target: &str) -> Result<Url, SessionError> {
        let current = self.frame.as_ref().map(|d| d.url.as_str()).unwrap_or(self.page.url.as_str());
        let base = match Url::parse(current) {
            Ok(u) if !target.starts_with('/') => u,
            _ => self.base.clone(),
        };
        Ok(base.join(target)?)
    }

    fn fetch_ready(&mut self, url: Url) -> Result<Document, SessionError> {
        let wait = Duration::from_millis(self.opts.ready_timeout_ms);
        let poll = Duration::from_millis(self.opts.poll_interval_ms);
        let started = Instant::now();
        loop {
            let (final_url, body) = net::read_body(self.client.get(url.clone()).send()?)?;
            let doc = Document::new(final_url, body);
            if doc.contains(&self.opts.ready_marker) || self.dialog_in(&doc).is_some() {
                return Ok(doc);
            }
            if started.elapsed() >= wait {
                return Err(SessionError::NavigationTimeout { target: url.to_string(), waited: started.elapsed() });
            }
            std::thread::sleep(poll);
        }
    }

    fn dialog_in(&self, doc: &Document) -> Option<Pending> {
        if let Some(text) = script_alert(&doc.html) {
            let in_place = goes_back(&doc.html) || form::forms(&doc.html).is_empty();
            return Some(Pending { text, dismiss_path: None, in_place });
        }
        self.opts
            .interstitials
            .iter()
            .find(|r| doc.contains(&r.marker))
            .map(|InterstitialRule { marker, dismiss_path }| Pending {
                text: marker.clone(),
                dismiss_path: dismiss_path.clone(),
                in_place: false,
            })
    }

    /// Make `doc` the active document of `scope`, unless it is only a dialog
    /// over the page already showing.
    fn install(&mut self, doc: Document, scope: Scope) {
        self.pending = self.dialog_in(&doc);
        if let Some(p) = &self.pending {
            logd!("Session: {} dialog raised: {}", self.name, p.text);
            if p.in_place {
                return;
            }
        }
        match scope {
            Scope::Current => {}
            Scope::Top => self.frame = None,
            Scope::Frame => self.frame = Some(Document::default()),
        }
        self.forms = form::forms(&doc.html);
        self.active_form = None;
        match self.frame.as_mut() {
            Some(f) => *f = doc,
            None => self.page = doc,
        }
    }

    fn submit(&mut self, action: Option<&str>) -> Result<Document, SessionError> {
        let idx = self
            .active_form
            .or_else(|| self.forms.iter().position(|f| f.action.is_some()))
            .or(if self.forms.is_empty() { None } else { Some(0) })
            .ok_or_else(|| SessionError::ElementNotFound(s!("form")))?;
        let form = &self.forms[idx];

        let mut pairs = form.pairs();
        if let (Some(action), Some(param)) = (action, self.opts.action_param.as_deref()) {
            match pairs.iter_mut().find(|(k, _)| k == param) {
                Some(slot) => slot.1 = s!(action),
                None => pairs.push((s!(param), s!(action))),
            }
        }

        let current = self.frame.as_ref().map(|d| d.url.clone()).unwrap_or_else(|| self.page.url.clone());
        let url = match &form.action {
            Some(a) => self.resolve(a)?,
            None => Url::parse(&current).or_else(|_| self.resolve(""))?,
        };
        logd!("Session: {} submit {:?} {} ({} fields)", self.name, form.method, url, pairs.len());

        let req = match form.method {
            Method::Post => self.client.post(url).form(&pairs),
            Method::Get => {
                let mut u = url;
                u.query_pairs_mut().extend_pairs(pairs.iter());
                self.client.get(u)
            }
        };
        let (final_url, body) = net::read_body(req.send()?)?;
        let doc = Document::new(final_url, body);
        self.install(doc.clone(), Scope::Current);
        Ok(doc)
    }
}

impl Session for HttpSession {
    fn registry(&self) -> &str {
        &self.name
    }

    fn navigate(&mut self, target: &str) -> Result<Document, SessionError> {
        self.ensure_clear()?;
        let url = self.resolve(target)?;
        let doc = self.fetch_ready(url)?;
        self.install(doc.clone(), Scope::Top);
        Ok(doc)
    }

    fn document(&self) -> Result<Document, SessionError> {
        self.ensure_clear()?;
        Ok(self.frame.clone().unwrap_or_else(|| self.page.clone()))
    }

    fn enter_frame(&mut self, selector: &str) -> Result<(), SessionError> {
        self.ensure_clear()?;
        let mut frames = html::elements(&self.page.html, "iframe");
        frames.extend(html::elements(&self.page.html, "frame"));
        frames.sort_by_key(|e| e.start);

        let pick = match selector {
            "iframe" | "frame" => frames.first(),
            s => {
                let by = FieldRef::parse(s);
                frames.iter().find(|e| by.matches(&e.tag))
            }
        };
        let src = pick
            .and_then(|e| e.attr("src"))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| SessionError::ElementNotFound(s!(selector)))?;

        let url = Url::parse(&self.page.url)
            .map_err(SessionError::from)
            .and_then(|u| Ok(u.join(&src)?))
            .or_else(|_| self.resolve(&src))?;
        let doc = self.fetch_ready(url)?;
        logd!("Session: {} entered frame {}", self.name, doc.url);
        self.install(doc, Scope::Frame);
        Ok(())
    }

    fn leave_frame(&mut self) {
        if self.frame.take().is_some() {
            self.forms = form::forms(&self.page.html);
            self.active_form = None;
        }
    }

    fn dismiss_interstitial(&mut self) -> Result<bool, SessionError> {
        let Some(p) = self.pending.take() else { return Ok(false) };
        logd!("Session: {} dismissing dialog: {}", self.name, p.text);
        if let Some(path) = p.dismiss_path {
            let url = self.resolve(&path)?;
            let doc = self.fetch_ready(url)?;
            self.install(doc, Scope::Current);
        }
        Ok(true)
    }

    fn inputs(&self, field: &FieldRef) -> Result<Vec<InputState>, SessionError> {
        self.ensure_clear()?;
        Ok(self
            .forms
            .iter()
            .flat_map(|f| f.matching(field))
            .map(|i| InputState { value: i.value.clone(), visible: i.visible })
            .collect())
    }

    fn fill(
        &mut self,
        field: &FieldRef,
        value: &str,
        target: FillTarget,
        mode: InputMode,
    ) -> Result<usize, SessionError> {
        self.ensure_clear()?;
        let Some(form_idx) = self.forms.iter().position(|f| f.has(field)) else {
            return Err(SessionError::ElementNotFound(field.to_string()));
        };

        let mut landed = 0usize;
        let mut first_done = false;
        for (i, f) in self.forms.iter_mut().enumerate() {
            for input in f.matching_mut(field) {
                let chosen = match target {
                    FillTarget::First => !first_done,
                    FillTarget::Visible => input.visible,
                    FillTarget::All => true,
                };
                first_done = true;
                // Keys only reach inputs a user can focus.
                if !chosen || (mode == InputMode::Keystroke && !input.visible) {
                    continue;
                }
                input.value = s!(value);
                landed += 1;
                if i != form_idx {
                    logd!("Session: {} {} also present in form {}", self.name, field, i);
                }
            }
        }
        self.active_form = Some(form_idx);
        Ok(landed)
    }

    fn trigger(&mut self, action: &str) -> Result<Document, SessionError> {
        self.ensure_clear()?;
        self.submit(Some(action))
    }
}

/// Text of the first `alert(...)` in a script block.
fn script_alert(doc: &str) -> Option<String> {
    html::elements(doc, "script").into_iter().find_map(|e| {
        let at = e.inner.find("alert(")?;
        let rest = &e.inner[at + "alert(".len()..];
        let text = rest
            .trim_start()
            .strip_prefix(['"', '\''])
            .and_then(|r| r.find(['"', '\'']).map(|end| &r[..end]))
            .unwrap_or("alert");
        Some(s!(text))
    })
}

/// Whether the page's script returns to the previous page.
fn goes_back(doc: &str) -> bool {
    html::elements(doc, "script")
        .iter()
        .any(|e| e.inner.contains("history.back") || e.inner.contains("history.go(-1)"))
}

/// Link target of the first menu entry tagged `token`: an `<a>` carrying the
/// class itself, or the first link inside an element that does.
fn menu_target(doc: &Document, token: &str) -> Option<String> {
    let link_of = |tag: &html::Tag| -> Option<String> {
        tag.attr("data-url")
            .or_else(|| tag.attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty() && *h != "#" && !h.starts_with("javascript:"))
            .map(str::to_string)
    };

    if let Some(t) = html::elements_with_class(&doc.html, "a", token).iter().find_map(|a| link_of(&a.tag)) {
        return Some(t);
    }
    ["li", "div", "span"].iter().find_map(|tag| {
        html::elements_with_class(&doc.html, tag, token).iter().find_map(|el| {
            link_of(&el.tag).or_else(|| html::elements(el.inner, "a").iter().find_map(|a| link_of(&a.tag)))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_text_is_extracted() {
        let doc = r#"<html><script type="text/javascript">alert('검색 조건을 입력하세요.'); history.back();</script></html>"#;
        assert_eq!(script_alert(doc).as_deref(), Some("검색 조건을 입력하세요."));
        assert_eq!(script_alert("<script>var a = 1;</script>"), None);
        assert!(goes_back(doc));
        assert!(!goes_back("<script>alert('x');</script>"));
    }

    #[test]
    fn menu_target_follows_nested_link() {
        let doc = Document::new(
            "https://kri.example/kri2",
            r##"<ul><li class="dep1-item ico-search"><a href="/kri2/search/main">검색</a></li>
                 <li class="MNU_1103"><a href="#" data-url="/kri2/search/name">성명검색</a></li></ul>"##,
        );
        assert_eq!(menu_target(&doc, "ico-search").as_deref(), Some("/kri2/search/main"));
        assert_eq!(menu_target(&doc, "MNU_1103").as_deref(), Some("/kri2/search/name"));
        assert_eq!(menu_target(&doc, "MNU_9999"), None);
    }
}
