// src/config/options.rs
//
// Run configuration. Every section has a Default carrying the live registry
// endpoints and markers; an optional TOML file overrides any part of it and
// CLI flags override the file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::consts::*;
use super::fields::FieldOverrides;
use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    pub run: RunOptions,
    pub log: LogOptions,
    pub bibliographic: BibliographicOptions,
    pub demographic: DemographicOptions,
    pub fields: FieldOverrides,
    pub credentials: CredentialsTable,
}

impl AppOptions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let opts: AppOptions = toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Fill credentials from the environment. Environment wins over the file.
    pub fn with_env_credentials(mut self) -> Self {
        if let Some(c) = Credentials::from_env(ENV_BIBLIO_USER, ENV_BIBLIO_PASSWORD) {
            self.credentials.bibliographic = Some(c);
        }
        if let Some(c) = Credentials::from_env(ENV_DEMO_USER, ENV_DEMO_PASSWORD) {
            self.credentials.demographic = Some(c);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let [lo, hi] = self.run.pause_ms;
        if lo > hi {
            return Err(ConfigError::Invalid(format!("run.pause_ms: {lo} > {hi}")));
        }
        if self.run.snapshot_every == 0 {
            return Err(ConfigError::Invalid(s!("run.snapshot_every must be at least 1")));
        }
        for (name, s) in [("bibliographic", &self.bibliographic.session), ("demographic", &self.demographic.session)] {
            if url::Url::parse(&s.base_url).is_err() {
                return Err(ConfigError::Invalid(format!("{name}.session.base_url: {:?}", s.base_url)));
            }
        }
        Ok(())
    }
}

/* ---------------- Run ---------------- */

/// Which key the table is organized by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    /// Detect from the columns present.
    #[default]
    Auto,
    /// One row per bibliographic record.
    Article,
    /// One row per bibliographic author.
    Author,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub input: Option<PathBuf>,
    pub shape: TableShape,
    pub snapshot_every: usize,
    pub snapshot_dir: PathBuf,
    /// Inclusive range for the pause between records.
    pub pause_ms: [u64; 2],
    pub retry_failed: bool,
    pub limit: Option<usize>,
    pub debug_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            input: None,
            shape: TableShape::Auto,
            snapshot_every: SNAPSHOT_EVERY,
            snapshot_dir: PathBuf::from(SNAPSHOT_DIR),
            pause_ms: PAUSE_MS,
            retry_failed: false,
            limit: None,
            debug_dir: PathBuf::from(DEBUG_DIR),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// EnvFilter directive, e.g. `info` or `rschr_enrich=debug`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { level: s!("info"), file: Some(PathBuf::from(DEBUG_LOG)) }
    }
}

/* ---------------- Sessions ---------------- */

/// A blocking page state and how to get past it. With no `dismiss_path` the
/// dialog is accepted in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterstitialRule {
    pub marker: String,
    #[serde(default)]
    pub dismiss_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    /// A view counts as ready once this text is present.
    pub ready_marker: String,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// `alert(...)` inside a script is always treated as a dialog; these add to it.
    pub interstitials: Vec<InterstitialRule>,
    /// Form parameter that carries a triggered page action, if the registry
    /// reads one. Without it the form is submitted as-is.
    pub action_param: Option<String>,
}

impl SessionOptions {
    fn for_base(base_url: &str) -> Self {
        Self {
            base_url: s!(base_url),
            user_agent: s!(USER_AGENT),
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            ready_marker: s!("</html>"),
            ready_timeout_ms: READY_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            interstitials: Vec::new(),
            action_param: None,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::for_base(KCI_BASE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginOptions {
    /// Page loaded first (sets cookies, may raise a notice).
    pub entry_path: String,
    /// Page holding the login form, when it is not the entry page.
    pub form_path: Option<String>,
    pub form_wait_ms: u64,
    pub user_field: String,
    pub password_field: String,
    /// Present only when logged in.
    pub authenticated_marker: Option<String>,
    /// Present only when logged out.
    pub unauthenticated_marker: Option<String>,
    /// Class tokens of the menu entries followed after login, in order.
    pub menu_path: Vec<String>,
    /// Frame entered at the end of the menu walk (`iframe` = first frame).
    pub frame: Option<String>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            entry_path: s!(KCI_MAIN),
            form_path: Some(s!(KCI_LOGIN_FORM)),
            form_wait_ms: FORM_WAIT_MS,
            user_field: s!(USER_INPUT),
            password_field: s!(PASSWORD_INPUT),
            authenticated_marker: Some(s!(LOGOUT_MARKER)),
            unauthenticated_marker: None,
            menu_path: Vec::new(),
            frame: None,
        }
    }
}

/* ---------------- Bibliographic registry ---------------- */

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleRoutes {
    /// Detail view; `{record}` is replaced.
    pub article_view: String,
    /// Profile view; `{author}` and `{record}` are replaced.
    pub author_profile: String,
    /// Profile view without a record context; `{author}` is replaced.
    pub author_profile_only: String,
    /// Substring identifying author links on the detail view.
    pub author_link: String,
    pub author_param: String,
    pub record_param: String,
    /// Hidden input holding the cross-registry id.
    pub cross_id_field: String,
    /// `tag.class` selectors tried in order for the profile heading name.
    pub profile_name: Vec<String>,
}

impl Default for ArticleRoutes {
    fn default() -> Self {
        Self {
            article_view: s!(KCI_ARTICLE_VIEW),
            author_profile: s!(KCI_AUTHOR_PROFILE),
            author_profile_only: s!(KCI_AUTHOR_PROFILE_ONLY),
            author_link: s!(KCI_AUTHOR_LINK),
            author_param: s!(KCI_AUTHOR_PARAM),
            record_param: s!(KCI_RECORD_PARAM),
            cross_id_field: s!(KCI_CROSS_ID_FIELD),
            profile_name: vec![s!("h3.name"), s!("strong.name")],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BibliographicOptions {
    pub session: SessionOptions,
    pub login: LoginOptions,
    pub routes: ArticleRoutes,
}

/* ---------------- Demographic registry ---------------- */

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// `#id` or a bare `name`.
    pub name_field: String,
    pub id_field: String,
    /// Value of the action parameter that runs the search.
    pub action: String,
    pub settle_ms: u64,
    pub retry_settle_ms: u64,
    /// Researcher-name column, read only for the mismatch check.
    pub name_marker: String,
    pub name_header: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            name_field: s!(KRI_NAME_INPUT),
            id_field: s!(KRI_ID_INPUT),
            action: s!(KRI_SEARCH_ACTION),
            settle_ms: SETTLE_MS,
            retry_settle_ms: RETRY_SETTLE_MS,
            name_marker: s!(KRI_NAME_COL),
            name_header: s!(KRI_NAME_HEADER),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicOptions {
    pub session: SessionOptions,
    pub login: LoginOptions,
    pub search: SearchOptions,
}

impl Default for DemographicOptions {
    fn default() -> Self {
        let mut session = SessionOptions::for_base(KRI_BASE);
        session.interstitials = vec![
            InterstitialRule { marker: s!(r#"id="next_pwd""#), dismiss_path: None },
            InterstitialRule { marker: s!("popup_notice"), dismiss_path: None },
        ];
        Self {
            session,
            login: LoginOptions {
                entry_path: s!(KRI_MAIN),
                form_path: None,
                menu_path: vec![s!(KRI_MENU_SEARCH), s!(KRI_MENU_NAME_SEARCH)],
                frame: Some(s!("iframe")),
                ..LoginOptions::default()
            },
            search: SearchOptions::default(),
        }
    }
}

/* ---------------- Credentials ---------------- */

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    fn from_env(user_var: &str, password_var: &str) -> Option<Self> {
        let user = std::env::var(user_var).ok().filter(|v| !v.is_empty())?;
        let password = std::env::var(password_var).ok().filter(|v| !v.is_empty())?;
        Some(Self { user, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsTable {
    pub bibliographic: Option<Credentials>,
    pub demographic: Option<Credentials>,
}
