// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rschr_enrich::error::SessionError;
use rschr_enrich::session::{Document, FieldRef, FillTarget, InputMode, InputState, Session};

pub const NAME_FIELD: &str = "txtKorNm";
pub const ID_FIELD: &str = "#txtSearchRschrRegNo";

/// What the next `trigger` does.
#[derive(Clone, Debug)]
pub enum Step {
    /// Search ran; the frame now shows this grid.
    Grid(String),
    /// Search ran but raised a dialog (e.g. "enter a search term").
    DialogAfterSubmit(String),
    /// The trigger itself is blocked by a dialog that pops mid-flight.
    Interrupt(String),
    /// The view never became ready.
    Timeout,
}

/// Values held by the name and id inputs when a search ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub visible_name: Option<String>,
    pub id: Option<String>,
}

/// In-memory `Session` double. Navigation serves canned pages; searches
/// consume `steps` in order. Fill semantics follow the real session:
/// keystrokes only reach visible inputs.
pub struct ScriptedSession {
    pub name: String,
    pub pages: HashMap<String, String>,
    /// Visits to a target that raise a dialog instead of loading it.
    pub alerts: HashMap<String, usize>,
    pub current: Document,
    pub inputs: Vec<(FieldRef, InputState)>,
    pub steps: VecDeque<Step>,
    pub pending: Option<String>,
    pub navigations: Vec<String>,
    pub submissions: Vec<Submission>,
    pub dismissed: usize,
    pub settled: Vec<Duration>,
}

impl ScriptedSession {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: HashMap::new(),
            alerts: HashMap::new(),
            current: Document::default(),
            inputs: Vec::new(),
            steps: VecDeque::new(),
            pending: None,
            navigations: Vec::new(),
            submissions: Vec::new(),
            dismissed: 0,
            settled: Vec::new(),
        }
    }

    /// A search frame: one name input per entry of `name_visibility`, one id input.
    pub fn search_frame(name_visibility: &[bool]) -> Self {
        let mut s = Self::new("KRI");
        for &visible in name_visibility {
            s.inputs.push((FieldRef::parse(NAME_FIELD), InputState { value: String::new(), visible }));
        }
        s.inputs.push((FieldRef::parse(ID_FIELD), InputState { value: String::new(), visible: true }));
        s.current = Document::new("https://kri.example/search", grid(&[]));
        s
    }

    pub fn page(mut self, target: &str, html: &str) -> Self {
        self.pages.insert(target.to_string(), html.to_string());
        self
    }

    /// The next `times` visits to `target` only raise a dialog; the page
    /// underneath stays as it was.
    pub fn alert_on(mut self, target: &str, times: usize) -> Self {
        self.alerts.insert(target.to_string(), times);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    pub fn triggers(&self) -> usize {
        self.submissions.len()
    }

    fn clear(&self) -> Result<(), SessionError> {
        match &self.pending {
            Some(t) => Err(SessionError::Interstitial(t.clone())),
            None => Ok(()),
        }
    }

    fn value_of(&self, field: &FieldRef, visible_only: bool) -> Option<String> {
        self.inputs
            .iter()
            .filter(|(f, i)| f == field && (!visible_only || i.visible))
            .map(|(_, i)| i.value.clone())
            .find(|v| !v.is_empty())
    }
}

impl Session for ScriptedSession {
    fn registry(&self) -> &str {
        &self.name
    }

    fn navigate(&mut self, target: &str) -> Result<Document, SessionError> {
        self.clear()?;
        self.navigations.push(target.to_string());
        if let Some(left) = self.alerts.get_mut(target).filter(|n| **n > 0) {
            *left -= 1;
            self.pending = Some("세션이 만료되었습니다.".to_string());
            return Ok(self.current.clone());
        }
        let html = self.pages.get(target).cloned().ok_or_else(|| SessionError::NavigationTimeout {
            target: target.to_string(),
            waited: Duration::from_millis(10),
        })?;
        self.current = Document::new(target, html);
        Ok(self.current.clone())
    }

    fn document(&self) -> Result<Document, SessionError> {
        self.clear()?;
        Ok(self.current.clone())
    }

    fn enter_frame(&mut self, _selector: &str) -> Result<(), SessionError> {
        self.clear()
    }

    fn leave_frame(&mut self) {}

    fn dismiss_interstitial(&mut self) -> Result<bool, SessionError> {
        match self.pending.take() {
            Some(_) => {
                self.dismissed += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn inputs(&self, field: &FieldRef) -> Result<Vec<InputState>, SessionError> {
        self.clear()?;
        Ok(self.inputs.iter().filter(|(f, _)| f == field).map(|(_, i)| i.clone()).collect())
    }

    fn fill(
        &mut self,
        field: &FieldRef,
        value: &str,
        target: FillTarget,
        mode: InputMode,
    ) -> Result<usize, SessionError> {
        self.clear()?;
        if !self.inputs.iter().any(|(f, _)| f == field) {
            return Err(SessionError::ElementNotFound(field.to_string()));
        }
        let mut landed = 0;
        let mut first_done = false;
        for (_, input) in self.inputs.iter_mut().filter(|e| &e.0 == field) {
            let chosen = match target {
                FillTarget::First => !first_done,
                FillTarget::Visible => input.visible,
                FillTarget::All => true,
            };
            first_done = true;
            if !chosen || (mode == InputMode::Keystroke && !input.visible) {
                continue;
            }
            input.value = value.to_string();
            landed += 1;
        }
        Ok(landed)
    }

    fn trigger(&mut self, _action: &str) -> Result<Document, SessionError> {
        self.clear()?;
        let step = self.steps.pop_front().unwrap_or(Step::Grid(grid(&[])));
        match step {
            Step::Interrupt(text) => {
                self.pending = Some(text.clone());
                Err(SessionError::Interstitial(text))
            }
            Step::Timeout => Err(SessionError::NavigationTimeout {
                target: "search".to_string(),
                waited: Duration::from_millis(10),
            }),
            Step::DialogAfterSubmit(text) => {
                self.record_submission();
                self.pending = Some(text);
                Ok(self.current.clone())
            }
            Step::Grid(html) => {
                self.record_submission();
                self.current = Document::new("https://kri.example/search", html);
                Ok(self.current.clone())
            }
        }
    }

    fn settle(&mut self, d: Duration) {
        self.settled.push(d);
    }
}

impl ScriptedSession {
    fn record_submission(&mut self) {
        let sub = Submission {
            visible_name: self.value_of(&FieldRef::parse(NAME_FIELD), true),
            id: self.value_of(&FieldRef::parse(ID_FIELD), false),
        };
        self.submissions.push(sub);
    }
}

/// One demographic result row.
#[derive(Clone, Debug, Default)]
pub struct Row<'a> {
    pub birth: &'a str,
    pub name: &'a str,
    pub gender: &'a str,
    pub univ: &'a str,
    pub dept: &'a str,
    pub job: &'a str,
}

/// Result grid in the registry's layout: a header row, then `rows`. With no
/// rows the grid shows an empty placeholder row.
pub fn grid(rows: &[Row<'_>]) -> String {
    let cell = |class: &str, v: &str| format!(r#"<td class="{class}">{v}</td>"#);
    let line = |r: &Row<'_>| {
        [
            cell("HideCol0C3", r.birth),
            cell("HideCol0C6", r.name),
            cell("HideCol0C7", r.gender),
            cell("HideCol0C8", r.univ),
            cell("HideCol0C9", r.dept),
            cell("HideCol0C10", r.job),
        ]
        .concat()
    };
    let header = Row {
        birth: "출생년도",
        name: "성명",
        gender: "성별",
        univ: "소속대학/기관",
        dept: "부서",
        job: "직급",
    };
    let mut html = format!("<html><table><tr>{}</tr>", line(&header));
    if rows.is_empty() {
        html.push_str(&format!("<tr>{}</tr>", line(&Row::default())));
    }
    for r in rows {
        html.push_str(&format!("<tr>{}</tr>", line(r)));
    }
    html.push_str("</table></html>");
    html
}

pub fn kim() -> Row<'static> {
    Row {
        birth: "1975",
        name: "김용수",
        gender: "남",
        univ: "한국대학교",
        dept: "사회학과",
        job: "교수",
    }
}

/// Detail view listing `author` (id, display text) as the first author.
pub fn detail_page(record: &str, author: Option<(&str, &str)>) -> String {
    let link = match author {
        Some((id, text)) => format!(
            r#"<a href="/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId={id}&amp;citationBean.artiId={record}">{text}</a>"#
        ),
        None => String::new(),
    };
    format!(r#"<html><div class="tit-area"><p>논문 {record}</p></div><div class="author">{link}</div></html>"#)
}

/// Author profile carrying `cross_id` in the hidden input (empty = unlinked).
pub fn profile_page(name: &str, cross_id: &str) -> String {
    format!(
        r#"<html><h3 class="name">{name}</h3><form><input type="hidden" id="citationBean.kriCretId" value="{cross_id}"></form></html>"#
    )
}

pub fn detail_path(record: &str) -> String {
    format!("/kciportal/ci/sereArticleSearch/ciSereArtiView.kci?sereArticleSearchBean.artiId={record}")
}

pub fn profile_path(author: &str, record: Option<&str>) -> String {
    match record {
        Some(r) => format!(
            "/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId={author}&citationBean.artiId={r}"
        ),
        None => format!("/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId={author}"),
    }
}

/// Write `text` as a table in a fresh temp dir.
pub fn table(dir: &Path, name: &str, text: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, text).unwrap();
    p
}
