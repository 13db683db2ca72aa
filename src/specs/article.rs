// src/specs/article.rs

use crate::config::options::ArticleRoutes;
use crate::core::html::{self, query_param, text_keep_breaks};
use crate::session::Document;

/// The first author reference on a detail view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorLink {
    /// Link text as displayed; may carry a romanized alias after a break or slash.
    pub name_raw: String,
    pub local_author_id: String,
    /// Record id encoded in the link, when it differs from the one requested.
    pub record_override: Option<String>,
}

pub fn detail_path(routes: &ArticleRoutes, record_id: &str) -> String {
    routes.article_view.replace("{record}", record_id)
}

/// Author links are listed in byline order; the first one is the first author.
pub fn first_author(doc: &Document, routes: &ArticleRoutes) -> Option<AuthorLink> {
    doc.elements("a").into_iter().find_map(|a| {
        let href = a.attr("href")?;
        if !href.contains(&routes.author_link) {
            return None;
        }
        let local_author_id = query_param(href, &routes.author_param)?;
        Some(AuthorLink {
            name_raw: text_keep_breaks(a.inner),
            local_author_id,
            record_override: query_param(href, &routes.record_param),
        })
    })
}

/// Article title, for log context. Falls back to the page title.
pub fn title(doc: &Document) -> Option<String> {
    html::elements_with_class(&doc.html, "div", "tit-area")
        .first()
        .map(|d| d.text())
        .or_else(|| html::slice_between_ci(&doc.html, "<title", "</title>").map(html::strip_tags))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"
        <div class="tit-area"><p>한국 사회의 연구 동향</p></div>
        <div class="author">
          <a href="/kciportal/po/search/poSearchList.kci">저자검색</a>
          <a href="/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId=CRT001613578&amp;citationBean.artiId=ART003157803">김용수
            /YONGSOO KIM</a>
          <a href="/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId=CRT000000002">이영희</a>
        </div>"#;

    #[test]
    fn first_author_with_override() {
        let doc = Document::new("https://www.kci.go.kr/x", DETAIL);
        let a = first_author(&doc, &ArticleRoutes::default()).unwrap();
        assert_eq!(a.local_author_id, "CRT001613578");
        assert_eq!(a.record_override.as_deref(), Some("ART003157803"));
        assert!(a.name_raw.starts_with("김용수\n"));
    }

    #[test]
    fn no_author_link_is_none() {
        let doc = Document::new("u", "<div class=\"tit-area\">제목</div><a href=\"/other\">x</a>");
        assert_eq!(first_author(&doc, &ArticleRoutes::default()), None);
        assert_eq!(title(&doc).as_deref(), Some("제목"));
        let doc = Document::new("u", "<html><TITLE> 논문 상세 </TITLE></html>");
        assert_eq!(title(&doc).as_deref(), Some("논문 상세"));
    }

    #[test]
    fn detail_path_fills_record() {
        let p = detail_path(&ArticleRoutes::default(), "ART001");
        assert!(p.ends_with("sereArticleSearchBean.artiId=ART001"));
    }
}
