// src/core/html.rs
//
// Tolerant tag scanning over raw HTML. No DOM: open tags are found
// case-insensitively, attributes are parsed from the open tag, and an
// element's inner HTML runs up to the next matching close tag (same-name
// nesting is not tracked; the registries' cells and links don't nest).

use super::sanitize::{normalize_entities, normalize_ws};

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Inner HTML between the first `open_pat` tag and the following `close_pat`.
pub fn slice_between_ci<'a>(s: &'a str, open_pat: &str, close_pat: &str) -> Option<&'a str> {
    let lc = to_lower(s);
    let open = to_lower(open_pat);
    let close = to_lower(close_pat);
    let o = lc.find(&open)?;
    let after = s[o..].find('>')? + o + 1;
    let cr = lc[after..].find(&close)?;
    Some(&s[after..after + cr])
}

/// Remove all tags, decode entities, collapse whitespace.
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    normalize_ws(&normalize_entities(&drop_tags(s.as_ref())))
}

/// Like `strip_tags` but `<br>` becomes a line break and inner whitespace is
/// kept as-is; only the ends are trimmed.
pub fn text_keep_breaks(s: &str) -> String {
    let mut with_breaks = String::with_capacity(s.len());
    let lc = to_lower(s);
    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find("<br") {
        let at = pos + rel;
        let boundary = lc[at + 3..].chars().next();
        match (boundary, s[at..].find('>')) {
            (Some(c), Some(gt)) if c == '>' || c == '/' || c.is_whitespace() => {
                with_breaks.push_str(&s[pos..at]);
                with_breaks.push('\n');
                pos = at + gt + 1;
            }
            _ => {
                with_breaks.push_str(&s[pos..at + 3]);
                pos = at + 3;
            }
        }
    }
    with_breaks.push_str(&s[pos..]);
    normalize_entities(&drop_tags(&with_breaks)).trim().to_string()
}

fn drop_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/* ---------------- Tags & elements ---------------- */

/// A parsed opening tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Tag {
    /// Attribute value by (ASCII case-insensitive) name. Bare attributes yield "".
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Exact token match inside `class`.
    pub fn has_class(&self, token: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|t| t == token))
            .unwrap_or(false)
    }
}

/// An element found in a document: its open tag, its inner HTML and where it starts.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    pub tag: Tag,
    pub inner: &'a str,
    pub start: usize,
}

impl Element<'_> {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.tag.attr(name)
    }

    pub fn has_class(&self, token: &str) -> bool {
        self.tag.has_class(token)
    }

    /// Visible text, whitespace collapsed.
    pub fn text(&self) -> String {
        strip_tags(self.inner)
    }
}

/// Tags that never have a close tag.
fn is_void(name: &str) -> bool {
    matches!(name, "input" | "br" | "img" | "meta" | "link" | "hr")
}

/// Byte offsets `(start, open_end)` of every `<name ...>` open tag, in order.
fn open_tag_spans(doc: &str, name: &str) -> Vec<(usize, usize)> {
    let lc = to_lower(doc);
    let needle = join!("<", &to_lower(name));
    let mut out = Vec::new();
    let mut pos = 0usize;

    while let Some(rel) = lc[pos..].find(&needle) {
        let start = pos + rel;
        let after = start + needle.len();
        pos = after;

        // "<a" must not match "<abbr"
        let boundary_ok = lc[after..]
            .chars()
            .next()
            .map(|c| c == '>' || c == '/' || c.is_whitespace())
            .unwrap_or(false);
        if !boundary_ok {
            continue;
        }
        let Some(gt) = find_tag_end(&doc[after..]) else { break };
        let open_end = after + gt + 1;
        out.push((start, open_end));
        pos = open_end;
    }
    out
}

/// Index of the `>` closing an open tag, skipping quoted attribute values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Every `<name>` element in `doc`. Void tags get an empty inner.
pub fn elements<'a>(doc: &'a str, name: &str) -> Vec<Element<'a>> {
    let lname = to_lower(name);
    let close = join!("</", &lname);
    let lc = to_lower(doc);

    open_tag_spans(doc, &lname)
        .into_iter()
        .map(|(start, open_end)| {
            let tag = parse_open_tag(&doc[start..open_end]);
            let self_closing = doc[..open_end].ends_with("/>");
            let inner = if is_void(&lname) || self_closing {
                ""
            } else {
                match lc[open_end..].find(&close) {
                    Some(rel) => &doc[open_end..open_end + rel],
                    None => &doc[open_end..],
                }
            };
            Element { tag, inner, start }
        })
        .collect()
}

/// Every `<name>` element whose class list contains `token`.
pub fn elements_with_class<'a>(doc: &'a str, name: &str, token: &str) -> Vec<Element<'a>> {
    elements(doc, name)
        .into_iter()
        .filter(|e| e.has_class(token))
        .collect()
}

/// Parse `<tag a="1" b='2' c=3 d>` into name + attributes (values entity-decoded).
pub fn parse_open_tag(raw: &str) -> Tag {
    let body = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    let mut chars = body.char_indices().peekable();

    let mut name_end = body.len();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            name_end = i;
            break;
        }
        chars.next();
    }
    let name = to_lower(&body[..name_end]);

    let mut attrs = Vec::new();
    let rest = &body[name_end.min(body.len())..];
    let bytes: Vec<char> = rest.chars().collect();
    let mut i = 0usize;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_whitespace() || bytes[i] == '/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let k0 = i;
        while i < bytes.len() && !bytes[i].is_whitespace() && bytes[i] != '=' {
            i += 1;
        }
        let key: String = bytes[k0..i].iter().collect();
        while i < bytes.len() && bytes[i].is_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == '=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_whitespace() {
                i += 1;
            }
            let value: String = if i < bytes.len() && (bytes[i] == '"' || bytes[i] == '\'') {
                let q = bytes[i];
                i += 1;
                let v0 = i;
                while i < bytes.len() && bytes[i] != q {
                    i += 1;
                }
                let v: String = bytes[v0..i].iter().collect();
                i += 1; // closing quote
                v
            } else {
                let v0 = i;
                while i < bytes.len() && !bytes[i].is_whitespace() {
                    i += 1;
                }
                bytes[v0..i].iter().collect()
            };
            attrs.push((to_lower(&key), normalize_entities(&value)));
        } else if !key.is_empty() {
            attrs.push((to_lower(&key), s!()));
        }
    }

    Tag { name, attrs }
}

/// Query parameter `key` from an href (`...?a=1&b=2`), percent-decoded.
pub fn query_param(href: &str, key: &str) -> Option<String> {
    let decoded = normalize_entities(href);
    let query = decoded.split_once('?').map(|(_, q)| q).unwrap_or(&decoded);
    let query = query.split('#').next().unwrap_or("");
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_open_tag_quoting_styles() {
        let t = parse_open_tag(r#"<INPUT type="hidden" id='citationBean.kriCretId' value=10032099 disabled>"#);
        assert_eq!(t.name, "input");
        assert_eq!(t.attr("type"), Some("hidden"));
        assert_eq!(t.id(), Some("citationBean.kriCretId"));
        assert_eq!(t.attr("VALUE"), Some("10032099"));
        assert!(t.has_attr("disabled"));
    }

    #[test]
    fn class_match_is_token_exact() {
        let t = parse_open_tag(r#"<td class="GMClassReadOnly HideCol0C13">"#);
        assert!(t.has_class("HideCol0C13"));
        assert!(!t.has_class("HideCol0C1"));
    }

    #[test]
    fn elements_skip_longer_tag_names() {
        let doc = r#"<abbr>x</abbr><a href="/p?id=1">One</a><area><a href="/p?id=2">Two</a>"#;
        let links = elements(doc, "a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text(), "One");
        assert_eq!(links[1].attr("href"), Some("/p?id=2"));
    }

    #[test]
    fn elements_with_class_collects_header_and_data() {
        let doc = r#"
            <tr><td class="HideCol0C3">출생년도</td><td class="HideCol0C7">성별</td></tr>
            <tr><td class="HideCol0C3"> 1975 </td><td class="HideCol0C7">남</td></tr>
        "#;
        let cells: Vec<String> = elements_with_class(doc, "td", "HideCol0C3")
            .iter()
            .map(|e| e.text())
            .collect();
        assert_eq!(cells, vec!["출생년도", "1975"]);
    }

    #[test]
    fn quoted_gt_does_not_end_tag() {
        let doc = r#"<a href="/x" onclick="if(a>b){go()}">Go</a>"#;
        let links = elements(doc, "a");
        assert_eq!(links[0].text(), "Go");
    }

    #[test]
    fn text_keep_breaks_preserves_line_structure() {
        let raw = "\n  김용수<br/>\n\t\t/YONGSOO KIM  ";
        assert_eq!(text_keep_breaks(raw), "김용수\n\n\t\t/YONGSOO KIM");
    }

    #[test]
    fn query_param_reads_encoded_href() {
        let href = "/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId=CRT001613578&amp;citationBean.artiId=ART003157803";
        assert_eq!(query_param(href, "citationBean.cretId").as_deref(), Some("CRT001613578"));
        assert_eq!(query_param(href, "citationBean.artiId").as_deref(), Some("ART003157803"));
        assert_eq!(query_param(href, "missing"), None);
    }

    #[test]
    fn slice_between_ci_finds_title() {
        let doc = "<HEAD><Title>저자 정보</TITLE></HEAD>";
        assert_eq!(slice_between_ci(doc, "<title", "</title>"), Some("저자 정보"));
    }
}
