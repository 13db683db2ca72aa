// src/core/sanitize.rs

/// Decode the entities the registries actually emit: named basics plus
/// decimal/hex numeric references. Unknown entities pass through untouched.
pub fn normalize_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let name = &tail[1..semi];
        let decoded = match name {
            "nbsp" => Some(' '),
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => numeric_entity(name),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn numeric_entity(name: &str) -> Option<char> {
    let num = name.strip_prefix('#')?;
    let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => num.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Native-script name from a registry display string: the text before the
/// first line break, then before the first `/`, trimmed at each step.
///
/// `"김용수\n/YONGSOO KIM"` becomes `"김용수"`.
pub fn normalize_name(raw: &str) -> String {
    let first_line = raw.trim().split('\n').next().unwrap_or("").trim();
    first_line.split('/').next().unwrap_or("").trim().to_string()
}

/// Identifier cell cleanup: trims, and turns a float rendering of an
/// integer id (`"10032099.0"`) back into the integer text.
pub fn normalize_id(s: &str) -> String {
    let t = s.trim();
    match t.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) => head.to_string(),
        _ => t.to_string(),
    }
}

/// Safe file-name fragment: ASCII alphanumerics, `-` and `_` kept, runs of
/// anything else collapsed to one `_`.
pub fn file_fragment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_us = false;
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
            last_us = false;
        } else if !last_us {
            out.push('_');
            last_us = true;
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() { s!("page") } else { out }
}
