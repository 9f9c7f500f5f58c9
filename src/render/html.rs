use serde_json::Value;

/// Escapes text content. Covers `& < > "`, which is also enough for
/// double-quoted attribute values.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value)
}

/// Plain string form of a JSON scalar. `null` is empty, containers fall
/// back to compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// `2024-05-01` becomes `2024.05.01`. Non-strings render empty.
pub fn dot_date(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace('-', "."),
        _ => String::new(),
    }
}

/// Groups integer digits with commas and keeps at most three fraction
/// digits. Strings are escaped as they are.
pub fn format_count(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                group_digits(i.unsigned_abs(), i < 0)
            } else if let Some(u) = n.as_u64() {
                group_digits(u, false)
            } else {
                let f = n.as_f64().unwrap_or_default();
                let rounded = format!("{:.3}", f.abs());
                let (int_part, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
                let frac = frac.trim_end_matches('0');
                let int_value = int_part.parse::<u64>().unwrap_or_default();
                let mut out = group_digits(int_value, f < 0.0 && rounded != "0.000");
                if !frac.is_empty() {
                    out.push('.');
                    out.push_str(frac);
                }
                out
            }
        }
        other => escape_text(&value_text(other)),
    }
}

fn group_digits(n: u64, negative: bool) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkSpec<'a> {
    pub url: Option<&'a str>,
    pub text: Option<&'a str>,
    pub target: Option<&'a str>,
    pub rel: Option<&'a str>,
    pub class: Option<&'a str>,
}

impl<'a> LinkSpec<'a> {
    /// Reads `{ url, text, target, rel }` from a row field.
    pub fn from_value(value: Option<&'a Value>) -> Self {
        let field = |key: &str| value.and_then(|v| v.get(key)).and_then(Value::as_str);
        Self {
            url: field("url").filter(|s| !s.trim().is_empty()),
            text: field("text"),
            target: field("target"),
            rel: field("rel"),
            class: None,
        }
    }

    fn open_tag(&self, url: &str) -> String {
        let class = self
            .class
            .map(|c| format!(r#" class="{}""#, escape_attr(c)))
            .unwrap_or_default();
        format!(
            r#"<a href="{}"{} target="{}" rel="{}">"#,
            escape_attr(url),
            class,
            escape_attr(self.target.unwrap_or("_blank")),
            escape_attr(self.rel.unwrap_or("noopener")),
        )
    }
}

/// Escaped text link, or just the escaped label when there is no URL.
pub fn link(spec: &LinkSpec<'_>) -> String {
    match spec.url {
        None => escape_text(spec.text.unwrap_or("")),
        Some(url) => format!(
            "{}{}</a>",
            spec.open_tag(url),
            escape_text(spec.text.unwrap_or(url))
        ),
    }
}

/// Link around trusted markup such as a generated `<img>`.
pub fn link_html(spec: &LinkSpec<'_>, inner: &str) -> String {
    match spec.url {
        None => inner.to_string(),
        Some(url) => format!("{}{}</a>", spec.open_tag(url), inner),
    }
}

fn looks_like_img_tag(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    match lower.strip_prefix("<img") {
        Some(rest) => rest.starts_with(|c: char| c.is_whitespace() || c == '>'),
        None => false,
    }
}

fn dimension(value: &Value, keys: [&str; 2]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| match v {
            Value::Number(_) => true,
            Value::String(s) => !s.is_empty(),
            _ => false,
        })
        .map(value_text)
}

/// Thumbnail markup. Accepts a ready `<img ...>` string (trusted, passed
/// through), a bare image URL, or `{ img|src, alt, w|width, h|height, url,
/// target, rel, linkClass }`.
pub fn thumb_html(value: Option<&Value>) -> String {
    let value = match value {
        Some(v) => v,
        None => return String::new(),
    };
    match value {
        Value::String(s) if s.is_empty() => String::new(),
        Value::String(s) if looks_like_img_tag(s) => s.clone(),
        Value::String(s) => format!(
            r#"<img src="{}" loading="lazy" decoding="async" alt="">"#,
            escape_attr(s)
        ),
        Value::Object(_) => {
            let src = match non_empty_str(value.get("img")).or_else(|| non_empty_str(value.get("src"))) {
                Some(src) => src,
                None => return String::new(),
            };
            let alt = value.get("alt").map(value_text).unwrap_or_default();
            let mut img = format!(r#"<img src="{}" alt="{}""#, escape_attr(src), escape_attr(&alt));
            if let Some(w) = dimension(value, ["w", "width"]) {
                img.push_str(&format!(r#" width="{}""#, escape_attr(&w)));
            }
            if let Some(h) = dimension(value, ["h", "height"]) {
                img.push_str(&format!(r#" height="{}""#, escape_attr(&h)));
            }
            img.push_str(r#" loading="lazy" decoding="async">"#);

            let mut spec = LinkSpec::from_value(Some(value));
            spec.class = value.get("linkClass").and_then(Value::as_str);
            link_html(&spec, &img)
        }
        _ => String::new(),
    }
}

/// Cell content that may be plain text, a `{ url, text }` link, a list of
/// either (one per line) or a `{ text }` object.
pub fn cell_link_or_text(value: Option<&Value>) -> String {
    let value = match value {
        Some(v) => v,
        None => return String::new(),
    };
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_text(s),
        Value::Array(items) => items
            .iter()
            .map(|item| cell_link_or_text(Some(item)))
            .collect::<Vec<_>>()
            .join("<br>"),
        Value::Object(_) => {
            let url = non_empty_str(value.get("url"));
            let text = non_empty_str(value.get("text"));
            match (url, text) {
                (Some(url), Some(text)) => link(&LinkSpec {
                    url: Some(url),
                    text: Some(text),
                    ..Default::default()
                }),
                _ => match value.get("text") {
                    Some(t) if !t.is_null() => escape_text(&value_text(t)),
                    _ => escape_text(&value_text(value)),
                },
            }
        }
        other => escape_text(&value_text(other)),
    }
}
