//! Metadata binding.
//!
//! Markup marks the elements to fill with attributes:
//!
//! ```text
//! <h1 data-from="meta1" data-bind="title">placeholder</h1>
//! <time data-from="meta2" data-bind="date" data-format="dotdate"></time>
//! <a data-from="meta1" data-bind="links.source" data-attr="href">source</a>
//! <span data-date="updated"></span>
//! ```
//!
//! The markup is scanned once into typed [`BindSpec`]s, then applied against
//! a set of named JSON sources. Elements whose source or value is missing
//! keep their placeholder content.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::render::html::{escape_attr, escape_text, value_text};

/// Source used by `data-date` elements.
pub const DATE_SOURCE: &str = "meta";

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("empty data-attr on <{tag}> bound to '{path}'")]
    EmptyAttr { tag: String, path: String },

    #[error("invalid attribute name '{name}' in data-attr on <{tag}>")]
    InvalidAttrName { tag: String, name: String },

    #[error("failed to compile binding scanner: {source}")]
    Scanner {
        #[source]
        source: regex::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Formatter {
    #[default]
    None,
    /// `2024-05-01` -> `2024.05.01`
    DotDate,
    Date,
    Trim,
}

impl Formatter {
    /// Unknown names fall back to [`Formatter::None`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "dotdate" => Formatter::DotDate,
            "date" => Formatter::Date,
            "trim" => Formatter::Trim,
            _ => Formatter::None,
        }
    }

    pub fn apply(&self, value: &Value) -> Value {
        match (self, value) {
            (Formatter::DotDate, Value::String(s)) => Value::String(s.replace('-', ".")),
            (Formatter::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            _ => value.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindMode {
    Text,
    Html,
    Attr(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindSpec {
    pub source: String,
    pub path: String,
    pub format: Formatter,
    pub mode: BindMode,
}

impl BindSpec {
    /// Builds a spec from an element's attributes. `Ok(None)` means the
    /// element is not bound (or is bound to an empty source or path).
    pub fn from_attributes(
        tag: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<Option<Self>, BindError> {
        let (source, path, default_format) = match (attrs.get("data-from"), attrs.get("data-bind")) {
            (Some(from), Some(bind)) => (from.trim().to_lowercase(), bind.trim().to_string(), Formatter::None),
            _ => match attrs.get("data-date") {
                Some(key) => (DATE_SOURCE.to_string(), key.trim().to_string(), Formatter::DotDate),
                None => return Ok(None),
            },
        };
        if source.is_empty() || path.is_empty() {
            return Ok(None);
        }

        let format = attrs
            .get("data-format")
            .map(|f| Formatter::parse(f))
            .unwrap_or(default_format);

        let mode = match attrs.get("data-attr") {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(BindError::EmptyAttr {
                        tag: tag.to_string(),
                        path,
                    });
                }
                if !is_valid_attr_name(name) {
                    return Err(BindError::InvalidAttrName {
                        tag: tag.to_string(),
                        name: name.to_string(),
                    });
                }
                BindMode::Attr(name.to_ascii_lowercase())
            }
            None if attrs
                .get("data-html")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false) =>
            {
                BindMode::Html
            }
            None => BindMode::Text,
        };

        Ok(Some(Self {
            source,
            path,
            format,
            mode,
        }))
    }

    /// Resolves and formats the value, `None` when the source or path is
    /// missing or the value is `null`.
    pub fn resolve(&self, sources: &BTreeMap<String, Value>) -> Option<String> {
        let src = sources.get(&self.source)?;
        let value = lookup(src, &self.path)?;
        if value.is_null() {
            return None;
        }
        Some(value_text(&self.format.apply(value)))
    }
}

fn is_valid_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Walks `a.b.c` through objects by key and arrays by index.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.trim().is_empty() {
        return None;
    }
    path.split('.').try_fold(value, |acc, key| match acc {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A bound element found by [`scan`], with byte offsets into the markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundElement {
    pub tag: String,
    pub spec: BindSpec,
    /// Range of the opening tag.
    pub open: (usize, usize),
    /// Range of the inner content, when a matching closing tag exists.
    pub inner: Option<(usize, usize)>,
}

struct Scanner {
    open_tag: Regex,
    attr: Regex,
}

impl Scanner {
    fn new() -> Result<Self, BindError> {
        let open_tag = Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:\s+[^\s/>"'=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*(/?)>"#)
            .map_err(|e| BindError::Scanner { source: e })?;
        let attr = Regex::new(r#"([^\s/>"'=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .map_err(|e| BindError::Scanner { source: e })?;
        Ok(Self { open_tag, attr })
    }

    fn attributes(&self, raw: &str) -> HashMap<String, String> {
        self.attr
            .captures_iter(raw)
            .filter_map(|c| {
                let name = c.get(1)?.as_str().to_ascii_lowercase();
                let value = c
                    .get(2)
                    .or_else(|| c.get(3))
                    .or_else(|| c.get(4))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect()
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Scans markup once for bound elements, in document order.
///
/// The closing tag is the first `</tag>` after the opening one, so a bound
/// element must not nest another element with the same tag name.
pub fn scan(markup: &str) -> Result<Vec<BoundElement>, BindError> {
    let scanner = Scanner::new()?;
    let mut out = Vec::new();
    for caps in scanner.open_tag.captures_iter(markup) {
        let (whole, tag) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(t)) => (w, t.as_str().to_ascii_lowercase()),
            _ => continue,
        };
        let raw_attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let attrs = scanner.attributes(raw_attrs);
        let spec = match BindSpec::from_attributes(&tag, &attrs)? {
            Some(spec) => spec,
            None => continue,
        };
        let self_closing = caps.get(3).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let inner = if self_closing || VOID_TAGS.contains(&tag.as_str()) {
            None
        } else {
            find_close(markup, whole.end(), &tag).map(|close| (whole.end(), close))
        };
        out.push(BoundElement {
            tag,
            spec,
            open: (whole.start(), whole.end()),
            inner,
        });
    }
    Ok(out)
}

fn find_close(markup: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    let lower = markup[from..].to_ascii_lowercase();
    let mut offset = 0;
    while let Some(pos) = lower[offset..].find(&needle) {
        let at = offset + pos;
        let after = lower[at + needle.len()..].chars().next();
        if matches!(after, Some(c) if c == '>' || c.is_whitespace()) {
            return Some(from + at);
        }
        offset = at + needle.len();
    }
    None
}

static ATTRIBUTE_RE: OnceLock<Option<Regex>> = OnceLock::new();

// One attribute of an opening tag, name in group 1. The tag name itself has
// no leading whitespace and never matches.
fn attribute_re() -> Option<&'static Regex> {
    ATTRIBUTE_RE
        .get_or_init(|| {
            Regex::new(r#"\s+([^\s/>"'=]+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?"#).ok()
        })
        .as_ref()
}

/// Rewrites an opening tag so that `name` carries `value`, replacing an
/// existing attribute of that name.
fn set_attribute(open_tag: &str, name: &str, value: &str) -> String {
    let stripped = match attribute_re() {
        Some(re) => re
            .replace_all(open_tag, |caps: &Captures| {
                if caps[1].eq_ignore_ascii_case(name) {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned(),
        None => open_tag.to_string(),
    };
    let insert_at = if stripped.ends_with("/>") {
        stripped.len() - 2
    } else {
        stripped.len().saturating_sub(1)
    };
    let (head, tail) = stripped.split_at(insert_at);
    let head = head.trim_end();
    format!(r#"{head} {name}="{}"{tail}"#, escape_attr(value))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindOutcome {
    pub markup: String,
    pub bound: usize,
    pub skipped: usize,
}

/// Fills every bound element whose value resolves. Elements nested inside
/// an element whose content was replaced are dropped with it.
pub fn apply(
    markup: &str,
    elements: &[BoundElement],
    sources: &BTreeMap<String, Value>,
) -> BindOutcome {
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;
    let mut bound = 0;
    let mut skipped = 0;

    for el in elements {
        if el.open.0 < cursor {
            skipped += 1;
            continue;
        }
        let value = match el.spec.resolve(sources) {
            Some(v) => v,
            None => {
                debug!(source = %el.spec.source, path = %el.spec.path, "binding left unresolved");
                skipped += 1;
                continue;
            }
        };

        match &el.spec.mode {
            BindMode::Attr(name) => {
                out.push_str(&markup[cursor..el.open.0]);
                out.push_str(&set_attribute(&markup[el.open.0..el.open.1], name, &value));
                cursor = el.open.1;
            }
            BindMode::Text | BindMode::Html => {
                let (start, end) = match el.inner {
                    Some(range) => range,
                    None => {
                        skipped += 1;
                        continue;
                    }
                };
                out.push_str(&markup[cursor..start]);
                if el.spec.mode == BindMode::Html {
                    out.push_str(&value);
                } else {
                    out.push_str(&escape_text(&value));
                }
                cursor = end;
            }
        }
        bound += 1;
    }
    out.push_str(&markup[cursor..]);

    BindOutcome {
        markup: out,
        bound,
        skipped,
    }
}

/// Scans and applies in one go.
pub fn bind_markup(
    markup: &str,
    sources: &BTreeMap<String, Value>,
) -> Result<BindOutcome, BindError> {
    let elements = scan(markup)?;
    Ok(apply(markup, &elements, sources))
}
