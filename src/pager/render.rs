use colored::Colorize;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::{PagerEntry, PagerState};
use crate::render::html::{escape_attr, escape_text};

pub const DEFAULT_PARAM: &str = "p";
pub const DEFAULT_MAX_NUMBERS: usize = 5;
pub const DEFAULT_MOBILE_MAX_NUMBERS: usize = 3;

/// Widths at or below this use the mobile number budget.
pub const MOBILE_MAX_WIDTH: u32 = 520;

const GAP_MARKUP: &str = r#"<span class="gap">…</span>"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Desktop,
    Mobile,
}

impl Viewport {
    pub fn from_width(width: u32) -> Self {
        if width <= MOBILE_MAX_WIDTH {
            Viewport::Mobile
        } else {
            Viewport::Desktop
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PagerOptions {
    pub max_numbers: usize,
    pub mobile_max_numbers: usize,
    pub show_prev_next: bool,
    pub show_first_last: bool,
    pub param: String,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            max_numbers: DEFAULT_MAX_NUMBERS,
            mobile_max_numbers: DEFAULT_MOBILE_MAX_NUMBERS,
            show_prev_next: true,
            show_first_last: true,
            param: DEFAULT_PARAM.to_string(),
        }
    }
}

impl PagerOptions {
    /// Reads the `pager` object of the site metadata. Budgets coerce the way
    /// the site scripts do (`null`, `""` and `false` are 0, `true` is 1);
    /// anything else that is not a number keeps the default. The toggles
    /// stay on unless they are literally `false`.
    pub fn from_meta(meta: &Value) -> Self {
        let mut out = Self::default();
        let cfg = match meta.get("pager") {
            Some(cfg) if cfg.is_object() => cfg,
            _ => return out,
        };
        if let Some(n) = cfg.get("max_numbers").and_then(numeric_budget) {
            out.max_numbers = n;
        }
        if let Some(n) = cfg.get("mobile_max_numbers").and_then(numeric_budget) {
            out.mobile_max_numbers = n;
        }
        out.show_prev_next = cfg.get("show_prev_next") != Some(&Value::Bool(false));
        out.show_first_last = cfg.get("show_first_last") != Some(&Value::Bool(false));
        out
    }

    pub fn budget_for(&self, viewport: Viewport) -> usize {
        let n = match viewport {
            Viewport::Desktop => self.max_numbers,
            Viewport::Mobile => self.mobile_max_numbers,
        };
        n.max(1)
    }
}

fn numeric_budget(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.max(0.0) as usize)
}

/// Link target for page `n`: page 1 drops the parameter, every other page
/// sets it in place. The fragment is always removed.
pub fn href_for(page_url: &Url, n: usize, param: &str) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in page_url.query_pairs() {
        if k == param {
            if n != 1 && !replaced {
                pairs.push((k.into_owned(), n.to_string()));
            }
            replaced = true;
            continue;
        }
        pairs.push((k.into_owned(), v.into_owned()));
    }
    if n != 1 && !replaced {
        pairs.push((param.to_string(), n.to_string()));
    }

    let mut url = page_url.clone();
    url.set_fragment(None);
    url.set_query(None);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs.iter());
    }

    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct LinkState<'a> {
    current: bool,
    disabled: bool,
    rel: Option<&'a str>,
}

fn page_link(label: &str, n: usize, page_url: &Url, param: &str, state: LinkState<'_>) -> String {
    let mut attrs = String::new();
    if state.disabled {
        attrs.push_str(r#" aria-disabled="true" tabindex="-1""#);
    } else {
        attrs.push_str(&format!(
            r#" href="{}""#,
            escape_attr(&href_for(page_url, n, param))
        ));
    }
    if state.current {
        attrs.push_str(r#" class="is-current" aria-current="page""#);
    }
    if let Some(rel) = state.rel {
        attrs.push_str(&format!(r#" rel="{}""#, escape_attr(rel)));
    }
    format!("<a{attrs}>{}</a>", escape_text(label))
}

/// Renders the inner markup of a pager container. The same inputs always
/// produce the same markup, so every container on a page can share it.
pub fn render_pager(
    state: &PagerState,
    options: &PagerOptions,
    page_url: &Url,
) -> String {
    let param = options.param.as_str();
    let mut out = String::new();

    if options.show_first_last {
        out.push_str(&page_link(
            "«",
            1,
            page_url,
            param,
            LinkState {
                disabled: state.is_first(),
                ..Default::default()
            },
        ));
    }
    if options.show_prev_next {
        out.push_str(&page_link(
            "‹",
            state.prev(),
            page_url,
            param,
            LinkState {
                disabled: state.is_first(),
                rel: Some("prev"),
                ..Default::default()
            },
        ));
    }

    let mut entries = state.window();
    if entries.is_empty() {
        entries.push(PagerEntry::Page(1));
    }
    for entry in entries {
        match entry {
            PagerEntry::Gap => out.push_str(GAP_MARKUP),
            PagerEntry::Page(n) => out.push_str(&page_link(
                &n.to_string(),
                n,
                page_url,
                param,
                LinkState {
                    current: n == state.current,
                    ..Default::default()
                },
            )),
        }
    }

    if options.show_prev_next {
        out.push_str(&page_link(
            "›",
            state.next(),
            page_url,
            param,
            LinkState {
                disabled: state.is_last(),
                rel: Some("next"),
                ..Default::default()
            },
        ));
    }
    if options.show_first_last {
        out.push_str(&page_link(
            "»",
            state.total,
            page_url,
            param,
            LinkState {
                disabled: state.is_last(),
                ..Default::default()
            },
        ));
    }
    out
}

pub fn render_pager_failure(err: &str) -> String {
    format!(
        r#"<span class="pager-error" style="color:crimson">読み込み失敗：{}</span>"#,
        escape_text(err)
    )
}

/// Terminal rendition of the window, current page bracketed.
pub fn render_pager_text(entries: &[PagerEntry], current: usize, color: bool) -> String {
    entries
        .iter()
        .map(|entry| match entry.page() {
            None => "…".to_string(),
            Some(n) if n == current => {
                let label = format!("[{n}]");
                if color {
                    label.bold().green().to_string()
                } else {
                    label
                }
            }
            Some(n) => n.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
