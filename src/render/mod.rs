//! Ranking row rendering.
//!
//! Rows come from `tables/table.<p>.json` and are rendered in one of three
//! layouts used across the site. Every field is optional; missing fields
//! render empty instead of failing the page.

pub mod html;

use serde::Serialize;
use serde_json::Value;

use html::{
    cell_link_or_text, dot_date, escape_text, format_count, link, thumb_html, value_text,
    LinkSpec,
};

pub const EMPTY_MESSAGE: &str = "データがありません";
pub const FAILURE_PREFIX: &str = "読み込み失敗：";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Rank | Thumb | Info | Views, one row per entry.
    Table4Cols,
    /// Four table rows per entry with the rank spanning all of them.
    Table4Rows,
    /// Card grid used by the music charts.
    Cards,
}

impl Layout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "table4cols" | "table-4cols" | "cols" => Some(Self::Table4Cols),
            "table4rows" | "table-4rows" | "rows" => Some(Self::Table4Rows),
            "cards" | "card" | "grid" => Some(Self::Cards),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Layout::Table4Cols => "table4cols",
            Layout::Table4Rows => "table4rows",
            Layout::Cards => "cards",
        }
    }

    fn columns(&self) -> usize {
        match self {
            Layout::Table4Cols => 4,
            Layout::Table4Rows => 3,
            Layout::Cards => 1,
        }
    }

    fn thead(&self) -> &'static str {
        match self {
            Layout::Table4Cols => "<tr><th>Rank</th><th>Thumb</th><th>Info</th><th>Views</th></tr>",
            Layout::Table4Rows => r#"<tr><th>Rank</th><th colspan="2">Info</th></tr>"#,
            Layout::Cards => "",
        }
    }
}

/// Accepts either a bare array of rows or `{ "rows": [...] }`.
pub fn rows_from_document(doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn wrap(layout: Layout, body: &str) -> String {
    match layout {
        Layout::Cards => format!(r#"<div id="card-grid" class="card-grid">{body}</div>"#),
        _ => format!(
            r#"<table id="data-table"><thead>{}</thead><tbody>{body}</tbody></table>"#,
            layout.thead()
        ),
    }
}

fn message(layout: Layout, style: &str, text: &str) -> String {
    match layout {
        Layout::Cards => format!(r#"<div style="{style}">{text}</div>"#),
        _ => format!(
            r#"<tr><td colspan="{}" style="{style}">{text}</td></tr>"#,
            layout.columns()
        ),
    }
}

/// Renders the full container (table or grid) for one page of rows.
/// Rendering the same rows twice yields identical markup.
pub fn render_rows(layout: Layout, rows: &[Value]) -> String {
    if rows.is_empty() {
        return wrap(layout, &message(layout, "padding:12px", EMPTY_MESSAGE));
    }
    let body: String = rows
        .iter()
        .map(|row| match layout {
            Layout::Table4Cols => row_4cols(row),
            Layout::Table4Rows => row_4rows(row),
            Layout::Cards => card(row),
        })
        .collect();
    wrap(layout, &body)
}

/// Container with an inline failure notice in place of the rows.
pub fn render_rows_failure(layout: Layout, err: &str) -> String {
    let text = format!("{FAILURE_PREFIX}{}", escape_text(err));
    wrap(layout, &message(layout, "color:crimson;padding:12px", &text))
}

fn field_text(row: &Value, key: &str) -> String {
    escape_text(&row.get(key).map(value_text).unwrap_or_default())
}

fn row_4cols(item: &Value) -> String {
    let rank = field_text(item, "rank");
    let thumb = thumb_html(item.get("thumb"));
    let title = link(&LinkSpec::from_value(item.get("title")));
    let channel = link(&LinkSpec::from_value(item.get("channel")));

    let published = item.get("publishedAt").map(dot_date).unwrap_or_default();
    let likes = field_text(item, "likeCount");
    let comments = field_text(item, "commentCount");
    let increment = field_text(item, "increment");
    let views = field_text(item, "viewCount");

    let mut meta = String::new();
    if !published.is_empty() {
        meta.push_str(&format!(
            r#"<span class="published">Release: {}</span>"#,
            escape_text(&published)
        ));
    }
    if !likes.is_empty() {
        meta.push_str(&format!(r#"<span class="chip likes">👍 {likes}</span>"#));
    }
    if !comments.is_empty() {
        meta.push_str(&format!(r#"<span class="chip comments">💬 {comments}</span>"#));
    }
    if !increment.is_empty() {
        meta.push_str(&format!(r#"<span class="chip increment">↗︎ {increment}</span>"#));
    }

    format!(
        r#"<tr><th class="rank" scope="row">{rank}</th><td class="thumb">{thumb}</td><td class="info"><div class="title">{title}</div><div class="channel">{channel}</div><div class="meta">{meta}</div></td><td class="highlight">{views}</td></tr>"#
    )
}

fn row_4rows(item: &Value) -> String {
    let rank = field_text(item, "rank");
    let thumb = thumb_html(item.get("thumb"));
    let title = cell_link_or_text(item.get("title"));
    let channel = cell_link_or_text(item.get("channel"));
    let count = |key: &str| item.get(key).map(format_count).unwrap_or_default();
    let likes = count("likes");
    let comments = count("comments");
    let views = count("views");

    format!(
        concat!(
            r#"<tr class="r1"><th scope="rowgroup" class="rank" rowspan="4">{rank}</th><td class="image" colspan="2">{thumb}</td></tr>"#,
            r#"<tr class="r2"><td class="title" colspan="2">{title}</td></tr>"#,
            r#"<tr class="r3"><td class="channel">{channel}</td><td class="stats"><span class="likes">👍 {likes}</span><span class="comments" style="margin-left:.8em;">💬 {comments}</span></td></tr>"#,
            r#"<tr class="r4"><td class="views-label">Views</td><td class="views">{views}</td></tr>"#,
        ),
        rank = rank,
        thumb = thumb,
        title = title,
        channel = channel,
        likes = likes,
        comments = comments,
        views = views,
    )
}

fn artists(value: Option<&Value>) -> String {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return String::new(),
    };
    items
        .iter()
        .filter(|a| a.is_object())
        .filter_map(|a| {
            let text = a.get("text").map(value_text).unwrap_or_default();
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            let url = a.get("url").map(value_text).unwrap_or_default();
            let target = a.get("target").map(value_text).unwrap_or_default();
            let url = url.trim();
            let target = target.trim();
            Some(link(&LinkSpec {
                url: Some(url).filter(|u| !u.is_empty()),
                text: Some(text),
                target: Some(target).filter(|t| !t.is_empty()),
                ..Default::default()
            }))
        })
        .collect::<Vec<_>>()
        .join(r#"<span class="sep">, </span>"#)
}

fn card(item: &Value) -> String {
    let rank = field_text(item, "rank");
    let thumb = thumb_html(item.get("thumb"));
    let title = link(&LinkSpec::from_value(item.get("title")));
    let artist = artists(item.get("artist"));
    let views = field_text(item, "viewcount");
    let increment = field_text(item, "increment_d");

    format!(
        r#"<article class="card"><div class="rank">#{rank}</div><div class="thumb">{thumb}</div><div class="title">{title}</div><div class="artist">{artist}</div><div class="metric">{views}</div><div class="sub">(+{increment})</div></article>"#
    )
}
