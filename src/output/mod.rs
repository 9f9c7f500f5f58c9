pub mod report;

use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::pager::render::render_pager_text;
use crate::pager::PagerEntry;
use crate::render::html::value_text;
use crate::render::Layout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// Everything one page render produced. The serialized form is the JSON
/// output; the skipped fields feed the HTML document.
#[derive(Clone, Debug, Serialize)]
pub struct PageReport {
    pub url: String,
    pub layout: Layout,
    pub page: usize,
    pub total: usize,
    pub max_numbers: usize,
    pub window: Vec<PagerEntry>,
    pub row_count: usize,
    pub rows: Vec<Value>,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub sections: PageSections,
}

/// Pre-rendered fragments and the values bindings resolve against.
#[derive(Clone, Debug, Default)]
pub struct PageSections {
    pub pager: String,
    pub table: String,
    pub switchbar: Option<String>,
    pub sources: BTreeMap<String, Value>,
}

fn row_title(row: &Value) -> String {
    match row.get("title") {
        Some(Value::Object(map)) => map.get("text").map(value_text).unwrap_or_default(),
        Some(other) => value_text(other),
        None => String::new(),
    }
}

fn row_metric(row: &Value) -> String {
    ["viewCount", "views", "viewcount"]
        .iter()
        .find_map(|key| row.get(*key))
        .map(value_text)
        .unwrap_or_default()
}

pub fn render_text(report: &PageReport, color: bool) -> Vec<u8> {
    let mut out = String::new();
    let pager = render_pager_text(&report.window, report.page, color);
    out.push_str(&format!("page {}/{}  {}\n", report.page, report.total, pager));
    for row in &report.rows {
        let rank = row.get("rank").map(value_text).unwrap_or_default();
        out.push_str(&format!(
            "{:>4}  {}  {}\n",
            rank,
            row_title(row).trim(),
            row_metric(row)
        ));
    }
    for err in &report.errors {
        let line = format!("error: {err}");
        if color {
            out.push_str(&line.red().to_string());
        } else {
            out.push_str(&line);
        }
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(report: &PageReport) -> Vec<u8> {
    serde_json::to_vec_pretty(report).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_html(report: &PageReport, template: Option<&str>) -> Vec<u8> {
    report::render_html(report, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PageReport {
        PageReport {
            url: "https://example.com/yt/all/views/".to_string(),
            layout: Layout::Table4Cols,
            page: 2,
            total: 3,
            max_numbers: 5,
            window: vec![PagerEntry::Page(1), PagerEntry::Page(2), PagerEntry::Page(3)],
            row_count: 2,
            rows: vec![
                json!({"rank": 1, "title": {"text": "First"}, "viewCount": "1,000"}),
                json!({"rank": 2, "title": "Second", "views": 900}),
            ],
            errors: vec!["meta1.json: 404".to_string()],
            sections: PageSections::default(),
        }
    }

    #[test]
    fn format_parse_and_infer() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("htm"), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::parse("xml"), None);
        assert_eq!(infer_format_from_path("out/Page.HTML"), Some(OutputFormat::Html));
        assert_eq!(infer_format_from_path("rows.txt"), Some(OutputFormat::Text));
        assert_eq!(infer_format_from_path("rows"), None);
    }

    #[test]
    fn text_lists_pager_and_rows() {
        let text = String::from_utf8(render_text(&sample(), false)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "page 2/3  1 [2] 3");
        assert_eq!(lines[1], "   1  First  1,000");
        assert_eq!(lines[2], "   2  Second  900");
        assert_eq!(lines[3], "error: meta1.json: 404");
    }

    #[test]
    fn json_skips_sections() {
        let v: Value = serde_json::from_slice(&render_json(&sample())).unwrap();
        assert_eq!(v["page"], 2);
        assert_eq!(v["layout"], "table4cols");
        assert_eq!(v["window"][0], json!({"page": 1}));
        assert_eq!(v["row_count"], 2);
        assert!(v.get("sections").is_none());
    }
}
