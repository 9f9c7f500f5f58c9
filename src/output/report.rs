use tracing::{debug, warn};

use super::PageReport;
use crate::bind::bind_markup;
use crate::drawer::shell_markup;

pub const SLOT_PAGER: &str = "<!-- rankpage:pager -->";
pub const SLOT_TABLE: &str = "<!-- rankpage:table -->";
pub const SLOT_SWITCHBAR: &str = "<!-- rankpage:switchbar -->";

const PAGER_LABEL: &str = "ページ送り";

// `<` only occurs inside JSON strings, so `\u003c` keeps the document valid
// and no comment or tag opener reaches the script tokenizer.
fn json_for_script_tag(value: &str) -> String {
    value.replace('<', "\\u003c")
}

fn pager_nav(inner: &str) -> String {
    format!(r#"<nav class="pager" aria-label="{PAGER_LABEL}">{inner}</nav>"#)
}

fn default_document(report: &PageReport) -> String {
    let sections = &report.sections;
    let switchbar = sections.switchbar.clone().unwrap_or_default();
    let drawer = shell_markup("メニュー", &switchbar);
    let pager = pager_nav(&sections.pager);

    format!(
        r####"<!DOCTYPE html>
<html lang="ja">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title data-from="meta1" data-bind="title">ランキング</title>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 0 auto; max-width: 1080px; padding: 0 12px; }}
    .drawer[hidden], .backdrop[hidden] {{ display: none; }}
    .pager {{ display: flex; flex-wrap: wrap; gap: 4px; margin: 12px 0; }}
    .pager a {{ padding: 4px 10px; border: 1px solid #ccc; border-radius: 4px; text-decoration: none; }}
    .pager a.is-current {{ background: #222; color: #fff; }}
    .pager a[aria-disabled="true"] {{ opacity: .4; pointer-events: none; }}
    .switchbar {{ display: flex; flex-wrap: wrap; gap: 6px; margin: 8px 0; }}
    .switchbar__btn.is-active {{ font-weight: 700; text-decoration: underline; }}
    #data-table {{ border-collapse: collapse; width: 100%; }}
    #data-table th, #data-table td {{ border-bottom: 1px solid #eee; padding: 6px; vertical-align: top; }}
    .card-grid {{ display: grid; gap: 12px; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); }}
  </style>
</head>
<body>
  {drawer}
  <header class="page-header">
    <h1 data-from="meta1" data-bind="title">ランキング</h1>
    <p class="explain" data-from="meta1" data-bind="explain" data-html="true"></p>
    <p class="updated">更新日: <time data-from="meta2" data-bind="date" data-format="dotdate"></time></p>
  </header>
  {switchbar}
  {pager}
  <main>{table}</main>
  {pager}
</body>
</html>
"####,
        drawer = drawer,
        switchbar = switchbar,
        pager = pager,
        table = sections.table,
    )
}

/// Fills the slot comments of a user template. A template without a pager
/// slot gets none; the other slots are optional too.
pub fn fill_template(template: &str, report: &PageReport) -> String {
    let sections = &report.sections;
    template
        .replace(SLOT_PAGER, &pager_nav(&sections.pager))
        .replace(SLOT_TABLE, &sections.table)
        .replace(
            SLOT_SWITCHBAR,
            sections.switchbar.as_deref().unwrap_or_default(),
        )
}

/// Binds page metadata into the document. Scanner failures leave the
/// markup as it was.
fn bind_document(markup: String, report: &PageReport) -> String {
    match bind_markup(&markup, &report.sections.sources) {
        Ok(outcome) => {
            debug!(
                bound = outcome.bound,
                skipped = outcome.skipped,
                "applied bindings"
            );
            outcome.markup
        }
        Err(e) => {
            warn!(error = %e, "bindings not applied");
            markup
        }
    }
}

fn embed_report(mut doc: String, report: &PageReport) -> String {
    let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
    let script = format!(
        r#"<script type="application/json" id="page-data">{}</script>"#,
        json_for_script_tag(&json)
    );
    match doc.rfind("</body>") {
        Some(at) => doc.insert_str(at, &format!("{script}\n")),
        None => {
            doc.push_str(&script);
            doc.push('\n');
        }
    }
    doc
}

pub fn render_html(report: &PageReport, template: Option<&str>) -> Vec<u8> {
    let doc = match template {
        Some(t) => fill_template(t, report),
        None => default_document(report),
    };
    let doc = bind_document(doc, report);
    embed_report(doc, report).into_bytes()
}
