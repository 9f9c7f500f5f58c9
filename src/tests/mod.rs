use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::app::{build_report, PageRequest, PagerOverrides};
use crate::fetch::{FetchError, SiteClient};
use crate::pager::render::Viewport;
use crate::pager::PagerEntry;
use crate::render::Layout;

#[derive(Clone)]
struct Doc {
    status: u16,
    content_type: &'static str,
    body: String,
}

fn json_doc(value: Value) -> Doc {
    Doc {
        status: 200,
        content_type: "application/json",
        body: value.to_string(),
    }
}

/// Minimal static file responder. Returns the base URL and the log of
/// request targets (path plus query).
async fn serve(docs: HashMap<&'static str, Doc>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let docs = Arc::new(docs);
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let docs = docs.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let target = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                seen.lock().unwrap().push(target.clone());

                let path = target.split('?').next().unwrap_or("/");
                let doc = docs.get(path).cloned().unwrap_or(Doc {
                    status: 404,
                    content_type: "text/plain",
                    body: "not found".to_string(),
                });
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    doc.status,
                    doc.content_type,
                    doc.body.len(),
                    doc.body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), log)
}

fn client(base: &str) -> SiteClient {
    SiteClient::new(&format!("{base}/site/"), 5, None).unwrap()
}

fn request(page_url: &str, layout: Layout) -> PageRequest {
    PageRequest {
        page_url: reqwest::Url::parse(page_url).unwrap(),
        page: None,
        layout,
        viewport: Viewport::Desktop,
        pager: PagerOverrides::default(),
        table_dir: "tables/".to_string(),
        meta1: "meta1.json".to_string(),
        meta2: "meta2.json".to_string(),
        bind_sources: Vec::new(),
        switchbar: false,
        cache_buster: true,
    }
}

#[tokio::test]
async fn load_meta_reads_both_documents() {
    let (base, _) = serve(HashMap::from([
        (
            "/site/meta1.json",
            json_doc(json!({"title": "Views", "build": "b42", "pager": {"max_numbers": 7}})),
        ),
        ("/site/meta2.json", json_doc(json!({"total_pages": 12}))),
    ]))
    .await;

    let meta = client(&base)
        .load_meta("meta1.json", "meta2.json")
        .await
        .unwrap();
    assert_eq!(meta.total_pages(), 12);
    assert_eq!(meta.build().as_deref(), Some("b42"));
    assert_eq!(meta.meta1["pager"]["max_numbers"], 7);
}

#[tokio::test]
async fn meta1_is_optional_meta2_is_not() {
    let (base, _) = serve(HashMap::from([(
        "/site/meta2.json",
        json_doc(json!({"total_pages": "3"})),
    )]))
    .await;
    let meta = client(&base)
        .load_meta("meta1.json", "meta2.json")
        .await
        .unwrap();
    assert_eq!(meta.meta1, json!({}));
    assert_eq!(meta.total_pages(), 3);

    let err = client(&base)
        .load_meta("meta1.json", "missing.json")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn body_decides_over_content_type() {
    let (base, _) = serve(HashMap::from([
        (
            "/site/plain.json",
            Doc {
                status: 200,
                content_type: "text/plain",
                body: r#"{"ok": true}"#.to_string(),
            },
        ),
        (
            "/site/broken.json",
            Doc {
                status: 200,
                content_type: "application/json",
                body: "{not json".to_string(),
            },
        ),
    ]))
    .await;
    let c = client(&base);
    assert_eq!(c.fetch_json("plain.json").await.unwrap(), json!({"ok": true}));
    assert!(matches!(
        c.fetch_json("broken.json").await.unwrap_err(),
        FetchError::Decode { .. }
    ));
    assert_eq!(c.fetch_optional_json("broken.json").await, json!({}));
}

#[tokio::test]
async fn rows_are_pinned_to_a_version() {
    let (base, log) = serve(HashMap::from([(
        "/site/tables/table.2.json",
        json_doc(json!({"rows": [{"rank": 11}, {"rank": 12}]})),
    )]))
    .await;
    let c = SiteClient::new(&format!("{base}/site/index.html"), 5, Some("2024-01-01".to_string()))
        .unwrap();

    let rows = c.fetch_rows("tables/", 2, Some("b42")).await.unwrap();
    assert_eq!(rows.len(), 2);
    let rows = c.fetch_rows("tables", 2, None).await.unwrap();
    assert_eq!(rows[1]["rank"], 12);

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "/site/tables/table.2.json?v=b42".to_string(),
            "/site/tables/table.2.json?v=2024-01-01".to_string(),
        ]
    );
}

#[tokio::test]
async fn sources_fail_independently() {
    let (base, _) = serve(HashMap::from([(
        "/site/a.json",
        json_doc(json!({"name": "a"})),
    )]))
    .await;
    let out = client(&base)
        .fetch_sources(&[
            ("A".to_string(), "a.json".to_string()),
            ("b".to_string(), "b.json".to_string()),
        ])
        .await;
    assert_eq!(out["a"].as_ref().unwrap()["name"], "a");
    assert!(out["b"].is_err());
}

#[tokio::test]
async fn report_for_a_middle_page() {
    let (base, log) = serve(HashMap::from([
        (
            "/site/meta1.json",
            json_doc(json!({"title": "Top <Views>", "build": "b7", "pager": {"max_numbers": 5}})),
        ),
        (
            "/site/meta2.json",
            json_doc(json!({"total_pages": 10, "date": "2024-05-01"})),
        ),
        (
            "/site/tables/table.5.json",
            json_doc(json!([{"rank": 41, "title": {"text": "Song"}, "viewCount": "1,000"}])),
        ),
    ]))
    .await;
    let c = client(&base);
    let req = request(&format!("{base}/site/?p=5#top"), Layout::Table4Cols);

    let report = build_report(&c, &req).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.page, 5);
    assert_eq!(report.total, 10);
    assert_eq!(
        report.window,
        vec![
            PagerEntry::Page(1),
            PagerEntry::Gap,
            PagerEntry::Page(3),
            PagerEntry::Page(4),
            PagerEntry::Page(5),
            PagerEntry::Page(6),
            PagerEntry::Page(7),
            PagerEntry::Gap,
            PagerEntry::Page(10),
        ]
    );
    assert_eq!(report.row_count, 1);
    assert!(report
        .sections
        .pager
        .contains(r#"<a href="/site/?p=5" class="is-current" aria-current="page">5</a>"#));
    assert!(report.sections.pager.contains(r#"<a href="/site/">1</a>"#));
    assert!(report.sections.table.contains("Song"));
    assert!(log
        .lock()
        .unwrap()
        .contains(&"/site/tables/table.5.json?v=b7".to_string()));

    let html = String::from_utf8(crate::output::render_html(&report, None)).unwrap();
    assert!(html.contains(">Top &lt;Views&gt;</h1>"));
    assert!(html.contains(">2024.05.01</time>"));
}

#[tokio::test]
async fn metadata_failure_keeps_the_table() {
    let (base, _) = serve(HashMap::from([(
        "/site/tables/table.3.json",
        json_doc(json!([{"rank": 21}])),
    )]))
    .await;
    let c = client(&base);
    let req = request(&format!("{base}/site/?p=3"), Layout::Table4Rows);

    let report = build_report(&c, &req).await;
    assert_eq!(report.errors.len(), 1);
    assert!(report.sections.pager.contains("読み込み失敗："));
    assert_eq!(report.page, 3);
    assert_eq!(report.row_count, 1);
    assert!(report.sections.table.contains(r#"rowspan="4">21</th>"#));
}

#[tokio::test]
async fn missing_table_renders_failure_row() {
    let (base, _) = serve(HashMap::from([(
        "/site/meta2.json",
        json_doc(json!({"total_pages": 2})),
    )]))
    .await;
    let c = client(&base);
    let req = request(&format!("{base}/site/?p=9"), Layout::Table4Cols);

    let report = build_report(&c, &req).await;
    assert_eq!(report.page, 2);
    assert_eq!(report.row_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("404"));
    assert!(report.sections.table.contains("color:crimson"));
}

#[tokio::test]
async fn cards_use_the_chart_date() {
    let (base, log) = serve(HashMap::from([
        ("/site/meta2.json", json_doc(json!({"total_pages": 1}))),
        ("/site/meta.json", json_doc(json!({"date": "2024-06-01"}))),
        (
            "/site/tables/table.1.json",
            json_doc(json!({"rows": [{"rank": 1, "viewcount": "10", "increment_d": "2"}]})),
        ),
    ]))
    .await;
    let c = client(&base);
    let req = request(&format!("{base}/site/"), Layout::Cards);

    let report = build_report(&c, &req).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.window, vec![PagerEntry::Page(1)]);
    assert!(report.sections.sources.contains_key("meta"));
    assert!(report.sections.table.contains("(+2)"));
    assert!(log
        .lock()
        .unwrap()
        .contains(&"/site/tables/table.1.json?v=2024-06-01".to_string()));
}

#[tokio::test]
async fn mobile_viewport_and_overrides_shrink_the_window() {
    let (base, _) = serve(HashMap::from([
        ("/site/meta2.json", json_doc(json!({"total_pages": 20}))),
        ("/site/tables/table.10.json", json_doc(json!([]))),
    ]))
    .await;
    let c = client(&base);
    let mut req = request(&format!("{base}/site/"), Layout::Table4Cols);
    req.page = Some("10".to_string());
    req.viewport = Viewport::Mobile;
    req.pager.show_first_last = Some(false);

    let report = build_report(&c, &req).await;
    assert_eq!(report.max_numbers, 3);
    assert_eq!(
        report.window,
        vec![
            PagerEntry::Page(1),
            PagerEntry::Gap,
            PagerEntry::Page(9),
            PagerEntry::Page(10),
            PagerEntry::Page(11),
            PagerEntry::Gap,
            PagerEntry::Page(20),
        ]
    );
    assert!(!report.sections.pager.contains('«'));
    assert!(report.sections.pager.contains('‹'));
    assert!(report.sections.table.contains("データがありません"));
}
