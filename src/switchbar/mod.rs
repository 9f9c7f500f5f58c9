//! Genre / ranking-type switch bars for the YouTube rankings.
//!
//! Ranking pages live at `.../{genre}/{type}/`. Each bar links to the
//! sibling pages that change one dimension and keep the other.

use reqwest::Url;

use crate::fetch::{directory_url, FetchError};
use crate::render::html::{escape_attr, escape_text};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Choice {
    pub key: &'static str,
    pub label: &'static str,
}

pub const GENRES: &[Choice] = &[
    Choice { key: "all", label: "全て" },
    Choice { key: "vocaloid", label: "ボカロ" },
    Choice { key: "kpop", label: "K-pop" },
    Choice { key: "anime", label: "アニメ主題歌" },
];

pub const TYPES: &[Choice] = &[
    Choice { key: "views", label: "歴代再生回数" },
    Choice { key: "likes", label: "いいね数" },
    Choice { key: "comments", label: "コメント数" },
    Choice { key: "daily", label: "デイリー" },
    Choice { key: "weekly", label: "ウィークリー" },
    Choice { key: "monthly", label: "マンスリー" },
];

const FALLBACK_GENRE: &str = "all";
const FALLBACK_TYPE: &str = "views";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Switchbar {
    pub genre: String,
    pub rtype: String,
    pub genre_links: Vec<SwitchLink>,
    pub type_links: Vec<SwitchLink>,
}

/// Last two path segments, read as `(genre, type)`.
pub fn current_selection(path: &str) -> (String, String) {
    let segs: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let lower = s.to_ascii_lowercase();
            lower != "index.html" && lower != "index.htm"
        })
        .collect();
    let n = segs.len();
    let genre = if n >= 2 { segs[n - 2] } else { "" };
    let rtype = if n >= 1 { segs[n - 1] } else { "" };
    (genre.to_string(), rtype.to_string())
}

fn known(choices: &[Choice], key: &str) -> bool {
    choices.iter().any(|c| c.key == key)
}

impl Switchbar {
    pub fn for_page(page_url: &str) -> Result<Self, FetchError> {
        let dir = directory_url(page_url)?;
        let (genre, rtype) = current_selection(dir.path());

        let keep_type = if known(TYPES, &rtype) { rtype.as_str() } else { FALLBACK_TYPE };
        let keep_genre = if known(GENRES, &genre) { genre.as_str() } else { FALLBACK_GENRE };

        let genre_links = GENRES
            .iter()
            .map(|g| SwitchLink {
                label: g.label,
                href: sibling(&dir, g.key, keep_type),
                active: g.key == genre,
            })
            .collect();
        let type_links = TYPES
            .iter()
            .map(|t| SwitchLink {
                label: t.label,
                href: sibling(&dir, keep_genre, t.key),
                active: t.key == rtype,
            })
            .collect();

        Ok(Self {
            genre,
            rtype,
            genre_links,
            type_links,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{}{}",
            render_bar("switchbar--genre", "ジャンル切替", &self.genre_links),
            render_bar("switchbar--rtype", "ランキング種別切替", &self.type_links)
        )
    }
}

fn sibling(dir: &Url, genre: &str, rtype: &str) -> String {
    match dir.join(&format!("../../{genre}/{rtype}/")) {
        Ok(u) => u.path().to_string(),
        Err(_) => format!("../../{genre}/{rtype}/"),
    }
}

fn render_bar(class: &str, label: &str, links: &[SwitchLink]) -> String {
    let buttons: String = links
        .iter()
        .map(|l| {
            let class = if l.active {
                "switchbar__btn is-active"
            } else {
                "switchbar__btn"
            };
            format!(
                r#"<a class="{class}" href="{}" role="button">{}</a>"#,
                escape_attr(&l.href),
                escape_text(l.label)
            )
        })
        .collect();
    format!(
        r#"<nav class="switchbar {class}" aria-label="{}">{buttons}</nav>"#,
        escape_attr(label)
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RovingKey {
    Left,
    Right,
}

/// Arrow-key focus movement across a bar, wrapping at both ends.
pub fn roving_focus(index: usize, len: usize, key: RovingKey) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = index.min(len - 1);
    Some(match key {
        RovingKey::Right => (index + 1) % len,
        RovingKey::Left => (index + len - 1) % len,
    })
}
