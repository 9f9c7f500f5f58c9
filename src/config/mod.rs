use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub layout: Option<String>,
    pub viewport_width: Option<u32>,
    pub max_numbers: Option<usize>,
    pub mobile_max_numbers: Option<usize>,
    pub show_prev_next: Option<bool>,
    pub show_first_last: Option<bool>,
    pub table_dir: Option<String>,
    pub meta1: Option<String>,
    pub meta2: Option<String>,
    #[serde(alias = "bind_source")]
    pub bind_sources: Option<Vec<String>>,
    pub switchbar: Option<bool>,
    pub template: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub timeout: Option<u64>,
    pub workers: Option<usize>,
    pub cache_buster: Option<bool>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".rankpage").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn default_config_yaml() -> String {
    r#"# rankpage config
#
# Location (default):
#   ~/.rankpage/config.yml
#
# Command line flags override every value here.

# Ranking directory to render (may carry ?p=N)
# url: https://example.com/ranking_home/youtube/all/views/

# Layout: table4cols, table4rows or cards
layout: table4cols

# Pager
# Widths up to 520px use the mobile budget. The budgets and toggles below
# override the pager object of meta1.json when set.
viewport_width: 1280
# max_numbers: 5
# mobile_max_numbers: 3
# show_prev_next: true
# show_first_last: true

# Data files, relative to the url
table_dir: tables/
meta1: meta1.json
meta2: meta2.json
# Extra binding sources as NAME=FILE
# bind_sources:
#   - meta=meta.json

# Genre / type switch bars
switchbar: false

# Output (optional)
# template: ./page.template.html
# output: ./page.html
# output_format: html

# Fetching
timeout: 10
workers: 4
cache_buster: true

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
