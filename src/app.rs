use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Url;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::bind::DATE_SOURCE;
use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::fetch::{self, SiteClient};
use crate::output::{self, OutputFormat, PageReport, PageSections};
use crate::pager::render::{
    render_pager, render_pager_failure, PagerOptions, Viewport, DEFAULT_PARAM,
};
use crate::pager::{parse_page_param, PagerState};
use crate::render::{self, Layout};
use crate::switchbar::Switchbar;

const CHART_META: &str = "meta.json";

fn print_banner() {
    const BANNER: &str = r#"
                     __
   _______ ____  __ / /__ ___  ___ ____ ____
  / __/ _ `/ _ \/ '_// _ \/ _ `/ _ `/ -_)
 /_/  \_,_/_//_/_/\_\/ .__/\_,_/\_, /\__/
                    /_/        /___/
"#;
    eprint!("{}", BANNER.bold());
    eprintln!(
        "       v{} - ranking page renderer",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
}

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS]\n\n");

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }
        let heading = arg.get_help_heading().unwrap_or("Options").to_string();
        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                section_idx.insert(heading, sections.len() - 1);
                sections.len() - 1
            }
        };
        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();
            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }
            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }
            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");
            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }
            out.push('\n');
        }
    }

    out
}

/// Pager settings given on the command line or in the config file. Unset
/// values keep what `meta1.json` says.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagerOverrides {
    pub max_numbers: Option<usize>,
    pub mobile_max_numbers: Option<usize>,
    pub show_prev_next: Option<bool>,
    pub show_first_last: Option<bool>,
}

impl PagerOverrides {
    pub fn apply(&self, mut options: PagerOptions) -> PagerOptions {
        if let Some(n) = self.max_numbers {
            options.max_numbers = n.max(1);
        }
        if let Some(n) = self.mobile_max_numbers {
            options.mobile_max_numbers = n.max(1);
        }
        if let Some(b) = self.show_prev_next {
            options.show_prev_next = b;
        }
        if let Some(b) = self.show_first_last {
            options.show_first_last = b;
        }
        options
    }
}

/// What to render: everything [`build_report`] needs besides the client.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub page_url: Url,
    pub page: Option<String>,
    pub layout: Layout,
    pub viewport: Viewport,
    pub pager: PagerOverrides,
    pub table_dir: String,
    pub meta1: String,
    pub meta2: String,
    pub bind_sources: Vec<(String, String)>,
    pub switchbar: bool,
    pub cache_buster: bool,
}

impl PageRequest {
    /// Raw page value: the explicit one, else `p` from the page URL.
    fn raw_page(&self) -> Option<String> {
        self.page.clone().or_else(|| {
            self.page_url
                .query_pairs()
                .find(|(k, _)| k == DEFAULT_PARAM)
                .map(|(_, v)| v.into_owned())
        })
    }
}

struct RunConfig {
    request: PageRequest,
    template_path: Option<String>,
    output_path: Option<String>,
    output_format: OutputFormat,
    timeout: u64,
    workers: usize,
    verbose: u8,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let raw_url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "a page URL must be specified (--url or url: in the config)".to_string())?;
    let page_url = Url::parse(raw_url.trim()).map_err(|e| format!("invalid URL '{raw_url}': {e}"))?;

    let layout_raw = args
        .layout
        .or(cfg.layout)
        .unwrap_or_else(|| "table4cols".to_string());
    let layout = Layout::parse(&layout_raw).ok_or_else(|| {
        format!("invalid layout '{layout_raw}', expected table4cols, table4rows, or cards")
    })?;

    let viewport_width = args.viewport_width.or(cfg.viewport_width).unwrap_or(1280);

    let pager = PagerOverrides {
        max_numbers: args.max_numbers.or(cfg.max_numbers),
        mobile_max_numbers: args.mobile_max_numbers.or(cfg.mobile_max_numbers),
        show_prev_next: if args.no_prev_next {
            Some(false)
        } else {
            cfg.show_prev_next
        },
        show_first_last: if args.no_first_last {
            Some(false)
        } else {
            cfg.show_first_last
        },
    };
    if pager.max_numbers == Some(0) || pager.mobile_max_numbers == Some(0) {
        return Err("invalid max-numbers, expected positive integer".to_string());
    }

    let raw_sources = if args.bind_source.is_empty() {
        cfg.bind_sources.unwrap_or_default()
    } else {
        args.bind_source
    };
    let bind_sources = raw_sources
        .iter()
        .map(|raw| {
            validation::parse_bind_source(raw)
                .map_err(|e| format!("invalid bind source '{raw}': {e}"))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let output_path = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw).ok_or_else(|| {
            format!("invalid output format '{raw}', expected html, json, or text")
        })?,
        None => output_path
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Html),
    };

    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    let workers = args.workers.or(cfg.workers).unwrap_or(4);
    if timeout == 0 || workers == 0 {
        return Err("timeout and workers must be positive integers".to_string());
    }

    Ok(RunConfig {
        request: PageRequest {
            page_url,
            page: args.page,
            layout,
            viewport: Viewport::from_width(viewport_width),
            pager,
            table_dir: args
                .table_dir
                .or(cfg.table_dir)
                .unwrap_or_else(|| fetch::DEFAULT_TABLE_DIR.to_string()),
            meta1: args
                .meta1
                .or(cfg.meta1)
                .unwrap_or_else(|| fetch::DEFAULT_META1.to_string()),
            meta2: args
                .meta2
                .or(cfg.meta2)
                .unwrap_or_else(|| fetch::DEFAULT_META2.to_string()),
            bind_sources,
            switchbar: args.switchbar || cfg.switchbar.unwrap_or(false),
            cache_buster: !args.no_cache_buster && cfg.cache_buster.unwrap_or(true),
        },
        template_path: args
            .template
            .or(cfg.template)
            .map(|p| config::expand_tilde_string(&p)),
        output_path,
        output_format,
        timeout,
        workers,
        verbose: args.verbose,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn is_non_empty_object(value: &Value) -> bool {
    value.as_object().map(|m| !m.is_empty()).unwrap_or(false)
}

/// Fetches everything a page needs and renders each section. Fetch and
/// parse failures end up in `errors` and as inline messages in the affected
/// section; the rest of the page is still produced.
pub async fn build_report(client: &SiteClient, req: &PageRequest) -> PageReport {
    let mut errors: Vec<String> = Vec::new();
    let mut sources: BTreeMap<String, Value> = BTreeMap::new();
    let raw_page = req.raw_page();

    let chart_meta = async {
        if req.layout == Layout::Cards {
            client.fetch_optional_json(CHART_META).await
        } else {
            Value::Null
        }
    };
    let (meta, chart_meta) = tokio::join!(client.load_meta(&req.meta1, &req.meta2), chart_meta);

    let (state, pager_html, version) = match meta {
        Ok(meta) => {
            let options = req.pager.apply(PagerOptions::from_meta(&meta.meta1));
            let budget = options.budget_for(req.viewport);
            let state = PagerState::from_query(raw_page.as_deref(), meta.total_pages(), budget);
            debug!(
                current = state.current,
                total = state.total,
                budget,
                "pager state"
            );
            let html = render_pager(&state, &options, &req.page_url);
            let version = meta.build();
            sources.insert("meta1".to_string(), meta.meta1);
            sources.insert("meta2".to_string(), meta.meta2);
            (state, html, version)
        }
        Err(e) => {
            warn!(error = %e, "metadata unavailable");
            errors.push(e.to_string());
            let budget = req.pager.apply(PagerOptions::default()).budget_for(req.viewport);
            let current = parse_page_param(raw_page.as_deref());
            // total is unknown; the requested page is the last one known to exist
            let state = PagerState::new(current, current, budget);
            (state, render_pager_failure(&e.to_string()), None)
        }
    };

    let version = if req.layout == Layout::Cards && req.cache_buster {
        Some(fetch::chart_cache_buster(&chart_meta, fetch::tokyo_today()))
    } else {
        version
    };
    if is_non_empty_object(&chart_meta) {
        sources.insert(DATE_SOURCE.to_string(), chart_meta);
    }

    let (rows, extra) = tokio::join!(
        client.fetch_rows(&req.table_dir, state.current, version.as_deref()),
        client.fetch_sources(&req.bind_sources)
    );

    for (name, result) in extra {
        match result {
            Ok(value) => {
                sources.insert(name, value);
            }
            Err(e) => {
                warn!(source = %name, error = %e, "bind source unavailable");
                errors.push(format!("{name}: {e}"));
            }
        }
    }

    let (rows, table_html) = match rows {
        Ok(rows) => {
            let html = render::render_rows(req.layout, &rows);
            (rows, html)
        }
        Err(e) => {
            warn!(error = %e, "table unavailable");
            errors.push(e.to_string());
            (Vec::new(), render::render_rows_failure(req.layout, &e.to_string()))
        }
    };

    let switchbar = if req.switchbar {
        match Switchbar::for_page(req.page_url.as_str()) {
            Ok(bar) => Some(bar.render()),
            Err(e) => {
                warn!(error = %e, "switchbar skipped");
                None
            }
        }
    } else {
        None
    };

    info!(
        page = state.current,
        total = state.total,
        rows = rows.len(),
        errors = errors.len(),
        "page assembled"
    );

    PageReport {
        url: req.page_url.to_string(),
        layout: req.layout,
        page: state.current,
        total: state.total,
        max_numbers: state.max_numbers,
        window: state.window(),
        row_count: rows.len(),
        rows,
        errors,
        sections: PageSections {
            pager: pager_html,
            table: table_html,
            switchbar,
            sources,
        },
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let req = &run.request;
    format_kv_line("URL", req.page_url.as_str());
    format_kv_line("Layout", req.layout.label());
    format_kv_line(
        "Viewport",
        match req.viewport {
            Viewport::Desktop => "desktop",
            Viewport::Mobile => "mobile",
        },
    );
    format_kv_line("Switchbar", format_bool(req.switchbar));
    format_kv_line("CacheBust", format_bool(req.cache_buster));
    format_kv_line(
        "Output",
        run.output_path.as_deref().unwrap_or("stdout"),
    );
    eprintln!();

    let template = match run.template_path.as_deref() {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("failed to read template {path}: {e}"))?,
        ),
        None => None,
    };

    let cache_buster = req.cache_buster.then(fetch::daily_cache_buster);
    let client = SiteClient::new(req.page_url.as_str(), run.timeout, cache_buster)
        .map_err(|e| e.to_string())?;

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed_precise}]")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(format!("fetching {}", client.base()));

    let now = Instant::now();
    let report = build_report(&client, req).await;
    pb.finish_and_clear();

    let color = !run.no_color;
    let rendered = match run.output_format {
        OutputFormat::Text => output::render_text(&report, color && run.output_path.is_none()),
        OutputFormat::Json => output::render_json(&report),
        OutputFormat::Html => output::render_html(&report, template.as_deref()),
    };

    match run.output_path.as_deref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|_| "failed to write output file".to_string())?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write output: {e}"))?;
            stdout
                .flush()
                .await
                .map_err(|e| format!("failed to write output: {e}"))?;
        }
    }

    eprintln!();
    format_kv_line("Page", &format!("{}/{}", report.page, report.total));
    format_kv_line("Rows", &report.row_count.to_string());
    for err in &report.errors {
        format_kv_line("Error", &err.red().to_string());
    }
    eprintln!(
        ":: Completed :: rendered in {}ms ::",
        now.elapsed().as_millis()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));

    if args.init_config {
        let path = user_config_path
            .or_else(config::default_config_path)
            .ok_or_else(|| "could not determine a config path, use --config".to_string())?;
        config::ensure_default_config_file(&path)?;
        println!(":: {:<10}: {}", "Config", path.display());
        return Ok(());
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    debug!(verbose = run.verbose, workers = run.workers, "configuration merged");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(run.workers)
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
