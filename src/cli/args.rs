use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rankpage",
    version,
    about = "pagination and ranking page renderer",
    long_about = "rankpage fetches the metadata and table data of a static ranking page, computes the pager window and renders the page.\n\nExamples:\n  rankpage -u https://example.com/ranking_home/youtube/all/views/\n  rankpage -u 'https://example.com/music_chart/daily/?p=3' -l cards -o page.html\n  rankpage -u https://example.com/yt/kpop/likes/ -w 390 --output-format text\n\nTip: Use --config to persist settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Page URL of the ranking directory (may carry ?p=N)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'p',
        long = "pg",
        visible_alias = "page",
        value_name = "N",
        help_heading = "Input",
        help = "Page number (overrides ?p= in the URL)."
    )]
    pub page: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.rankpage/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write the default config file and exit."
    )]
    pub init_config: bool,

    #[arg(
        long = "td",
        visible_alias = "table-dir",
        value_name = "DIR",
        help_heading = "Data",
        help = "Directory holding table.<p>.json (default tables/)."
    )]
    pub table_dir: Option<String>,

    #[arg(
        long = "m1",
        visible_alias = "meta1",
        value_name = "FILE",
        help_heading = "Data",
        help = "Page metadata file with the pager config (default meta1.json)."
    )]
    pub meta1: Option<String>,

    #[arg(
        long = "m2",
        visible_alias = "meta2",
        value_name = "FILE",
        help_heading = "Data",
        help = "Metadata file with total_pages (default meta2.json)."
    )]
    pub meta2: Option<String>,

    #[arg(
        long = "bs",
        visible_alias = "bind-source",
        value_name = "NAME=FILE",
        action = ArgAction::Append,
        help_heading = "Data",
        help = "Extra binding source (repeatable)."
    )]
    pub bind_source: Vec<String>,

    #[arg(
        short = 'l',
        long = "ly",
        visible_alias = "layout",
        value_name = "LAYOUT",
        help_heading = "Render",
        help = "Row layout: table4cols, table4rows or cards."
    )]
    pub layout: Option<String>,

    #[arg(
        short = 'w',
        long = "vw",
        visible_alias = "viewport-width",
        value_name = "PX",
        help_heading = "Pager",
        help = "Viewport width; 520 or less uses the mobile budget."
    )]
    pub viewport_width: Option<u32>,

    #[arg(
        long = "mn",
        visible_alias = "max-numbers",
        value_name = "N",
        help_heading = "Pager",
        help = "Desktop budget of numeric links."
    )]
    pub max_numbers: Option<usize>,

    #[arg(
        long = "mmn",
        visible_alias = "mobile-max-numbers",
        value_name = "N",
        help_heading = "Pager",
        help = "Mobile budget of numeric links."
    )]
    pub mobile_max_numbers: Option<usize>,

    #[arg(
        long = "npn",
        visible_alias = "no-prev-next",
        help_heading = "Pager",
        help = "Hide the previous/next controls."
    )]
    pub no_prev_next: bool,

    #[arg(
        long = "nfl",
        visible_alias = "no-first-last",
        help_heading = "Pager",
        help = "Hide the first/last controls."
    )]
    pub no_first_last: bool,

    #[arg(
        short = 's',
        long = "sw",
        visible_alias = "switchbar",
        help_heading = "Render",
        help = "Render the genre/type switch bars."
    )]
    pub switchbar: bool,

    #[arg(
        short = 'T',
        long = "tpl",
        visible_alias = "template",
        value_name = "FILE",
        help_heading = "Render",
        help = "HTML template with <!-- rankpage:... --> slots."
    )]
    pub template: Option<String>,

    #[arg(
        short = 'o',
        long = "o",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write output to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: html, json or text (inferred from --output)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "to",
        visible_alias = "timeout",
        value_name = "SECS",
        help_heading = "Fetch",
        help = "HTTP timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "wk",
        visible_alias = "workers",
        value_name = "N",
        help_heading = "Fetch",
        help = "Runtime worker threads."
    )]
    pub workers: Option<usize>,

    #[arg(
        long = "ncb",
        visible_alias = "no-cache-buster",
        help_heading = "Fetch",
        help = "Do not append ?v= to data requests."
    )]
    pub no_cache_buster: bool,
}
