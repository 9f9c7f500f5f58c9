use crate::cli::args::CliArgs;
use crate::output::OutputFormat;
use crate::render::Layout;

/// Splits `NAME=FILE`. The name is lowercased to match `data-from`.
pub fn parse_bind_source(raw: &str) -> Result<(String, String), String> {
    let (name, file) = raw
        .split_once('=')
        .ok_or_else(|| "expected NAME=FILE".to_string())?;
    let name = name.trim().to_lowercase();
    let file = file.trim();
    if name.is_empty() {
        return Err("empty source name".to_string());
    }
    if file.is_empty() {
        return Err("empty file".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!("invalid source name '{name}'"));
    }
    Ok((name, file.to_string()))
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.url.as_deref() {
        reqwest::Url::parse(raw.trim()).map_err(|e| format!("invalid --url '{raw}': {e}"))?;
    }
    if let Some(raw) = args.layout.as_deref() {
        if Layout::parse(raw).is_none() {
            return Err(format!(
                "invalid --layout '{raw}', expected table4cols, table4rows, or cards"
            ));
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected html, json, or text"
            ));
        }
    }
    if args.max_numbers == Some(0) {
        return Err("invalid max-numbers, expected positive integer".to_string());
    }
    if args.mobile_max_numbers == Some(0) {
        return Err("invalid mobile-max-numbers, expected positive integer".to_string());
    }
    if args.timeout == Some(0) {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    if args.workers == Some(0) {
        return Err("invalid workers, expected positive integer".to_string());
    }
    for raw in &args.bind_source {
        parse_bind_source(raw).map_err(|e| format!("invalid --bind-source '{raw}': {e}"))?;
    }
    Ok(())
}
