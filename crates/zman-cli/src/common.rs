use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate};
use clap::Args;
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use zman_astro::Location;
use zman_interpreter::ExecutionContext;
use zman_syntax::error::{Error, ErrorList};

/// Date and place the formulas are evaluated for.
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// Latitude in degrees, north positive
    #[arg(long, env = "ZMAN_LATITUDE", default_value_t = 31.7683, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude in degrees, east positive
    #[arg(long, env = "ZMAN_LONGITUDE", default_value_t = 35.2137, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Elevation in meters
    #[arg(long, env = "ZMAN_ELEVATION", default_value_t = 0.0)]
    pub elevation: f64,

    /// UTC offset, e.g. +02:00, -05:00 or UTC
    #[arg(long, env = "ZMAN_TIMEZONE", default_value = "+02:00", value_parser = parse_offset, allow_hyphen_values = true)]
    pub timezone: FixedOffset,

    /// Date as YYYY-MM-DD; defaults to today
    #[arg(long, env = "ZMAN_DATE", value_parser = parse_date)]
    pub date: Option<NaiveDate>,
}

impl ContextArgs {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.elevation, self.timezone)
    }

    pub fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.date(), self.location())
    }
}

/// A formula given inline, from a file, or on stdin.
#[derive(Args, Debug, Clone)]
pub struct FormulaInput {
    /// Formula text
    pub formula: Option<String>,

    /// Read the formula from a file instead
    #[arg(short, long, conflicts_with = "formula")]
    pub file: Option<PathBuf>,
}

impl FormulaInput {
    pub fn read(&self) -> Result<String, String> {
        if let Some(text) = &self.formula {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return read_file(path);
        }
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        Ok(buf)
    }
}

pub fn parse_offset(s: &str) -> Result<FixedOffset, String> {
    let t = s.trim();
    if t == "Z" || t.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string());
    }
    if let Ok(hours) = t.parse::<i32>() {
        return FixedOffset::east_opt(hours * 3600).ok_or_else(|| format!("UTC offset out of range: {}", s));
    }
    t.parse::<FixedOffset>()
        .map_err(|e| format!("invalid UTC offset '{}': {} (expected e.g. +02:00)", s, e))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}

pub fn read_file(path: &Path) -> Result<String, String> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()));
    }
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

/// Loads a `{"key": "formula", ...}` JSON object, keeping file order.
pub fn load_formula_set(path: &Path) -> Result<IndexMap<String, String>, String> {
    let text = read_file(path)?;
    let set: IndexMap<String, String> =
        serde_json::from_str(&text).map_err(|e| format!("Invalid formula set {}: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), formulas = set.len(), "loaded formula set");
    Ok(set)
}

pub fn print_failure(msg: impl AsRef<str>) {
    eprintln!("{}: {}", "error".red().bold(), msg.as_ref().red());
}

pub fn render_error(err: &Error) {
    eprintln!("{}: {}", err.kind.label().red().bold(), err.msg.red());
    if let (Some(line), Some(col)) = (err.line, err.col) {
        eprintln!("  --> line {}, column {}", line, col);
        if let Some(src_line) = &err.context {
            let line_num_str = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", line_num_str.bright_black(), src_line);

            let mut marker = String::new();
            marker.push_str(&" ".repeat(line_num_str.len()));
            if col > 1 {
                marker.push_str(&" ".repeat(col - 1));
            }
            marker.push('^');
            eprintln!("{}{}", marker.red(), " error here".red());
            eprintln!("     |");
        }
    }
    match &err.suggestion {
        Some(s) => eprintln!("{} {}", "💡 Help:".yellow(), s.yellow()),
        None => provide_error_suggestions(&err.msg),
    }
}

pub fn render_errors(errors: &ErrorList) {
    for (i, err) in errors.iter().enumerate() {
        if i > 0 {
            eprintln!();
        }
        render_error(err);
    }
}

/// Generic hints for messages that carry no suggestion of their own.
pub fn provide_error_suggestions(err_msg: &str) {
    if err_msg.contains("expected ')'") || err_msg.contains("missing ')'") {
        eprintln!("{}", "💡 Help: Check that every '(' has a matching ')'.".yellow());
        eprintln!("    {}", "Example: solar(16.1, before_sunrise)".bright_black());
    } else if err_msg.contains("expected '{'") || err_msg.contains("expected '}'") {
        eprintln!("{}", "💡 Help: Conditional branches are wrapped in braces.".yellow());
        eprintln!("    {}", "Example: if (latitude > 40) { sunrise } else { sunset }".bright_black());
    } else if err_msg.contains("after expression") {
        eprintln!("{}", "💡 Help: A formula is a single expression.".yellow());
        eprintln!("    {}", "Join values with an operator: sunrise + 10min".bright_black());
    } else if err_msg.contains("cannot compare") {
        eprintln!("{}", "💡 Help: Compare numbers with numbers, durations with durations, strings with strings.".yellow());
    } else if err_msg.contains("division by zero") {
        eprintln!("{}", "💡 Help: You cannot divide by zero.".yellow());
        eprintln!("    {}", "Example: (sunset - sunrise) / 12".bright_black());
    } else if err_msg.contains("must be a Time") {
        eprintln!("{}", "💡 Help: Times come from primitives, functions and @references.".yellow());
        eprintln!("    {}", "Durations like 72min are added to a time: sunrise - 72min".bright_black());
    }
}
