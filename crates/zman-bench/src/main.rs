use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Days, FixedOffset, NaiveDate};
use clap::{ArgAction, Parser};
use indexmap::IndexMap;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use zman_astro::Location;
use zman_interpreter::{execute_formula_set, ExecutionContext};
use zman_validator::validate;

#[derive(Parser, Debug)]
#[command(name = "zman-bench", about = "Time the zman formula pipeline over formula sets")]
struct Cli {
    /// Specific set(s) to run (by file stem, e.g. standard). If omitted, runs every set found.
    #[arg(short = 't', long = "test", action = ArgAction::Append)]
    tests: Vec<String>,

    /// Iterations per set (measured)
    #[arg(short = 'n', long = "iterations", default_value_t = 10)]
    iterations: u32,

    /// Warmup iterations (not measured)
    #[arg(short = 'w', long = "warmup", default_value_t = 2)]
    warmup: u32,

    /// Consecutive days each iteration evaluates the set for
    #[arg(short = 'd', long = "days", default_value_t = 30)]
    days: u32,

    /// First evaluated date
    #[arg(long = "start", default_value = "2024-01-01")]
    start: NaiveDate,

    #[arg(long, default_value_t = 31.7683, allow_hyphen_values = true)]
    latitude: f64,

    #[arg(long, default_value_t = 35.2137, allow_hyphen_values = true)]
    longitude: f64,

    /// UTC offset in whole hours
    #[arg(long = "utc-offset", default_value_t = 2, allow_hyphen_values = true)]
    utc_offset: i32,

    /// Directory holding formula sets (*.json); default: benchmark/sets
    #[arg(long = "sets")]
    sets: Option<PathBuf>,

    /// Output JSON file path; default: benchmark/results/<timestamp>.json
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// List discovered sets and exit
    #[arg(long = "list", default_value_t = false)]
    list: bool,
}

#[derive(Debug, Serialize)]
struct BenchResult {
    name: String,
    formulas: usize,
    days: u32,
    iterations: u32,
    avg_total_ms: f64,
    min_total_ms: f64,
    max_total_ms: f64,
    avg_lex_ms: f64,
    avg_parse_ms: f64,
    avg_validate_ms: f64,
    avg_exec_ms: f64,
    /// Average execution time per formula per day.
    us_per_formula_day: f64,
}

#[derive(Debug, Serialize)]
struct OutputDoc {
    timestamp: String,
    zman_version: String,
    benchmarks: Vec<BenchResult>,
}

#[derive(Debug, Clone)]
struct SetCase {
    name: String,
    path: PathBuf,
}

#[derive(Default)]
struct Samples {
    totals: Vec<f64>,
    lexes: Vec<f64>,
    parses: Vec<f64>,
    validates: Vec<f64>,
    execs: Vec<f64>,
}

fn workspace_root() -> PathBuf {
    // crates/zman-bench -> crates -> root
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or(manifest)
}

fn discover_sets(dir: &Path) -> Vec<SetCase> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for e in entries.flatten() {
            let p = e.path();
            if p.extension().and_then(|s| s.to_str()) == Some("json") {
                let name = p.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
                out.push(SetCase { name, path: p });
            }
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn read_set(path: &Path) -> Result<IndexMap<String, String>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid formula set {}: {}", path.display(), e))
}

/// One pass of the pipeline: lex, parse and validate every formula, then
/// evaluate the whole set for each day.
fn run_once(set: &IndexMap<String, String>, cli: &Cli, location: Location, samples: Option<&mut Samples>) -> Result<(), String> {
    let t0 = Instant::now();
    let mut t = Instant::now();

    for (key, text) in set {
        zman_lexer::tokenize(text).map_err(|e| format!("{}: {}", key, e))?;
    }
    let t_lex = t.elapsed();

    t = Instant::now();
    let mut asts = Vec::with_capacity(set.len());
    for (key, text) in set {
        let ast = zman_parser::parse(text).map_err(|e| format!("{}: {}", key, e))?;
        asts.push((key, ast));
    }
    let t_parse = t.elapsed();

    t = Instant::now();
    let keys: Vec<&str> = set.keys().map(String::as_str).collect();
    for (key, ast) in &asts {
        let errors = validate(ast, &keys);
        if !errors.is_empty() {
            return Err(format!("{}: {}", key, errors));
        }
    }
    let t_validate = t.elapsed();

    t = Instant::now();
    let mut ctx = ExecutionContext::new(cli.start, location);
    for day in 0..cli.days {
        let date = cli
            .start
            .checked_add_days(Days::new(u64::from(day)))
            .ok_or_else(|| format!("date out of range: {} + {} days", cli.start, day))?;
        ctx.set_date(date);
        execute_formula_set(set, &mut ctx).map_err(|e| format!("{}: {}", date, e))?;
    }
    let t_exec = t.elapsed();

    if let Some(s) = samples {
        s.lexes.push(dur_ms(t_lex));
        s.parses.push(dur_ms(t_parse));
        s.validates.push(dur_ms(t_validate));
        s.execs.push(dur_ms(t_exec));
        s.totals.push(dur_ms(t0.elapsed()));
    }
    Ok(())
}

fn measure_set(set: &IndexMap<String, String>, cli: &Cli, location: Location) -> Result<Samples, String> {
    for _ in 0..cli.warmup {
        run_once(set, cli, location, None)?;
    }
    let mut samples = Samples::default();
    for _ in 0..cli.iterations {
        run_once(set, cli, location, Some(&mut samples))?;
    }
    Ok(samples)
}

fn dur_ms(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn stats(vals: &[f64]) -> (f64, f64, f64) {
    let min = vals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = if vals.is_empty() { 0.0 } else { vals.iter().sum::<f64>() / (vals.len() as f64) };
    (avg, min, max)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let sets_dir = cli.sets.clone().unwrap_or_else(|| workspace_root().join("benchmark/sets"));
    let mut sets = discover_sets(&sets_dir);

    if cli.list {
        println!("Discovered sets:");
        for s in &sets {
            println!("- {} ({})", s.name, s.path.display());
        }
        return;
    }

    if !cli.tests.is_empty() {
        let wanted: std::collections::HashSet<_> = cli.tests.iter().map(|s| s.to_lowercase()).collect();
        sets.retain(|s| wanted.contains(&s.name.to_lowercase()));
        if sets.is_empty() {
            eprintln!("No matching sets. Use --list to see available.");
            std::process::exit(2);
        }
    }

    if sets.is_empty() {
        eprintln!("No formula sets (*.json) found in {}.", sets_dir.display());
        std::process::exit(2);
    }

    let Some(tz) = FixedOffset::east_opt(cli.utc_offset * 3600) else {
        eprintln!("UTC offset out of range: {}", cli.utc_offset);
        std::process::exit(2);
    };
    let location = Location::new(cli.latitude, cli.longitude, 0.0, tz);

    let mut results = Vec::new();

    for case in &sets {
        let measured = read_set(&case.path).and_then(|set| measure_set(&set, &cli, location).map(|s| (set.len(), s)));
        let (formulas, samples) = match measured {
            Ok(m) => m,
            Err(e) => {
                eprintln!("{}: {}", case.name, e);
                std::process::exit(1);
            }
        };
        tracing::debug!(set = %case.name, formulas, "measured formula set");

        let (avg_t, min_t, max_t) = stats(&samples.totals);
        let (avg_l, _, _) = stats(&samples.lexes);
        let (avg_p, _, _) = stats(&samples.parses);
        let (avg_v, _, _) = stats(&samples.validates);
        let (avg_e, _, _) = stats(&samples.execs);
        let evaluations = (formulas as f64) * f64::from(cli.days.max(1));
        let per_formula_day = avg_e * 1000.0 / evaluations;

        println!(
            "{:>12}: total avg={:.3}ms min={:.3}ms max={:.3}ms | lex={:.3}ms parse={:.3}ms validate={:.3}ms exec={:.3}ms | {:.2}us/formula/day",
            case.name, avg_t, min_t, max_t, avg_l, avg_p, avg_v, avg_e, per_formula_day
        );

        results.push(BenchResult {
            name: case.name.clone(),
            formulas,
            days: cli.days,
            iterations: cli.iterations,
            avg_total_ms: avg_t,
            min_total_ms: min_t,
            max_total_ms: max_t,
            avg_lex_ms: avg_l,
            avg_parse_ms: avg_p,
            avg_validate_ms: avg_v,
            avg_exec_ms: avg_e,
            us_per_formula_day: per_formula_day,
        });
    }

    let out_path = match cli.output.clone() {
        Some(p) => p,
        None => {
            // Windows-safe filename timestamp
            let ts_file = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%SZ").to_string();
            workspace_root().join("benchmark/results").join(format!("{}.json", ts_file))
        }
    };

    let doc = OutputDoc {
        timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        zman_version: env!("CARGO_PKG_VERSION").to_string(),
        benchmarks: results,
    };

    let written = serde_json::to_string_pretty(&doc)
        .map_err(|e| format!("Failed to encode results: {}", e))
        .and_then(|json| {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
            }
            fs::write(&out_path, json).map_err(|e| format!("Failed to write {}: {}", out_path.display(), e))
        });
    if let Err(e) = written {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    println!("\nSaved results to {}", out_path.display());
}
