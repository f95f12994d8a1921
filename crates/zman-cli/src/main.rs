mod common;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use zman_astro::{Location, Time};
use zman_interpreter::{
    dependency_order, execute, execute_formula_set, execute_with_breakdown, BatchError, Breakdown,
};
use zman_syntax::error::ErrorList;
use zman_validator::{validate_formula, validate_formula_as};

use common::{load_formula_set, render_errors, ContextArgs, FormulaInput};

#[derive(Parser)]
#[command(name = "zman", version, about = "Parse, check and evaluate zman formulas")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of a formula
    Tokens {
        #[command(flatten)]
        input: FormulaInput,
    },

    /// Parse a formula and print its canonical form and result type
    Parse {
        #[command(flatten)]
        input: FormulaInput,

        /// Also print the syntax tree
        #[arg(long)]
        tree: bool,
    },

    /// Check a formula without evaluating it
    Validate {
        #[command(flatten)]
        input: FormulaInput,

        /// Key the formula is stored under; rejects self-references
        #[arg(long)]
        key: Option<String>,

        /// Comma-separated formula keys that @references may name
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },

    /// Evaluate a formula for a date and location
    Eval {
        #[command(flatten)]
        input: FormulaInput,

        #[command(flatten)]
        context: ContextArgs,

        /// Formula set (JSON) evaluated first so @references resolve
        #[arg(long, value_name = "FILE")]
        formulas: Option<PathBuf>,

        /// Show every intermediate time the formula went through
        #[arg(long)]
        breakdown: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate every formula of a JSON formula set
    Batch {
        file: PathBuf,

        #[command(flatten)]
        context: ContextArgs,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the evaluation order of a JSON formula set
    Order { file: PathBuf },

    /// Start an interactive session
    Repl {
        #[command(flatten)]
        context: ContextArgs,
    },
}

/// A failure that has already been reported on stderr.
struct Reported;

fn fail(msg: impl AsRef<str>) -> Reported {
    common::print_failure(msg);
    Reported
}

fn report(errors: ErrorList) -> Reported {
    render_errors(&errors);
    Reported
}

fn report_batch(err: BatchError) -> Reported {
    match err {
        BatchError::Cycle(cycle) => fail(cycle.to_string()),
        BatchError::Formula { key, errors } => {
            eprintln!("{} {}", "in formula".bright_black(), key.bold());
            report(errors)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Tokens { input } => cmd_tokens(&input),
        Commands::Parse { input, tree } => cmd_parse(&input, tree),
        Commands::Validate { input, key, keys } => cmd_validate(&input, key.as_deref(), &keys),
        Commands::Eval {
            input,
            context,
            formulas,
            breakdown,
            json,
        } => cmd_eval(&input, &context, formulas, breakdown, json),
        Commands::Batch { file, context, json } => cmd_batch(file, &context, json),
        Commands::Order { file } => cmd_order(file),
        Commands::Repl { context } => {
            repl::start_repl(&context);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Reported) => ExitCode::FAILURE,
    }
}

fn cmd_tokens(input: &FormulaInput) -> Result<(), Reported> {
    let text = input.read().map_err(fail)?;
    let tokens =
        zman_lexer::tokenize(&text).map_err(|e| report(ErrorList::from(e).with_source(&text)))?;
    for tk in &tokens {
        let kind = format!("{:?}", tk.kind);
        println!("{:>3}:{:<3} {:<12} {}", tk.pos.line, tk.pos.column, kind, tk.literal);
    }
    Ok(())
}

fn cmd_parse(input: &FormulaInput, tree: bool) -> Result<(), Reported> {
    let text = input.read().map_err(fail)?;
    let ast = zman_parser::parse(&text).map_err(|e| report(e.with_source(&text)))?;
    println!("{}", ast);
    println!("{} {}", "type:".bright_black(), ast.value_type());
    if tree {
        println!("{:#?}", ast);
    }
    Ok(())
}

fn cmd_validate(input: &FormulaInput, key: Option<&str>, keys: &[String]) -> Result<(), Reported> {
    let text = input.read().map_err(fail)?;
    let validation = validate_formula_as(&text, keys, key);
    match validation.ast {
        Some(ast) if validation.errors.is_empty() => {
            println!("{} formula is valid ({})", "ok:".green().bold(), ast.value_type());
            Ok(())
        }
        _ => Err(report(validation.errors.with_source(&text))),
    }
}

#[derive(Serialize)]
struct Place {
    latitude: f64,
    longitude: f64,
    elevation: f64,
    timezone: String,
}

impl From<&Location> for Place {
    fn from(loc: &Location) -> Self {
        Self {
            latitude: loc.latitude,
            longitude: loc.longitude,
            elevation: loc.elevation,
            timezone: loc.timezone.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EvalReport<'a> {
    formula: &'a str,
    date: NaiveDate,
    location: Place,
    result: Time,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<Breakdown>,
}

#[derive(Serialize)]
struct BatchReport {
    date: NaiveDate,
    location: Place,
    results: IndexMap<String, Time>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Reported> {
    let out = serde_json::to_string_pretty(value).map_err(|e| fail(format!("Failed to encode JSON: {}", e)))?;
    println!("{}", out);
    Ok(())
}

fn cmd_eval(
    input: &FormulaInput,
    args: &ContextArgs,
    formulas: Option<PathBuf>,
    breakdown: bool,
    json: bool,
) -> Result<(), Reported> {
    let text = input.read().map_err(fail)?;
    let mut ctx = args.context();

    let mut keys: Vec<String> = Vec::new();
    if let Some(path) = formulas {
        let set = load_formula_set(&path).map_err(fail)?;
        let results = execute_formula_set(&set, &mut ctx).map_err(report_batch)?;
        keys.extend(results.into_keys());
    }

    let validation = validate_formula(&text, &keys);
    let ast = match validation.ast {
        Some(ast) if validation.errors.is_empty() => ast,
        _ => return Err(report(validation.errors.with_source(&text))),
    };

    let (result, steps) = if breakdown {
        let eval = execute_with_breakdown(&ast, &mut ctx).map_err(|e| report(e.with_source(&text)))?;
        (eval.result, Some(eval.breakdown))
    } else {
        let time = execute(&ast, &mut ctx).map_err(|e| report(e.with_source(&text)))?;
        (time, None)
    };
    tracing::info!(date = %ctx.date(), result = %result, "formula evaluated");

    if json {
        return print_json(&EvalReport {
            formula: text.trim(),
            date: ctx.date(),
            location: Place::from(ctx.location()),
            result,
            breakdown: steps,
        });
    }

    println!("{}", result.format("%H:%M:%S"));
    if let Some(steps) = steps {
        let width = steps.keys().map(|k| k.len()).max().unwrap_or(0);
        for (name, value) in &steps {
            println!("  {:<width$}  {}", name.bright_black(), value, width = width);
        }
    }
    Ok(())
}

fn cmd_batch(file: PathBuf, args: &ContextArgs, json: bool) -> Result<(), Reported> {
    let set = load_formula_set(&file).map_err(fail)?;
    let keys: Vec<&str> = set.keys().map(String::as_str).collect();

    let mut invalid = false;
    for (key, text) in &set {
        let validation = validate_formula_as(text, &keys, Some(key.as_str()));
        if !validation.errors.is_empty() {
            eprintln!("{} {}", "in formula".bright_black(), key.bold());
            render_errors(&validation.errors);
            invalid = true;
        }
    }
    if invalid {
        return Err(Reported);
    }

    let mut ctx = args.context();
    let results = execute_formula_set(&set, &mut ctx).map_err(report_batch)?;
    tracing::info!(formulas = results.len(), date = %ctx.date(), "formula set evaluated");

    if json {
        return print_json(&BatchReport {
            date: ctx.date(),
            location: Place::from(ctx.location()),
            results,
        });
    }

    let width = results.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, time) in &results {
        println!("{:<width$}  {}", key, time.format("%H:%M:%S"), width = width);
    }
    Ok(())
}

fn cmd_order(file: PathBuf) -> Result<(), Reported> {
    let set = load_formula_set(&file).map_err(fail)?;
    let order = dependency_order(&set).map_err(|e| fail(e.to_string()))?;
    for key in order {
        println!("{}", key);
    }
    Ok(())
}
