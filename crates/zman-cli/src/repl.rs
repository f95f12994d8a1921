use std::io::{self, Write};

use indexmap::IndexMap;
use owo_colors::OwoColorize;
use zman_astro::Time;
use zman_interpreter::{execute, execute_formula_set, BatchError, ExecutionContext};
use zman_lexer::Lexer;
use zman_syntax::token::TokenKind;
use zman_validator::{validate_formula, validate_formula_as};

use crate::common::{parse_date, parse_offset, print_failure, render_errors, ContextArgs};

/// Named formulas plus the context they are evaluated in.
struct Session {
    ctx: ExecutionContext,
    formulas: IndexMap<String, String>,
}

pub fn start_repl(args: &ContextArgs) {
    println!("{}", "Zman REPL. Type :help for help, :quit to exit.".bold().green());

    let mut session = Session {
        ctx: args.context(),
        formulas: IndexMap::new(),
    };

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "zman> ".cyan().to_string() } else { "... > ".cyan().to_string() };
        print!("{}", prompt);
        let _ = io::stdout().flush();

        let mut line = String::new();
        let n = match io::stdin().read_line(&mut line) {
            Ok(n) => n,
            Err(_) => {
                println!("<input error>");
                break;
            }
        };
        if n == 0 {
            println!("\nGoodbye.");
            break;
        }
        let trimmed = line.trim();

        if buffer.is_empty() && trimmed.is_empty() {
            continue;
        }

        if buffer.is_empty() && trimmed.starts_with(':') {
            let (cmd, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
            let rest = rest.trim();
            match cmd {
                ":quit" | ":q" | ":exit" => {
                    println!("Goodbye.");
                    break;
                }
                ":help" | ":h" => print_help(),
                ":let" => session.let_command(rest),
                ":set" => session.set_command(rest),
                ":keys" => session.print_keys(),
                ":ctx" => session.print_context(),
                ":reset" => {
                    session.formulas.clear();
                    session.ctx.clear_cache();
                    println!("{}", "Formulas cleared.".yellow());
                }
                _ => println!("{}", "Unknown command. Type :help.".red()),
            }
            continue;
        }

        buffer.push_str(&line);
        if !is_complete(&buffer) {
            continue;
        }

        if let Some(time) = session.evaluate(&buffer) {
            println!("{}", time.format("%H:%M:%S").bright_blue());
        }
        buffer.clear();
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}  {}", ":let key = formula".yellow(), "Define a named formula");
    println!("  {}  {}", ":set lat|lon|elev|tz|date <value>".yellow(), "Change the context");
    println!("  {}  {}", ":keys".yellow(), "List defined formulas and their times");
    println!("  {}  {}", ":ctx".yellow(), "Show the date, location and sun times");
    println!("  {}  {}", ":reset".yellow(), "Forget every defined formula");
    println!("  {}  {}", ":help".yellow(), "Show this help");
    println!("  {}  {}", ":quit".yellow(), "Exit the REPL");
    println!("Anything else is evaluated as a formula. Unclosed ( or {{ continues on the next line.");
}

impl Session {
    fn evaluate(&mut self, text: &str) -> Option<Time> {
        let keys: Vec<&str> = self.formulas.keys().map(String::as_str).collect();
        let validation = validate_formula(text, &keys);
        let ast = match validation.ast {
            Some(ast) if validation.errors.is_empty() => ast,
            _ => {
                render_errors(&validation.errors.with_source(text));
                return None;
            }
        };
        match execute(&ast, &mut self.ctx) {
            Ok(time) => Some(time),
            Err(errors) => {
                render_errors(&errors.with_source(text));
                None
            }
        }
    }

    fn let_command(&mut self, rest: &str) {
        let Some((key, text)) = rest.split_once('=') else {
            print_failure("usage: :let key = formula");
            return;
        };
        let key = key.trim().trim_start_matches('@');
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            print_failure(format!("invalid formula key '{}'", key));
            return;
        }
        if let Some(time) = self.define(key, text.trim()) {
            println!("{} = {}", key.yellow(), time.format("%H:%M:%S").bright_blue());
        }
    }

    /// Validates and stores a named formula, then re-evaluates the whole set
    /// so dependents see the new value. A failing definition is rolled back.
    fn define(&mut self, key: &str, text: &str) -> Option<Time> {
        let keys: Vec<&str> = self
            .formulas
            .keys()
            .map(String::as_str)
            .filter(|k| *k != key)
            .collect();
        let validation = validate_formula_as(text, &keys, Some(key));
        if !validation.is_valid() {
            render_errors(&validation.errors.with_source(text));
            return None;
        }

        let previous = self.formulas.insert(key.to_string(), text.to_string());
        match self.refresh() {
            Ok(()) => self.ctx.cached(key),
            Err(err) => {
                report_batch(err);
                match previous {
                    Some(old) => {
                        self.formulas.insert(key.to_string(), old);
                    }
                    None => {
                        self.formulas.shift_remove(key);
                    }
                }
                let _ = self.refresh();
                None
            }
        }
    }

    fn refresh(&mut self) -> Result<(), BatchError> {
        self.ctx.clear_cache();
        execute_formula_set(&self.formulas, &mut self.ctx).map(|_| ())
    }

    fn set_command(&mut self, rest: &str) {
        let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Err(msg) = self.apply_setting(field, value.trim()) {
            print_failure(msg);
            return;
        }
        if let Err(err) = self.refresh() {
            report_batch(err);
        }
        self.print_context();
    }

    fn apply_setting(&mut self, field: &str, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Err("usage: :set lat|lon|elev|tz|date <value>".to_string());
        }
        let number = || value.parse::<f64>().map_err(|_| format!("expected a number, got '{}'", value));

        let mut location = *self.ctx.location();
        match field {
            "lat" | "latitude" => location.latitude = number()?,
            "lon" | "longitude" => location.longitude = number()?,
            "elev" | "elevation" => location.elevation = number()?,
            "tz" | "timezone" => location.timezone = parse_offset(value)?,
            "date" => {
                self.ctx.set_date(parse_date(value)?);
                return Ok(());
            }
            other => return Err(format!("unknown setting '{}' (expected lat, lon, elev, tz or date)", other)),
        }
        self.ctx.set_location(location);
        Ok(())
    }

    fn print_keys(&self) {
        if self.formulas.is_empty() {
            println!("{}", "<no formulas>".dimmed());
            return;
        }
        for (key, text) in &self.formulas {
            let time = match self.ctx.cached(key) {
                Some(t) => t.format("%H:%M:%S").to_string(),
                None => "--:--:--".to_string(),
            };
            println!("{} = {}  {}", key.yellow(), time.bright_blue(), text.bright_black());
        }
    }

    fn print_context(&mut self) {
        let date = self.ctx.date();
        let loc = *self.ctx.location();
        println!("{}: {}", "date".yellow(), date);
        println!(
            "{}: {:.4}, {:.4}  {} m  UTC{}",
            "location".yellow(),
            loc.latitude,
            loc.longitude,
            loc.elevation,
            loc.timezone
        );
        let sun = self.ctx.sun_times();
        let show = |t: Option<Time>| t.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_else(|| "none".to_string());
        println!("{}: {}", "sunrise".yellow(), show(sun.sunrise));
        println!("{}: {}", "sunset".yellow(), show(sun.sunset));
    }
}

fn report_batch(err: BatchError) {
    match err {
        BatchError::Cycle(cycle) => print_failure(cycle.to_string()),
        BatchError::Formula { key, errors } => {
            eprintln!("{} {}", "in formula".bright_black(), key.bold());
            render_errors(&errors);
        }
    }
}

/// Input is complete once every `(` and `{` is closed.
fn is_complete(input: &str) -> bool {
    let mut lexer = Lexer::new(input);
    let mut paren = 0i32;
    let mut brace = 0i32;
    loop {
        let tk = lexer.next_token();
        match tk.kind {
            TokenKind::LParen => paren += 1,
            TokenKind::RParen => paren -= 1,
            TokenKind::LBrace => brace += 1,
            TokenKind::RBrace => brace -= 1,
            // let the parser report the bad character
            TokenKind::Illegal => return true,
            TokenKind::Eof => break,
            _ => {}
        }
    }
    paren <= 0 && brace <= 0
}
